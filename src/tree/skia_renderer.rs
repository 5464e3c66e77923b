use std::path::Path;

use anyhow::{anyhow, Context, Result};
use egui::{Align, Align2, Color32, Pos2};
use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::Font;
use log::{debug, warn};
use tiny_skia::{
    Color, FillRule, GradientStop, LineCap, LinearGradient, Paint, PathBuilder, Pixmap, Point,
    SpreadMode, Stroke, StrokeDash, Transform,
};

use crate::tree::fonts::load_system_sans_font;
use crate::tree::scene_graph::{FillShape, ScenePrimitive, StrokeStyle, TreeSceneGraph};

/// Rasterizes scenes into RGBA pixmaps and PNG files.
pub struct SkiaTreeRenderer {
    text_font: Option<Font>,
}

impl Default for SkiaTreeRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SkiaTreeRenderer {
    pub fn new() -> Self {
        let text_font = load_system_sans_font();
        if text_font.is_none() {
            warn!("No system sans-serif font found; labels will not be rasterized");
        }
        Self { text_font }
    }

    pub fn without_text() -> Self {
        Self { text_font: None }
    }

    /// `scale` multiplies every coordinate, e.g. 2.0 for a high-DPI image.
    pub fn rasterize(&self, scene: &TreeSceneGraph, scale: f32) -> Result<Pixmap> {
        let ppp = scale.max(0.05);
        let width_px = (scene.size.x * ppp).round().max(1.0) as u32;
        let height_px = (scene.size.y * ppp).round().max(1.0) as u32;

        let mut pixmap = Pixmap::new(width_px, height_px)
            .ok_or_else(|| anyhow!("Cannot allocate a {width_px}x{height_px} pixmap"))?;

        for primitive in &scene.primitives {
            render_primitive(
                &mut pixmap,
                primitive,
                ppp,
                scene.antialias,
                self.text_font.as_ref(),
            );
        }
        debug!(
            "Rasterized {} primitives into {width_px}x{height_px}",
            scene.primitives.len()
        );
        Ok(pixmap)
    }

    pub fn encode_png(&self, scene: &TreeSceneGraph, scale: f32) -> Result<Vec<u8>> {
        let pixmap = self.rasterize(scene, scale)?;
        pixmap.encode_png().context("PNG encoding failed")
    }

    pub fn write_png(&self, scene: &TreeSceneGraph, scale: f32, path: &Path) -> Result<()> {
        let bytes = self.encode_png(scene, scale)?;
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

fn render_primitive(
    pixmap: &mut Pixmap,
    primitive: &ScenePrimitive,
    ppp: f32,
    antialias: bool,
    text_font: Option<&Font>,
) {
    match primitive {
        ScenePrimitive::FillRect { rect, color } => {
            let Some(ts_rect) = tiny_skia::Rect::from_xywh(
                rect.min.x * ppp,
                rect.min.y * ppp,
                (rect.width() * ppp).max(0.0),
                (rect.height() * ppp).max(0.0),
            ) else {
                return;
            };
            let paint = solid_paint(*color, antialias);
            pixmap.fill_rect(ts_rect, &paint, Transform::identity(), None);
        }
        ScenePrimitive::FillCircle {
            center,
            radius,
            color,
        } => {
            if let Some(path) = circle_path(*center, *radius, ppp) {
                fill_path(pixmap, &path, &solid_paint(*color, antialias));
            }
        }
        ScenePrimitive::FillPolygon { points, color } => {
            if let Some(path) = polyline_path(points, ppp, true) {
                fill_path(pixmap, &path, &solid_paint(*color, antialias));
            }
        }
        ScenePrimitive::FillGradient {
            shape,
            start,
            end,
            from,
            to,
        } => {
            let path = match shape {
                FillShape::Rect(rect) => polyline_path(
                    &[rect.left_top(), rect.right_top(), rect.right_bottom(), rect.left_bottom()],
                    ppp,
                    true,
                ),
                FillShape::Circle { center, radius } => circle_path(*center, *radius, ppp),
                FillShape::Polygon(points) => polyline_path(points, ppp, true),
            };
            let Some(path) = path else {
                return;
            };
            let mut paint = solid_paint(*to, antialias);
            if let Some(shader) = LinearGradient::new(
                Point::from_xy(start.x * ppp, start.y * ppp),
                Point::from_xy(end.x * ppp, end.y * ppp),
                vec![
                    GradientStop::new(0.0, to_skia_color(*from)),
                    GradientStop::new(1.0, to_skia_color(*to)),
                ],
                SpreadMode::Pad,
                Transform::identity(),
            ) {
                paint.shader = shader;
            }
            fill_path(pixmap, &path, &paint);
        }
        ScenePrimitive::StrokeRect { rect, style } => {
            let corners = [
                rect.left_top(),
                rect.right_top(),
                rect.right_bottom(),
                rect.left_bottom(),
            ];
            if let Some(path) = polyline_path(&corners, ppp, true) {
                stroke_path(pixmap, &path, style, ppp, antialias);
            }
        }
        ScenePrimitive::StrokeCircle {
            center,
            radius,
            style,
        } => {
            if let Some(path) = circle_path(*center, *radius, ppp) {
                stroke_path(pixmap, &path, style, ppp, antialias);
            }
        }
        ScenePrimitive::StrokePolygon { points, style } => {
            if let Some(path) = polyline_path(points, ppp, true) {
                stroke_path(pixmap, &path, style, ppp, antialias);
            }
        }
        ScenePrimitive::StrokeLine { from, to, style } => {
            if let Some(path) = polyline_path(&[*from, *to], ppp, false) {
                stroke_path(pixmap, &path, style, ppp, antialias);
            }
        }
        ScenePrimitive::StrokePolyline { points, style } => {
            if let Some(path) = polyline_path(points, ppp, false) {
                stroke_path(pixmap, &path, style, ppp, antialias);
            }
        }
        ScenePrimitive::StrokeQuadratic {
            from,
            ctrl,
            to,
            style,
        } => {
            let mut pb = PathBuilder::new();
            pb.move_to(from.x * ppp, from.y * ppp);
            pb.quad_to(ctrl.x * ppp, ctrl.y * ppp, to.x * ppp, to.y * ppp);
            if let Some(path) = pb.finish() {
                stroke_path(pixmap, &path, style, ppp, antialias);
            }
        }
        ScenePrimitive::StrokeCubic {
            from,
            ctrl1,
            ctrl2,
            to,
            style,
        } => {
            let mut pb = PathBuilder::new();
            pb.move_to(from.x * ppp, from.y * ppp);
            pb.cubic_to(
                ctrl1.x * ppp,
                ctrl1.y * ppp,
                ctrl2.x * ppp,
                ctrl2.y * ppp,
                to.x * ppp,
                to.y * ppp,
            );
            if let Some(path) = pb.finish() {
                stroke_path(pixmap, &path, style, ppp, antialias);
            }
        }
        ScenePrimitive::StrokeArc {
            center,
            radius,
            start_angle,
            end_angle,
            style,
        } => {
            let points = arc_points(*center, *radius, *start_angle, *end_angle);
            if let Some(path) = polyline_path(&points, ppp, false) {
                stroke_path(pixmap, &path, style, ppp, antialias);
            }
        }
        ScenePrimitive::Text {
            text,
            anchor,
            angle,
            align,
            size,
            color,
        } => {
            let Some(font) = text_font else {
                return;
            };
            render_text(pixmap, font, text, *anchor, *angle, *align, *size, *color, ppp);
        }
    }
}

fn solid_paint(color: Color32, antialias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_skia_color(color));
    paint.anti_alias = antialias;
    paint
}

fn fill_path(pixmap: &mut Pixmap, path: &tiny_skia::Path, paint: &Paint) {
    pixmap.fill_path(path, paint, FillRule::Winding, Transform::identity(), None);
}

fn circle_path(center: Pos2, radius: f32, ppp: f32) -> Option<tiny_skia::Path> {
    PathBuilder::from_circle(center.x * ppp, center.y * ppp, (radius * ppp).max(0.5))
}

fn polyline_path(points: &[Pos2], ppp: f32, close: bool) -> Option<tiny_skia::Path> {
    let (first, rest) = points.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let mut pb = PathBuilder::new();
    pb.move_to(first.x * ppp, first.y * ppp);
    for p in rest {
        pb.line_to(p.x * ppp, p.y * ppp);
    }
    if close {
        pb.close();
    }
    pb.finish()
}

fn stroke_path(
    pixmap: &mut Pixmap,
    path: &tiny_skia::Path,
    style: &StrokeStyle,
    ppp: f32,
    antialias: bool,
) {
    let paint = solid_paint(style.color, antialias);

    let mut stroke = Stroke::default();
    stroke.width = (style.width * ppp).max(1.0);
    stroke.line_cap = LineCap::Round;
    if let Some((dash, gap)) = style.dash {
        stroke.dash = StrokeDash::new(vec![(dash * ppp).max(1.0), (gap * ppp).max(1.0)], 0.0);
    }

    pixmap.stroke_path(path, &paint, &stroke, Transform::identity(), None);
}

fn to_skia_color(color: Color32) -> Color {
    Color::from_rgba8(color.r(), color.g(), color.b(), color.a())
}

/// Unscaled points along an arc; the step count follows the arc length.
fn arc_points(center: Pos2, radius: f32, start_angle: f32, end_angle: f32) -> Vec<Pos2> {
    let delta = end_angle - start_angle;
    let steps = ((delta.abs() * radius.abs() / 2.0).ceil() as usize).clamp(12, 320);
    (0..=steps)
        .map(|i| {
            let a = start_angle + delta * i as f32 / steps as f32;
            Pos2::new(center.x + radius * a.cos(), center.y + radius * a.sin())
        })
        .collect()
}

fn align_fraction(align: Align) -> f32 {
    match align {
        Align::Min => 0.0,
        Align::Center => 0.5,
        Align::Max => 1.0,
    }
}

#[allow(clippy::too_many_arguments)]
fn render_text(
    pixmap: &mut Pixmap,
    font: &Font,
    text: &str,
    anchor: Pos2,
    angle: f32,
    align: Align2,
    size: f32,
    color: Color32,
    ppp: f32,
) {
    if text.is_empty() {
        return;
    }

    let px = (size * ppp).max(6.0);
    let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings::default());
    layout.append(&[font], &TextStyle::new(text, px, 0));

    let glyphs = layout.glyphs();
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for g in glyphs.iter().filter(|g| g.width > 0 && g.height > 0) {
        min_x = min_x.min(g.x);
        min_y = min_y.min(g.y);
        max_x = max_x.max(g.x + g.width as f32);
        max_y = max_y.max(g.y + g.height as f32);
    }
    if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
        return;
    }

    let text_w = (max_x - min_x).max(1.0);
    let text_h = (max_y - min_y).max(1.0);
    let anchor_local = (
        text_w * align_fraction(align.x()),
        text_h * align_fraction(align.y()),
    );

    let ax = anchor.x * ppp;
    let ay = anchor.y * ppp;
    let (sin_a, cos_a) = angle.sin_cos();
    let width_px = pixmap.width() as usize;
    let data = pixmap.data_mut();

    for g in glyphs.iter().filter(|g| g.width > 0 && g.height > 0) {
        let (metrics, bitmap) = font.rasterize_config(g.key);
        if metrics.width == 0 || metrics.height == 0 {
            continue;
        }
        let gx = g.x - min_x;
        let gy = g.y - min_y;

        for y in 0..metrics.height {
            for x in 0..metrics.width {
                let cov = bitmap[y * metrics.width + x] as f32 / 255.0;
                let src_a = (color.a() as f32 / 255.0) * cov;
                if src_a <= 0.0 {
                    continue;
                }

                // Pixel centres keep rotated glyphs stable.
                let dx = gx + x as f32 + 0.5 - anchor_local.0;
                let dy = gy + y as f32 + 0.5 - anchor_local.1;
                let world_x = ax + dx * cos_a - dy * sin_a;
                let world_y = ay + dx * sin_a + dy * cos_a;

                let x0 = world_x.floor();
                let y0 = world_y.floor();
                let fx = world_x - x0;
                let fy = world_y - y0;
                let (x0, y0) = (x0 as i32, y0 as i32);

                for (px, py, weight) in [
                    (x0, y0, (1.0 - fx) * (1.0 - fy)),
                    (x0 + 1, y0, fx * (1.0 - fy)),
                    (x0, y0 + 1, (1.0 - fx) * fy),
                    (x0 + 1, y0 + 1, fx * fy),
                ] {
                    blend_pixel_premultiplied(data, width_px, px, py, color, src_a * weight);
                }
            }
        }
    }
}

fn blend_pixel_premultiplied(
    data: &mut [u8],
    width: usize,
    x: i32,
    y: i32,
    color: Color32,
    src_a: f32,
) {
    if src_a <= 0.0 || x < 0 || y < 0 || width == 0 {
        return;
    }
    let (xu, yu) = (x as usize, y as usize);
    let height = data.len() / (width * 4);
    if xu >= width || yu >= height {
        return;
    }
    let idx = (yu * width + xu) * 4;

    let src = [color.r(), color.g(), color.b()].map(|c| c as f32 / 255.0 * src_a);
    for (channel, s) in src.into_iter().enumerate() {
        let dst = data[idx + channel] as f32 / 255.0;
        data[idx + channel] = ((s + dst * (1.0 - src_a)).clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    let dst_a = data[idx + 3] as f32 / 255.0;
    data[idx + 3] = ((src_a + dst_a * (1.0 - src_a)).clamp(0.0, 1.0) * 255.0).round() as u8;
}
