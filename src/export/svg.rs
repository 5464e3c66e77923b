use std::f32::consts::PI;
use std::path::Path;

use anyhow::{Context, Result};
use egui::{Align, Align2, Color32, Pos2, Rect};
use log::info;
use svg::node::element::{
    Circle, Definitions, Group, Line, LinearGradient, Path as SvgPath, Polygon, Polyline, Rectangle,
    Stop, Text,
};
use svg::Document;

use crate::tree::scene_graph::{FillShape, ScenePrimitive, StrokeStyle, TreeSceneGraph};

/// Converts a scene into an SVG document of the same size.
pub fn scene_to_document(scene: &TreeSceneGraph) -> Document {
    let width = scene.size.x;
    let height = scene.size.y;
    let mut document = Document::new()
        .set("width", width)
        .set("height", height)
        .set("viewBox", (0, 0, width, height));
    if !scene.antialias {
        document = document.set("shape-rendering", "crispEdges");
    }

    let mut defs = Definitions::new();
    let mut gradients = 0usize;
    let mut tree_group = Group::new().set("id", "tree");

    for primitive in &scene.primitives {
        match primitive {
            ScenePrimitive::FillRect { rect, color } => {
                tree_group = tree_group.add(fill(rectangle(rect), *color));
            }
            ScenePrimitive::StrokeRect { rect, style } => {
                tree_group = tree_group.add(stroke(rectangle(rect), style));
            }
            ScenePrimitive::FillCircle {
                center,
                radius,
                color,
            } => {
                tree_group = tree_group.add(fill(circle(*center, *radius), *color));
            }
            ScenePrimitive::StrokeCircle {
                center,
                radius,
                style,
            } => {
                tree_group = tree_group.add(stroke(circle(*center, *radius), style));
            }
            ScenePrimitive::FillPolygon { points, color } => {
                let polygon = Polygon::new().set("points", points_attr(points));
                tree_group = tree_group.add(fill(polygon, *color));
            }
            ScenePrimitive::StrokePolygon { points, style } => {
                let polygon = Polygon::new().set("points", points_attr(points));
                tree_group = tree_group.add(stroke(polygon, style));
            }
            ScenePrimitive::FillGradient {
                shape,
                start,
                end,
                from,
                to,
            } => {
                gradients += 1;
                let id = format!("gradient{gradients}");
                defs = defs.add(
                    LinearGradient::new()
                        .set("id", id.clone())
                        .set("gradientUnits", "userSpaceOnUse")
                        .set("x1", start.x)
                        .set("y1", start.y)
                        .set("x2", end.x)
                        .set("y2", end.y)
                        .add(stop("0", *from))
                        .add(stop("1", *to)),
                );
                let paint = format!("url(#{id})");
                tree_group = match shape {
                    FillShape::Rect(rect) => tree_group.add(rectangle(rect).set("fill", paint)),
                    FillShape::Circle { center, radius } => {
                        tree_group.add(circle(*center, *radius).set("fill", paint))
                    }
                    FillShape::Polygon(points) => tree_group.add(
                        Polygon::new()
                            .set("points", points_attr(points))
                            .set("fill", paint),
                    ),
                };
            }
            ScenePrimitive::StrokeLine { from, to, style } => {
                let line = Line::new()
                    .set("x1", from.x)
                    .set("y1", from.y)
                    .set("x2", to.x)
                    .set("y2", to.y);
                tree_group = tree_group.add(stroke(line, style));
            }
            ScenePrimitive::StrokePolyline { points, style } => {
                let line = Polyline::new().set("points", points_attr(points));
                tree_group = tree_group.add(stroke(line, style).set("fill", "none"));
            }
            ScenePrimitive::StrokeQuadratic {
                from,
                ctrl,
                to,
                style,
            } => {
                let d = format!(
                    "M {} {} Q {} {} {} {}",
                    from.x, from.y, ctrl.x, ctrl.y, to.x, to.y
                );
                tree_group = tree_group.add(path(d, style));
            }
            ScenePrimitive::StrokeCubic {
                from,
                ctrl1,
                ctrl2,
                to,
                style,
            } => {
                let d = format!(
                    "M {} {} C {} {} {} {} {} {}",
                    from.x, from.y, ctrl1.x, ctrl1.y, ctrl2.x, ctrl2.y, to.x, to.y
                );
                tree_group = tree_group.add(path(d, style));
            }
            ScenePrimitive::StrokeArc {
                center,
                radius,
                start_angle,
                end_angle,
                style,
            } => {
                if let Some(d) = arc_path(*center, *radius, *start_angle, *end_angle) {
                    tree_group = tree_group.add(path(d, style));
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
                tree_group = tree_group.add(text_element(text, *anchor, *angle, *align, *size, *color));
            }
        }
    }

    if gradients > 0 {
        document = document.add(defs);
    }
    document.add(tree_group)
}

/// Writes `scene` as an SVG file.
pub fn write_svg(scene: &TreeSceneGraph, path: &Path) -> Result<()> {
    let document = scene_to_document(scene);
    svg::save(path, &document)
        .with_context(|| format!("Failed to save SVG to {}", path.display()))?;
    info!("Wrote SVG {}", path.display());
    Ok(())
}

fn rectangle(rect: &Rect) -> Rectangle {
    Rectangle::new()
        .set("x", rect.min.x)
        .set("y", rect.min.y)
        .set("width", rect.width())
        .set("height", rect.height())
}

fn circle(center: Pos2, radius: f32) -> Circle {
    Circle::new()
        .set("cx", center.x)
        .set("cy", center.y)
        .set("r", radius)
}

fn fill<T: svg::Node>(mut element: T, color: Color32) -> T {
    element.assign("fill", color_to_hex(color));
    if color.a() < 255 {
        element.assign("fill-opacity", color_opacity(color));
    }
    element.assign("stroke", "none");
    element
}

fn stroke<T: svg::Node>(mut element: T, style: &StrokeStyle) -> T {
    element.assign("fill", "none");
    element.assign("stroke", color_to_hex(style.color));
    if style.color.a() < 255 {
        element.assign("stroke-opacity", color_opacity(style.color));
    }
    element.assign("stroke-width", style.width);
    if let Some((on, off)) = style.dash {
        element.assign("stroke-dasharray", format!("{on} {off}"));
    }
    element
}

fn path(d: String, style: &StrokeStyle) -> SvgPath {
    stroke(SvgPath::new().set("d", d), style)
}

fn stop(offset: &str, color: Color32) -> Stop {
    Stop::new()
        .set("offset", offset)
        .set("stop-color", color_to_hex(color))
        .set("stop-opacity", color_opacity(color))
}

fn points_attr(points: &[Pos2]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

/// SVG path data for an arc from `start_angle` to `end_angle` (radians, y down).
fn arc_path(center: Pos2, radius: f32, start_angle: f32, end_angle: f32) -> Option<String> {
    let span = end_angle - start_angle;
    if radius <= 0.0 || span.abs() <= f32::EPSILON {
        return None;
    }
    let point = |a: f32| Pos2::new(center.x + radius * a.cos(), center.y + radius * a.sin());
    let sweep = u8::from(span > 0.0);
    if span.abs() >= 2.0 * PI - 1e-4 {
        // Full circle: two half arcs.
        let a = point(start_angle);
        let b = point(start_angle + PI);
        return Some(format!(
            "M {} {} A {r} {r} 0 1 {sweep} {} {} A {r} {r} 0 1 {sweep} {} {}",
            a.x,
            a.y,
            b.x,
            b.y,
            a.x,
            a.y,
            r = radius
        ));
    }
    let large = u8::from(span.abs() > PI);
    let a = point(start_angle);
    let b = point(end_angle);
    Some(format!(
        "M {} {} A {r} {r} 0 {large} {sweep} {} {}",
        a.x,
        a.y,
        b.x,
        b.y,
        r = radius
    ))
}

fn text_element(text: &str, anchor: Pos2, angle: f32, align: Align2, size: f32, color: Color32) -> Text {
    let text_anchor = match align.x() {
        Align::Min => "start",
        Align::Center => "middle",
        Align::Max => "end",
    };
    let baseline = match align.y() {
        Align::Min => "hanging",
        Align::Center => "middle",
        Align::Max => "alphabetic",
    };
    let mut element = Text::new(text)
        .set("x", anchor.x)
        .set("y", anchor.y)
        .set("font-family", "sans-serif")
        .set("font-size", size)
        .set("fill", color_to_hex(color))
        .set("text-anchor", text_anchor)
        .set("dominant-baseline", baseline);
    if angle.abs() > f32::EPSILON {
        element = element.set(
            "transform",
            format!("rotate({} {} {})", angle.to_degrees(), anchor.x, anchor.y),
        );
    }
    element
}

fn color_to_hex(color: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r(), color.g(), color.b())
}

fn color_opacity(color: Color32) -> f32 {
    color.a() as f32 / 255.0
}

#[cfg(test)]
mod tests {
    use egui::Vec2;

    use super::*;
    use crate::tree::fonts::TreeFontSet;
    use crate::tree::painter::DisplayOptions;
    use crate::tree::scene_graph::PaintRequest;
    use crate::tree::test_support::create_test_tree;
    use crate::tree::viewer::TreeViewer;

    fn scene(primitives: Vec<ScenePrimitive>) -> TreeSceneGraph {
        TreeSceneGraph {
            size: Vec2::new(100.0, 50.0),
            antialias: true,
            primitives,
        }
    }

    #[test]
    fn test_document_carries_size_and_primitives() {
        let doc = scene_to_document(&scene(vec![
            ScenePrimitive::FillRect {
                rect: Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 50.0)),
                color: Color32::WHITE,
            },
            ScenePrimitive::StrokeLine {
                from: Pos2::new(1.0, 2.0),
                to: Pos2::new(30.0, 2.0),
                style: StrokeStyle::solid(1.5, Color32::from_rgb(255, 0, 16)),
            },
        ]))
        .to_string();
        assert!(doc.contains("width=\"100\""), "{doc}");
        assert!(doc.contains("<rect"));
        assert!(doc.contains("stroke=\"#ff0010\""));
        assert!(doc.contains("stroke-width=\"1.5\""));
        assert!(!doc.contains("<defs"), "No gradients, no definitions");
    }

    #[test]
    fn test_text_alignment_and_rotation() {
        let doc = scene_to_document(&scene(vec![ScenePrimitive::Text {
            text: "Homo sapiens".into(),
            anchor: Pos2::new(10.0, 20.0),
            angle: PI / 2.0,
            align: Align2::RIGHT_CENTER,
            size: 10.0,
            color: Color32::BLACK,
        }]))
        .to_string();
        assert!(doc.contains("Homo sapiens"));
        assert!(doc.contains("text-anchor=\"end\""));
        assert!(doc.contains("dominant-baseline=\"middle\""));
        assert!(doc.contains("rotate(90"), "{doc}");
        assert!(doc.contains(" 10 20)"), "Rotation pivots on the anchor");
    }

    #[test]
    fn test_gradient_goes_into_definitions() {
        let doc = scene_to_document(&scene(vec![ScenePrimitive::FillGradient {
            shape: FillShape::Circle {
                center: Pos2::new(5.0, 5.0),
                radius: 3.0,
            },
            start: Pos2::new(2.0, 2.0),
            end: Pos2::new(8.0, 8.0),
            from: Color32::WHITE,
            to: Color32::BLUE,
        }]))
        .to_string();
        assert!(doc.contains("<linearGradient"));
        assert!(doc.contains("url(#gradient1)"));
    }

    #[test]
    fn test_arc_flags() {
        let quarter = arc_path(Pos2::ZERO, 10.0, 0.0, PI / 2.0).unwrap();
        assert!(quarter.contains("A 10 10 0 0 1"), "{quarter}");
        let backwards = arc_path(Pos2::ZERO, 10.0, 0.0, -1.5 * PI).unwrap();
        assert!(backwards.contains("0 1 0"), "{backwards}");
        assert!(arc_path(Pos2::ZERO, 10.0, 1.0, 1.0).is_none());
        let full = arc_path(Pos2::ZERO, 10.0, 0.0, 2.0 * PI).unwrap();
        assert_eq!(full.matches(" A ").count(), 2);
    }

    #[test]
    fn test_tree_export_lists_every_leaf() {
        let mut viewer = TreeViewer::new(DisplayOptions::default(), TreeFontSet::approximate());
        viewer.set_trees(vec![create_test_tree()]);
        let scene = viewer
            .paint(&PaintRequest::export(Vec2::new(600.0, 400.0)))
            .unwrap();
        let doc = scene_to_document(&scene).to_string();
        for name in ["A", "B", "C", "D", "E"] {
            assert!(doc.contains(&format!(">{name}<")), "Missing label {name}");
        }
    }
}
