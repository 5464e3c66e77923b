use egui::{Align2, Color32, Pos2, Rect, Vec2};
use log::debug;

use crate::tree::fonts::TreeFontSet;
use crate::tree::layout::{viewport_rect, LayoutCache, LayoutKind, MOVE};
use crate::tree::painter::{
    branch_length_text, confidence_text, node_label_text, BranchStyle, NodeFill, NodeLabelDirection,
    NodeShape, RenderTarget, TreePainter, EURO_D, ROUNDED_D,
};
use crate::tree::simplify::Simplification;
use crate::tree::{NodeId, Tree, TreeNode};

const MIN_ROOT_LENGTH: f32 = 3.0;
const OV_FOUND_BOX: f32 = 2.0;
const OV_VIEWPORT_MIN: f32 = 6.0;
const OV_STROKE: f32 = 0.5;
const ARC_MIN_LENGTH: f64 = 1.5;
const SCALE_TICK: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub width: f32,
    pub color: Color32,
    pub dash: Option<(f32, f32)>,
}

impl StrokeStyle {
    pub fn solid(width: f32, color: Color32) -> Self {
        Self {
            width,
            color,
            dash: None,
        }
    }
}

/// Geometry that can carry a gradient fill.
#[derive(Debug, Clone, PartialEq)]
pub enum FillShape {
    Rect(Rect),
    Circle { center: Pos2, radius: f32 },
    Polygon(Vec<Pos2>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScenePrimitive {
    FillRect {
        rect: Rect,
        color: Color32,
    },
    StrokeRect {
        rect: Rect,
        style: StrokeStyle,
    },
    FillCircle {
        center: Pos2,
        radius: f32,
        color: Color32,
    },
    StrokeCircle {
        center: Pos2,
        radius: f32,
        style: StrokeStyle,
    },
    FillPolygon {
        points: Vec<Pos2>,
        color: Color32,
    },
    StrokePolygon {
        points: Vec<Pos2>,
        style: StrokeStyle,
    },
    /// Linear gradient running from `from` at `start` to `to` at `end`.
    FillGradient {
        shape: FillShape,
        start: Pos2,
        end: Pos2,
        from: Color32,
        to: Color32,
    },
    StrokeLine {
        from: Pos2,
        to: Pos2,
        style: StrokeStyle,
    },
    StrokePolyline {
        points: Vec<Pos2>,
        style: StrokeStyle,
    },
    StrokeQuadratic {
        from: Pos2,
        ctrl: Pos2,
        to: Pos2,
        style: StrokeStyle,
    },
    StrokeCubic {
        from: Pos2,
        ctrl1: Pos2,
        ctrl2: Pos2,
        to: Pos2,
        style: StrokeStyle,
    },
    /// Angles in radians, y pointing down.
    StrokeArc {
        center: Pos2,
        radius: f32,
        start_angle: f32,
        end_angle: f32,
        style: StrokeStyle,
    },
    Text {
        text: String,
        anchor: Pos2,
        angle: f32,
        align: Align2,
        size: f32,
        color: Color32,
    },
}

/// Drawing primitives for one paint pass, in the coordinates of the output surface.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeSceneGraph {
    pub size: Vec2,
    pub antialias: bool,
    pub primitives: Vec<ScenePrimitive>,
}

impl TreeSceneGraph {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.primitives.iter().filter_map(|p| match p {
            ScenePrimitive::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// What the caller wants painted: the full canvas size, the part of it that is
/// visible, and the sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintRequest {
    pub canvas: Vec2,
    pub visible: Rect,
    pub target: RenderTarget,
}

impl PaintRequest {
    pub fn export(canvas: Vec2) -> Self {
        Self {
            canvas,
            visible: Rect::from_min_size(Pos2::ZERO, canvas),
            target: RenderTarget::Export,
        }
    }

    pub fn print(canvas: Vec2) -> Self {
        Self {
            target: RenderTarget::Print,
            ..Self::export(canvas)
        }
    }

    pub fn screen(canvas: Vec2, visible: Rect) -> Self {
        Self {
            canvas,
            visible,
            target: RenderTarget::Screen,
        }
    }

    /// Top-left corner of the output surface in canvas coordinates.
    fn origin(&self) -> Pos2 {
        match self.target {
            RenderTarget::Screen => self.visible.min,
            RenderTarget::Print | RenderTarget::Export => Pos2::ZERO,
        }
    }

    fn surface_size(&self) -> Vec2 {
        match self.target {
            RenderTarget::Screen => self.visible.size(),
            RenderTarget::Print | RenderTarget::Export => self.canvas,
        }
    }
}

/// Unit of the scale bar for a tree whose deepest tip sits at `max_distance`.
pub fn scale_unit(max_distance: f64) -> f64 {
    match max_distance {
        d if d <= 0.5 => 0.01,
        d if d <= 5.0 => 0.1,
        d if d <= 50.0 => 1.0,
        d if d <= 500.0 => 10.0,
        _ => 100.0,
    }
}

/// Flips text on the left half of a circle so it never reads upside down.
fn readable_rotation(angle: f32) -> (f32, Align2) {
    let degree = angle.to_degrees().rem_euclid(360.0);
    if degree > 90.0 && degree < 270.0 {
        (angle + std::f32::consts::PI, Align2::RIGHT_CENTER)
    } else {
        (angle, Align2::LEFT_CENTER)
    }
}

pub fn build_tree_scene(
    tree: &Tree,
    cache: &LayoutCache,
    fonts: &TreeFontSet,
    painter: &TreePainter,
    request: &PaintRequest,
) -> TreeSceneGraph {
    let mut builder = SceneBuilder::new(tree, cache, fonts, painter, request);
    builder.paint();
    debug!(
        "Scene for {:?}: {} primitives, hiding factor {}",
        request.target,
        builder.primitives.len(),
        builder.sim.factor
    );
    TreeSceneGraph {
        size: request.surface_size(),
        antialias: painter.options.antialias,
        primitives: builder.primitives,
    }
}

struct SceneBuilder<'a> {
    tree: &'a Tree,
    cache: &'a LayoutCache,
    fonts: &'a TreeFontSet,
    painter: &'a TreePainter<'a>,
    request: &'a PaintRequest,
    sim: Simplification,
    origin: Pos2,
    kind: LayoutKind,
    stroke: f32,
    primitives: Vec<ScenePrimitive>,
}

impl<'a> SceneBuilder<'a> {
    fn new(
        tree: &'a Tree,
        cache: &'a LayoutCache,
        fonts: &'a TreeFontSet,
        painter: &'a TreePainter<'a>,
        request: &'a PaintRequest,
    ) -> Self {
        let options = painter.options;
        let kind = cache.kind.unwrap_or(options.layout_kind);
        let sim = Simplification::new(
            kind,
            &cache.params,
            fonts.large().height,
            options.dynamic_hiding,
            request.target,
            request.visible,
            options.hiding,
        );
        Self {
            tree,
            cache,
            fonts,
            painter,
            request,
            sim,
            origin: request.origin(),
            kind,
            stroke: painter.stroke_width(cache.params.y_distance),
            primitives: Vec::new(),
        }
    }

    fn to_local(&self, p: Pos2) -> Pos2 {
        Pos2::new(p.x - self.origin.x, p.y - self.origin.y)
    }

    fn primary(&self, id: NodeId) -> Option<Pos2> {
        self.tree.nodes.get(id)?.primary.map(|p| p.to_pos2())
    }

    fn paint(&mut self) {
        self.primitives.push(ScenePrimitive::FillRect {
            rect: Rect::from_min_size(Pos2::ZERO, self.request.surface_size()),
            color: self.painter.background(),
        });
        let Some(root) = self.tree.root else {
            return;
        };
        if self.primary(root).is_none() {
            return;
        }

        if self.kind == LayoutKind::Rectangular && self.tree.rooted {
            self.paint_root_branch(root);
        }

        let mut tip_index = 0usize;
        for id in self.tree.visible_preorder() {
            let node = &self.tree.nodes[id];
            let Some(pos) = self.primary(id) else {
                continue;
            };
            let is_tip = node.is_leaf() || self.tree.is_collapsed(id);
            if is_tip && id != root {
                tip_index += 1;
            }

            if let Some(parent_pos) = node.parent.and_then(|p| self.primary(p)) {
                if !self.sim.shortcut(pos.x - parent_pos.x, pos.y - parent_pos.y) {
                    self.paint_branch(node, parent_pos, pos);
                }
            }

            if self.tree.is_collapsed(id) {
                self.paint_collapsed(node, pos);
            } else {
                self.paint_node_box(node, pos);
            }

            let index = match self.kind {
                LayoutKind::Circular => self
                    .cache
                    .draw_index
                    .get(&id)
                    .map(|i| i + 1)
                    .unwrap_or(tip_index),
                _ => tip_index,
            };
            self.paint_labels(node, pos, is_tip, index);
        }

        if self.kind == LayoutKind::Rectangular {
            self.paint_scale();
        }
        if self.request.target == RenderTarget::Screen && self.cache.overview.on {
            self.paint_overview();
        }
    }

    fn branch_style(&self, node: &TreeNode) -> StrokeStyle {
        StrokeStyle::solid(self.stroke, self.painter.branch_color(node))
    }

    fn line(&mut self, from: Pos2, to: Pos2, style: StrokeStyle) {
        let (from, to) = (self.to_local(from), self.to_local(to));
        self.primitives.push(ScenePrimitive::StrokeLine { from, to, style });
    }

    fn paint_root_branch(&mut self, root: NodeId) {
        let Some(pos) = self.primary(root) else {
            return;
        };
        let node = &self.tree.nodes[root];
        let params = &self.cache.params;
        let length = node.branch_length();
        let d = if self.painter.options.phylogram_for(self.tree) && length > 0.0 {
            (length * params.x_correction as f64) as f32
        } else {
            params.x_distance
        }
        .max(MIN_ROOT_LENGTH);
        let style = self.branch_style(node);
        self.line(Pos2::new(pos.x - d, pos.y), pos, style);
    }

    fn paint_branch(&mut self, node: &TreeNode, from: Pos2, to: Pos2) {
        match self.kind {
            LayoutKind::Rectangular => self.paint_rectangular_branch(node, from, to),
            LayoutKind::Circular => self.paint_circular_branch(node, to),
            LayoutKind::Unrooted => {
                if !self.sim.branch_culled(from.y, to.y) {
                    let style = self.branch_style(node);
                    self.line(from, to, style);
                }
            }
        }
    }

    fn paint_rectangular_branch(&mut self, node: &TreeNode, from: Pos2, to: Pos2) {
        let style = self.branch_style(node);
        let (x1, y1, x2, y2) = (from.x, from.y, to.x, to.y);
        let branch_style = self.painter.options.branch_style;
        match branch_style {
            BranchStyle::Triangular | BranchStyle::Convex | BranchStyle::Curved => {
                if self.sim.branch_culled(y1, y2) {
                    return;
                }
                let (from, to) = (self.to_local(from), self.to_local(to));
                let primitive = match branch_style {
                    BranchStyle::Triangular => ScenePrimitive::StrokeLine { from, to, style },
                    BranchStyle::Convex => ScenePrimitive::StrokeQuadratic {
                        from,
                        ctrl: Pos2::new(from.x, to.y),
                        to,
                        style,
                    },
                    _ => {
                        let (dx, dy) = (to.x - from.x, to.y - from.y);
                        ScenePrimitive::StrokeCubic {
                            from,
                            ctrl1: Pos2::new(from.x + dx * 0.4, from.y + dy * 0.2),
                            ctrl2: Pos2::new(from.x + dx * 0.6, from.y + dy * 0.8),
                            to,
                            style,
                        }
                    }
                };
                self.primitives.push(primitive);
            }
            BranchStyle::Rectangular | BranchStyle::Euro | BranchStyle::Rounded => {
                let outer = self.tree.is_first_child(node.id) || self.tree.is_last_child(node.id);
                let mut y2_r = y1;
                if branch_style == BranchStyle::Rounded {
                    y2_r = if y2 > y1 {
                        (y2 - ROUNDED_D).max(y1)
                    } else {
                        (y2 + ROUNDED_D).min(y1)
                    };
                }
                if (outer || branch_style != BranchStyle::Rectangular)
                    && !self.sim.branch_culled(y1, y2)
                {
                    match branch_style {
                        BranchStyle::Euro => {
                            self.line(from, Pos2::new((x1 + EURO_D).min(x2), y2), style)
                        }
                        BranchStyle::Rounded => self.line(from, Pos2::new(x1, y2_r), style),
                        _ => self.line(from, Pos2::new(x1, y2), style),
                    }
                }
                if self.sim.branch_culled(y2, y2) {
                    return;
                }
                match branch_style {
                    BranchStyle::Euro => {
                        if x1 + EURO_D < x2 {
                            self.line(Pos2::new(x1 + EURO_D, y2), to, style);
                        }
                    }
                    BranchStyle::Rounded => {
                        let x1_r = x1 + ROUNDED_D;
                        if x1_r < x2 {
                            self.line(Pos2::new(x1_r, y2), to, style);
                        }
                        let corner_x = x1_r.min(x2);
                        let points: Vec<Pos2> = (0..=8)
                            .map(|i| {
                                let t = i as f32 / 8.0 * std::f32::consts::FRAC_PI_2;
                                self.to_local(Pos2::new(
                                    x1 + (corner_x - x1) * (1.0 - t.cos()),
                                    y2_r + (y2 - y2_r) * t.sin(),
                                ))
                            })
                            .collect();
                        self.primitives
                            .push(ScenePrimitive::StrokePolyline { points, style });
                    }
                    _ => self.line(Pos2::new(x1, y2), to, style),
                }
            }
        }
    }

    fn paint_circular_branch(&mut self, node: &TreeNode, to: Pos2) {
        let Some(parent) = node.parent else {
            return;
        };
        let (Some(&angle), Some(&parent_angle)) =
            (self.cache.angles.get(&node.id), self.cache.angles.get(&parent))
        else {
            return;
        };
        let Some(parent_pos) = self.primary(parent) else {
            return;
        };
        let center = self.cache.params.circ_center.to_pos2();
        let parent_radius = (parent_pos - center).length();
        if self.sim.branch_culled(to.y, center.y + angle.sin() as f32 * parent_radius) {
            return;
        }
        let style = self.branch_style(node);
        let arc = parent_angle - angle;
        if (self.tree.is_first_child(node.id) || self.tree.is_last_child(node.id))
            && ((parent_radius as f64 * arc).abs() > ARC_MIN_LENGTH
                || self.request.target != RenderTarget::Screen)
        {
            self.primitives.push(ScenePrimitive::StrokeArc {
                center: self.to_local(center),
                radius: parent_radius,
                start_angle: angle as f32,
                end_angle: parent_angle as f32,
                style,
            });
        }
        let shoulder = Pos2::new(
            center.x + angle.cos() as f32 * parent_radius,
            center.y + angle.sin() as f32 * parent_radius,
        );
        self.line(to, shoulder, style);
    }

    fn paint_node_box(&mut self, node: &TreeNode, pos: Pos2) {
        let options = self.painter.options;
        let found = self.painter.is_highlighted(node.id);
        let has_event = options.show_events && node.data.event.is_some();
        let wanted = if node.is_leaf() {
            options.show_node_shapes_external
        } else {
            options.show_node_shapes_internal
        };
        if !(found || wanted || has_event) || self.sim.label_culled(pos.y) {
            return;
        }
        let size = options.node_shape_size;
        let half = size / 2.0;
        let color = self.painter.node_box_color(node);
        let center = self.to_local(pos);
        let shape = match options.node_shape {
            NodeShape::Circle => FillShape::Circle {
                center,
                radius: half,
            },
            NodeShape::Rectangle => {
                FillShape::Rect(Rect::from_center_size(center, Vec2::splat(size)))
            }
        };
        let start = Pos2::new(center.x - half, center.y - half);
        let end = Pos2::new(center.x + half, center.y + half);
        self.fill_shape(shape, color, start, end);
    }

    /// Fills per the configured node fill, outlining everything but solid fills.
    fn fill_shape(&mut self, shape: FillShape, color: Color32, start: Pos2, end: Pos2) {
        let fill = if self.painter.black_and_white() {
            NodeFill::Solid
        } else {
            self.painter.options.node_fill
        };
        let background = self.painter.background();
        match fill {
            NodeFill::Solid => self.primitives.push(solid_fill(&shape, color)),
            NodeFill::None => self.primitives.push(solid_fill(&shape, background)),
            NodeFill::Gradient => self.primitives.push(ScenePrimitive::FillGradient {
                shape: shape.clone(),
                start,
                end,
                from: background,
                to: color,
            }),
        }
        if fill != NodeFill::Solid {
            let style = StrokeStyle::solid(self.stroke, color);
            self.primitives.push(outline(shape, style));
        }
    }

    fn paint_collapsed(&mut self, node: &TreeNode, pos: Pos2) {
        if self.sim.label_culled(pos.y) {
            return;
        }
        let tree = self.tree;
        let count = tree.all_external_descendants(node.id).max(1);
        let box_size = self.painter.options.node_shape_size + 1.0;
        let half_pitch = self.cache.params.y_distance / 2.0;
        let d = match self.kind {
            LayoutKind::Rectangular if count > 1000 => half_pitch,
            LayoutKind::Rectangular => (count as f32).log10() * half_pitch / 2.5,
            _ => box_size,
        }
        .max(box_size);

        let parent_pos = node.parent.and_then(|p| self.primary(p));
        let direction = match (self.kind, self.cache.angles.get(&node.id)) {
            (LayoutKind::Rectangular, _) | (_, None) => Vec2::new(1.0, 0.0),
            (_, Some(&angle)) => Vec2::new(angle.cos() as f32, angle.sin() as f32),
        };
        let normal = Vec2::new(-direction.y, direction.x);
        let apex = match (self.kind, parent_pos) {
            (LayoutKind::Rectangular, Some(pp)) => {
                Pos2::new((pos.x - 2.0 * box_size).max(pp.x + 1.0), pos.y)
            }
            _ => pos - direction * 2.0 * box_size,
        };
        let base = pos + direction;
        let points: Vec<Pos2> = [apex, base - normal * d, base + normal * d]
            .into_iter()
            .map(|p| self.to_local(p))
            .collect();
        let color = self.painter.collapsed_color(tree, node);
        let (start, end) = (points[0], self.to_local(base));
        self.fill_shape(FillShape::Polygon(points), color, start, end);
    }

    fn paint_labels(&mut self, node: &TreeNode, pos: Pos2, is_tip: bool, index: usize) {
        if self.sim.label_culled(pos.y) {
            return;
        }
        let found = self.painter.is_highlighted(node.id);
        match self.kind {
            LayoutKind::Rectangular => {
                if is_tip {
                    if self.sim.show_external_label(index, found) {
                        self.paint_node_text(node, pos);
                    }
                } else {
                    let min_child = node
                        .children
                        .iter()
                        .filter_map(|&c| self.primary(c))
                        .map(|c| c.x - pos.x)
                        .fold(f32::INFINITY, f32::min);
                    let ext = self.tree.external_count(node.id);
                    if self.sim.show_internal_label(
                        min_child,
                        ext,
                        self.cache.params.y_distance,
                        self.fonts.large().height,
                        found,
                    ) {
                        self.paint_node_text(node, pos);
                    }
                }
                self.paint_branch_annotations(node, pos);
            }
            LayoutKind::Circular | LayoutKind::Unrooted => {
                if is_tip && self.sim.show_external_label(index, found) {
                    self.paint_radial_text(node, pos);
                }
            }
        }
    }

    fn label_for(&self, node: &TreeNode) -> String {
        let mut text = node_label_text(node, self.painter.options);
        if self.tree.is_collapsed(node.id) {
            let count = self.tree.all_external_descendants(node.id);
            if text.is_empty() {
                text = format!("({count})");
            } else {
                text.push_str(&format!(" ({count})"));
            }
        }
        text
    }

    fn paint_node_text(&mut self, node: &TreeNode, pos: Pos2) {
        let text = self.label_for(node);
        if text.is_empty() {
            return;
        }
        let offset = 2.0 * self.painter.options.node_shape_size;
        let anchor = self.to_local(Pos2::new(pos.x + offset, pos.y));
        self.primitives.push(ScenePrimitive::Text {
            text,
            anchor,
            angle: 0.0,
            align: Align2::LEFT_CENTER,
            size: self.fonts.large_size(),
            color: self.painter.label_color(node),
        });
    }

    fn paint_radial_text(&mut self, node: &TreeNode, pos: Pos2) {
        let text = self.label_for(node);
        if text.is_empty() {
            return;
        }
        let angle = self.cache.angles.get(&node.id).copied().unwrap_or(0.0) as f32;
        let offset = 2.0 * self.painter.options.node_shape_size;
        let direction = Vec2::new(angle.cos(), angle.sin());
        let anchor = self.to_local(pos + direction * offset);
        let (angle, align) = match self.painter.options.node_label_direction {
            NodeLabelDirection::Radial => readable_rotation(angle),
            NodeLabelDirection::Horizontal if direction.x < 0.0 => (0.0, Align2::RIGHT_CENTER),
            NodeLabelDirection::Horizontal => (0.0, Align2::LEFT_CENTER),
        };
        self.primitives.push(ScenePrimitive::Text {
            text,
            anchor,
            angle,
            align,
            size: self.fonts.large_size(),
            color: self.painter.label_color(node),
        });
    }

    /// Branch length above and confidence below the horizontal part of a branch.
    fn paint_branch_annotations(&mut self, node: &TreeNode, pos: Pos2) {
        let options = self.painter.options;
        let Some(parent_pos) = node.parent.and_then(|p| self.primary(p)) else {
            return;
        };
        let style = options.branch_style;
        let small = self.fonts.small();
        if options.show_branch_lengths && options.phylogram_for(self.tree) {
            if let Some(text) = branch_length_text(node, options) {
                let anchor = Pos2::new(
                    parent_pos.x + style.annotation_offset(),
                    pos.y - small.descent,
                );
                self.primitives.push(ScenePrimitive::Text {
                    text,
                    anchor: self.to_local(anchor),
                    angle: 0.0,
                    align: Align2::LEFT_BOTTOM,
                    size: small.size,
                    color: self.painter.branch_length_color(),
                });
            }
        }
        if options.show_confidences && style.has_horizontal_segment() {
            if let Some(text) = confidence_text(&node.data.confidences, options) {
                let end = match style {
                    BranchStyle::Euro => pos.x + EURO_D,
                    BranchStyle::Rounded => pos.x + ROUNDED_D,
                    _ => pos.x,
                };
                let anchor = Pos2::new((parent_pos.x + end) / 2.0, pos.y - 1.0);
                self.primitives.push(ScenePrimitive::Text {
                    text,
                    anchor: self.to_local(anchor),
                    angle: 0.0,
                    align: Align2::CENTER_TOP,
                    size: small.size,
                    color: self.painter.confidence_color(),
                });
            }
        }
    }

    fn paint_scale(&mut self) {
        let options = self.painter.options;
        let params = &self.cache.params;
        if !options.show_scale
            || !options.phylogram_for(self.tree)
            || params.x_correction <= 0.0
            || params.max_distance_to_root <= 0.0
        {
            return;
        }
        let unit = scale_unit(params.max_distance_to_root);
        let visible = self.request.visible;
        let x1 = visible.min.x + MOVE;
        let x2 = x1 + (unit * params.x_correction as f64) as f32;
        let y1 = match self.request.target {
            RenderTarget::Screen => visible.max.y,
            RenderTarget::Print | RenderTarget::Export => self.request.canvas.y,
        } - 12.0;
        let y2 = y1 - SCALE_TICK;
        let y3 = y1 - SCALE_TICK / 2.0;
        let color = self.painter.branch_length_color();
        let style = StrokeStyle::solid(1.0, color);
        self.line(Pos2::new(x1, y1), Pos2::new(x1, y2), style);
        self.line(Pos2::new(x2, y1), Pos2::new(x2, y2), style);
        self.line(Pos2::new(x1, y3), Pos2::new(x2, y3), style);

        let mut label = crate::tree::painter::format_decimal(unit, 2);
        if let Some(u) = self.tree.distance_unit.as_deref().filter(|u| !u.is_empty()) {
            label.push_str(&format!(" [{u}]"));
        }
        self.primitives.push(ScenePrimitive::Text {
            text: label,
            anchor: self.to_local(Pos2::new(x1 + 2.0, y3 - 2.0)),
            angle: 0.0,
            align: Align2::LEFT_BOTTOM,
            size: self.fonts.small_size(),
            color,
        });
    }

    /// Miniature of the whole tree with the visible area marked. Overview
    /// coordinates are local to the box, and the box origin is relative to the
    /// visible area, which is also the origin of the screen surface.
    fn paint_overview(&mut self) {
        let ov = self.cache.overview;
        let origin = ov.origin.to_pos2().to_vec2();
        let frame = Rect::from_min_size(origin.to_pos2(), Vec2::new(ov.width, ov.height));
        let color = self.painter.colors.overview;
        self.primitives.push(ScenePrimitive::FillRect {
            rect: frame,
            color: self.painter.background(),
        });
        self.primitives.push(ScenePrimitive::StrokeRect {
            rect: frame,
            style: StrokeStyle::solid(OV_STROKE, color),
        });
        let style = StrokeStyle::solid(OV_STROKE, color);
        let at = |id: NodeId| -> Option<Pos2> {
            self.tree
                .nodes
                .get(id)?
                .overview
                .map(|p| p.to_pos2() + origin)
        };

        for id in self.tree.visible_preorder() {
            let node = &self.tree.nodes[id];
            let Some(pos) = at(id) else {
                continue;
            };
            if let Some(parent_pos) = node.parent.and_then(at) {
                let (dx, dy) = (pos.x - parent_pos.x, pos.y - parent_pos.y);
                if dx.abs() > 2.0 || dy.abs() > 2.0 {
                    let primitive = match self.kind {
                        LayoutKind::Rectangular if self.painter.options.branch_style.has_horizontal_segment() => {
                            ScenePrimitive::StrokePolyline {
                                points: vec![parent_pos, Pos2::new(parent_pos.x, pos.y), pos],
                                style,
                            }
                        }
                        _ => ScenePrimitive::StrokeLine {
                            from: parent_pos,
                            to: pos,
                            style,
                        },
                    };
                    self.primitives.push(primitive);
                }
            }
            if self.tree.is_collapsed(id) {
                let count = self.tree.all_external_descendants(id).max(2) as f32;
                let d = (count.log10() * ov.pitch / 2.0).max(1.0);
                self.primitives.push(ScenePrimitive::FillPolygon {
                    points: vec![
                        pos,
                        Pos2::new(pos.x + 2.0 * d, pos.y - d),
                        Pos2::new(pos.x + 2.0 * d, pos.y + d),
                    ],
                    color,
                });
            }
            if self.painter.is_highlighted(id) {
                self.primitives.push(ScenePrimitive::FillRect {
                    rect: Rect::from_center_size(pos, Vec2::splat(OV_FOUND_BOX)),
                    color: self.painter.colors.found,
                });
            }
        }

        let view = viewport_rect(&ov, self.request.canvas, self.request.visible).translate(origin);
        let found = self.painter.colors.found;
        if view.width() < OV_VIEWPORT_MIN || view.height() < OV_VIEWPORT_MIN {
            let size = Vec2::new(
                view.width().max(OV_VIEWPORT_MIN),
                view.height().max(OV_VIEWPORT_MIN),
            );
            self.primitives.push(ScenePrimitive::FillRect {
                rect: Rect::from_min_size(view.min, size),
                color: found,
            });
        } else {
            self.primitives.push(ScenePrimitive::StrokeRect {
                rect: view,
                style: StrokeStyle::solid(1.0, found),
            });
        }
    }
}

fn solid_fill(shape: &FillShape, color: Color32) -> ScenePrimitive {
    match shape {
        FillShape::Rect(rect) => ScenePrimitive::FillRect { rect: *rect, color },
        FillShape::Circle { center, radius } => ScenePrimitive::FillCircle {
            center: *center,
            radius: *radius,
            color,
        },
        FillShape::Polygon(points) => ScenePrimitive::FillPolygon {
            points: points.clone(),
            color,
        },
    }
}

fn outline(shape: FillShape, style: StrokeStyle) -> ScenePrimitive {
    match shape {
        FillShape::Rect(rect) => ScenePrimitive::StrokeRect { rect, style },
        FillShape::Circle { center, radius } => ScenePrimitive::StrokeCircle {
            center,
            radius,
            style,
        },
        FillShape::Polygon(points) => ScenePrimitive::StrokePolygon { points, style },
    }
}
