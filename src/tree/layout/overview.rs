use egui::{Rect, Vec2};

use super::{
    circular, rectangular, unrooted, urt_factor, LayoutKind, LayoutParams, Placement, MOVE,
};
use crate::tree::painter::DisplayOptions;
use crate::tree::{Position, Tree};

/// Distance between the overview box and the edges of the visible area.
pub const OV_BORDER: f32 = 10.0;
const OV_TRIGGER_RATIO: f32 = 1.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverviewPlacement {
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
}

impl OverviewPlacement {
    pub fn label(self) -> &'static str {
        match self {
            OverviewPlacement::UpperLeft => "Upper left",
            OverviewPlacement::UpperRight => "Upper right",
            OverviewPlacement::LowerLeft => "Lower left",
            OverviewPlacement::LowerRight => "Lower right",
        }
    }
}

/// Spacing for the miniature overview. Coordinates produced with these
/// parameters are local to the overview box; `origin` is the box's top-left
/// corner relative to the visible area.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OverviewParams {
    pub on: bool,
    pub width: f32,
    pub height: f32,
    pub origin: Position,
    pub x_distance: f32,
    pub pitch: f32,
    pub x_correction: f32,
    pub urt_factor: f32,
    pub root: Position,
}

impl OverviewParams {
    pub fn derive(
        tree: &Tree,
        options: &DisplayOptions,
        primary: &LayoutParams,
        canvas: Vec2,
        visible: Rect,
    ) -> Self {
        let width = options.overview_width.max(1.0);
        let height = options.overview_height.max(1.0);
        let needed = canvas.x > OV_TRIGGER_RATIO * visible.width()
            || canvas.y > OV_TRIGGER_RATIO * visible.height();
        if !options.show_overview || !needed || tree.is_empty() {
            return Self {
                width,
                height,
                ..Self::default()
            };
        }

        let canvas_w = canvas.x.max(1.0);
        let label = primary.longest_label * width / canvas_w;
        let ext = primary.ext_nodes.max(1) as f32;
        let x_distance = if options.cladogram_type.scales_by_depth() {
            (width - label) / primary.max_depth.max(1) as f32
        } else {
            (width - label) / ext
        }
        .max(0.0);
        let x_correction = if primary.tree_height > 0.0 {
            (((width - label) - x_distance) as f64 / primary.tree_height).max(0.0) as f32
        } else {
            0.0
        };
        let urt = urt_factor(
            tree,
            options.phylogram,
            width.min(height),
            primary.max_distance_to_root,
            primary.max_depth,
        );

        Self {
            on: true,
            width,
            height,
            origin: origin(options.overview_placement, visible.size(), width, height),
            x_distance,
            pitch: height / ext,
            x_correction,
            urt_factor: urt,
            root: Position::new(MOVE * width / canvas_w, height / 2.0),
        }
    }
}

/// Top-left corner of the overview box relative to the visible area.
fn origin(placement: OverviewPlacement, visible: Vec2, width: f32, height: f32) -> Position {
    let right = (visible.x - OV_BORDER - width).round();
    let bottom = (visible.y - OV_BORDER - height).round();
    match placement {
        OverviewPlacement::UpperLeft => Position::new(OV_BORDER, OV_BORDER),
        OverviewPlacement::UpperRight => Position::new(right, OV_BORDER),
        OverviewPlacement::LowerLeft => Position::new(OV_BORDER, bottom),
        OverviewPlacement::LowerRight => Position::new(right, bottom),
    }
}

/// Same discipline as the primary plane, run against the overview box.
pub(crate) fn place(
    tree: &Tree,
    options: &DisplayOptions,
    ov: &OverviewParams,
    primary: &LayoutParams,
    max_branches: &[usize],
) -> Placement {
    let center = Position::new(ov.width / 2.0, ov.height / 2.0);
    match options.layout_kind {
        LayoutKind::Rectangular => {
            let spacing = rectangular::RectSpacing {
                root: ov.root,
                pitch: ov.pitch,
                x_distance: ov.x_distance,
                x_correction: ov.x_correction,
                phylogram: options.phylogram_for(tree),
                cladogram_type: options.cladogram_type,
            };
            rectangular::place(tree, &spacing, max_branches)
        }
        LayoutKind::Circular => circular::place(
            tree,
            center,
            ov.width.min(ov.height) / 2.0,
            options.circular_start_angle,
            primary.max_depth,
        ),
        LayoutKind::Unrooted => unrooted::place(
            tree,
            center,
            ov.urt_factor,
            options.unrooted_start_angle,
            options.phylogram_for(tree),
        ),
    }
}

/// The visible part of the canvas, scaled into overview-local coordinates.
pub fn viewport_rect(ov: &OverviewParams, canvas: Vec2, visible: Rect) -> Rect {
    let sx = ov.width / canvas.x.max(1.0);
    let sy = ov.height / canvas.y.max(1.0);
    Rect::from_min_size(
        egui::pos2(visible.min.x * sx, visible.min.y * sy),
        egui::vec2(visible.width() * sx, visible.height() * sy),
    )
}
