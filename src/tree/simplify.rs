use egui::Rect;

use super::layout::{LayoutKind, LayoutParams, TWO_PI};
use super::painter::RenderTarget;

/// Tuned constants for dynamic hiding. They have no derivation beyond looking
/// reasonable at common screen sizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HidingConfig {
    pub label_height_factor: f32,
    /// Radius standing in for the circumference in unrooted mode.
    pub unrooted_radius: f32,
    /// Internal labels are hidden when the shortest child branch is shorter than this.
    pub internal_label_min_branch: f32,
    /// Branch shortcutting starts at this hiding factor.
    pub shortcut_threshold: usize,
    pub shortcut_min_distance: f32,
    /// `(hiding factor above, minimum distance)`, checked from the last entry down.
    pub shortcut_steps: [(usize, f32); 3],
    pub cull_branch_margin: f32,
    pub cull_label_margin: f32,
}

impl Default for HidingConfig {
    fn default() -> Self {
        Self {
            label_height_factor: 1.5,
            unrooted_radius: 10.0,
            internal_label_min_branch: 20.0,
            shortcut_threshold: 40,
            shortcut_min_distance: 1.5,
            shortcut_steps: [(100, 2.0), (1000, 3.0), (4000, 4.0)],
            cull_branch_margin: 20.0,
            cull_label_margin: 40.0,
        }
    }
}

/// How many visible tips share one label slot before labels start to overlap.
pub fn hiding_factor(
    kind: LayoutKind,
    params: &LayoutParams,
    font_height: f32,
    config: &HidingConfig,
) -> usize {
    let ext = params.ext_nodes.max(1) as f64;
    let fh = font_height as f64;
    let factor = config.label_height_factor as f64;
    let raw = match kind {
        LayoutKind::Rectangular => {
            if params.y_distance <= 0.0 {
                return params.ext_nodes.max(1);
            }
            (0.5 + fh / (factor * params.y_distance as f64)).floor()
        }
        LayoutKind::Circular => {
            let radius = (params.circ_radius as f64).max(1.0);
            (fh * factor * ext / (TWO_PI * radius)).floor()
        }
        LayoutKind::Unrooted => {
            (fh * factor * ext / (TWO_PI * config.unrooted_radius as f64)).floor()
        }
    };
    raw.max(0.0) as usize
}

/// Per-pass decisions about what detail gets painted. Never affects coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Simplification {
    pub factor: usize,
    pub active: bool,
    /// Minimum branch extent worth drawing, when shortcutting applies.
    pub shortcut_distance: Option<f32>,
    /// Visible area with margins applied, for the screen target only.
    pub cull: Option<Rect>,
    pub config: HidingConfig,
}

impl Simplification {
    pub fn new(
        kind: LayoutKind,
        params: &LayoutParams,
        font_height: f32,
        dynamic_hiding: bool,
        target: RenderTarget,
        visible: Rect,
        config: HidingConfig,
    ) -> Self {
        let factor = hiding_factor(kind, params, font_height, &config);
        let active = dynamic_hiding && factor > 1;
        let shortcut_distance = if target == RenderTarget::Screen
            && kind == LayoutKind::Rectangular
            && factor >= config.shortcut_threshold
        {
            let min = config
                .shortcut_steps
                .iter()
                .rev()
                .find(|(above, _)| factor > *above)
                .map(|(_, d)| *d)
                .unwrap_or(config.shortcut_min_distance);
            Some(min)
        } else {
            None
        };
        let cull = (target == RenderTarget::Screen).then_some(visible);
        Self {
            factor,
            active,
            shortcut_distance,
            cull,
            config,
        }
    }

    /// Nothing is hidden, shortcut or culled.
    pub fn none() -> Self {
        Self {
            factor: 1,
            active: false,
            shortcut_distance: None,
            cull: None,
            config: HidingConfig::default(),
        }
    }

    /// `visible_index` is the 1-based position of the tip in paint order.
    pub fn show_external_label(&self, visible_index: usize, exempt: bool) -> bool {
        !self.active || exempt || visible_index % self.factor == 1
    }

    pub fn show_internal_label(
        &self,
        min_child_branch: f32,
        ext: usize,
        y_distance: f32,
        font_height: f32,
        exempt: bool,
    ) -> bool {
        if !self.active || exempt {
            return true;
        }
        min_child_branch >= self.config.internal_label_min_branch
            && y_distance * ext as f32 / 2.0 >= font_height
    }

    /// True when the branch is too small in both axes to be worth drawing.
    pub fn shortcut(&self, dx: f32, dy: f32) -> bool {
        match self.shortcut_distance {
            Some(min) => dx.abs() <= min && dy.abs() <= min,
            None => false,
        }
    }

    /// True when a branch spanning `y1..y2` lies entirely outside the visible rows.
    pub fn branch_culled(&self, y1: f32, y2: f32) -> bool {
        match self.cull {
            Some(rect) => {
                let m = self.config.cull_branch_margin;
                (y1 < rect.min.y - m && y2 < rect.min.y - m)
                    || (y1 > rect.max.y + m && y2 > rect.max.y + m)
            }
            None => false,
        }
    }

    pub fn label_culled(&self, y: f32) -> bool {
        match self.cull {
            Some(rect) => {
                let m = self.config.cull_label_margin;
                y < rect.min.y - m || y > rect.max.y + m
            }
            None => false,
        }
    }
}
