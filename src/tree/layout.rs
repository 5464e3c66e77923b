use std::collections::{HashMap, HashSet};

use egui::{Rect, Vec2};
use log::debug;

use super::fonts::{TreeFontSet, FONT_SIZE_CHANGE_STEP};
use super::painter::{self, DisplayOptions};
use super::{NodeId, Position, Tree};

mod circular;
mod overview;
mod rectangular;
mod unrooted;

pub use overview::{viewport_rect, OverviewParams, OverviewPlacement, OV_BORDER};

/// Margin around the drawing, in pixels.
pub const MOVE: f32 = 20.0;
pub const TWO_PI: f64 = std::f64::consts::TAU;

const LONGEST_LABEL_START: f32 = 30.0;
const LONGEST_LABEL_MIN_CAP: f32 = 40.0;
const LONGEST_LABEL_MAX_RATIO: f32 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    Rectangular,
    Circular,
    Unrooted,
}

impl LayoutKind {
    pub fn label(self) -> &'static str {
        match self {
            LayoutKind::Rectangular => "Rectangular",
            LayoutKind::Circular => "Circular",
            LayoutKind::Unrooted => "Unrooted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CladogramType {
    /// Branch steps scale with the number of external nodes left behind.
    ExtNodeSum,
    /// Every branch gets the same step; tips are not lined up.
    NonLinedUp,
    /// Branch steps scale with the change in branches-to-leaf.
    Uniform,
}

impl CladogramType {
    pub fn label(self) -> &'static str {
        match self {
            CladogramType::ExtNodeSum => "External node sum",
            CladogramType::NonLinedUp => "Non lined up",
            CladogramType::Uniform => "Uniform",
        }
    }

    fn scales_by_depth(self) -> bool {
        !matches!(self, CladogramType::ExtNodeSum)
    }
}

/// Which of the two coordinate fields of a node a placement writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Primary,
    Overview,
}

/// Spacing quantities derived once per layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutParams {
    pub width: f32,
    pub height: f32,
    pub longest_label: f32,
    /// External node count used for spacing (collapsed clades count once).
    pub ext_nodes: usize,
    pub max_depth: usize,
    pub tree_height: f64,
    pub max_distance_to_root: f64,
    pub x_distance: f32,
    /// Vertical distance between neighbouring visible tips.
    pub y_distance: f32,
    pub x_correction: f32,
    pub urt_factor: f32,
    pub circ_center: Position,
    pub circ_radius: f32,
}

impl LayoutParams {
    pub fn derive(
        tree: &Tree,
        options: &DisplayOptions,
        canvas: Vec2,
        visible: Rect,
        longest_label: f32,
    ) -> Self {
        let width = canvas.x.max(1.0);
        let height = canvas.y.max(1.0);
        let max_depth = tree.max_depth();
        let ext_nodes = spacing_ext_count(tree, max_depth);

        let avail = width - longest_label - MOVE;
        let x_distance = if options.cladogram_type.scales_by_depth() {
            avail / (max_depth as f32 + 1.0)
        } else {
            avail / (ext_nodes as f32 + 3.0)
        }
        .max(0.0);
        let y_distance = ((height - MOVE) / ext_nodes as f32).max(0.0);

        let tree_height = tree.height();
        let x_correction = if tree_height > 0.0 {
            ((width - MOVE - longest_label - x_distance) as f64 / tree_height).max(0.0) as f32
        } else {
            0.0
        };

        let max_distance_to_root = tree.max_distance_to_root();
        let d = visible.width().min(visible.height()).max(1.0);
        let urt_factor = urt_factor(tree, options.phylogram, d, max_distance_to_root, max_depth);

        let circ_radius = (width.min(height) / 2.0 - (MOVE + longest_label)).max(1.0);
        let circ_offset = circ_radius + MOVE + longest_label;

        Self {
            width,
            height,
            longest_label,
            ext_nodes,
            max_depth,
            tree_height,
            max_distance_to_root,
            x_distance,
            y_distance,
            x_correction,
            urt_factor,
            circ_center: Position::new(circ_offset, circ_offset),
            circ_radius,
        }
    }
}

/// Converts branch-length units to pixels for the unrooted layout.
pub(crate) fn urt_factor(
    tree: &Tree,
    phylogram: bool,
    d: f32,
    max_distance_to_root: f64,
    max_depth: usize,
) -> f32 {
    if phylogram && tree.has_branch_lengths() && max_distance_to_root > 0.0 {
        (d as f64 / (2.0 * max_distance_to_root)) as f32
    } else if max_depth > 0 {
        d / (2.0 * max_depth as f32)
    } else {
        d / 2.0
    }
}

/// Root external count, or the depth for a tree with a single external node.
fn spacing_ext_count(tree: &Tree, max_depth: usize) -> usize {
    let ext = tree.root.map(|r| tree.external_count(r)).unwrap_or(1);
    if ext == 1 {
        max_depth.max(1)
    } else {
        ext
    }
}

/// Coordinates computed by one discipline for one plane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placement {
    pub positions: Vec<(NodeId, Position)>,
    /// Angle of each placed node (circular and unrooted).
    pub angles: HashMap<NodeId, f64>,
    /// Order in which visible tips were placed around the circle.
    pub draw_index: HashMap<NodeId, usize>,
    /// Angular wedge `(low, high)` allotted to each node (unrooted).
    pub wedges: HashMap<NodeId, (f64, f64)>,
    /// Vertical extent `(top, bottom)` allotted to each node (rectangular).
    pub extents: HashMap<NodeId, (f32, f32)>,
}

impl Placement {
    pub fn position_of(&self, id: NodeId) -> Option<Position> {
        self.positions
            .iter()
            .find(|(node, _)| *node == id)
            .map(|(_, pos)| *pos)
    }
}

/// Writes a placement into one plane, clearing every coordinate it does not set.
pub fn apply(tree: &mut Tree, placement: &Placement, plane: Plane) {
    for node in &mut tree.nodes {
        match plane {
            Plane::Primary => node.primary = None,
            Plane::Overview => node.overview = None,
        }
    }
    for &(id, pos) in &placement.positions {
        if let Some(node) = tree.nodes.get_mut(id) {
            match plane {
                Plane::Primary => node.primary = Some(pos),
                Plane::Overview => node.overview = Some(pos),
            }
        }
    }
}

/// Per-pass cached quantities shared by the renderer and the simplification controller.
/// Rebuilt as a whole by [`compute`]; edits only flip `valid`.
#[derive(Debug, Clone, Default)]
pub struct LayoutCache {
    pub valid: bool,
    pub kind: Option<LayoutKind>,
    pub params: LayoutParams,
    pub overview: OverviewParams,
    pub angles: HashMap<NodeId, f64>,
    pub draw_index: HashMap<NodeId, usize>,
    pub wedges: HashMap<NodeId, (f64, f64)>,
    pub collapsed_external: HashSet<NodeId>,
    pub max_branches_to_leaf: Vec<usize>,
}

impl LayoutCache {
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn max_branches(&self, id: NodeId) -> usize {
        self.max_branches_to_leaf.get(id).copied().unwrap_or(0)
    }
}

/// Runs a complete layout pass: label measurement, automatic font fitting,
/// spacing parameters, primary coordinates and overview coordinates.
pub fn compute(
    tree: &mut Tree,
    fonts: &mut TreeFontSet,
    options: &DisplayOptions,
    canvas: Vec2,
    visible: Rect,
) -> LayoutCache {
    tree.invalidate();
    if tree.is_empty() {
        tree.clear_positions();
        return LayoutCache {
            valid: true,
            ..LayoutCache::default()
        };
    }

    let width = canvas.x.max(1.0);
    let mut longest = longest_label_width(tree, fonts, options, width);
    if options.auto_font_size {
        longest = fit_fonts(tree, fonts, options, width, longest);
    }

    let params = LayoutParams::derive(tree, options, canvas, visible, longest);
    let max_branches = max_branches_to_leaf_all(tree);
    debug!(
        "Layout {:?}: ext={} depth={} x_dist={:.3} y_dist={:.3} x_corr={:.3} urt={:.3}",
        options.layout_kind,
        params.ext_nodes,
        params.max_depth,
        params.x_distance,
        params.y_distance,
        params.x_correction,
        params.urt_factor
    );

    let primary = place(tree, options, &params, &max_branches);
    apply(tree, &primary, Plane::Primary);

    let overview = OverviewParams::derive(tree, options, &params, canvas, visible);
    let ov_placement = if overview.on {
        overview::place(tree, options, &overview, &params, &max_branches)
    } else {
        Placement::default()
    };
    apply(tree, &ov_placement, Plane::Overview);

    LayoutCache {
        valid: true,
        kind: Some(options.layout_kind),
        params,
        overview,
        angles: primary.angles,
        draw_index: primary.draw_index,
        wedges: primary.wedges,
        collapsed_external: collapsed_external_nodes(tree),
        max_branches_to_leaf: max_branches,
    }
}

/// Primary-plane placement for the active discipline.
pub fn place(
    tree: &Tree,
    options: &DisplayOptions,
    params: &LayoutParams,
    max_branches: &[usize],
) -> Placement {
    match options.layout_kind {
        LayoutKind::Rectangular => {
            let spacing = rectangular::RectSpacing::primary(tree, options, params);
            rectangular::place(tree, &spacing, max_branches)
        }
        LayoutKind::Circular => circular::place(
            tree,
            params.circ_center,
            params.circ_radius,
            options.circular_start_angle,
            params.max_depth,
        ),
        LayoutKind::Unrooted => unrooted::place(
            tree,
            Position::new(params.width / 2.0, params.height / 2.0),
            params.urt_factor,
            options.unrooted_start_angle,
            options.phylogram_for(tree),
        ),
    }
}

/// Width of the longest visible external-node label, clamped to the panel.
pub fn longest_label_width(
    tree: &Tree,
    fonts: &TreeFontSet,
    options: &DisplayOptions,
    width: f32,
) -> f32 {
    let max_length = (LONGEST_LABEL_MAX_RATIO * (width - MOVE))
        .round()
        .max(LONGEST_LABEL_MIN_CAP);
    let mut longest = LONGEST_LABEL_START;
    for id in tree.external_nodes() {
        if tree.nodes[id].collapse {
            continue;
        }
        let text = painter::node_label_text(&tree.nodes[id], options);
        let sum = fonts.large_width(&text);
        if sum >= max_length {
            return max_length;
        }
        longest = longest.max(sum);
    }
    longest.min(max_length)
}

/// Shrinks the fonts while labels take more than 70% of the width, or grows them
/// back towards their pre-shrink size while labels take less than 60%.
fn fit_fonts(
    tree: &Tree,
    fonts: &mut TreeFontSet,
    options: &DisplayOptions,
    width: f32,
    mut longest: f32,
) -> f32 {
    let shrink_limit = 0.7 * width;
    let grow_limit = 0.6 * width;
    if longest > grow_limit && fonts.large_size() > 2.0 + FONT_SIZE_CHANGE_STEP {
        while longest > shrink_limit && fonts.large_size() > 2.0 {
            let before = fonts.large_size();
            fonts.decrease_size(fonts.min_size(), true);
            if fonts.large_size() >= before {
                break;
            }
            longest = longest_label_width(tree, fonts, options, width);
            debug!("Auto font size: shrunk to {} pt", fonts.large_size());
        }
    } else {
        while longest < grow_limit
            && fonts.is_decreased_by_system()
            && fonts.large_size() <= fonts.large_memory() - FONT_SIZE_CHANGE_STEP
        {
            fonts.increase_size();
            let grown = longest_label_width(tree, fonts, options, width);
            if grown > shrink_limit {
                fonts.decrease_size(fonts.min_size(), true);
                break;
            }
            longest = grown;
            debug!("Auto font size: grew to {} pt", fonts.large_size());
        }
    }
    longest
}

/// Largest number of branches to a visible tip, for every node.
pub fn max_branches_to_leaf_all(tree: &Tree) -> Vec<usize> {
    let mut best = vec![0usize; tree.nodes.len()];
    for id in tree.postorder() {
        if tree.is_collapsed(id) {
            continue;
        }
        best[id] = tree.nodes[id]
            .children
            .iter()
            .map(|&c| best[c] + 1)
            .max()
            .unwrap_or(0);
    }
    best
}

/// External nodes hidden below a collapsed ancestor (or collapsed themselves).
pub fn collapsed_external_nodes(tree: &Tree) -> HashSet<NodeId> {
    tree.external_nodes()
        .into_iter()
        .filter(|&id| tree.is_collapsed(id) || tree.is_hidden_by_collapse(id))
        .collect()
}
