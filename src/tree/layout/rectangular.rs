use super::{CladogramType, LayoutParams, Placement, MOVE};
use crate::tree::painter::DisplayOptions;
use crate::tree::{NodeId, Position, Tree};

/// Spacing inputs for the rectangular placement in one plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RectSpacing {
    pub root: Position,
    /// Distance between neighbouring visible tips.
    pub pitch: f32,
    pub x_distance: f32,
    pub x_correction: f32,
    pub phylogram: bool,
    pub cladogram_type: CladogramType,
}

impl RectSpacing {
    pub fn primary(tree: &Tree, options: &DisplayOptions, params: &LayoutParams) -> Self {
        let phylogram = options.phylogram_for(tree);
        let root_length = tree.root().map(|r| r.branch_length()).unwrap_or(0.0);
        let root_x = if !tree.rooted {
            MOVE
        } else if phylogram && root_length > 0.0 {
            MOVE + (root_length * params.x_correction as f64) as f32
        } else {
            MOVE + params.x_distance
        };
        let root_y = MOVE / 2.0 + params.y_distance * params.ext_nodes as f32 / 2.0;
        Self {
            root: Position::new(root_x, root_y),
            pitch: params.y_distance,
            x_distance: params.x_distance,
            x_correction: params.x_correction,
            phylogram,
            cladogram_type: options.cladogram_type,
        }
    }

    /// Horizontal pixel length of the branch above `child`.
    fn branch_length(&self, tree: &Tree, child: NodeId, factor: usize) -> f32 {
        if self.phylogram {
            (tree.nodes[child].branch_length() * self.x_correction as f64) as f32
        } else if factor == 0 || self.cladogram_type == CladogramType::NonLinedUp {
            self.x_distance
        } else {
            self.x_distance * factor as f32
        }
    }
}

/// Places the visible tree top-down in preorder. A child's x depends only on its
/// parent's x and its own branch; its y comes from the running vertical extent of
/// the children laid out before it.
pub(crate) fn place(tree: &Tree, spacing: &RectSpacing, max_branches: &[usize]) -> Placement {
    let mut placement = Placement::default();
    let Some(root) = tree.root else {
        return placement;
    };
    let half = spacing.pitch / 2.0;
    let mut positions: Vec<Option<Position>> = vec![None; tree.nodes.len()];
    positions[root] = Some(spacing.root);

    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let Some(pos) = positions[id] else {
            continue;
        };
        placement.positions.push((id, pos));
        let ext = tree.external_count(id) as f32;
        placement
            .extents
            .insert(id, (pos.y - half * ext, pos.y + half * ext));
        if tree.is_collapsed(id) {
            continue;
        }

        let node = &tree.nodes[id];
        let mut y2 = 0.0f32;
        for (i, &child) in node.children.iter().enumerate() {
            let child_ext = tree.external_count(child);
            let factor = if spacing.cladogram_type == CladogramType::Uniform {
                max_branches
                    .get(id)
                    .copied()
                    .unwrap_or(0)
                    .saturating_sub(max_branches.get(child).copied().unwrap_or(0))
            } else {
                tree.external_count(id).saturating_sub(child_ext)
            };
            if i == 0 {
                y2 = pos.y - half * (ext - child_ext as f32);
            } else {
                y2 += half * child_ext as f32;
            }
            let x2 = spacing.branch_length(tree, child, factor);
            positions[child] = Some(Position::new(pos.x + x2, y2));
            y2 += half * child_ext as f32;
        }
        stack.extend(node.children.iter().rev().copied());
    }
    placement
}
