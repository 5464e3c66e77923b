use super::{Placement, TWO_PI};
use crate::tree::{Position, Tree};

/// Equal-angle layout: the root sits at `center` and every node hands its wedge
/// to its children in proportion to their external node counts. A child is
/// placed along the bisector of its own wedge.
pub(crate) fn place(
    tree: &Tree,
    center: Position,
    urt_factor: f32,
    start_angle: f64,
    use_branch_lengths: bool,
) -> Placement {
    let mut placement = Placement::default();
    let Some(root) = tree.root else {
        return placement;
    };
    placement.positions.push((root, center));
    placement
        .wedges
        .insert(root, (start_angle, start_angle + TWO_PI));
    placement.angles.insert(root, start_angle + TWO_PI / 2.0);

    let mut stack = vec![(root, center, start_angle, start_angle + TWO_PI)];
    while let Some((id, pos, low, high)) = stack.pop() {
        if tree.is_collapsed(id) {
            continue;
        }
        let node = &tree.nodes[id];
        let enclosed = tree.external_count(id) as f64;
        let mut current = low;
        let mut pending = Vec::with_capacity(node.children.len());
        for &child in &node.children {
            let arc = tree.external_count(child) as f64 / enclosed * (high - low);
            let length = if use_branch_lengths {
                tree.nodes[child].branch_length() * urt_factor as f64
            } else {
                urt_factor as f64
            };
            let mid = current + arc / 2.0;
            let child_pos = Position::new(
                (pos.x as f64 + mid.cos() * length) as f32,
                (pos.y as f64 + mid.sin() * length) as f32,
            );
            placement.positions.push((child, child_pos));
            placement.wedges.insert(child, (current, current + arc));
            placement.angles.insert(child, mid);
            pending.push((child, child_pos, current, current + arc));
            current += arc;
        }
        stack.extend(pending.into_iter().rev());
    }
    placement
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::tree::test_support::strategies::arb_tree;
    use crate::tree::test_support::*;

    #[test]
    fn test_root_at_center_and_children_at_unit_step() {
        let tree = create_test_tree();
        let center = Position::new(200.0, 150.0);
        let placement = place(&tree, center, 30.0, 0.0, false);
        let root = tree.root.unwrap();
        assert_eq!(placement.position_of(root), Some(center));
        let ab = tree.find_by_name("AB").unwrap();
        let p = placement.position_of(ab).unwrap();
        let d = ((p.x - center.x).powi(2) + (p.y - center.y).powi(2)).sqrt();
        assert!((d - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_wedge_proportional_to_leaf_count() {
        let tree = create_test_tree();
        let placement = place(&tree, Position::new(0.0, 0.0), 10.0, 0.0, true);
        let ab = tree.find_by_name("AB").unwrap();
        let (low, high) = placement.wedges[&ab];
        assert!((high - low - TWO_PI * 2.0 / 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_length_branch_places_child_on_parent() {
        let mut tree = create_test_tree();
        let ab = tree.find_by_name("AB").unwrap();
        tree.nodes[ab].length = Some(-1.0);
        let placement = place(&tree, Position::new(5.0, 5.0), 10.0, 0.0, true);
        assert_eq!(placement.position_of(ab), Some(Position::new(5.0, 5.0)));
    }

    proptest! {
        #[test]
        fn prop_child_wedges_partition_parent(tree in arb_tree(40), start in 0.0f64..6.0) {
            let placement = place(&tree, Position::new(0.0, 0.0), 10.0, start, true);
            for id in tree.preorder() {
                let node = &tree.nodes[id];
                if node.is_leaf() {
                    continue;
                }
                let (low, high) = placement.wedges[&id];
                let sum: f64 = node
                    .children
                    .iter()
                    .map(|c| {
                        let (cl, ch) = placement.wedges[c];
                        ch - cl
                    })
                    .sum();
                prop_assert!((sum - (high - low)).abs() < 1e-9);
                let first = placement.wedges[&node.children[0]].0;
                prop_assert!((first - low).abs() < 1e-12);
            }
        }
    }
}
