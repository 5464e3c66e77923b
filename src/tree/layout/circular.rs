use super::{Placement, TWO_PI};
use crate::tree::{Position, Tree};

/// Visible tips are spread evenly around the circle starting at `start_angle`;
/// an internal node sits at the mean angle of its children, at a radius that is
/// linear in its depth. Branch lengths are not used.
pub(crate) fn place(
    tree: &Tree,
    center: Position,
    radius: f32,
    start_angle: f64,
    max_depth: usize,
) -> Placement {
    let mut placement = Placement::default();
    let Some(root) = tree.root else {
        return placement;
    };
    let max_depth = max_depth.max(1) as f64;
    let radius = radius as f64;
    let at = |angle: f64, r: f64| {
        Position::new(
            (center.x as f64 + r * radius * angle.cos()) as f32,
            (center.y as f64 + r * radius * angle.sin()) as f32,
        )
    };

    let tips = tree.visible_tips();
    let step = TWO_PI / tips.len().max(1) as f64;
    let mut angle = start_angle;
    for (index, &tip) in tips.iter().enumerate() {
        if tip == root {
            continue;
        }
        placement.angles.insert(tip, angle);
        placement.draw_index.insert(tip, index);
        angle += step;
    }

    let depths = tree.depths();
    let visible = tree.visible_preorder();
    let mut inner: Vec<usize> = visible
        .iter()
        .copied()
        .filter(|&id| !placement.angles.contains_key(&id))
        .collect();
    // children before parents
    inner.reverse();
    for id in inner {
        let children = &tree.nodes[id].children;
        let theta = if children.is_empty() {
            start_angle
        } else {
            children
                .iter()
                .map(|c| placement.angles.get(c).copied().unwrap_or(start_angle))
                .sum::<f64>()
                / children.len() as f64
        };
        placement.angles.insert(id, theta);
    }

    for id in visible {
        let theta = placement.angles.get(&id).copied().unwrap_or(start_angle);
        let r = if id == root {
            0.0
        } else if tree.nodes[id].is_leaf() || tree.is_collapsed(id) {
            1.0
        } else {
            1.0 - (max_depth - depths[id] as f64) / max_depth
        };
        placement.positions.push((id, at(theta, r)));
    }
    placement
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::test_support::*;

    fn distance(a: Position, b: Position) -> f32 {
        ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
    }

    #[test]
    fn test_tips_evenly_spaced_on_circle() {
        let tree = create_test_tree();
        let center = Position::new(100.0, 100.0);
        let placement = place(&tree, center, 80.0, 0.0, tree.max_depth());
        let tips = tree.external_nodes();
        for &tip in &tips {
            let p = placement.position_of(tip).unwrap();
            assert!((distance(p, center) - 80.0).abs() < 1e-3);
        }
        let step = TWO_PI / 5.0;
        for (i, &tip) in tips.iter().enumerate() {
            assert!((placement.angles[&tip] - step * i as f64).abs() < 1e-9);
            assert_eq!(placement.draw_index[&tip], i);
        }
    }

    #[test]
    fn test_internal_radius_linear_in_depth() {
        let tree = create_test_tree();
        let center = Position::new(0.0, 0.0);
        let placement = place(&tree, center, 90.0, 0.0, 3);
        let de = tree.find_by_name("DE").unwrap();
        let d = distance(placement.position_of(de).unwrap(), center);
        assert!((d - 60.0).abs() < 1e-3, "Depth 2 of 3 should sit at two thirds");
        let root = tree.root.unwrap();
        assert_eq!(placement.position_of(root), Some(center));
    }

    #[test]
    fn test_internal_angle_is_mean_of_children() {
        let tree = create_test_tree();
        let placement = place(&tree, Position::new(0.0, 0.0), 50.0, 0.3, 3);
        let ab = tree.find_by_name("AB").unwrap();
        let a = tree.find_by_name("A").unwrap();
        let b = tree.find_by_name("B").unwrap();
        let mean = (placement.angles[&a] + placement.angles[&b]) / 2.0;
        assert!((placement.angles[&ab] - mean).abs() < 1e-9);
    }

    #[test]
    fn test_collapsed_clade_takes_one_slot() {
        let mut tree = create_test_tree();
        let cde = tree.find_by_name("CDE").unwrap();
        tree.nodes[cde].collapse = true;
        tree.invalidate();
        let placement = place(&tree, Position::new(0.0, 0.0), 50.0, 0.0, tree.max_depth());
        assert_eq!(placement.draw_index.len(), 3);
        assert_eq!(placement.positions.len(), 5);
        let c = tree.find_by_name("C").unwrap();
        assert!(placement.position_of(c).is_none());
    }
}
