use std::fmt;

use egui::Color32;
use log::{debug, warn};

use super::painter::DisplayOptions;
use super::{BranchData, NodeId, Tree, TreeNode};

/// Operations that an unrooted display refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOperation {
    Collapse,
    Reroot,
    Subtree,
    Cut,
    Copy,
    Paste,
    Delete,
    AddNode,
    Colorize,
}

impl EditOperation {
    fn verb(self) -> &'static str {
        match self {
            EditOperation::Collapse => "collapse",
            EditOperation::Reroot => "re-root",
            EditOperation::Subtree => "get a sub/super tree",
            EditOperation::Cut => "cut a subtree",
            EditOperation::Copy => "copy a subtree",
            EditOperation::Paste => "paste a subtree",
            EditOperation::Delete => "delete",
            EditOperation::AddNode => "add a node",
            EditOperation::Colorize => "colorize a subtree",
        }
    }
}

/// Reasons a structural edit is refused. A refused edit leaves the tree untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    UnrootedDisplay(EditOperation),
    NotRerootable,
    RerootInSubtree,
    TooFewExternalNodes,
    SubtreeOfExternalNode,
    SubtreeOfRoot,
    SubtreeStackFull(usize),
    SwapTooManyChildren(usize),
    CutRoot,
    EmptyBuffer,
    SiblingOfRoot,
    DeleteEntireTree,
    UnknownNode(NodeId),
    NoTree,
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::UnrootedDisplay(op) => {
                write!(f, "Cannot {} in unrooted display type", op.verb())
            }
            EditError::NotRerootable => write!(f, "This tree is not rerootable"),
            EditError::RerootInSubtree => write!(f, "Cannot re-root while a subtree is displayed"),
            EditError::TooFewExternalNodes => {
                write!(f, "Need at least two external nodes to re-root")
            }
            EditError::SubtreeOfExternalNode => write!(f, "Cannot get a subtree of an external node"),
            EditError::SubtreeOfRoot => write!(f, "Cannot get a subtree of the root node"),
            EditError::SubtreeStackFull(max) => {
                write!(f, "Cannot nest more than {max} subtree views")
            }
            EditError::SwapTooManyChildren(n) => write!(
                f,
                "Cannot swap descendants of nodes with more than 2 descendants (node has {n})"
            ),
            EditError::CutRoot => write!(f, "Cannot cut entire tree as subtree"),
            EditError::EmptyBuffer => {
                write!(f, "No tree in buffer (need to copy or cut a subtree first)")
            }
            EditError::SiblingOfRoot => write!(f, "Cannot add a sibling to the root"),
            EditError::DeleteEntireTree => write!(f, "Cannot delete entire tree"),
            EditError::UnknownNode(id) => write!(f, "Node {id} is not part of the displayed tree"),
            EditError::NoTree => write!(f, "No tree loaded"),
        }
    }
}

impl std::error::Error for EditError {}

/// Where new material goes relative to the target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    Sibling,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Remove the node and hand its children to its parent.
    NodeOnly,
    Subtree,
}

/// Which displayed field leads when sorting descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortPriority {
    Taxonomy,
    Sequence,
    NodeName,
}

impl SortPriority {
    /// Taxonomy unless no taxonomy field is shown; then sequence, then node names.
    pub fn from_options(options: &DisplayOptions) -> Self {
        let taxonomy_shown = options.show_taxonomy_code
            || options.show_taxonomy_scientific
            || options.show_taxonomy_common;
        let sequence_shown = options.show_sequence_accession
            || options.show_sequence_name
            || options.show_sequence_symbol;
        if taxonomy_shown {
            SortPriority::Taxonomy
        } else if sequence_shown {
            SortPriority::Sequence
        } else if options.show_node_names {
            SortPriority::NodeName
        } else {
            SortPriority::Taxonomy
        }
    }
}

/// Adds two branch lengths, ignoring negative or absent halves.
pub fn add_distances(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a.filter(|v| *v >= 0.0), b.filter(|v| *v >= 0.0)) {
        (Some(a), Some(b)) => Some(a + b),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

/// Fails unless `id` is reachable from the current root.
pub fn ensure_node(tree: &Tree, id: NodeId) -> Result<(), EditError> {
    match tree.root {
        Some(root) if id < tree.nodes.len() && tree.is_ancestor_or_self(root, id) => Ok(()),
        _ => Err(EditError::UnknownNode(id)),
    }
}

fn replace_child(tree: &mut Tree, parent: NodeId, old: NodeId, new: NodeId) {
    if let Some(slot) = tree.nodes[parent].children.iter_mut().find(|c| **c == old) {
        *slot = new;
    }
}

fn remove_child(tree: &mut Tree, parent: NodeId, child: NodeId) {
    tree.nodes[parent].children.retain(|&c| c != child);
}

fn branch_payload(node: &TreeNode) -> BranchData {
    BranchData {
        length: None,
        ..node.branch_data()
    }
}

fn set_branch_payload(node: &mut TreeNode, data: BranchData) {
    node.data.confidences = data.confidences;
    node.data.branch_color = data.color;
}

/// Sets the collapse flag on `id` and everything below it.
pub fn set_collapse(tree: &mut Tree, id: NodeId, collapse: bool) {
    for n in tree.preorder_from(id) {
        tree.nodes[n].collapse = collapse;
    }
}

/// Collapses or expands an internal non-root node. Returns whether anything changed.
pub fn toggle_collapse(tree: &mut Tree, id: NodeId) -> Result<bool, EditError> {
    ensure_node(tree, id)?;
    if tree.nodes[id].is_leaf() || tree.is_root(id) {
        return Ok(false);
    }
    let collapse = !tree.nodes[id].collapse;
    set_collapse(tree, id, collapse);
    tree.mark_edited();
    Ok(true)
}

pub fn uncollapse_all(tree: &mut Tree) -> bool {
    let mut changed = false;
    for node in &mut tree.nodes {
        changed |= node.collapse;
        node.collapse = false;
    }
    if changed {
        tree.mark_edited();
    }
    changed
}

/// Collapses every internal non-root node whose support is below `min`.
/// Returns the number of newly collapsed clades.
pub fn collapse_by_confidence(tree: &mut Tree, min: f64) -> usize {
    let mut count = 0;
    for id in tree.preorder() {
        let node = &tree.nodes[id];
        if node.is_leaf() || tree.is_root(id) || tree.is_hidden_by_collapse(id) {
            continue;
        }
        if node.confidence().is_some_and(|c| c < min) {
            set_collapse(tree, id, true);
            count += 1;
        }
    }
    if count > 0 {
        debug!("Collapsed {count} clades with support below {min}");
        tree.mark_edited();
    }
    count
}

/// Re-roots on the branch above `id`. With `distance`, the new root sits that far
/// from `id`; otherwise in the middle of the branch. Branch data travels along the
/// re-parented path, and a bifurcating old root is dissolved.
pub fn reroot(tree: &mut Tree, id: NodeId, distance: Option<f64>) -> Result<(), EditError> {
    ensure_node(tree, id)?;
    if tree.leaf_count() < 2 {
        return Ok(());
    }
    let Some(parent) = tree.nodes[id].parent.filter(|_| !tree.is_root(id)) else {
        return Ok(());
    };
    tree.rooted = true;

    if tree.is_root(parent) {
        reroot_below_root(tree, id, parent, distance);
    } else {
        reroot_along_path(tree, id, parent);
        if let Some(root) = tree.root {
            place_on_branch(tree, root, id, distance);
        }
    }
    tree.mark_edited();
    Ok(())
}

fn reroot_below_root(tree: &mut Tree, n: NodeId, root: NodeId, distance: Option<f64>) {
    let siblings = tree.nodes[root].children.clone();
    if siblings.len() == 2 {
        if let Some(dist) = distance {
            let total: f64 = siblings.iter().map(|&c| tree.nodes[c].branch_length()).sum();
            let other = if siblings[0] == n { siblings[1] } else { siblings[0] };
            tree.nodes[n].length = Some(dist);
            tree.nodes[other].length = Some((total - dist).max(0.0));
        }
        return;
    }
    if siblings.len() < 2 {
        return;
    }

    let dn = tree.nodes[n].length;
    remove_child(tree, root, n);
    let new_root = tree.add_node(None, None);
    tree.nodes[new_root].children = vec![n, root];
    tree.nodes[n].parent = Some(new_root);
    tree.nodes[root].parent = Some(new_root);
    let payload = branch_payload(&tree.nodes[n]);
    set_branch_payload(&mut tree.nodes[root], payload);
    tree.root = Some(new_root);

    match (distance, dn) {
        (Some(dist), _) => {
            tree.nodes[n].length = Some(dist);
            tree.nodes[root].length = Some(dn.map_or(0.0, |d| (d - dist).max(0.0)));
        }
        (None, Some(d)) if d >= 0.0 => {
            tree.nodes[n].length = Some(d / 2.0);
            tree.nodes[root].length = Some(d / 2.0);
        }
        _ => tree.nodes[root].length = dn,
    }
}

/// Inserts a new root between `a` and its parent and reverses every edge up to
/// the old root. Lengths are fixed up by [`place_on_branch`].
fn reroot_along_path(tree: &mut Tree, start: NodeId, parent: NodeId) {
    let mut a = start;
    let mut b = parent;
    let Some(mut c) = tree.nodes[b].parent else {
        return;
    };
    let new_root = tree.add_node(None, None);
    tree.nodes[new_root].children = vec![a, b];

    let mut distance1 = tree.nodes[c].length;
    let mut payload1 = branch_payload(&tree.nodes[c]);
    tree.nodes[c].length = tree.nodes[b].length;
    let b_payload = branch_payload(&tree.nodes[b]);
    set_branch_payload(&mut tree.nodes[c], b_payload);
    let a_payload = branch_payload(&tree.nodes[a]);
    set_branch_payload(&mut tree.nodes[b], a_payload);
    tree.nodes[b].length = tree.nodes[a].length;
    replace_child(tree, b, a, c);

    while !tree.is_root(c) {
        a = b;
        b = c;
        let Some(next) = tree.nodes[c].parent else {
            break;
        };
        c = next;
        replace_child(tree, b, a, c);
        tree.nodes[b].parent = Some(a);
        let distance2 = tree.nodes[c].length;
        let payload2 = branch_payload(&tree.nodes[c]);
        tree.nodes[c].length = distance1;
        set_branch_payload(&mut tree.nodes[c], payload1);
        distance1 = distance2;
        payload1 = payload2;
    }

    // c is the old root now.
    let old_root = c;
    if tree.nodes[old_root].children.len() == 2 {
        let keep = tree.nodes[old_root]
            .children
            .iter()
            .copied()
            .find(|&x| x != b);
        if let Some(node) = keep {
            tree.nodes[node].parent = Some(b);
            let merged = match (tree.nodes[old_root].length, tree.nodes[node].length) {
                (None, None) => None,
                (x, y) => Some(x.unwrap_or(0.0).max(0.0) + y.unwrap_or(0.0).max(0.0)),
            };
            tree.nodes[node].length = merged;
            let payload = branch_payload(&tree.nodes[old_root]);
            set_branch_payload(&mut tree.nodes[node], payload);
            replace_child(tree, b, old_root, node);
            tree.nodes[old_root].children.clear();
            tree.nodes[old_root].parent = None;
        }
    } else if tree.nodes[old_root].children.len() == 1 {
        // Unary old root: drop it along with any chain it leaves childless.
        tree.nodes[old_root].children.clear();
        let mut dropped = old_root;
        let mut holder = b;
        loop {
            remove_child(tree, holder, dropped);
            tree.nodes[dropped].parent = None;
            if !tree.nodes[holder].children.is_empty() {
                break;
            }
            if holder == parent {
                remove_child(tree, new_root, parent);
                break;
            }
            match tree.nodes[holder].parent {
                Some(next) if next != new_root => {
                    dropped = holder;
                    holder = next;
                }
                _ => break,
            }
        }
    } else {
        tree.nodes[old_root].parent = Some(b);
        remove_child(tree, old_root, b);
    }

    tree.nodes[new_root].parent = None;
    tree.nodes[start].parent = Some(new_root);
    tree.nodes[parent].parent = tree.nodes[new_root]
        .children
        .contains(&parent)
        .then_some(new_root);
    tree.root = Some(new_root);
}

/// Splits the original branch of `a` between `a` and its former parent, both now
/// children of `root`. The former parent currently holds a copy of the length.
fn place_on_branch(tree: &mut Tree, root: NodeId, a: NodeId, distance: Option<f64>) {
    let Some(&b) = tree.nodes[root].children.iter().find(|&&c| c != a) else {
        return;
    };
    match (tree.nodes[a].length, distance) {
        (None, _) => tree.nodes[b].length = None,
        (Some(len), Some(dist)) => {
            tree.nodes[a].length = Some(dist);
            tree.nodes[b].length = Some((len - dist).max(0.0));
        }
        (Some(len), None) => {
            tree.nodes[a].length = Some(len / 2.0);
            tree.nodes[b].length = Some(len / 2.0);
        }
    }
}

fn distance_to_ancestor(tree: &Tree, ancestor: NodeId, mut id: NodeId) -> f64 {
    let mut d = 0.0;
    while id != ancestor {
        let node = &tree.nodes[id];
        d += node.branch_length();
        match node.parent {
            Some(p) => id = p,
            None => break,
        }
    }
    d
}

/// Leaf below `id` farthest from it, with the distance to the root.
fn furthest_leaf(tree: &Tree, id: NodeId, root: NodeId) -> Option<(NodeId, f64)> {
    tree.preorder_from(id)
        .into_iter()
        .filter(|&n| tree.nodes[n].is_leaf())
        .map(|n| (n, distance_to_ancestor(tree, id, n)))
        .fold(None, |best: Option<(NodeId, f64)>, (n, d)| match best {
            Some((_, bd)) if bd >= d => best,
            _ => Some((n, d)),
        })
        .map(|(n, _)| (n, distance_to_ancestor(tree, root, n)))
}

/// Moves the root until the two deepest clades below it are equally deep.
/// Returns whether the root moved.
pub fn midpoint_root(tree: &mut Tree) -> Result<bool, EditError> {
    if tree.leaf_count() < 2 {
        return Err(EditError::TooFewExternalNodes);
    }
    if tree.max_distance_to_root() <= 0.0 {
        return Ok(false);
    }
    let limit = tree.node_count();
    let mut moved = false;
    for _ in 0..=limit {
        let Some(root) = tree.root else {
            break;
        };
        let mut deepest: Option<NodeId> = None;
        let (mut da, mut db) = (0.0f64, 0.0f64);
        for &child in &tree.nodes[root].children {
            let Some((leaf, df)) = furthest_leaf(tree, child, root) else {
                continue;
            };
            if df > da {
                db = da;
                da = df;
                deepest = Some(leaf);
            } else if df > db {
                db = df;
            }
        }
        let diff = da - db;
        let Some(mut a) = deepest.filter(|_| diff >= 1e-6) else {
            return Ok(moved);
        };
        let mut x = da - diff / 2.0;
        while !tree.is_root(a) && tree.nodes[a].length.map_or(true, |l| x > l) {
            x -= tree.nodes[a].branch_length();
            match tree.nodes[a].parent {
                Some(p) => a = p,
                None => break,
            }
        }
        reroot(tree, a, Some(x))?;
        moved = true;
    }
    warn!("Midpoint rooting did not converge after {limit} steps");
    Ok(moved)
}

/// Removes the subtree at `id`. A parent left with a single child is dissolved
/// into that child, merging their branch lengths.
pub fn delete_subtree(tree: &mut Tree, id: NodeId) -> Result<(), EditError> {
    ensure_node(tree, id)?;
    let Some(parent) = tree.nodes[id].parent.filter(|_| !tree.is_root(id)) else {
        return Err(EditError::DeleteEntireTree);
    };
    let siblings = tree.nodes[parent].children.clone();
    let other = siblings.iter().copied().find(|&c| c != id);
    if siblings.len() == 2 {
        if let Some(other) = other {
            if tree.is_root(parent) {
                tree.root = Some(other);
                tree.nodes[other].parent = None;
            } else if let Some(grand) = tree.nodes[parent].parent {
                tree.nodes[other].length =
                    add_distances(tree.nodes[parent].length, tree.nodes[other].length);
                replace_child(tree, grand, parent, other);
                tree.nodes[other].parent = Some(grand);
            }
            tree.nodes[parent].children.clear();
            tree.nodes[parent].parent = None;
        }
    } else {
        remove_child(tree, parent, id);
    }
    tree.nodes[id].parent = None;
    tree.mark_edited();
    Ok(())
}

/// Removes `id` only; its children take its place with merged branch lengths.
pub fn remove_node(tree: &mut Tree, id: NodeId) -> Result<(), EditError> {
    ensure_node(tree, id)?;
    if tree.is_root(id) {
        let [child] = tree.nodes[id].children[..] else {
            return Err(EditError::DeleteEntireTree);
        };
        tree.nodes[child].length = add_distances(tree.nodes[id].length, tree.nodes[child].length);
        tree.nodes[child].parent = None;
        tree.nodes[id].children.clear();
        tree.root = Some(child);
        tree.mark_edited();
        return Ok(());
    }
    let Some(parent) = tree.nodes[id].parent else {
        return Err(EditError::UnknownNode(id));
    };
    let children = std::mem::take(&mut tree.nodes[id].children);
    let index = tree.child_index(id).unwrap_or(0);
    for &child in &children {
        tree.nodes[child].length = add_distances(tree.nodes[id].length, tree.nodes[child].length);
        tree.nodes[child].parent = Some(parent);
    }
    tree.nodes[parent].children.splice(index..=index, children);
    tree.nodes[id].parent = None;
    tree.mark_edited();
    Ok(())
}

pub fn delete(tree: &mut Tree, id: NodeId, mode: DeleteMode) -> Result<(), EditError> {
    ensure_node(tree, id)?;
    if tree.is_root(id) && (mode == DeleteMode::Subtree || tree.nodes[id].children.len() != 1) {
        return Err(EditError::DeleteEntireTree);
    }
    match mode {
        DeleteMode::NodeOnly => remove_node(tree, id),
        DeleteMode::Subtree => delete_subtree(tree, id),
    }
}

/// Grafts a copy of `source` next to or below `target` and returns the ids of
/// every node this added. Pasting below a root that has a single external node
/// replaces the displayed tree with the copy.
pub fn attach_tree(
    tree: &mut Tree,
    source: &Tree,
    target: NodeId,
    attach: Attach,
) -> Result<Vec<NodeId>, EditError> {
    ensure_node(tree, target)?;
    let Some(source_root) = source.root else {
        return Err(EditError::EmptyBuffer);
    };
    if attach == Attach::Sibling && tree.is_root(target) {
        return Err(EditError::SiblingOfRoot);
    }
    let start = tree.nodes.len();
    let grafted = tree.graft(source, source_root).ok_or(EditError::EmptyBuffer)?;

    match attach {
        Attach::Child if tree.is_root(target) && tree.all_external_descendants(target) == 1 => {
            tree.root = Some(grafted);
            tree.rooted = true;
        }
        Attach::Child => {
            tree.nodes[target].children.push(grafted);
            tree.nodes[grafted].parent = Some(target);
        }
        Attach::Sibling => {
            let Some(parent) = tree.nodes[target].parent else {
                return Err(EditError::SiblingOfRoot);
            };
            let half = tree.nodes[target].length.map(|l| l / 2.0);
            let joint = tree.add_node(None, half);
            tree.nodes[target].length = half;
            replace_child(tree, parent, target, joint);
            tree.nodes[joint].parent = Some(parent);
            tree.nodes[joint].children = vec![target, grafted];
            tree.nodes[target].parent = Some(joint);
            tree.nodes[grafted].parent = Some(joint);
        }
    }
    tree.mark_edited();
    Ok((start..tree.nodes.len()).collect())
}

/// Adds a new unnamed leaf and returns its id.
pub fn add_empty_node(tree: &mut Tree, target: NodeId, attach: Attach) -> Result<NodeId, EditError> {
    let mut single = Tree::new(tree.id, None);
    single.root = Some(single.add_node(None, None));
    let added = attach_tree(tree, &single, target, attach)?;
    added.first().copied().ok_or(EditError::EmptyBuffer)
}

/// Exchanges the two children of `id`. Returns whether anything changed.
pub fn swap_children(tree: &mut Tree, id: NodeId) -> Result<bool, EditError> {
    ensure_node(tree, id)?;
    let n = tree.nodes[id].children.len();
    if n > 2 {
        return Err(EditError::SwapTooManyChildren(n));
    }
    if n < 2 {
        return Ok(false);
    }
    tree.nodes[id].children.swap(0, 1);
    tree.mark_edited();
    Ok(true)
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

fn taxonomy_key(node: &TreeNode) -> Option<String> {
    let tax = node.data.taxonomy.as_ref()?;
    non_empty(&tax.scientific_name)
        .map(str::to_lowercase)
        .or_else(|| non_empty(&tax.code).map(str::to_string))
        .or_else(|| non_empty(&tax.common_name).map(str::to_lowercase))
}

fn sequence_key(node: &TreeNode) -> Option<String> {
    let seq = node.data.sequence.as_ref()?;
    non_empty(&seq.name)
        .map(str::to_lowercase)
        .or_else(|| non_empty(&seq.symbol).map(str::to_string))
        .or_else(|| non_empty(&seq.gene_name).map(str::to_string))
        .or_else(|| {
            seq.accession
                .as_ref()
                .map(|a| a.value.clone())
                .filter(|v| !v.is_empty())
        })
}

fn name_key(node: &TreeNode) -> Option<String> {
    non_empty(&node.name).map(str::to_lowercase)
}

fn sort_key(node: &TreeNode, priority: SortPriority) -> Option<String> {
    match priority {
        SortPriority::Taxonomy => taxonomy_key(node)
            .or_else(|| sequence_key(node))
            .or_else(|| name_key(node)),
        SortPriority::Sequence => sequence_key(node)
            .or_else(|| taxonomy_key(node))
            .or_else(|| name_key(node)),
        SortPriority::NodeName => name_key(node)
            .or_else(|| taxonomy_key(node))
            .or_else(|| sequence_key(node)),
    }
}

/// Stable sort of the children of every node below `id`. Nodes without a key
/// keep their relative order after the keyed ones.
pub fn sort_descendants(tree: &mut Tree, id: NodeId, priority: SortPriority) -> Result<bool, EditError> {
    ensure_node(tree, id)?;
    if tree.nodes[id].is_leaf() {
        return Ok(false);
    }
    for n in tree.preorder_from(id) {
        if tree.nodes[n].children.len() < 2 {
            continue;
        }
        let mut children = std::mem::take(&mut tree.nodes[n].children);
        children.sort_by_cached_key(|&c| match sort_key(&tree.nodes[c], priority) {
            Some(key) => (false, key),
            None => (true, String::new()),
        });
        tree.nodes[n].children = children;
    }
    tree.mark_edited();
    Ok(true)
}

/// Ladderizes below `id` by external-node count.
pub fn order_subtree(tree: &mut Tree, id: NodeId, increasing: bool) -> Result<(), EditError> {
    ensure_node(tree, id)?;
    tree.order_subtree(id, increasing);
    tree.mark_edited();
    Ok(())
}

pub fn colorize_subtree(tree: &mut Tree, id: NodeId, color: Color32) -> Result<(), EditError> {
    ensure_node(tree, id)?;
    for n in tree.preorder_from(id) {
        tree.nodes[n].data.branch_color = Some(color);
    }
    tree.mark_edited();
    Ok(())
}

pub fn remove_branch_colors(tree: &mut Tree) -> bool {
    let mut changed = false;
    for id in tree.preorder() {
        changed |= tree.nodes[id].data.branch_color.take().is_some();
    }
    if changed {
        tree.mark_edited();
    }
    changed
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;
    use crate::tree::test_support::strategies::arb_tree;
    use crate::tree::test_support::*;
    use crate::tree::{Confidence, Sequence, Taxonomy};

    fn id(tree: &Tree, name: &str) -> NodeId {
        tree.find_by_name(name).unwrap()
    }

    fn leaf_distance(tree: &Tree, a: NodeId, b: NodeId) -> f64 {
        let mut up = HashMap::new();
        let (mut n, mut d) = (a, 0.0);
        loop {
            up.insert(n, d);
            match tree.nodes[n].parent {
                Some(p) => {
                    d += tree.nodes[n].branch_length();
                    n = p;
                }
                None => break,
            }
        }
        let (mut n, mut d) = (b, 0.0);
        loop {
            if let Some(da) = up.get(&n) {
                return da + d;
            }
            match tree.nodes[n].parent {
                Some(p) => {
                    d += tree.nodes[n].branch_length();
                    n = p;
                }
                None => return f64::NAN,
            }
        }
    }

    fn all_leaf_distances(tree: &Tree) -> HashMap<(String, String), f64> {
        let leaves = tree.external_nodes();
        let mut out = HashMap::new();
        for &a in &leaves {
            for &b in &leaves {
                let key = (tree.nodes[a].name_str().to_string(), tree.nodes[b].name_str().to_string());
                out.insert(key, leaf_distance(tree, a, b));
            }
        }
        out
    }

    fn check_links(tree: &Tree) {
        let root = tree.root.unwrap();
        assert_eq!(tree.nodes[root].parent, None, "Root must have no parent");
        for id in tree.preorder() {
            for &c in &tree.nodes[id].children {
                assert_eq!(tree.nodes[c].parent, Some(id), "Child {c} must point back to {id}");
            }
        }
    }

    #[test]
    fn test_reroot_dissolves_bifurcating_root() {
        let mut tree = create_test_tree();
        let c = id(&tree, "C");
        let cde = id(&tree, "CDE");
        tree.nodes[cde].data.confidences = vec![Confidence::new(90.0)];
        let before = all_leaf_distances(&tree);
        reroot(&mut tree, c, None).unwrap();
        check_links(&tree);

        let root = tree.root.unwrap();
        let cde = id(&tree, "CDE");
        let ab = id(&tree, "AB");
        assert_eq!(tree.nodes[root].children, vec![c, cde]);
        assert_eq!(tree.nodes[c].length, Some(0.5));
        assert_eq!(tree.nodes[cde].length, Some(0.5));
        assert_eq!(tree.nodes[ab].parent, Some(cde));
        assert_eq!(tree.nodes[ab].length, Some(2.0), "Old root branches merge");
        assert_eq!(
            tree.nodes[ab].confidence(),
            Some(90.0),
            "Support moves along the reversed path"
        );
        assert_eq!(tree.leaf_names(), vec!["A", "B", "C", "D", "E"]);
        assert_eq!(before, all_leaf_distances(&tree));
        assert!(tree.edited);
    }

    #[test]
    fn test_reroot_below_multifurcating_root() {
        let mut tree = tree_from_parents(&[0, 0, 0], &[2.0, 1.0, 1.0]);
        let n1 = 1;
        reroot(&mut tree, n1, None).unwrap();
        check_links(&tree);
        let root = tree.root.unwrap();
        assert_eq!(tree.nodes[root].children, vec![n1, 0]);
        assert_eq!(tree.nodes[n1].length, Some(1.0));
        assert_eq!(tree.nodes[0].length, Some(1.0));
        assert_eq!(tree.nodes[0].children, vec![2, 3]);
    }

    #[test]
    fn test_reroot_at_root_is_noop() {
        let mut tree = create_test_tree();
        let root = tree.root.unwrap();
        tree.rooted = false;
        reroot(&mut tree, root, None).unwrap();
        assert_eq!(tree.root, Some(root));
        assert!(!tree.edited);
        assert!(!tree.rooted, "A no-op reroot leaves the rooted flag alone");

        let c = id(&tree, "C");
        reroot(&mut tree, c, None).unwrap();
        assert!(tree.rooted);
    }

    #[test]
    fn test_midpoint_root_balances_depths() {
        let mut tree = create_test_tree();
        let e = id(&tree, "E");
        tree.nodes[e].length = Some(5.0);
        assert!(midpoint_root(&mut tree).unwrap());
        check_links(&tree);
        let root = tree.root.unwrap();
        assert_eq!(tree.nodes[root].children.len(), 2);
        let depths: Vec<f64> = tree.nodes[root]
            .children
            .iter()
            .map(|&c| furthest_leaf(&tree, c, root).unwrap().1)
            .collect();
        assert!((depths[0] - 4.5).abs() < 1e-9, "{depths:?}");
        assert!((depths[1] - 4.5).abs() < 1e-9, "{depths:?}");
        assert!(!midpoint_root(&mut tree).unwrap(), "Already at the midpoint");
    }

    #[test]
    fn test_midpoint_needs_two_leaves() {
        let mut tree = tree_from_parents(&[0], &[1.0]);
        assert_eq!(midpoint_root(&mut tree), Err(EditError::TooFewExternalNodes));
    }

    #[test]
    fn test_delete_subtree_collapses_unary_parent() {
        let mut tree = create_test_tree();
        let d = id(&tree, "D");
        let e = id(&tree, "E");
        delete_subtree(&mut tree, d).unwrap();
        check_links(&tree);
        assert_eq!(tree.leaf_names(), vec!["A", "B", "C", "E"]);
        assert_eq!(tree.nodes[e].parent, Some(id(&tree, "CDE")));
        assert_eq!(tree.nodes[e].length, Some(2.0));
        assert!(tree.find_by_name("DE").is_none());
    }

    #[test]
    fn test_delete_child_of_root_promotes_sibling() {
        let mut tree = create_test_tree();
        let ab = id(&tree, "AB");
        let cde = id(&tree, "CDE");
        delete_subtree(&mut tree, ab).unwrap();
        assert_eq!(tree.root, Some(cde));
        assert_eq!(tree.nodes[cde].parent, None);
    }

    #[test]
    fn test_delete_refuses_whole_tree() {
        let mut tree = create_test_tree();
        let root = tree.root.unwrap();
        let before = tree.nodes.clone();
        assert_eq!(delete(&mut tree, root, DeleteMode::NodeOnly), Err(EditError::DeleteEntireTree));
        assert_eq!(delete(&mut tree, root, DeleteMode::Subtree), Err(EditError::DeleteEntireTree));
        assert_eq!(tree.nodes, before);
    }

    #[test]
    fn test_remove_node_keeps_children_in_place() {
        let mut tree = create_test_tree();
        let cde = id(&tree, "CDE");
        let c = id(&tree, "C");
        let de = id(&tree, "DE");
        remove_node(&mut tree, cde).unwrap();
        check_links(&tree);
        let root = tree.root.unwrap();
        assert_eq!(tree.nodes[root].children, vec![id(&tree, "AB"), c, de]);
        assert_eq!(tree.nodes[c].length, Some(2.0));
    }

    #[test]
    fn test_paste_as_sibling_splits_branch() {
        let mut tree = create_test_tree();
        let source = tree.copy_subtree(id(&tree, "AB"));
        let c = id(&tree, "C");
        let added = attach_tree(&mut tree, &source, c, Attach::Sibling).unwrap();
        check_links(&tree);
        assert_eq!(added.len(), 4, "Three copied nodes plus the joint");
        let joint = tree.nodes[c].parent.unwrap();
        assert_eq!(tree.nodes[joint].length, Some(0.5));
        assert_eq!(tree.nodes[c].length, Some(0.5));
        assert_eq!(tree.leaf_count(), 7);
    }

    #[test]
    fn test_paste_sibling_of_root_rejected() {
        let mut tree = create_test_tree();
        let source = tree.copy_subtree(id(&tree, "AB"));
        let root = tree.root.unwrap();
        let count = tree.nodes.len();
        assert_eq!(
            attach_tree(&mut tree, &source, root, Attach::Sibling),
            Err(EditError::SiblingOfRoot)
        );
        assert_eq!(tree.nodes.len(), count, "Refusal happens before grafting");
    }

    #[test]
    fn test_paste_into_single_leaf_tree_replaces_it() {
        let mut tree = Tree::new(0, None);
        let root = tree.add_node(Some("only".into()), None);
        tree.root = Some(root);
        tree.rooted = false;
        let source = create_test_tree();
        attach_tree(&mut tree, &source, root, Attach::Child).unwrap();
        assert!(tree.rooted);
        assert_eq!(tree.leaf_names(), vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_add_empty_node_as_child() {
        let mut tree = create_test_tree();
        let c = id(&tree, "C");
        let new = add_empty_node(&mut tree, c, Attach::Child).unwrap();
        assert_eq!(tree.nodes[new].parent, Some(c));
        assert!(tree.nodes[new].name.is_none());
    }

    #[test]
    fn test_swap_children() {
        let mut tree = create_test_tree();
        let ab = id(&tree, "AB");
        let (a, b) = (id(&tree, "A"), id(&tree, "B"));
        assert!(swap_children(&mut tree, ab).unwrap());
        assert_eq!(tree.nodes[ab].children, vec![b, a]);
        assert!(!swap_children(&mut tree, a).unwrap());

        let mut wide = tree_from_parents(&[0, 0, 0], &[]);
        let root = wide.root.unwrap();
        assert_eq!(swap_children(&mut wide, root), Err(EditError::SwapTooManyChildren(3)));
    }

    #[test]
    fn test_sort_descendants_by_priority() {
        let mut tree = tree_from_parents(&[0, 0, 0], &[]);
        let root = tree.root.unwrap();
        tree.nodes[1].name = Some("zeta".into());
        tree.nodes[2].name = Some("Alpha".into());
        tree.nodes[3].name = None;
        tree.nodes[3].data.taxonomy = Some(Taxonomy {
            scientific_name: Some("Mus musculus".into()),
            ..Taxonomy::default()
        });
        sort_descendants(&mut tree, root, SortPriority::NodeName).unwrap();
        assert_eq!(tree.nodes[root].children, vec![2, 3, 1]);

        tree.nodes[1].data.sequence = Some(Sequence {
            name: Some("aaa".into()),
            ..Sequence::default()
        });
        sort_descendants(&mut tree, root, SortPriority::Sequence).unwrap();
        assert_eq!(tree.nodes[root].children[0], 1);
    }

    #[test]
    fn test_sort_priority_follows_displayed_fields() {
        let mut options = DisplayOptions::default();
        options.show_taxonomy_code = false;
        options.show_taxonomy_scientific = false;
        options.show_taxonomy_common = false;
        assert_eq!(SortPriority::from_options(&options), SortPriority::NodeName);
        options.show_sequence_name = true;
        assert_eq!(SortPriority::from_options(&options), SortPriority::Sequence);
        options.show_taxonomy_code = true;
        assert_eq!(SortPriority::from_options(&options), SortPriority::Taxonomy);
    }

    #[test]
    fn test_collapse_toggle_and_confidence() {
        let mut tree = create_test_tree();
        let cde = id(&tree, "CDE");
        let de = id(&tree, "DE");
        assert!(toggle_collapse(&mut tree, cde).unwrap());
        assert!(tree.nodes[de].collapse, "Descendants inherit the flag");
        assert_eq!(tree.visible_tips().len(), 3);
        assert!(toggle_collapse(&mut tree, cde).unwrap());
        assert!(!tree.nodes[de].collapse);
        let a = id(&tree, "A");
        assert!(!toggle_collapse(&mut tree, a).unwrap());

        let ab = id(&tree, "AB");
        tree.nodes[ab].data.confidences = vec![Confidence::new(30.0)];
        tree.nodes[de].data.confidences = vec![Confidence::new(95.0)];
        assert_eq!(collapse_by_confidence(&mut tree, 50.0), 1);
        assert!(tree.nodes[id(&tree, "AB")].collapse);
        assert!(!tree.nodes[de].collapse);
        assert!(uncollapse_all(&mut tree));
        assert_eq!(tree.visible_tips().len(), 5);
    }

    #[test]
    fn test_colorize_and_remove_colors() {
        let mut tree = create_test_tree();
        let cde = id(&tree, "CDE");
        colorize_subtree(&mut tree, cde, Color32::RED).unwrap();
        assert_eq!(tree.nodes[id(&tree, "E")].data.branch_color, Some(Color32::RED));
        assert_eq!(tree.nodes[id(&tree, "A")].data.branch_color, None);
        assert!(remove_branch_colors(&mut tree));
        assert!(!remove_branch_colors(&mut tree));
    }

    #[test]
    fn test_add_distances() {
        assert_eq!(add_distances(None, None), None);
        assert_eq!(add_distances(Some(1.0), None), Some(1.0));
        assert_eq!(add_distances(Some(-1.0), Some(2.0)), Some(2.0));
        assert_eq!(add_distances(Some(1.5), Some(2.0)), Some(3.5));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            EditError::UnrootedDisplay(EditOperation::Collapse).to_string(),
            "Cannot collapse in unrooted display type"
        );
        assert_eq!(EditError::CutRoot.to_string(), "Cannot cut entire tree as subtree");
    }

    proptest! {
        #[test]
        fn prop_reroot_preserves_leaf_distances(tree in arb_tree(24), pick in 0usize..24) {
            let mut tree = tree;
            let order = tree.preorder();
            let target = order[pick % order.len()];
            let before = all_leaf_distances(&tree);
            let names = tree.leaf_names();
            reroot(&mut tree, target, None).unwrap();
            check_links(&tree);
            prop_assert_eq!(names, tree.leaf_names());
            for (key, d) in all_leaf_distances(&tree) {
                prop_assert!((before[&key] - d).abs() < 1e-9, "{:?}: {} vs {}", key, before[&key], d);
            }
        }
    }
}
