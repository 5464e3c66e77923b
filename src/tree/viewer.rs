use std::collections::HashSet;

use egui::{Color32, Rect, Vec2};
use log::{debug, info, warn};

use super::edit::{self, Attach, DeleteMode, EditError, EditOperation, SortPriority};
use super::fonts::TreeFontSet;
use super::layout::{self, LayoutCache, LayoutKind};
use super::painter::{DisplayOptions, TreeColorSet, TreePainter};
use super::scene_graph::{build_tree_scene, PaintRequest, TreeSceneGraph};
use super::{NodeId, Tree, TreeNode};

/// Nesting limit for subtree views.
pub const MAX_SUBTREES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSearchType {
    Contains,
    StartsWith,
    EndsWith,
    Matches,
}

/// One level of subtree view. The displayed subtree shares the arena with the
/// full tree; only the root pointer and the temporary root's parent link move.
#[derive(Debug, Clone, Copy)]
struct SubtreeFrame {
    previous_root: NodeId,
    temp_root: NodeId,
    temp_root_parent: Option<NodeId>,
}

/// Editing session over a set of loaded trees. Owns everything one paint pass
/// needs and rejects edits the current display cannot support.
pub struct TreeViewer {
    trees: Vec<Tree>,
    current_tree_index: usize,
    pub options: DisplayOptions,
    pub colors: TreeColorSet,
    fonts: TreeFontSet,
    cache: LayoutCache,
    canvas: Vec2,
    visible: Rect,
    found: HashSet<NodeId>,
    selected: HashSet<NodeId>,
    copied: HashSet<NodeId>,
    clipboard: Option<Tree>,
    subtrees: Vec<SubtreeFrame>,
}

impl TreeViewer {
    pub fn new(options: DisplayOptions, fonts: TreeFontSet) -> Self {
        Self {
            trees: Vec::new(),
            current_tree_index: 0,
            options,
            colors: TreeColorSet::default(),
            fonts,
            cache: LayoutCache::default(),
            canvas: Vec2::new(1100.0, 760.0),
            visible: Rect::from_min_size(egui::Pos2::ZERO, Vec2::new(1100.0, 760.0)),
            found: HashSet::new(),
            selected: HashSet::new(),
            copied: HashSet::new(),
            clipboard: None,
            subtrees: Vec::new(),
        }
    }

    pub fn set_trees(&mut self, trees: Vec<Tree>) {
        self.subtrees.clear();
        self.trees = trees;
        self.current_tree_index = 0;
        self.clear_highlights();
        self.cache.invalidate();
    }

    pub fn add_tree(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn current_tree_index(&self) -> usize {
        self.current_tree_index
    }

    pub fn current_tree(&self) -> Option<&Tree> {
        self.trees.get(self.current_tree_index)
    }

    fn tree_mut(&mut self) -> Result<&mut Tree, EditError> {
        self.trees
            .get_mut(self.current_tree_index)
            .ok_or(EditError::NoTree)
    }

    /// Switches the displayed tree, leaving any subtree view first.
    pub fn show_tree(&mut self, index: usize) {
        if index < self.trees.len() && index != self.current_tree_index {
            while !self.subtrees.is_empty() {
                self.supertree();
            }
            self.current_tree_index = index;
            self.clear_highlights();
            self.cache.invalidate();
        }
    }

    pub fn show_next_tree(&mut self) {
        if self.current_tree_index + 1 < self.trees.len() {
            self.show_tree(self.current_tree_index + 1);
        }
    }

    pub fn show_previous_tree(&mut self) {
        if self.current_tree_index > 0 {
            self.show_tree(self.current_tree_index - 1);
        }
    }

    pub fn fonts(&self) -> &TreeFontSet {
        &self.fonts
    }

    pub fn fonts_mut(&mut self) -> &mut TreeFontSet {
        self.cache.invalidate();
        &mut self.fonts
    }

    pub fn found(&self) -> &HashSet<NodeId> {
        &self.found
    }

    pub fn selected(&self) -> &HashSet<NodeId> {
        &self.selected
    }

    /// Adds `id` to the selection, or drops it if already selected. Returns
    /// whether the node is selected afterwards.
    pub fn toggle_selected(&mut self, id: NodeId) -> Result<bool, EditError> {
        self.ensure_node(id)?;
        if self.selected.remove(&id) {
            Ok(false)
        } else {
            self.selected.insert(id);
            Ok(true)
        }
    }

    pub fn copied(&self) -> &HashSet<NodeId> {
        &self.copied
    }

    pub fn clipboard(&self) -> Option<&Tree> {
        self.clipboard.as_ref()
    }

    pub fn clear_highlights(&mut self) {
        self.found.clear();
        self.selected.clear();
        self.copied.clear();
    }

    pub fn is_current_tree_subtree(&self) -> bool {
        !self.subtrees.is_empty()
    }

    pub fn subtree_depth(&self) -> usize {
        self.subtrees.len()
    }

    pub fn set_layout_kind(&mut self, kind: LayoutKind) {
        if self.options.layout_kind != kind {
            self.options.layout_kind = kind;
            self.cache.invalidate();
        }
    }

    /// Resizes the canvas and the visible part of it.
    pub fn set_viewport(&mut self, canvas: Vec2, visible: Rect) {
        if self.canvas != canvas || self.visible != visible {
            self.canvas = canvas;
            self.visible = visible;
            self.cache.invalidate();
        }
    }

    fn reject(&self, err: EditError) -> EditError {
        warn!("{err}");
        err
    }

    fn ensure_rooted_display(&self, op: EditOperation) -> Result<(), EditError> {
        if self.options.layout_kind == LayoutKind::Unrooted {
            return Err(self.reject(EditError::UnrootedDisplay(op)));
        }
        Ok(())
    }

    fn ensure_node(&self, id: NodeId) -> Result<(), EditError> {
        let tree = self.current_tree().ok_or(EditError::NoTree)?;
        edit::ensure_node(tree, id).map_err(|e| self.reject(e))
    }

    fn edited(&mut self) {
        self.cache.invalidate();
    }

    pub fn toggle_collapse(&mut self, id: NodeId) -> Result<bool, EditError> {
        self.ensure_rooted_display(EditOperation::Collapse)?;
        self.ensure_node(id)?;
        let changed = edit::toggle_collapse(self.tree_mut()?, id)?;
        if changed {
            self.edited();
        }
        Ok(changed)
    }

    pub fn uncollapse_all(&mut self) -> Result<bool, EditError> {
        self.ensure_rooted_display(EditOperation::Collapse)?;
        let changed = edit::uncollapse_all(self.tree_mut()?);
        if changed {
            self.edited();
        }
        Ok(changed)
    }

    pub fn collapse_by_confidence(&mut self, min: f64) -> Result<usize, EditError> {
        self.ensure_rooted_display(EditOperation::Collapse)?;
        let count = edit::collapse_by_confidence(self.tree_mut()?, min);
        if count > 0 {
            self.edited();
        }
        Ok(count)
    }

    fn ensure_rerootable(&self) -> Result<(), EditError> {
        let rerootable = self.current_tree().is_some_and(|t| t.rerootable);
        if !rerootable {
            return Err(self.reject(EditError::NotRerootable));
        }
        self.ensure_rooted_display(EditOperation::Reroot)?;
        if self.is_current_tree_subtree() {
            return Err(self.reject(EditError::RerootInSubtree));
        }
        Ok(())
    }

    pub fn reroot(&mut self, id: NodeId) -> Result<(), EditError> {
        self.ensure_rerootable()?;
        self.ensure_node(id)?;
        edit::reroot(self.tree_mut()?, id, None)?;
        self.edited();
        Ok(())
    }

    pub fn midpoint_root(&mut self) -> Result<bool, EditError> {
        self.ensure_rerootable()?;
        let moved = edit::midpoint_root(self.tree_mut()?).map_err(|e| self.reject(e))?;
        if moved {
            self.edited();
        }
        Ok(moved)
    }

    /// Shows only the clade below `id`. Asking for the subtree of the displayed
    /// root while already in a subtree view steps back out instead.
    pub fn subtree(&mut self, id: NodeId) -> Result<(), EditError> {
        self.ensure_rooted_display(EditOperation::Subtree)?;
        self.ensure_node(id)?;
        let tree = self.current_tree().ok_or(EditError::NoTree)?;
        if tree.nodes[id].is_leaf() {
            return Err(self.reject(EditError::SubtreeOfExternalNode));
        }
        if tree.is_root(id) {
            if self.is_current_tree_subtree() {
                self.supertree();
                return Ok(());
            }
            return Err(self.reject(EditError::SubtreeOfRoot));
        }
        if self.subtrees.len() >= MAX_SUBTREES {
            return Err(self.reject(EditError::SubtreeStackFull(MAX_SUBTREES)));
        }
        let Some(previous_root) = tree.root else {
            return Err(EditError::UnknownNode(id));
        };
        let frame = SubtreeFrame {
            previous_root,
            temp_root: id,
            temp_root_parent: tree.nodes[id].parent,
        };
        let tree = self.tree_mut()?;
        tree.nodes[id].parent = None;
        tree.root = Some(id);
        tree.invalidate();
        self.subtrees.push(frame);
        self.edited();
        debug!("Subtree view at node {id} (depth {})", self.subtrees.len());
        Ok(())
    }

    /// Leaves the innermost subtree view. Edits made inside it are kept; if the
    /// displayed root was replaced meanwhile, the replacement is re-attached.
    pub fn supertree(&mut self) -> bool {
        let Some(frame) = self.subtrees.pop() else {
            return false;
        };
        let Some(tree) = self.trees.get_mut(self.current_tree_index) else {
            return false;
        };
        let current = tree.root.unwrap_or(frame.temp_root);
        if let Some(parent) = frame.temp_root_parent {
            if current != frame.temp_root {
                if let Some(slot) = tree.nodes[parent]
                    .children
                    .iter_mut()
                    .find(|c| **c == frame.temp_root)
                {
                    *slot = current;
                }
            }
            tree.nodes[current].parent = Some(parent);
        }
        tree.root = Some(frame.previous_root);
        tree.invalidate();
        self.cache.invalidate();
        true
    }

    pub fn swap(&mut self, id: NodeId) -> Result<bool, EditError> {
        self.ensure_node(id)?;
        let swapped = edit::swap_children(self.tree_mut()?, id).map_err(|e| self.reject(e))?;
        if swapped {
            self.edited();
        }
        Ok(swapped)
    }

    /// Sorts below `id` by whichever label fields are displayed.
    pub fn sort_descendants(&mut self, id: NodeId) -> Result<bool, EditError> {
        self.ensure_node(id)?;
        let priority = SortPriority::from_options(&self.options);
        let sorted = edit::sort_descendants(self.tree_mut()?, id, priority)?;
        if sorted {
            self.edited();
        }
        Ok(sorted)
    }

    pub fn order_subtree(&mut self, id: NodeId, increasing: bool) -> Result<(), EditError> {
        self.ensure_node(id)?;
        edit::order_subtree(self.tree_mut()?, id, increasing)?;
        self.edited();
        Ok(())
    }

    pub fn cut(&mut self, id: NodeId) -> Result<(), EditError> {
        self.ensure_rooted_display(EditOperation::Cut)?;
        self.ensure_node(id)?;
        let tree = self.current_tree().ok_or(EditError::NoTree)?;
        if tree.is_root(id) {
            return Err(self.reject(EditError::CutRoot));
        }
        let copy = tree.copy_subtree(id);
        edit::delete_subtree(self.tree_mut()?, id)?;
        self.clipboard = Some(copy);
        self.copied.clear();
        self.edited();
        Ok(())
    }

    pub fn copy(&mut self, id: NodeId) -> Result<(), EditError> {
        self.ensure_rooted_display(EditOperation::Copy)?;
        self.ensure_node(id)?;
        let tree = self.current_tree().ok_or(EditError::NoTree)?;
        let copy = tree.copy_subtree(id);
        let ids: HashSet<NodeId> = tree.preorder_from(id).into_iter().collect();
        self.copied = ids;
        self.clipboard = Some(copy);
        Ok(())
    }

    /// Inserts a copy of the clipboard and highlights the new nodes.
    pub fn paste(&mut self, target: NodeId, attach: Attach) -> Result<(), EditError> {
        self.ensure_rooted_display(EditOperation::Paste)?;
        self.ensure_node(target)?;
        let Some(buffer) = self.clipboard.take() else {
            return Err(self.reject(EditError::EmptyBuffer));
        };
        let result = self
            .tree_mut()
            .and_then(|tree| edit::attach_tree(tree, &buffer, target, attach));
        self.clipboard = Some(buffer);
        let added = result.map_err(|e| self.reject(e))?;
        self.copied.extend(added);
        self.edited();
        Ok(())
    }

    pub fn delete(&mut self, id: NodeId, mode: DeleteMode) -> Result<(), EditError> {
        self.ensure_rooted_display(EditOperation::Delete)?;
        self.ensure_node(id)?;
        edit::delete(self.tree_mut()?, id, mode).map_err(|e| self.reject(e))?;
        self.edited();
        Ok(())
    }

    pub fn add_empty_node(&mut self, target: NodeId, attach: Attach) -> Result<NodeId, EditError> {
        self.ensure_rooted_display(EditOperation::AddNode)?;
        self.ensure_node(target)?;
        let id = edit::add_empty_node(self.tree_mut()?, target, attach).map_err(|e| self.reject(e))?;
        self.copied.insert(id);
        self.edited();
        Ok(id)
    }

    pub fn colorize_subtree(&mut self, id: NodeId, color: Color32) -> Result<(), EditError> {
        self.ensure_rooted_display(EditOperation::Colorize)?;
        self.ensure_node(id)?;
        edit::colorize_subtree(self.tree_mut()?, id, color)?;
        self.edited();
        Ok(())
    }

    pub fn remove_branch_colors(&mut self) -> Result<bool, EditError> {
        let changed = edit::remove_branch_colors(self.tree_mut()?);
        if changed {
            self.edited();
        }
        Ok(changed)
    }

    /// Case-insensitive substring search over names, taxonomy and sequence
    /// fields. Replaces the found set and returns its size.
    pub fn find_nodes(&mut self, query: &str) -> usize {
        self.find_nodes_with(query, TextSearchType::Contains, false)
    }

    pub fn find_nodes_with(
        &mut self,
        query: &str,
        search_type: TextSearchType,
        case_sensitive: bool,
    ) -> usize {
        self.found.clear();
        let query = query.trim();
        if query.is_empty() {
            return 0;
        }
        let query = if case_sensitive {
            query.to_string()
        } else {
            query.to_lowercase()
        };
        if let Some(tree) = self.current_tree() {
            let hits: Vec<NodeId> = tree
                .preorder()
                .into_iter()
                .filter(|&id| {
                    searchable_fields(&tree.nodes[id])
                        .any(|text| matches_text(text, &query, search_type, case_sensitive))
                })
                .collect();
            self.found.extend(hits);
        }
        info!("Found {} nodes matching \"{query}\"", self.found.len());
        self.found.len()
    }

    /// Runs a layout pass if anything changed since the last one.
    pub fn layout(&mut self) -> &LayoutCache {
        if !self.cache.valid {
            if let Some(tree) = self.trees.get_mut(self.current_tree_index) {
                self.cache =
                    layout::compute(tree, &mut self.fonts, &self.options, self.canvas, self.visible);
            }
        }
        &self.cache
    }

    pub fn paint(&mut self, request: &PaintRequest) -> Option<TreeSceneGraph> {
        self.set_viewport(request.canvas, request.visible);
        self.layout();
        let tree = self.current_tree()?;
        let painter = TreePainter::new(
            &self.options,
            &self.colors,
            request.target,
            &self.found,
            &self.copied,
        )
        .with_selected(&self.selected);
        Some(build_tree_scene(tree, &self.cache, &self.fonts, &painter, request))
    }
}

fn searchable_fields(node: &TreeNode) -> impl Iterator<Item = &str> {
    let taxonomy = node.data.taxonomy.iter().flat_map(|t| {
        [&t.code, &t.scientific_name, &t.common_name]
            .into_iter()
            .filter_map(|s| s.as_deref())
    });
    let sequence = node.data.sequence.iter().flat_map(|s| {
        [&s.name, &s.symbol, &s.gene_name]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .chain(s.accession.iter().map(|a| a.value.as_str()))
    });
    node.name.as_deref().into_iter().chain(taxonomy).chain(sequence)
}

fn matches_text(text: &str, query: &str, search_type: TextSearchType, case_sensitive: bool) -> bool {
    let target = if case_sensitive {
        text.to_string()
    } else {
        text.to_lowercase()
    };
    match search_type {
        TextSearchType::Contains => target.contains(query),
        TextSearchType::StartsWith => target.starts_with(query),
        TextSearchType::EndsWith => target.ends_with(query),
        TextSearchType::Matches => target == query,
    }
}

#[cfg(test)]
mod tests {
    use egui::Pos2;
    use proptest::prelude::*;

    use super::*;
    use crate::tree::test_support::strategies::arb_tree;
    use crate::tree::test_support::*;
    use crate::tree::{Sequence, Taxonomy};

    fn viewer_with(tree: Tree) -> TreeViewer {
        let mut viewer = TreeViewer::new(DisplayOptions::default(), TreeFontSet::approximate());
        viewer.set_trees(vec![tree]);
        viewer
    }

    fn id(viewer: &TreeViewer, name: &str) -> NodeId {
        viewer.current_tree().unwrap().find_by_name(name).unwrap()
    }

    fn tree(viewer: &TreeViewer) -> &Tree {
        viewer.current_tree().unwrap()
    }

    #[test]
    fn test_collapse_root_child_leaves_one_visible_tip() {
        let mut t = Tree::new(0, None);
        let root = t.add_node(None, None);
        t.root = Some(root);
        let inner = t.add_child(root, Some("inner".into()), Some(1.0));
        for name in ["A", "B", "C", "D", "E"] {
            t.add_child(inner, Some(name.into()), Some(1.0));
        }
        t.invalidate();
        let mut viewer = viewer_with(t);
        assert!(viewer.toggle_collapse(inner).unwrap());
        let tree = tree(&viewer);
        assert_eq!(tree.visible_tips().len(), 1);
        assert_eq!(tree.external_count(root), 1, "Collapsed clade counts as one");
        assert!(tree.edited);
    }

    #[test]
    fn test_reroot_rejected_when_not_rerootable() {
        let mut t = create_test_tree();
        t.rerootable = false;
        let mut viewer = viewer_with(t);
        let before = tree(&viewer).nodes.clone();
        let c = id(&viewer, "C");
        assert_eq!(viewer.reroot(c), Err(EditError::NotRerootable));
        assert_eq!(viewer.midpoint_root(), Err(EditError::NotRerootable));
        assert_eq!(tree(&viewer).nodes, before, "Tree must be untouched");
        assert!(!tree(&viewer).edited);
    }

    #[test]
    fn test_unrooted_display_rejects_structural_edits() {
        let mut viewer = viewer_with(create_test_tree());
        viewer.copy(id(&viewer, "AB")).unwrap();
        viewer.set_layout_kind(LayoutKind::Unrooted);
        let before = tree(&viewer).nodes.clone();
        let cde = id(&viewer, "CDE");
        let c = id(&viewer, "C");
        let unrooted = EditError::UnrootedDisplay;

        assert_eq!(viewer.toggle_collapse(cde).unwrap_err(), unrooted(EditOperation::Collapse));
        assert_eq!(viewer.reroot(c).unwrap_err(), unrooted(EditOperation::Reroot));
        assert_eq!(viewer.subtree(cde).unwrap_err(), unrooted(EditOperation::Subtree));
        assert_eq!(viewer.cut(cde).unwrap_err(), unrooted(EditOperation::Cut));
        assert_eq!(viewer.copy(cde).unwrap_err(), unrooted(EditOperation::Copy));
        assert_eq!(
            viewer.paste(c, Attach::Sibling).unwrap_err(),
            unrooted(EditOperation::Paste)
        );
        assert_eq!(
            viewer.delete(c, DeleteMode::NodeOnly).unwrap_err(),
            unrooted(EditOperation::Delete)
        );
        assert_eq!(
            viewer.add_empty_node(c, Attach::Child).unwrap_err(),
            unrooted(EditOperation::AddNode)
        );
        assert_eq!(
            viewer.colorize_subtree(cde, Color32::RED).unwrap_err(),
            unrooted(EditOperation::Colorize)
        );
        assert_eq!(tree(&viewer).nodes, before);
        assert!(!tree(&viewer).edited);
        assert!(!viewer.is_current_tree_subtree());
    }

    #[test]
    fn test_swap_rejects_multifurcation() {
        let mut viewer = viewer_with(tree_from_parents(&[0, 0, 0], &[]));
        let root = tree(&viewer).root.unwrap();
        let before = tree(&viewer).nodes[root].children.clone();
        assert_eq!(viewer.swap(root), Err(EditError::SwapTooManyChildren(3)));
        assert_eq!(tree(&viewer).nodes[root].children, before);
    }

    #[test]
    fn test_subtree_stack_round_trip() {
        let mut viewer = viewer_with(create_test_tree());
        let root = tree(&viewer).root.unwrap();
        let cde = id(&viewer, "CDE");
        let de = id(&viewer, "DE");

        assert_eq!(viewer.subtree(root), Err(EditError::SubtreeOfRoot));
        assert_eq!(viewer.subtree(id(&viewer, "A")), Err(EditError::SubtreeOfExternalNode));

        viewer.subtree(cde).unwrap();
        assert_eq!(tree(&viewer).leaf_names(), vec!["C", "D", "E"]);
        assert_eq!(viewer.reroot(de), Err(EditError::RerootInSubtree));
        viewer.subtree(de).unwrap();
        assert_eq!(viewer.subtree_depth(), 2);
        assert_eq!(tree(&viewer).leaf_names(), vec!["D", "E"]);

        viewer.subtree(de).unwrap();
        assert_eq!(viewer.subtree_depth(), 1, "Subtree of the shown root steps out");
        assert!(viewer.supertree());
        assert!(!viewer.supertree(), "Nothing left to restore");
        assert_eq!(tree(&viewer).root, Some(root));
        assert_eq!(tree(&viewer).nodes[cde].parent, Some(root));
        assert_eq!(tree(&viewer).leaf_names(), vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_supertree_keeps_edits_made_in_subtree() {
        let mut viewer = viewer_with(create_test_tree());
        let root = tree(&viewer).root.unwrap();
        let cde = id(&viewer, "CDE");
        let de = id(&viewer, "DE");
        viewer.subtree(cde).unwrap();
        viewer.delete(id(&viewer, "C"), DeleteMode::Subtree).unwrap();
        assert_eq!(tree(&viewer).root, Some(de), "Sibling replaced the shown root");
        viewer.supertree();
        assert_eq!(tree(&viewer).root, Some(root));
        assert_eq!(tree(&viewer).nodes[de].parent, Some(root));
        assert!(tree(&viewer).nodes[root].children.contains(&de));
        assert_eq!(tree(&viewer).leaf_names(), vec!["A", "B", "D", "E"]);
    }

    #[test]
    fn test_subtree_stack_capacity() {
        let mut t = Tree::new(0, None);
        let mut parent = t.add_node(None, None);
        t.root = Some(parent);
        for i in 0..=MAX_SUBTREES + 1 {
            t.add_child(parent, Some(format!("leaf{i}")), Some(1.0));
            parent = t.add_child(parent, Some(format!("inner{i}")), Some(1.0));
        }
        t.add_child(parent, Some("last".into()), Some(1.0));
        t.add_child(parent, Some("last2".into()), Some(1.0));
        t.invalidate();
        let mut viewer = viewer_with(t);
        for i in 0..MAX_SUBTREES {
            viewer.subtree(id(&viewer, &format!("inner{i}"))).unwrap();
        }
        let next = id(&viewer, &format!("inner{MAX_SUBTREES}"));
        assert_eq!(viewer.subtree(next), Err(EditError::SubtreeStackFull(MAX_SUBTREES)));
    }

    #[test]
    fn test_cut_copy_paste() {
        let mut viewer = viewer_with(create_test_tree());
        let root = tree(&viewer).root.unwrap();
        assert_eq!(viewer.paste(root, Attach::Child), Err(EditError::EmptyBuffer));
        assert_eq!(viewer.cut(root), Err(EditError::CutRoot));

        viewer.copy(id(&viewer, "DE")).unwrap();
        assert_eq!(viewer.copied().len(), 3);
        assert!(!tree(&viewer).edited, "Copy does not edit");

        viewer.cut(id(&viewer, "AB")).unwrap();
        assert!(viewer.copied().is_empty());
        assert_eq!(tree(&viewer).leaf_names(), vec!["C", "D", "E"]);

        viewer.paste(id(&viewer, "C"), Attach::Sibling).unwrap();
        assert_eq!(tree(&viewer).leaf_names(), vec!["A", "B", "C", "D", "E"]);
        assert_eq!(viewer.copied().len(), 4);
        viewer.paste(id(&viewer, "C"), Attach::Child).unwrap();
        assert_eq!(tree(&viewer).leaf_count(), 6, "Buffer survives a paste");
    }

    #[test]
    fn test_delete_refuses_entire_tree() {
        let mut viewer = viewer_with(create_test_tree());
        let root = tree(&viewer).root.unwrap();
        assert_eq!(viewer.delete(root, DeleteMode::NodeOnly), Err(EditError::DeleteEntireTree));
        viewer.delete(id(&viewer, "DE"), DeleteMode::NodeOnly).unwrap();
        assert_eq!(tree(&viewer).leaf_names(), vec!["A", "B", "C", "D", "E"]);
        assert!(tree(&viewer).find_by_name("DE").is_none());
    }

    #[test]
    fn test_find_nodes_searches_payload() {
        let mut t = create_test_tree();
        let a = t.find_by_name("A").unwrap();
        t.nodes[a].data.taxonomy = Some(Taxonomy {
            scientific_name: Some("Homo sapiens".into()),
            ..Taxonomy::default()
        });
        let b = t.find_by_name("B").unwrap();
        t.nodes[b].data.sequence = Some(Sequence {
            gene_name: Some("SAPK1".into()),
            ..Sequence::default()
        });
        let mut viewer = viewer_with(t);
        assert_eq!(viewer.find_nodes("sap"), 2);
        assert!(viewer.found().contains(&a) && viewer.found().contains(&b));
        assert_eq!(viewer.find_nodes("de"), 2, "CDE and DE");
        assert_eq!(viewer.find_nodes_with("DE", TextSearchType::Matches, true), 1);
        assert_eq!(viewer.find_nodes("   "), 0);
    }

    #[test]
    fn test_midpoint_root_through_viewer() {
        let mut t = create_test_tree();
        let e = t.find_by_name("E").unwrap();
        t.nodes[e].length = Some(5.0);
        let mut viewer = viewer_with(t);
        assert!(viewer.midpoint_root().unwrap());
        assert!(tree(&viewer).edited);
    }

    #[test]
    fn test_paint_lays_out_on_demand() {
        let mut viewer = viewer_with(balanced_tree(3));
        let canvas = Vec2::new(800.0, 800.0);
        let scene = viewer.paint(&PaintRequest::export(canvas)).unwrap();
        assert_eq!(scene.texts().filter(|t| t.starts_with('L')).count(), 8);
        assert!(viewer.layout().valid);

        viewer.find_nodes("L3");
        let visible = Rect::from_min_size(Pos2::ZERO, Vec2::new(400.0, 400.0));
        let scene = viewer.paint(&PaintRequest::screen(canvas, visible)).unwrap();
        assert!(!scene.primitives.is_empty());
    }

    #[test]
    fn test_selected_leaf_keeps_label_when_thinned() {
        let mut viewer = viewer_with(balanced_tree(8));
        viewer.options.auto_font_size = false;
        let leaf = id(&viewer, "L5");
        assert!(viewer.toggle_selected(leaf).unwrap());
        let scene = viewer.paint(&PaintRequest::export(Vec2::new(600.0, 300.0))).unwrap();
        let labels: Vec<&str> = scene.texts().filter(|t| t.starts_with('L')).collect();
        assert!(labels.len() < 256, "Labels should be thinned out");
        assert!(labels.contains(&"L5"), "Selected nodes are exempt from hiding");

        assert!(!viewer.toggle_selected(leaf).unwrap());
        assert!(viewer.selected().is_empty());
        assert_eq!(viewer.toggle_selected(10_000), Err(EditError::UnknownNode(10_000)));
    }

    #[test]
    fn test_show_tree_leaves_subtree_view() {
        let mut viewer = viewer_with(create_test_tree());
        viewer.add_tree(balanced_tree(2));
        viewer.subtree(id(&viewer, "CDE")).unwrap();
        viewer.show_next_tree();
        assert_eq!(viewer.current_tree_index(), 1);
        assert!(!viewer.is_current_tree_subtree());
        assert_eq!(viewer.trees()[0].leaf_count(), 5, "First tree restored");
    }

    proptest! {
        #[test]
        fn prop_cut_then_paste_restores_leaves(tree in arb_tree(20), pick in 0usize..20) {
            let order = tree.preorder();
            let target = order[pick % order.len()];
            prop_assume!(!tree.is_root(target));
            let names = tree.leaf_names();
            let parent = tree.nodes[target].parent.unwrap();
            let sibling = tree.nodes[parent].children.iter().copied().find(|&c| c != target);

            let mut viewer = viewer_with(tree);
            viewer.cut(target).unwrap();
            let after_cut = viewer.current_tree().unwrap();
            let (anchor, attach) = if edit::ensure_node(after_cut, parent).is_ok() {
                (parent, Attach::Child)
            } else {
                let sibling = sibling.unwrap();
                if after_cut.is_root(sibling) { (sibling, Attach::Child) } else { (sibling, Attach::Sibling) }
            };
            prop_assume!(!(after_cut.is_root(anchor)
                && attach == Attach::Child
                && after_cut.all_external_descendants(anchor) == 1));
            viewer.paste(anchor, attach).unwrap();
            prop_assert_eq!(names, viewer.current_tree().unwrap().leaf_names());
        }
    }
}
