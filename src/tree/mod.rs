use egui::Color32;
use phylotree::tree::{Node as PhyloNode, Tree as PhyloTree};

pub mod edit;
pub mod fonts;
pub mod layout;
pub mod painter;
pub mod scene_graph;
pub mod simplify;
pub mod skia_renderer;
pub mod viewer;

pub type NodeId = phylotree::tree::NodeId;

/// Pixel coordinate of a node in one of the two layout planes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn to_pos2(self) -> egui::Pos2 {
        egui::pos2(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Accession {
    pub source: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sequence {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub gene_name: Option<String>,
    pub accession: Option<Accession>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Taxonomy {
    pub code: Option<String>,
    pub scientific_name: Option<String>,
    pub common_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Confidence {
    pub value: f64,
    pub std_dev: Option<f64>,
    pub kind: Option<String>,
}

impl Confidence {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            std_dev: None,
            kind: None,
        }
    }
}

/// Gene duplication/speciation annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Event {
    pub duplications: u32,
    pub speciations: u32,
}

impl Event {
    pub fn is_duplication(&self) -> bool {
        self.duplications > 0 && self.speciations == 0
    }

    pub fn is_speciation(&self) -> bool {
        self.speciations > 0 && self.duplications == 0
    }
}

/// Payload attached to a node. The engine only reads it, except for `branch_color`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeData {
    pub sequence: Option<Sequence>,
    pub taxonomy: Option<Taxonomy>,
    pub confidences: Vec<Confidence>,
    pub properties: Vec<(String, String)>,
    pub branch_color: Option<Color32>,
    pub event: Option<Event>,
}

/// Data that belongs to the branch above a node rather than to the node itself.
/// Re-rooting moves it along the re-parented path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BranchData {
    pub length: Option<f64>,
    pub confidences: Vec<Confidence>,
    pub color: Option<Color32>,
}

/// Representation of a phylogenetic tree with an explicit node arena.
///
/// Nodes that get detached by an edit stay in `nodes` but are no longer
/// reachable from `root`; every traversal starts at the root.
#[derive(Debug, Clone)]
pub struct Tree {
    pub id: usize,
    pub label: Option<String>,
    pub root: Option<NodeId>,
    pub nodes: Vec<TreeNode>,
    pub rooted: bool,
    pub rerootable: bool,
    pub edited: bool,
    pub distance_unit: Option<String>,
    external_counts: Vec<usize>,
}

impl Tree {
    pub fn new(id: usize, label: Option<String>) -> Self {
        Self {
            id,
            label,
            root: None,
            nodes: Vec::new(),
            rooted: true,
            rerootable: true,
            edited: false,
            distance_unit: None,
            external_counts: Vec::new(),
        }
    }

    /// Converts a parsed `phylotree` arena into the engine's model.
    pub fn from_phylo(id: usize, label: Option<String>, phylo: &PhyloTree) -> Self {
        let mut tree = Self::new(id, label);
        tree.nodes = (0..phylo.size())
            .map(|idx| match phylo.get(&idx) {
                Ok(node) => TreeNode::from_phylo(node),
                Err(_) => TreeNode::new(idx, None, None),
            })
            .collect();
        tree.root = phylo.get_root().ok();
        tree.invalidate();
        tree
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(id)
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.and_then(|id| self.nodes.get(id))
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        self.root == Some(id)
    }

    /// Appends a detached node and returns its id.
    pub fn add_node(&mut self, name: Option<String>, length: Option<f64>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(TreeNode::new(id, name, length));
        id
    }

    /// Appends a node as the last child of `parent`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: Option<String>,
        length: Option<f64>,
    ) -> NodeId {
        let id = self.add_node(name, length);
        self.nodes[id].parent = Some(parent);
        self.nodes[parent].children.push(id);
        id
    }

    /// Node ids reachable from `start`, parents before children, children left to right.
    pub fn preorder_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if start >= self.nodes.len() {
            return order;
        }
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
        order
    }

    pub fn preorder(&self) -> Vec<NodeId> {
        self.root.map(|r| self.preorder_from(r)).unwrap_or_default()
    }

    /// Node ids reachable from `start`, children before parents.
    pub fn postorder_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if start >= self.nodes.len() {
            return order;
        }
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().copied());
        }
        order.reverse();
        order
    }

    pub fn postorder(&self) -> Vec<NodeId> {
        self.root.map(|r| self.postorder_from(r)).unwrap_or_default()
    }

    /// Preorder that does not descend below collapsed nodes.
    pub fn visible_preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let Some(root) = self.root else {
            return order;
        };
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            if !self.is_collapsed(id) {
                stack.extend(self.nodes[id].children.iter().rev().copied());
            }
        }
        order
    }

    /// A non-root node flagged as collapsed. The root never hides its children.
    pub fn is_collapsed(&self, id: NodeId) -> bool {
        self.nodes[id].collapse && self.root != Some(id)
    }

    /// Nodes that terminate the visible tree: leaves and topmost collapsed nodes.
    pub fn visible_tips(&self) -> Vec<NodeId> {
        self.visible_preorder()
            .into_iter()
            .filter(|&id| self.nodes[id].is_leaf() || self.is_collapsed(id))
            .collect()
    }

    /// True when `id` or one of its ancestors below the root is collapsed.
    pub fn is_hidden_by_collapse(&self, id: NodeId) -> bool {
        let mut current = self.nodes.get(id).and_then(|n| n.parent);
        while let Some(pid) = current {
            if self.is_collapsed(pid) {
                return true;
            }
            current = self.nodes[pid].parent;
        }
        false
    }

    pub fn external_nodes(&self) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|&id| self.nodes[id].is_leaf())
            .collect()
    }

    pub fn leaf_count(&self) -> usize {
        self.external_nodes().len()
    }

    pub fn node_count(&self) -> usize {
        self.preorder().len()
    }

    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut all = self.preorder_from(id);
        if !all.is_empty() {
            all.remove(0);
        }
        all
    }

    /// Leaves below `id`, ignoring collapse flags.
    pub fn all_external_descendants(&self, id: NodeId) -> usize {
        self.preorder_from(id)
            .into_iter()
            .filter(|&n| self.nodes[n].is_leaf())
            .count()
    }

    /// Recomputes the cached visible external-descendant counts (collapsed nodes count as one).
    pub fn invalidate(&mut self) {
        let mut counts = vec![0; self.nodes.len()];
        for id in self.postorder() {
            let node = &self.nodes[id];
            counts[id] = if node.is_leaf() || self.is_collapsed(id) {
                1
            } else {
                node.children.iter().map(|&c| counts[c]).sum()
            };
        }
        self.external_counts = counts;
    }

    /// Cached visible external-descendant count, as of the last `invalidate`.
    pub fn external_count(&self, id: NodeId) -> usize {
        self.external_counts.get(id).copied().filter(|&c| c > 0).unwrap_or(1)
    }

    pub fn mark_edited(&mut self) {
        self.edited = true;
        self.invalidate();
    }

    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes.get(id).and_then(|n| n.parent);
        while let Some(pid) = current {
            depth += 1;
            current = self.nodes[pid].parent;
        }
        depth
    }

    /// Depth of every reachable node, indexed by id.
    pub fn depths(&self) -> Vec<usize> {
        let mut depths = vec![0; self.nodes.len()];
        for id in self.preorder() {
            if let Some(pid) = self.nodes[id].parent {
                depths[id] = depths[pid] + 1;
            }
        }
        depths
    }

    /// Largest depth of a visible tip.
    pub fn max_depth(&self) -> usize {
        let depths = self.depths();
        self.visible_tips()
            .into_iter()
            .map(|id| depths[id])
            .max()
            .unwrap_or(0)
    }

    /// Largest summed branch length from the root to a visible tip.
    /// Absent and negative lengths contribute zero; the root branch is excluded.
    pub fn max_distance_to_root(&self) -> f64 {
        let mut dist = vec![0.0f64; self.nodes.len()];
        let mut max = 0.0f64;
        for id in self.visible_preorder() {
            let node = &self.nodes[id];
            if let Some(pid) = node.parent.filter(|_| !self.is_root(id)) {
                dist[id] = dist[pid] + node.branch_length();
            }
            if node.is_leaf() || self.is_collapsed(id) {
                max = max.max(dist[id]);
            }
        }
        max
    }

    /// Height of the visible tree including the root branch.
    pub fn height(&self) -> f64 {
        let root_length = self.root().map(|r| r.branch_length()).unwrap_or(0.0);
        root_length + self.max_distance_to_root()
    }

    /// Largest number of branches between `id` and a visible tip below it.
    pub fn max_branches_to_leaf(&self, id: NodeId) -> usize {
        let mut best = vec![0usize; self.nodes.len()];
        for n in self.postorder_from(id) {
            if self.is_collapsed(n) && n != id {
                best[n] = 0;
                continue;
            }
            best[n] = self.nodes[n]
                .children
                .iter()
                .map(|&c| best[c] + 1)
                .max()
                .unwrap_or(0);
        }
        best.get(id).copied().unwrap_or(0)
    }

    /// True if any non-root branch carries a positive length.
    pub fn has_branch_lengths(&self) -> bool {
        self.preorder()
            .into_iter()
            .filter(|&id| !self.is_root(id))
            .any(|id| self.nodes[id].length.is_some_and(|l| l > 0.0))
    }

    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.nodes.get(id)?.parent?;
        self.nodes[parent].children.iter().position(|&c| c == id)
    }

    pub fn is_first_child(&self, id: NodeId) -> bool {
        self.child_index(id) == Some(0)
    }

    pub fn is_last_child(&self, id: NodeId) -> bool {
        match (self.nodes.get(id).and_then(|n| n.parent), self.child_index(id)) {
            (Some(parent), Some(idx)) => idx + 1 == self.nodes[parent].children.len(),
            _ => false,
        }
    }

    /// Is `ancestor` on the path from `id` to the root (or `id` itself)?
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.nodes[n].parent;
        }
        false
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.preorder()
            .into_iter()
            .find(|&id| self.nodes[id].name.as_deref() == Some(name))
    }

    /// Names of all external nodes, sorted.
    pub fn leaf_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .external_nodes()
            .into_iter()
            .map(|id| self.nodes[id].name_str().to_string())
            .collect();
        names.sort();
        names
    }

    /// Order children below `start` by clade size.
    /// If `increasing` is true, smaller clades come first; otherwise larger clades come first.
    pub fn order_subtree(&mut self, start: NodeId, increasing: bool) {
        let mut sizes = vec![0usize; self.nodes.len()];
        let order = self.postorder_from(start);
        for &id in &order {
            let node = &self.nodes[id];
            sizes[id] = if node.is_leaf() {
                1
            } else {
                node.children.iter().map(|&c| sizes[c]).sum()
            };
        }
        for id in order {
            if self.nodes[id].children.len() > 1 {
                self.nodes[id].children.sort_by(|&a, &b| {
                    if increasing {
                        sizes[a].cmp(&sizes[b])
                    } else {
                        sizes[b].cmp(&sizes[a])
                    }
                });
            }
        }
    }

    pub fn order_nodes(&mut self, increasing: bool) {
        if let Some(root) = self.root {
            self.order_subtree(root, increasing);
        }
    }

    /// Detached deep copy of the subtree rooted at `id`, re-identified in preorder.
    pub fn copy_subtree(&self, id: NodeId) -> Tree {
        let mut copy = Tree::new(self.id, self.label.clone());
        copy.distance_unit = self.distance_unit.clone();
        copy.root = copy.graft(self, id);
        if let Some(root) = copy.root {
            copy.nodes[root].parent = None;
        }
        copy.invalidate();
        copy
    }

    /// Appends a fresh-id copy of the subtree of `source` rooted at `start`.
    /// The copied nodes are un-collapsed and carry no coordinates; the new
    /// subtree root is detached and its id is returned.
    pub fn graft(&mut self, source: &Tree, start: NodeId) -> Option<NodeId> {
        if start >= source.nodes.len() {
            return None;
        }
        let offset = self.nodes.len();
        let order = source.preorder_from(start);
        let mut remap = vec![usize::MAX; source.nodes.len()];
        for (i, &old) in order.iter().enumerate() {
            remap[old] = offset + i;
        }
        for &old in &order {
            let src = &source.nodes[old];
            let mut node = TreeNode::new(remap[old], src.name.clone(), src.length);
            node.data = src.data.clone();
            node.parent = src.parent.filter(|_| old != start).map(|p| remap[p]);
            node.children = src.children.iter().map(|&c| remap[c]).collect();
            self.nodes.push(node);
        }
        Some(offset)
    }

    pub fn clear_positions(&mut self) {
        for node in &mut self.nodes {
            node.primary = None;
            node.overview = None;
        }
    }

    /// Ids reachable from the root, used to compare structure across edits.
    pub fn reachable(&self) -> Vec<bool> {
        let mut reachable = vec![false; self.nodes.len()];
        for id in self.preorder() {
            reachable[id] = true;
        }
        reachable
    }
}

/// Node within a phylogenetic tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub id: NodeId,
    pub name: Option<String>,
    pub length: Option<f64>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub collapse: bool,
    pub primary: Option<Position>,
    pub overview: Option<Position>,
    pub data: NodeData,
}

impl TreeNode {
    pub fn new(id: NodeId, name: Option<String>, length: Option<f64>) -> Self {
        Self {
            id,
            name,
            length,
            parent: None,
            children: Vec::new(),
            collapse: false,
            primary: None,
            overview: None,
            data: NodeData::default(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_internal(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn name_str(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Branch length with absent or negative values treated as zero.
    pub fn branch_length(&self) -> f64 {
        self.length.filter(|l| *l > 0.0).unwrap_or(0.0)
    }

    pub fn confidence(&self) -> Option<f64> {
        self.data.confidences.first().map(|c| c.value)
    }

    pub fn take_branch_data(&mut self) -> BranchData {
        BranchData {
            length: self.length.take(),
            confidences: std::mem::take(&mut self.data.confidences),
            color: self.data.branch_color.take(),
        }
    }

    pub fn branch_data(&self) -> BranchData {
        BranchData {
            length: self.length,
            confidences: self.data.confidences.clone(),
            color: self.data.branch_color,
        }
    }

    pub fn set_branch_data(&mut self, data: BranchData) {
        self.length = data.length;
        self.data.confidences = data.confidences;
        self.data.branch_color = data.color;
    }

    pub(crate) fn from_phylo(node: &PhyloNode) -> Self {
        let mut tree_node = TreeNode::new(node.id, node.name.clone(), node.parent_edge);
        tree_node.parent = node.parent;
        tree_node.children = node.children.clone();
        tree_node
    }
}

/// Container for the full contents of an imported file.
#[derive(Debug, Clone)]
pub struct TreeBundle {
    pub format: TreeFileFormat,
    pub trees: Vec<Tree>,
}

impl TreeBundle {
    pub fn new(format: TreeFileFormat, trees: Vec<Tree>) -> Self {
        Self { format, trees }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TreeFileFormat {
    Newick,
    Nexus,
}
