use crate::snapshot::NavigationSnapshot;
use crate::snapshot::SortOrderFilter;
use slab::Slab;
use std::collections::HashMap;
use tracing::warn;

/// Arena slot of a [`TreeNode`]. Stable while the node stays in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    id: String,
    label: String,
    all_label: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    has_subdepartments: bool,
    is_leaf: bool,
    is_root: bool,
    hidden: bool,
    is_filter: bool,
}

impl TreeNode {
    fn detached(snapshot: &NavigationSnapshot, parent: Option<NodeId>) -> Self {
        Self {
            id: snapshot.id.clone(),
            label: snapshot.label.clone(),
            all_label: snapshot.alt_label.clone(),
            parent,
            children: Vec::new(),
            has_subdepartments: snapshot.has_children(),
            is_leaf: !snapshot.has_children(),
            is_root: false,
            hidden: snapshot.hidden,
            is_filter: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn all_label(&self) -> &str {
        &self.all_label
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Children exist, loaded or not.
    pub fn has_subdepartments(&self) -> bool {
        self.has_subdepartments || !self.children.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    /// The node stands for an option of a sort-order filter.
    pub fn is_filter(&self) -> bool {
        self.is_filter
    }

    /// The node's children are known (or it has none).
    pub fn loaded(&self) -> bool {
        self.is_leaf || !self.children.is_empty()
    }
}

/// Navigation tree stored in an arena; parents and children refer to each
/// other by [`NodeId`].
#[derive(Debug, Clone)]
pub struct NavigationTree {
    nodes: Slab<TreeNode>,
    by_id: HashMap<String, NodeId>,
    root: NodeId,
}

impl NavigationTree {
    /// Build a tree whose root is `snapshot`, flagged as the root.
    pub fn from_snapshot(snapshot: &NavigationSnapshot) -> Self {
        let mut nodes = Slab::new();
        let root = NodeId(nodes.insert(TreeNode::detached(snapshot, None)));
        let mut tree = Self {
            nodes,
            by_id: HashMap::from([(snapshot.id.clone(), root)]),
            root,
        };
        tree.attach_children(root, &snapshot.children);
        tree.set_is_root(true);
        tree
    }

    /// Build a two-level tree from a sort-order filter: the filter is the
    /// root and every option is a leaf.
    pub fn from_filter(filter: &SortOrderFilter) -> Self {
        let root_snapshot = NavigationSnapshot::new("", filter.label.clone()).with_children(
            filter
                .options
                .iter()
                .map(|option| NavigationSnapshot::new(option.id.clone(), option.label.clone()))
                .collect(),
        );
        let mut tree = Self::from_snapshot(&root_snapshot);
        let children = tree.nodes[tree.root.0].children.clone();
        for child in children {
            tree.nodes[child.0].is_filter = true;
        }
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_node(&self) -> &TreeNode {
        &self.nodes[self.root.0]
    }

    pub fn node(&self, node: NodeId) -> Option<&TreeNode> {
        self.nodes.get(node.0)
    }

    pub fn find_node_by_id(&self, id: &str) -> Option<NodeId> {
        self.by_id.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&TreeNode> {
        self.find_node_by_id(id).and_then(|node| self.node(node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids from the root down to `node`, both included.
    pub fn path(&self, node: NodeId) -> Vec<&str> {
        let mut path = Vec::new();
        let mut cursor = self.node(node);
        while let Some(current) = cursor {
            path.push(current.id());
            cursor = current.parent().and_then(|parent| self.node(parent));
        }
        path.reverse();
        path
    }

    pub fn set_is_root(&mut self, is_root: bool) {
        self.nodes[self.root.0].is_root = is_root;
    }

    /// Replace `node` and everything below it with `snapshot`.
    ///
    /// The node keeps its slot and its place under its parent. The root flag
    /// is cleared; the caller re-establishes it on the tree root.
    pub fn reinitialize(&mut self, node: NodeId, snapshot: &NavigationSnapshot) -> usize {
        let Some(current) = self.nodes.get(node.0) else {
            warn!("navigation node {node:?} is not part of the tree");
            return 0;
        };
        let parent = current.parent;
        let previous_id = current.id.clone();
        let children = current.children.clone();
        let mut removed = 0;
        for child in children {
            removed += self.detach(child);
        }

        if previous_id != snapshot.id {
            self.by_id.remove(&previous_id);
            if let Some(existing) = self.by_id.get(&snapshot.id) {
                warn!(
                    "navigation id {:?} already used by {existing:?}; lookups keep the old node",
                    snapshot.id
                );
            } else {
                self.by_id.insert(snapshot.id.clone(), node);
            }
        }
        self.nodes[node.0] = TreeNode::detached(snapshot, parent);
        self.attach_children(node, &snapshot.children);
        removed
    }

    fn attach_children(&mut self, parent: NodeId, children: &[NavigationSnapshot]) {
        for child in children {
            if let Some(existing) = self.by_id.get(&child.id) {
                warn!(
                    "skipping duplicate navigation id {:?} (already at {existing:?})",
                    child.id
                );
                continue;
            }
            let id = NodeId(self.nodes.insert(TreeNode::detached(child, Some(parent))));
            self.by_id.insert(child.id.clone(), id);
            self.nodes[parent.0].children.push(id);
            self.attach_children(id, &child.children);
        }
    }

    /// Remove `node` and its descendants from the arena. Returns how many.
    fn detach(&mut self, node: NodeId) -> usize {
        let Some(removed) = self.nodes.try_remove(node.0) else {
            return 0;
        };
        if self.by_id.get(&removed.id) == Some(&node) {
            self.by_id.remove(&removed.id);
        }
        1 + removed
            .children
            .into_iter()
            .map(|child| self.detach(child))
            .sum::<usize>()
    }
}
