use crate::tree::NavigationTree;
use crate::tree::NodeId;
use crate::tree::TreeNode;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Identifies a bound [`NavigationView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ViewHandle(u64);

/// One row of a navigation view: a direct child of the viewed node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubdepartmentRow {
    pub id: String,
    pub label: String,
    pub all_label: String,
    pub has_children: bool,
    pub is_active: bool,
}

/// What a consumer sees of one navigation node and its children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavigationView {
    pub navigation_id: String,
    pub label: String,
    pub all_label: String,
    pub parent_navigation_id: String,
    pub parent_label: String,
    pub loaded: bool,
    pub is_root: bool,
    pub hidden: bool,
    pub is_filter: bool,
    pub subdepartments: Vec<SubdepartmentRow>,
}

impl NavigationView {
    pub fn from_node(tree: &NavigationTree, node: NodeId) -> Self {
        let mut view = Self::default();
        view.load(tree, node);
        view
    }

    /// Reload from `node`; every row starts out inactive.
    pub fn load(&mut self, tree: &NavigationTree, node: NodeId) {
        let Some(tree_node) = tree.node(node) else {
            return;
        };
        let parent = tree_node.parent().and_then(|parent| tree.node(parent));
        self.navigation_id = tree_node.id().to_string();
        self.label = tree_node.label().to_string();
        self.all_label = tree_node.all_label().to_string();
        self.parent_navigation_id = parent.map(|p| p.id().to_string()).unwrap_or_default();
        self.parent_label = parent.map(|p| p.label().to_string()).unwrap_or_default();
        self.loaded = tree_node.loaded();
        self.is_root = tree_node.is_root();
        self.hidden = tree_node.hidden();
        self.is_filter = tree_node.is_filter();
        self.subdepartments = tree_node
            .children()
            .iter()
            .filter_map(|child| tree.node(*child))
            .map(|child| SubdepartmentRow {
                id: child.id().to_string(),
                label: child.label().to_string(),
                all_label: child.all_label().to_string(),
                has_children: child.has_subdepartments(),
                is_active: false,
            })
            .collect();
    }

    pub fn len(&self) -> usize {
        self.subdepartments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subdepartments.is_empty()
    }

    pub fn active_row(&self) -> Option<usize> {
        self.subdepartments.iter().position(|row| row.is_active)
    }

    /// Make `id` the only active row.
    ///
    /// Returns the rows whose active flag changed, as an inclusive range
    /// covering the previous and the new active row. Unknown ids and an
    /// already active row change nothing.
    pub fn mark_active(&mut self, id: &str) -> Option<(usize, usize)> {
        let row = self.subdepartments.iter().position(|sub| sub.id == id)?;
        let previous = self.active_row();
        if previous == Some(row) {
            return None;
        }
        for (index, sub) in self.subdepartments.iter_mut().enumerate() {
            sub.is_active = index == row;
        }
        let first = previous.map_or(row, |previous| previous.min(row));
        let last = previous.map_or(row, |previous| previous.max(row));
        Some((first, last))
    }
}

/// Notification about a bound view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProjectionEvent {
    /// The view was reloaded from its node.
    Reloaded {
        view: ViewHandle,
        navigation_id: String,
    },
    /// Rows `first_row..=last_row` changed their active flag.
    ActiveChanged {
        view: ViewHandle,
        first_row: usize,
        last_row: usize,
    },
}

/// Keeps bound navigation views in step with a [`NavigationTree`].
#[derive(Debug, Default)]
pub struct NavigationProjector {
    views: HashMap<ViewHandle, NavigationView>,
    bindings: HashMap<String, Vec<ViewHandle>>,
    next_handle: u64,
}

impl NavigationProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a view of `navigation_id`, with `active_id` marked if it is one
    /// of its children. `None` when the tree has no such node.
    pub fn bind(
        &mut self,
        tree: &NavigationTree,
        navigation_id: &str,
        active_id: &str,
    ) -> Option<ViewHandle> {
        let node = tree.find_node_by_id(navigation_id)?;
        let mut view = NavigationView::from_node(tree, node);
        view.mark_active(active_id);

        self.next_handle += 1;
        let handle = ViewHandle(self.next_handle);
        self.views.insert(handle, view);
        self.bindings
            .entry(navigation_id.to_string())
            .or_default()
            .push(handle);
        Some(handle)
    }

    pub fn unbind(&mut self, handle: ViewHandle) -> bool {
        if self.views.remove(&handle).is_none() {
            return false;
        }
        self.bindings.retain(|_, handles| {
            handles.retain(|bound| *bound != handle);
            !handles.is_empty()
        });
        true
    }

    pub fn view(&self, handle: ViewHandle) -> Option<&NavigationView> {
        self.views.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Drop every view.
    pub fn clear(&mut self) {
        self.views.clear();
        self.bindings.clear();
    }

    /// Refresh views after the tree changed or the active node moved.
    ///
    /// Views bound to `active_id` are reloaded. When the active node is a
    /// leaf, views bound to its parent mark it as their active row.
    pub fn project(&mut self, tree: &NavigationTree, active_id: &str) -> Vec<ProjectionEvent> {
        let Some(node) = tree.find_node_by_id(active_id) else {
            debug!("active navigation id {active_id:?} is not in the tree");
            return Vec::new();
        };
        let mut events = Vec::new();

        for handle in self.bindings.get(active_id).into_iter().flatten() {
            if let Some(view) = self.views.get_mut(handle) {
                view.load(tree, node);
                events.push(ProjectionEvent::Reloaded {
                    view: *handle,
                    navigation_id: active_id.to_string(),
                });
            }
        }

        let parent = tree
            .node(node)
            .filter(|tree_node| tree_node.is_leaf())
            .and_then(TreeNode::parent)
            .and_then(|parent| tree.node(parent));
        if let Some(parent) = parent {
            for handle in self.bindings.get(parent.id()).into_iter().flatten() {
                let Some(view) = self.views.get_mut(handle) else {
                    continue;
                };
                if let Some((first_row, last_row)) = view.mark_active(active_id) {
                    events.push(ProjectionEvent::ActiveChanged {
                        view: *handle,
                        first_row,
                        last_row,
                    });
                }
            }
        }
        events
    }
}
