use crate::snapshot::NavigationSnapshot;
use crate::tree::NavigationTree;
use crate::tree::NodeId;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;
use tracing::warn;

/// Find the smallest part of `fresh` that has to replace its counterpart
/// under `node`.
///
/// Returns `None` when the cached subtree already knows everything `fresh`
/// says. A node is considered different when its id differs or when `fresh`
/// lists a child the cache does not have. Children known to both sides are
/// compared recursively; a single differing child is returned as is, two or
/// more make the whole `fresh` node the replacement. Cached children that
/// `fresh` does not mention are left alone.
pub fn find_update_node<'a>(
    tree: &NavigationTree,
    node: NodeId,
    fresh: &'a NavigationSnapshot,
) -> Option<&'a NavigationSnapshot> {
    let Some(cached) = tree.node(node) else {
        return Some(fresh);
    };
    if cached.id() != fresh.id {
        return Some(fresh);
    }

    let cached_children: Vec<(&str, NodeId)> = cached
        .children()
        .iter()
        .filter_map(|child| tree.node(*child).map(|child_node| (child_node.id(), *child)))
        .collect();
    let mut fresh_children: HashMap<&str, &NavigationSnapshot> = HashMap::new();
    for child in &fresh.children {
        if !cached_children.iter().any(|(id, _)| *id == child.id) {
            return Some(fresh);
        }
        fresh_children.insert(child.id.as_str(), child);
    }

    let mut first_mismatch = None;
    for (id, child) in cached_children {
        let Some(fresh_child) = fresh_children.get(id).copied() else {
            continue;
        };
        if let Some(update) = find_update_node(tree, child, fresh_child) {
            if first_mismatch.is_some() {
                return Some(fresh);
            }
            first_mismatch = Some(update);
        }
    }
    first_mismatch
}

/// Where a snapshot merge landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// There was no tree yet; it was built from the snapshot.
    Created,
    /// The subtree at `navigation_id` was rebuilt from the snapshot.
    Replaced {
        #[serde(skip)]
        node: NodeId,
        navigation_id: String,
        removed: usize,
    },
    Unchanged,
}

impl MergeOutcome {
    pub fn replaced_id(&self) -> Option<&str> {
        match self {
            Self::Replaced { navigation_id, .. } => Some(navigation_id),
            Self::Created | Self::Unchanged => None,
        }
    }
}

/// Merge a fresh snapshot into the cached tree, creating it if needed.
///
/// A snapshot rooted at an unknown id replaces the whole tree in place.
/// Otherwise only the subtree located by [`find_update_node`] is rebuilt.
pub fn merge_snapshot(
    tree: &mut Option<NavigationTree>,
    fresh: &NavigationSnapshot,
) -> MergeOutcome {
    let Some(cached) = tree.as_mut() else {
        *tree = Some(NavigationTree::from_snapshot(fresh));
        return MergeOutcome::Created;
    };

    let (node, update) = match cached.find_node_by_id(&fresh.id) {
        None => (cached.root(), Some(fresh)),
        Some(node) => match find_update_node(cached, node, fresh) {
            Some(update) => match cached.find_node_by_id(&update.id) {
                Some(target) => (target, Some(update)),
                None => {
                    warn!(
                        "navigation node {:?} vanished while merging; rebuilding from the root",
                        update.id
                    );
                    (cached.root(), Some(fresh))
                }
            },
            None => (node, None),
        },
    };

    let outcome = match update {
        Some(update) => {
            let removed = cached.reinitialize(node, update);
            debug!(
                "replaced navigation subtree {:?} ({removed} stale nodes)",
                update.id
            );
            MergeOutcome::Replaced {
                node,
                navigation_id: update.id.clone(),
                removed,
            }
        }
        None => MergeOutcome::Unchanged,
    };
    cached.set_is_root(true);
    outcome
}
