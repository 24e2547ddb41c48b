//! Navigation (department) trees for streamed search scopes.
//!
//! Backends send partial department trees alongside their results. The tree
//! is cached in a [`NavigationTree`]; each new snapshot is merged by locating
//! the smallest subtree that actually changed ([`merge_snapshot`]). A
//! [`NavigationProjector`] then keeps the bound [`NavigationView`]s and their
//! active row in step with the tree.

mod differ;
mod projector;
mod snapshot;
mod tree;

pub use differ::MergeOutcome;
pub use differ::find_update_node;
pub use differ::merge_snapshot;
pub use projector::NavigationProjector;
pub use projector::NavigationView;
pub use projector::ProjectionEvent;
pub use projector::SubdepartmentRow;
pub use projector::ViewHandle;
pub use snapshot::FilterOption;
pub use snapshot::NavigationSnapshot;
pub use snapshot::SortOrderFilter;
pub use tree::NavigationTree;
pub use tree::NodeId;
pub use tree::TreeNode;
