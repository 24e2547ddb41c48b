//! # Scopes Results Model
//!
//! Incremental reconciliation of streamed, ranked search results into a
//! stable, row-addressed list.
//!
//! A backend delivers the results of a search as a growing, cumulative batch.
//! [`ListReconciler`] turns each batch into a short sequence of [`RowOp`]s
//! (insert, remove, move, data-changed ranges) that a view can replay to stay
//! in sync without rebuilding the list.
//!
//! ## Example
//!
//! ```
//! use scopes_results_model::KeyedResult;
//! use scopes_results_model::ListReconciler;
//! use scopes_results_model::ResultRecord;
//! use scopes_results_model::RowOp;
//!
//! let mut reconciler = ListReconciler::new("music");
//! let session = reconciler.begin_session();
//! let batch: Vec<KeyedResult> = ["a", "b"]
//!     .into_iter()
//!     .map(|uri| ResultRecord::new(uri, "music").into())
//!     .collect();
//! let delta = reconciler.merge_batch(&session, &batch)?;
//! assert_eq!(delta.ops, vec![RowOp::Insert { at: 0, count: 2 }]);
//! reconciler.end_session(session)?;
//! # Ok::<(), scopes_results_model::ReconcileError>(())
//! ```

mod collection;
mod error;
mod identity;
mod index;
mod ops;
mod reconciler;

pub use collection::ResultCollection;
pub use error::ReconcileError;
pub use error::Result;
pub use identity::IdentityKey;
pub use identity::KeyedResult;
pub use identity::ResultRecord;
pub use index::DuplicateKey;
pub use index::PositionIndex;
pub use ops::OpLog;
pub use ops::RowOp;
pub use ops::replay;
pub use reconciler::CompletionStatus;
pub use reconciler::Diagnostic;
pub use reconciler::ListReconciler;
pub use reconciler::ModelDelta;
pub use reconciler::SessionHandle;
