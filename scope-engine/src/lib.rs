//! A search scope: categorized, incrementally reconciled results plus the
//! department and sort-order navigation that come with them.
//!
//! [`ScopeModel`] is the synchronous core. It splits each [`SearchChunk`]
//! by category, merges the cumulative batches through one reconciler per
//! category and merges navigation snapshots into cached trees, reporting
//! everything it changed as [`ScopeUpdate`]s. [`ScopeDriver`] runs a model
//! on a tokio task together with the aggregation, clear and TTL timers.

mod categories;
mod config;
mod driver;
mod error;
mod model;
mod update;

pub use categories::Categories;
pub use config::EngineConfig;
pub use config::ResultsTtl;
pub use driver::ScopeDriver;
pub use driver::ScopeHandle;
pub use error::EngineError;
pub use error::Result;
pub use model::ChunkOutcome;
pub use model::ScopeModel;
pub use model::SearchChunk;
pub use model::SearchTicket;
pub use update::NavigationKind;
pub use update::ScopeStatus;
pub use update::ScopeUpdate;
