use crate::ops::RowOp;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("merge session {session} is not open")]
    StaleSession { session: u64 },

    #[error("batch of {len} results is shorter than the {processed} already merged; session reset")]
    BatchShrank { processed: usize, len: usize },

    #[error("batch diverged from the merged prefix at row {row}; session reset")]
    PrefixDiverged { row: usize },

    #[error("{op:?} does not fit a projection of {len} rows")]
    InvalidOp { op: RowOp, len: usize },
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
