use crate::error::ReconcileError;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;

/// Structural change to a row-indexed list, applied in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RowOp {
    /// `count` new rows now occupy `at..at + count`.
    Insert { at: usize, count: usize },
    /// Rows `at..at + count` are gone.
    Remove { at: usize, count: usize },
    /// Rows `from..from + count` are taken out and put back so that the first
    /// of them lands on row `to` of the resulting list.
    Move { from: usize, to: usize, count: usize },
    /// Row `row` was replaced in place; `fields` names what changed.
    DataChanged { row: usize, fields: Vec<String> },
}

/// Ordered operation log that coalesces adjacent single-row operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpLog {
    ops: Vec<RowOp>,
}

impl OpLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_insert(&mut self, at: usize) {
        if let Some(RowOp::Insert { at: start, count }) = self.ops.last_mut() {
            if at == *start + *count {
                *count += 1;
                return;
            }
        }
        self.ops.push(RowOp::Insert { at, count: 1 });
    }

    pub fn push_remove(&mut self, at: usize) {
        if let Some(RowOp::Remove { at: start, count }) = self.ops.last_mut() {
            if at == *start {
                *count += 1;
                return;
            }
        }
        self.ops.push(RowOp::Remove { at, count: 1 });
    }

    pub fn push_move(&mut self, from: usize, to: usize) {
        // Consecutive rows pulled up to consecutive slots form one block move.
        if let Some(RowOp::Move {
            from: block_from,
            to: block_to,
            count,
        }) = self.ops.last_mut()
        {
            if from > to
                && *block_from > *block_to
                && from == *block_from + *count
                && to == *block_to + *count
            {
                *count += 1;
                return;
            }
        }
        self.ops.push(RowOp::Move { from, to, count: 1 });
    }

    pub fn push_data_changed(&mut self, row: usize, fields: Vec<String>) {
        self.ops.push(RowOp::DataChanged { row, fields });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[RowOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<RowOp> {
        self.ops
    }
}

/// Replay `ops` against a consumer-side projection of the rows.
///
/// `fresh` materializes the value of an inserted or data-changed row, given
/// the row index it occupies at the moment the operation is applied.
pub fn replay<T>(
    rows: &mut Vec<T>,
    ops: &[RowOp],
    mut fresh: impl FnMut(usize) -> T,
) -> Result<()> {
    for op in ops {
        let len = rows.len();
        let invalid = || ReconcileError::InvalidOp {
            op: op.clone(),
            len,
        };
        match *op {
            RowOp::Insert { at, count } => {
                if at > len {
                    return Err(invalid());
                }
                let inserted: Vec<T> = (at..at + count).map(&mut fresh).collect();
                rows.splice(at..at, inserted);
            }
            RowOp::Remove { at, count } => {
                if at + count > len {
                    return Err(invalid());
                }
                rows.drain(at..at + count);
            }
            RowOp::Move { from, to, count } => {
                if from + count > len || to + count > len {
                    return Err(invalid());
                }
                let moved: Vec<T> = rows.drain(from..from + count).collect();
                rows.splice(to..to, moved);
            }
            RowOp::DataChanged { row, .. } => {
                if row >= len {
                    return Err(invalid());
                }
                rows[row] = fresh(row);
            }
        }
    }
    Ok(())
}
