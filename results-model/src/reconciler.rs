use crate::collection::ResultCollection;
use crate::error::ReconcileError;
use crate::error::Result;
use crate::identity::IdentityKey;
use crate::identity::KeyedResult;
use crate::identity::ResultRecord;
use crate::index::DuplicateKey;
use crate::index::PositionIndex;
use crate::ops::OpLog;
use crate::ops::RowOp;
use serde::Deserialize;
use serde::Serialize;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use tracing::debug;
use tracing::warn;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Status a backend attaches to every batch it delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Incomplete,
    Finished,
    Error,
    Cancelled,
}

impl CompletionStatus {
    /// Whether this status closes the session (the batch is still merged).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

/// Proof that a merge session is open.
///
/// Handles cannot be cloned, and ending or cancelling a session consumes its
/// handle. Starting a new session makes every older handle stale.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionHandle {
    id: u64,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Something odd the reconciler recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The key appeared twice in the session's batch; `row` won.
    DuplicateKey {
        key: IdentityKey,
        first_row: usize,
        row: usize,
    },
}

impl From<DuplicateKey> for Diagnostic {
    fn from(duplicate: DuplicateKey) -> Self {
        Self::DuplicateKey {
            key: duplicate.key,
            first_row: duplicate.first_row,
            row: duplicate.row,
        }
    }
}

/// Operations produced by one reconciler call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelDelta {
    pub ops: Vec<RowOp>,
    pub previous_len: usize,
    pub len: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl ModelDelta {
    fn unchanged(len: usize) -> Self {
        Self {
            ops: Vec::new(),
            previous_len: len,
            len,
            diagnostics: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn count_changed(&self) -> bool {
        self.previous_len != self.len
    }
}

/// Per-session bookkeeping, discarded whenever a session starts or is cancelled.
#[derive(Debug, Default)]
struct SearchContext {
    /// Key -> row of the collection; exact between merge steps.
    committed: PositionIndex,
    /// Key -> batch index of its last occurrence.
    incoming: PositionIndex,
    /// Batch rows consumed so far.
    processed: usize,
    /// Collection rows already in their final order for this session.
    settled: usize,
    /// Whether the once-per-session prune ran.
    pruned: bool,
    /// Key of the last consumed batch row, to detect a diverging prefix.
    last_key: Option<IdentityKey>,
}

impl SearchContext {
    fn reset(&mut self) {
        self.committed.clear();
        self.incoming.clear();
        self.processed = 0;
        self.settled = 0;
        self.pruned = false;
        self.last_key = None;
    }
}

/// Merges cumulative, prefix-stable result batches into a [`ResultCollection`].
///
/// Each call walks only the part of the batch it has not seen yet: rows that
/// are new get inserted, rows already shown get moved into place, and on the
/// first call of a session rows that disappeared get removed.
#[derive(Debug)]
pub struct ListReconciler {
    collection: ResultCollection,
    ctx: SearchContext,
    session: Option<u64>,
    purge: bool,
}

impl ListReconciler {
    pub fn new(category_id: impl Into<String>) -> Self {
        Self {
            collection: ResultCollection::new(category_id),
            ctx: SearchContext::default(),
            session: None,
            purge: false,
        }
    }

    pub fn collection(&self) -> &ResultCollection {
        &self.collection
    }

    pub fn category_id(&self) -> &str {
        self.collection.category_id()
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    pub fn open_session(&self) -> Option<u64> {
        self.session
    }

    /// True from `begin_session` until the session merged a non-empty batch.
    pub fn needs_purging(&self) -> bool {
        self.purge
    }

    /// Open a new session, cancelling the one in flight.
    pub fn begin_session(&mut self) -> SessionHandle {
        if let Some(previous) = self.session.take() {
            debug!(
                "category {}: session {previous} superseded",
                self.category_id()
            );
        }
        self.ctx.reset();
        self.purge = true;
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        self.session = Some(id);
        SessionHandle { id }
    }

    /// Merge the session's cumulative batch as received so far.
    ///
    /// `batch` must extend the batch of the previous call. A batch that is
    /// shorter, or whose already merged prefix changed, resets the session
    /// and is rejected; resubmitting it is then treated like a first batch.
    pub fn merge_batch(
        &mut self,
        session: &SessionHandle,
        batch: &[KeyedResult],
    ) -> Result<ModelDelta> {
        self.check_session(session)?;
        let previous_len = self.collection.len();
        if batch.is_empty() {
            return Ok(ModelDelta::unchanged(previous_len));
        }
        self.check_prefix(batch)?;
        self.purge = false;

        let duplicates = self.ctx.incoming.extend_from(batch, self.ctx.processed);
        for duplicate in &duplicates {
            warn!(
                "category {}: result {} delivered twice (rows {} and {}); keeping the later one",
                self.category_id(),
                duplicate.key,
                duplicate.first_row,
                duplicate.row
            );
        }

        let mut log = OpLog::new();
        if !self.ctx.pruned {
            if !self.collection.is_empty() {
                let incoming = &self.ctx.incoming;
                self.collection.prune(|key| incoming.contains(key), &mut log);
            }
            // Rows below a pruned one shifted; index the survivors once.
            self.ctx.committed.rebuild(self.collection.rows());
            self.ctx.pruned = true;
        }
        self.place_from(batch, &mut log);

        self.ctx.processed = batch.len();
        self.ctx.last_key = batch.last().map(KeyedResult::key);

        debug!(
            "category {}: merged batch of {} into {} rows ({} ops)",
            self.category_id(),
            batch.len(),
            self.collection.len(),
            log.len()
        );
        Ok(ModelDelta {
            ops: log.into_ops(),
            previous_len,
            len: self.collection.len(),
            diagnostics: duplicates.into_iter().map(Diagnostic::from).collect(),
        })
    }

    /// Close the session. The collection now is the committed generation.
    pub fn end_session(&mut self, session: SessionHandle) -> Result<()> {
        self.check_session(&session)?;
        self.session = None;
        // `committed` already tracks the final rows; only the batch-side
        // bookkeeping is dropped.
        self.ctx.incoming.clear();
        self.ctx.processed = 0;
        self.ctx.settled = 0;
        self.ctx.last_key = None;
        Ok(())
    }

    /// Abandon the session, discarding everything it buffered.
    ///
    /// Rows already merged stay as they are; nothing half-applied remains.
    pub fn cancel_session(&mut self, session: SessionHandle) {
        if self.session != Some(session.id) {
            debug!(
                "category {}: cancel of stale session {}",
                self.category_id(),
                session.id
            );
            return;
        }
        self.session = None;
        self.ctx.reset();
    }

    /// Merge `batch` and, for a terminal status, close the session.
    ///
    /// Returns the session handle back while the session stays open.
    pub fn apply(
        &mut self,
        session: SessionHandle,
        batch: &[KeyedResult],
        status: CompletionStatus,
    ) -> Result<(ModelDelta, Option<SessionHandle>)> {
        if status == CompletionStatus::Cancelled {
            self.cancel_session(session);
            return Ok((ModelDelta::unchanged(self.collection.len()), None));
        }
        let delta = self.merge_batch(&session, batch)?;
        if status.is_terminal() {
            self.end_session(session)?;
            Ok((delta, None))
        } else {
            Ok((delta, Some(session)))
        }
    }

    /// Remove every row and forget the search context.
    pub fn clear(&mut self) -> ModelDelta {
        let previous_len = self.collection.len();
        let mut log = OpLog::new();
        self.collection.clear(&mut log);
        self.ctx.reset();
        self.purge = false;
        ModelDelta {
            ops: log.into_ops(),
            previous_len,
            len: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Replace the row holding `key` with `updated`, keeping its position.
    ///
    /// Refused when `updated` is already shown on another row: a key may
    /// occupy one row only.
    pub fn update_result(
        &mut self,
        key: &IdentityKey,
        updated: ResultRecord,
    ) -> Option<ModelDelta> {
        let indexed = self
            .ctx
            .committed
            .find(key)
            .filter(|row| self.collection.get(*row).map(KeyedResult::key) == Some(*key));
        let Some(row) = indexed.or_else(|| self.collection.position(key)) else {
            warn!(
                "category {}: no result {key} to update with {}",
                self.category_id(),
                updated.uri
            );
            return None;
        };

        let replacement = KeyedResult::new(updated);
        let replacement_key = replacement.key();
        if let Some(other) = self
            .collection
            .position(&replacement_key)
            .filter(|other| *other != row)
        {
            warn!(
                "category {}: result {replacement_key} is already shown at row {other}; \
                 not updating row {row}",
                self.category_id()
            );
            return None;
        }
        if self.ctx.committed.remove(key).is_some() {
            self.ctx.committed.insert(replacement_key, row);
        }
        let len = self.collection.len();
        let mut log = OpLog::new();
        self.collection.replace(row, replacement, &mut log);
        Some(ModelDelta {
            ops: log.into_ops(),
            previous_len: len,
            len,
            diagnostics: Vec::new(),
        })
    }

    fn check_session(&self, session: &SessionHandle) -> Result<()> {
        if self.session == Some(session.id) {
            Ok(())
        } else {
            warn!(
                "category {}: rejected batch for stale session {}",
                self.category_id(),
                session.id
            );
            Err(ReconcileError::StaleSession {
                session: session.id,
            })
        }
    }

    fn check_prefix(&mut self, batch: &[KeyedResult]) -> Result<()> {
        let processed = self.ctx.processed;
        if batch.len() < processed {
            warn!(
                "category {}: batch shrank from {processed} to {}; resetting session",
                self.category_id(),
                batch.len()
            );
            self.ctx.reset();
            return Err(ReconcileError::BatchShrank {
                processed,
                len: batch.len(),
            });
        }
        if processed > 0 && Some(batch[processed - 1].key()) != self.ctx.last_key {
            let row = processed - 1;
            warn!(
                "category {}: batch diverged at row {row}; resetting session",
                self.category_id()
            );
            self.ctx.reset();
            return Err(ReconcileError::PrefixDiverged { row });
        }
        Ok(())
    }

    fn place_from(&mut self, batch: &[KeyedResult], log: &mut OpLog) {
        for (index, item) in batch.iter().enumerate().skip(self.ctx.processed) {
            let key = item.key();
            if self.ctx.incoming.find(&key) != Some(index) {
                // A later duplicate in this batch owns the slot.
                continue;
            }
            let target = self.ctx.settled;
            match self.ctx.committed.find(&key) {
                None => {
                    self.collection.insert(target, item.clone(), log);
                    self.ctx
                        .committed
                        .reindex(self.collection.rows(), target..self.collection.len());
                    self.ctx.settled += 1;
                }
                Some(row) if row == target => {
                    self.ctx.settled += 1;
                }
                Some(row) if row > target => {
                    self.collection.move_row(row, target, log);
                    self.ctx
                        .committed
                        .reindex(self.collection.rows(), target..row + 1);
                    self.ctx.settled += 1;
                }
                Some(row) => {
                    // Settled earlier under the same key: the later occurrence
                    // wins, so the row moves to the end of the settled prefix.
                    let to = target - 1;
                    if row != to {
                        self.collection.move_row(row, to, log);
                        self.ctx
                            .committed
                            .reindex(self.collection.rows(), row..to + 1);
                    }
                }
            }
        }
    }
}
