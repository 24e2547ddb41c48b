use crate::identity::IdentityKey;
use crate::identity::KeyedResult;
use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;

/// Maps identity keys to row positions.
#[derive(Debug, Clone, Default)]
pub struct PositionIndex {
    positions: HashMap<IdentityKey, usize>,
}

/// A key that was indexed more than once; the later row wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    pub key: IdentityKey,
    pub first_row: usize,
    pub row: usize,
}

impl PositionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: &[KeyedResult]) -> Self {
        let mut index = Self::new();
        index.rebuild(rows);
        index
    }

    pub fn find(&self, key: &IdentityKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.positions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }

    pub fn insert(&mut self, key: IdentityKey, row: usize) -> Option<usize> {
        self.positions.insert(key, row)
    }

    pub fn remove(&mut self, key: &IdentityKey) -> Option<usize> {
        self.positions.remove(key)
    }

    /// Index `rows` from scratch.
    pub fn rebuild(&mut self, rows: &[KeyedResult]) {
        self.positions.clear();
        self.positions.reserve(rows.len());
        for (row, item) in rows.iter().enumerate() {
            self.positions.insert(item.key(), row);
        }
    }

    /// Index `rows[offset..]` on top of what is already indexed.
    ///
    /// Later rows win over earlier ones carrying the same key; every such
    /// collision is returned so the caller can surface it.
    pub fn extend_from(&mut self, rows: &[KeyedResult], offset: usize) -> Vec<DuplicateKey> {
        let mut duplicates = Vec::new();
        for (row, item) in rows.iter().enumerate().skip(offset) {
            if let Some(first_row) = self.positions.insert(item.key(), row) {
                duplicates.push(DuplicateKey {
                    key: item.key(),
                    first_row,
                    row,
                });
            }
        }
        duplicates
    }

    /// Re-point every key in `rows[range]` at its current row.
    ///
    /// After a single-row move or insert only the rows between the old and the
    /// new position change index, so callers pass just that span.
    pub fn reindex(&mut self, rows: &[KeyedResult], range: Range<usize>) {
        for (row, item) in rows.iter().enumerate().take(range.end).skip(range.start) {
            self.positions.insert(item.key(), row);
        }
    }
}
