use crate::identity::IdentityKey;
use crate::identity::KeyedResult;
use crate::ops::OpLog;

/// The ordered, row-addressed results of one category.
///
/// Every mutation goes through a method that records the matching
/// [`RowOp`](crate::RowOp), so a view replaying the log stays row-for-row in
/// sync with the collection.
#[derive(Debug, Clone, Default)]
pub struct ResultCollection {
    category_id: String,
    rows: Vec<KeyedResult>,
}

impl ResultCollection {
    pub fn new(category_id: impl Into<String>) -> Self {
        Self {
            category_id: category_id.into(),
            rows: Vec::new(),
        }
    }

    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&KeyedResult> {
        self.rows.get(row)
    }

    pub fn rows(&self) -> &[KeyedResult] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyedResult> {
        self.rows.iter()
    }

    pub fn keys(&self) -> Vec<IdentityKey> {
        self.rows.iter().map(KeyedResult::key).collect()
    }

    /// Linear lookup, for callers that have no index at hand.
    pub fn position(&self, key: &IdentityKey) -> Option<usize> {
        self.rows.iter().position(|item| item.key() == *key)
    }

    pub(crate) fn insert(&mut self, at: usize, item: KeyedResult, log: &mut OpLog) {
        self.rows.insert(at, item);
        log.push_insert(at);
    }

    pub(crate) fn move_row(&mut self, from: usize, to: usize, log: &mut OpLog) {
        let item = self.rows.remove(from);
        self.rows.insert(to, item);
        log.push_move(from, to);
    }

    /// Drop every row for which `keep` is false, in a single pass.
    pub(crate) fn prune(&mut self, mut keep: impl FnMut(&IdentityKey) -> bool, log: &mut OpLog) {
        let mut row = 0;
        self.rows.retain(|item| {
            if keep(&item.key()) {
                row += 1;
                true
            } else {
                log.push_remove(row);
                false
            }
        });
    }

    pub(crate) fn replace(&mut self, row: usize, item: KeyedResult, log: &mut OpLog) {
        let fields = self.rows[row].record().changed_fields(item.record());
        self.rows[row] = item;
        log.push_data_changed(row, fields);
    }

    pub(crate) fn clear(&mut self, log: &mut OpLog) {
        for _ in 0..self.rows.len() {
            log.push_remove(0);
        }
        self.rows.clear();
    }
}
