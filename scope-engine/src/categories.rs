use crate::error::EngineError;
use crate::error::Result;
use scopes_results_model::IdentityKey;
use scopes_results_model::KeyedResult;
use scopes_results_model::ListReconciler;
use scopes_results_model::ModelDelta;
use scopes_results_model::ResultCollection;
use scopes_results_model::ResultRecord;
use scopes_results_model::SessionHandle;
use std::collections::HashMap;
use tracing::debug;

/// One category: its reconciled rows plus the cumulative batch of the
/// search in flight.
#[derive(Debug)]
struct Category {
    reconciler: ListReconciler,
    session: Option<SessionHandle>,
    batch: Vec<KeyedResult>,
    dirty: bool,
}

impl Category {
    fn new(id: &str, searching: bool) -> Self {
        let mut reconciler = ListReconciler::new(id);
        let session = searching.then(|| reconciler.begin_session());
        Self {
            reconciler,
            session,
            batch: Vec::new(),
            dirty: false,
        }
    }

    fn cancel(&mut self) {
        if let Some(session) = self.session.take() {
            self.reconciler.cancel_session(session);
        }
        self.batch.clear();
        self.dirty = false;
    }
}

/// Categories of a scope in the order the backend first reported them.
#[derive(Debug, Default)]
pub struct Categories {
    order: Vec<String>,
    by_id: HashMap<String, Category>,
    searching: bool,
}

impl Categories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn collection(&self, category_id: &str) -> Option<&ResultCollection> {
        self.by_id
            .get(category_id)
            .map(|category| category.reconciler.collection())
    }

    /// Start a merge session in every category, cancelling the previous ones.
    pub fn begin_search(&mut self) {
        self.searching = true;
        for category in self.by_id.values_mut() {
            category.cancel();
            category.session = Some(category.reconciler.begin_session());
        }
    }

    /// Abandon the search in flight. Rows already shown stay.
    pub fn cancel_search(&mut self) {
        self.searching = false;
        for category in self.by_id.values_mut() {
            category.cancel();
        }
    }

    /// Split `results` by category, keeping their order within each one.
    ///
    /// Returns the ids of categories seen for the first time, in order.
    pub fn push_results(&mut self, results: Vec<ResultRecord>) -> Vec<String> {
        let mut added = Vec::new();
        for record in results {
            let category_id = record.category_id.clone();
            let category = match self.by_id.get_mut(&category_id) {
                Some(category) => category,
                None => {
                    debug!("new category {category_id}");
                    self.order.push(category_id.clone());
                    added.push(category_id.clone());
                    self.by_id
                        .entry(category_id)
                        .or_insert_with_key(|id| Category::new(id, self.searching))
                }
            };
            category.batch.push(KeyedResult::new(record));
            category.dirty = true;
        }
        added
    }

    /// Merge the cumulative batch of every category that received results
    /// since the last flush.
    pub fn flush(&mut self) -> Result<Vec<(String, ModelDelta)>> {
        let mut deltas = Vec::new();
        for id in &self.order {
            let Some(category) = self.by_id.get_mut(id) else {
                continue;
            };
            if !category.dirty {
                continue;
            }
            category.dirty = false;
            let Some(session) = category.session.as_ref() else {
                continue;
            };
            let delta = category.reconciler.merge_batch(session, &category.batch)?;
            if !delta.is_empty() {
                deltas.push((id.clone(), delta));
            }
        }
        Ok(deltas)
    }

    /// Close every session. Categories that got nothing in this search are
    /// cleared.
    pub fn finish_search(&mut self) -> Result<Vec<(String, ModelDelta)>> {
        self.searching = false;
        for category in self.by_id.values_mut() {
            if let Some(session) = category.session.take() {
                category.reconciler.end_session(session)?;
            }
            category.batch.clear();
        }
        Ok(self.purge())
    }

    /// Clear every category that has not received results in this search.
    pub fn purge(&mut self) -> Vec<(String, ModelDelta)> {
        let mut deltas = Vec::new();
        for id in &self.order {
            let Some(category) = self.by_id.get_mut(id) else {
                continue;
            };
            if category.reconciler.needs_purging() {
                let delta = category.reconciler.clear();
                if !delta.is_empty() {
                    deltas.push((id.clone(), delta));
                }
            }
        }
        deltas
    }

    pub fn update_result(
        &mut self,
        category_id: &str,
        key: &IdentityKey,
        record: ResultRecord,
    ) -> Result<Option<ModelDelta>> {
        let category = self
            .by_id
            .get_mut(category_id)
            .ok_or_else(|| EngineError::UnknownCategory(category_id.to_string()))?;
        Ok(category.reconciler.update_result(key, record))
    }
}
