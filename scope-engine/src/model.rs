use crate::categories::Categories;
use crate::config::EngineConfig;
use crate::config::ResultsTtl;
use crate::error::EngineError;
use crate::error::Result;
use crate::update::NavigationKind;
use crate::update::ScopeStatus;
use crate::update::ScopeUpdate;
use scopes_navigation::MergeOutcome;
use scopes_navigation::NavigationProjector;
use scopes_navigation::NavigationSnapshot;
use scopes_navigation::NavigationTree;
use scopes_navigation::NavigationView;
use scopes_navigation::SortOrderFilter;
use scopes_navigation::ViewHandle;
use scopes_navigation::merge_snapshot;
use scopes_results_model::CompletionStatus;
use scopes_results_model::IdentityKey;
use scopes_results_model::ModelDelta;
use scopes_results_model::ResultCollection;
use scopes_results_model::ResultRecord;
use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Proof of being the search a scope is currently running.
///
/// Tickets cannot be cloned; starting another search makes them stale.
#[derive(Debug, PartialEq, Eq)]
pub struct SearchTicket {
    id: u64,
}

impl SearchTicket {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// What a backend delivered since its previous chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchChunk {
    /// New results, in rank order, appended to those already delivered
    #[serde(default)]
    pub results: Vec<ResultRecord>,

    /// Latest department tree, if the backend sent one
    #[serde(default)]
    pub departments: Option<NavigationSnapshot>,

    /// Latest sort-order filter, if the backend sent one
    #[serde(default)]
    pub sort_filter: Option<SortOrderFilter>,

    pub status: CompletionStatus,
}

impl SearchChunk {
    pub fn new(status: CompletionStatus) -> Self {
        Self {
            results: Vec::new(),
            departments: None,
            sort_filter: None,
            status,
        }
    }

    pub fn with_results(mut self, results: Vec<ResultRecord>) -> Self {
        self.results = results;
        self
    }

    pub fn with_departments(mut self, departments: NavigationSnapshot) -> Self {
        self.departments = Some(departments);
        self
    }

    pub fn with_sort_filter(mut self, sort_filter: SortOrderFilter) -> Self {
        self.sort_filter = Some(sort_filter);
        self
    }
}

/// What the caller has to do after [`ScopeModel::push_chunk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// The chunk is buffered; call [`ScopeModel::flush`] after `flush_in`.
    Buffered { flush_in: Duration },
    /// The search ended and everything was flushed.
    Completed(Vec<ScopeUpdate>),
    /// The search was cancelled; its buffered results were dropped.
    Cancelled(Vec<ScopeUpdate>),
}

#[derive(Debug, Default)]
struct NavigationState {
    tree: Option<NavigationTree>,
    views: NavigationProjector,
    has_navigation: bool,
    current_id: String,
}

impl NavigationState {
    fn project(&mut self, kind: NavigationKind, updates: &mut Vec<ScopeUpdate>) {
        let Some(tree) = self.tree.as_ref() else {
            return;
        };
        let events = self.views.project(tree, &self.current_id);
        if !events.is_empty() {
            updates.push(ScopeUpdate::NavigationViews { kind, events });
        }
    }

    fn set_has_navigation(
        &mut self,
        kind: NavigationKind,
        has_navigation: bool,
        updates: &mut Vec<ScopeUpdate>,
    ) {
        if self.has_navigation != has_navigation {
            self.has_navigation = has_navigation;
            updates.push(ScopeUpdate::HasNavigationChanged {
                kind,
                has_navigation,
            });
        }
    }

    fn set_current_id(
        &mut self,
        kind: NavigationKind,
        navigation_id: String,
        updates: &mut Vec<ScopeUpdate>,
    ) -> bool {
        if self.current_id == navigation_id {
            return false;
        }
        self.current_id = navigation_id;
        updates.push(ScopeUpdate::CurrentNavigationChanged {
            kind,
            navigation_id: self.current_id.clone(),
        });
        true
    }
}

/// Everything one scope shows: categorized results plus its department and
/// sort-order navigation, fed by a stream of [`SearchChunk`]s.
///
/// The model is single-threaded and has no notion of time; the caller runs
/// the timers (see [`crate::ScopeDriver`]).
#[derive(Debug)]
pub struct ScopeModel {
    config: EngineConfig,
    categories: Categories,
    announced: Vec<String>,
    next_ticket: u64,
    search: Option<u64>,
    query: String,
    search_in_progress: bool,
    status: ScopeStatus,
    delayed_clear: bool,
    received_departments: Option<NavigationSnapshot>,
    last_departments: Option<NavigationSnapshot>,
    received_sort_filter: Option<SortOrderFilter>,
    last_sort_filter: Option<SortOrderFilter>,
    departments: NavigationState,
    alt_navigation: NavigationState,
}

impl ScopeModel {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            categories: Categories::new(),
            announced: Vec::new(),
            next_ticket: 0,
            search: None,
            query: String::new(),
            search_in_progress: false,
            status: ScopeStatus::Okay,
            delayed_clear: false,
            received_departments: None,
            last_departments: None,
            received_sort_filter: None,
            last_sort_filter: None,
            departments: NavigationState::default(),
            alt_navigation: NavigationState::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn status(&self) -> ScopeStatus {
        self.status
    }

    pub fn search_in_progress(&self) -> bool {
        self.search_in_progress
    }

    pub fn categories(&self) -> &Categories {
        &self.categories
    }

    pub fn collection(&self, category_id: &str) -> Option<&ResultCollection> {
        self.categories.collection(category_id)
    }

    pub fn has_navigation(&self, kind: NavigationKind) -> bool {
        self.navigation(kind).has_navigation
    }

    pub fn current_navigation_id(&self, kind: NavigationKind) -> &str {
        &self.navigation(kind).current_id
    }

    pub fn navigation_tree(&self, kind: NavigationKind) -> Option<&NavigationTree> {
        self.navigation(kind).tree.as_ref()
    }

    pub fn navigation_view(
        &self,
        kind: NavigationKind,
        handle: ViewHandle,
    ) -> Option<&NavigationView> {
        self.navigation(kind).views.view(handle)
    }

    /// Expiry of this scope's finished results.
    pub fn results_ttl(&self, kind: ResultsTtl) -> Option<Duration> {
        self.config.results_ttl(kind)
    }

    /// Start a search, cancelling the one in flight.
    ///
    /// Old rows stay visible until the new search delivers, or until the
    /// first flush clears categories that got nothing.
    pub fn start_search(
        &mut self,
        query: impl Into<String>,
        navigation_id: impl Into<String>,
    ) -> (SearchTicket, Vec<ScopeUpdate>) {
        let mut updates = Vec::new();
        if let Some(previous) = self.search.take() {
            debug!("search {previous} superseded");
            self.categories.cancel_search();
        }
        self.next_ticket += 1;
        let id = self.next_ticket;
        self.query = query.into();
        self.set_current_navigation_id_into(
            NavigationKind::Departments,
            navigation_id.into(),
            &mut updates,
        );

        self.received_departments = None;
        self.received_sort_filter = None;
        self.categories.begin_search();
        self.delayed_clear = true;
        self.search = Some(id);
        info!("search {id} started for {:?}", self.query);

        updates.push(ScopeUpdate::SearchStarted {
            ticket: id,
            query: self.query.clone(),
        });
        self.set_search_in_progress(true, &mut updates);
        (SearchTicket { id }, updates)
    }

    /// Buffer a chunk of the current search.
    ///
    /// `elapsed` is how long the search has been running; it shortens the
    /// delay before the next flush.
    pub fn push_chunk(
        &mut self,
        ticket: &SearchTicket,
        chunk: SearchChunk,
        elapsed: Duration,
    ) -> Result<ChunkOutcome> {
        self.check_ticket(ticket)?;
        if chunk.status == CompletionStatus::Cancelled {
            return Ok(ChunkOutcome::Cancelled(self.cancel_search()));
        }

        if let Some(departments) = chunk.departments {
            self.received_departments = Some(departments);
        }
        if let Some(sort_filter) = chunk.sort_filter {
            self.received_sort_filter = Some(sort_filter);
        }
        let added = self.categories.push_results(chunk.results);
        self.announced.extend(added);

        if chunk.status == CompletionStatus::Incomplete {
            return Ok(ChunkOutcome::Buffered {
                flush_in: self.config.aggregation_delay(elapsed),
            });
        }
        let mut updates = self.flush()?;
        updates.extend(self.finish_search(chunk.status)?);
        Ok(ChunkOutcome::Completed(updates))
    }

    /// The clear grace period of `ticket` ran out.
    pub fn clear_timeout_expired(&mut self, ticket: &SearchTicket) -> Result<Vec<ScopeUpdate>> {
        self.check_ticket(ticket)?;
        self.flush()
    }

    /// Show everything buffered so far.
    pub fn flush(&mut self) -> Result<Vec<ScopeUpdate>> {
        let mut updates = Vec::new();
        if self.status != ScopeStatus::Okay {
            self.status = ScopeStatus::Okay;
            updates.push(ScopeUpdate::StatusChanged {
                status: self.status,
            });
        }

        for category_id in self.announced.drain(..) {
            let index = self
                .categories
                .ids()
                .iter()
                .position(|id| *id == category_id)
                .unwrap_or_default();
            updates.push(ScopeUpdate::CategoryAdded { category_id, index });
        }
        let deltas = self.categories.flush()?;
        push_results(deltas, &mut updates);
        if self.delayed_clear {
            self.delayed_clear = false;
            push_results(self.categories.purge(), &mut updates);
        }

        self.flush_departments(&mut updates);
        self.flush_alt_navigation(&mut updates);
        Ok(updates)
    }

    fn flush_departments(&mut self, updates: &mut Vec<ScopeUpdate>) {
        let kind = NavigationKind::Departments;
        let fresh = self
            .received_departments
            .as_ref()
            .filter(|fresh| self.last_departments.as_ref() != Some(*fresh));
        if let Some(fresh) = fresh {
            let outcome = merge_snapshot(&mut self.departments.tree, fresh);
            let created = outcome == MergeOutcome::Created;
            updates.push(ScopeUpdate::NavigationMerged { kind, outcome });
            if !created {
                self.departments.project(kind, updates);
            }
        }
        self.last_departments.clone_from(&self.received_departments);

        let has_navigation = self.received_departments.is_some() && self.navigation_allowed();
        self.departments
            .set_has_navigation(kind, has_navigation, updates);
        if !has_navigation && !self.departments.current_id.is_empty() {
            self.departments
                .set_current_id(kind, String::new(), updates);
        }
    }

    fn flush_alt_navigation(&mut self, updates: &mut Vec<ScopeUpdate>) {
        let kind = NavigationKind::AltNavigation;
        let mut current_id = self.alt_navigation.current_id.clone();
        let fresh = self
            .received_sort_filter
            .as_ref()
            .filter(|filter| self.last_sort_filter.as_ref() != Some(*filter));
        if let Some(filter) = fresh {
            self.alt_navigation.tree = Some(NavigationTree::from_filter(filter));
            updates.push(ScopeUpdate::NavigationMerged {
                kind,
                outcome: MergeOutcome::Created,
            });
            if let Some(option) = filter.active_option() {
                current_id.clone_from(&option.id);
            }
        }
        self.last_sort_filter.clone_from(&self.received_sort_filter);

        let has_navigation = self.received_sort_filter.is_some() && self.navigation_allowed();
        self.alt_navigation
            .set_has_navigation(kind, has_navigation, updates);
        if self.alt_navigation.set_current_id(kind, current_id, updates) {
            self.alt_navigation.project(kind, updates);
        }
    }

    fn finish_search(&mut self, status: CompletionStatus) -> Result<Vec<ScopeUpdate>> {
        let mut updates = Vec::new();
        push_results(self.categories.finish_search()?, &mut updates);
        self.search = None;
        self.delayed_clear = false;
        self.set_search_in_progress(false, &mut updates);

        let scope_status = if status == CompletionStatus::Finished {
            ScopeStatus::Okay
        } else {
            warn!("search for {:?} ended with an error", self.query);
            ScopeStatus::Unknown
        };
        if self.status != scope_status {
            self.status = scope_status;
            updates.push(ScopeUpdate::StatusChanged {
                status: scope_status,
            });
        }
        updates.push(ScopeUpdate::SearchFinished { status });
        Ok(updates)
    }

    fn cancel_search(&mut self) -> Vec<ScopeUpdate> {
        let mut updates = Vec::new();
        if let Some(id) = self.search.take() {
            debug!("search {id} cancelled");
        }
        self.categories.cancel_search();
        self.delayed_clear = false;
        self.set_search_in_progress(false, &mut updates);
        updates.push(ScopeUpdate::SearchFinished {
            status: CompletionStatus::Cancelled,
        });
        updates
    }

    /// Drop the search in flight and everything it buffered.
    pub fn invalidate(&mut self) -> Vec<ScopeUpdate> {
        let mut updates = Vec::new();
        if let Some(id) = self.search.take() {
            debug!("search {id} invalidated");
        }
        self.categories.cancel_search();
        self.delayed_clear = false;
        self.set_search_in_progress(false, &mut updates);
        updates.push(ScopeUpdate::ResultsInvalidated);
        updates
    }

    /// Bind a view to the node `navigation_id`; `None` if the tree has no
    /// such node yet.
    pub fn bind_navigation(
        &mut self,
        kind: NavigationKind,
        navigation_id: &str,
    ) -> Option<ViewHandle> {
        let state = self.navigation_mut(kind);
        let tree = state.tree.as_ref()?;
        state.views.bind(tree, navigation_id, &state.current_id)
    }

    pub fn unbind_navigation(&mut self, kind: NavigationKind, handle: ViewHandle) -> bool {
        self.navigation_mut(kind).views.unbind(handle)
    }

    /// Make `navigation_id` the active node and refresh the bound views.
    pub fn set_current_navigation_id(
        &mut self,
        kind: NavigationKind,
        navigation_id: impl Into<String>,
    ) -> Vec<ScopeUpdate> {
        let mut updates = Vec::new();
        self.set_current_navigation_id_into(kind, navigation_id.into(), &mut updates);
        updates
    }

    fn set_current_navigation_id_into(
        &mut self,
        kind: NavigationKind,
        navigation_id: String,
        updates: &mut Vec<ScopeUpdate>,
    ) {
        let state = self.navigation_mut(kind);
        if state.set_current_id(kind, navigation_id, updates) {
            state.project(kind, updates);
        }
    }

    /// Replace one shown result in place.
    pub fn update_result(
        &mut self,
        category_id: &str,
        key: &IdentityKey,
        record: ResultRecord,
    ) -> Result<Option<ScopeUpdate>> {
        let delta = self.categories.update_result(category_id, key, record)?;
        Ok(delta.map(|delta| ScopeUpdate::Results {
            category_id: category_id.to_string(),
            delta,
        }))
    }

    fn check_ticket(&self, ticket: &SearchTicket) -> Result<()> {
        if self.search == Some(ticket.id) {
            Ok(())
        } else {
            warn!("dropping input of stale search {}", ticket.id);
            Err(EngineError::StaleSearch { ticket: ticket.id })
        }
    }

    fn navigation_allowed(&self) -> bool {
        !self.config.navigation_requires_empty_query || self.query.is_empty()
    }

    fn set_search_in_progress(&mut self, in_progress: bool, updates: &mut Vec<ScopeUpdate>) {
        if self.search_in_progress != in_progress {
            self.search_in_progress = in_progress;
            updates.push(ScopeUpdate::SearchInProgress { in_progress });
        }
    }

    fn navigation(&self, kind: NavigationKind) -> &NavigationState {
        match kind {
            NavigationKind::Departments => &self.departments,
            NavigationKind::AltNavigation => &self.alt_navigation,
        }
    }

    fn navigation_mut(&mut self, kind: NavigationKind) -> &mut NavigationState {
        match kind {
            NavigationKind::Departments => &mut self.departments,
            NavigationKind::AltNavigation => &mut self.alt_navigation,
        }
    }
}

fn push_results(deltas: Vec<(String, ModelDelta)>, updates: &mut Vec<ScopeUpdate>) {
    updates.extend(
        deltas
            .into_iter()
            .map(|(category_id, delta)| ScopeUpdate::Results { category_id, delta }),
    );
}
