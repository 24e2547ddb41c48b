use scopes_navigation::MergeOutcome;
use scopes_navigation::ProjectionEvent;
use scopes_results_model::CompletionStatus;
use scopes_results_model::ModelDelta;
use serde::Deserialize;
use serde::Serialize;

/// Which of a scope's two navigation trees something refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationKind {
    /// The department tree
    Departments,
    /// The tree built from the sort-order filter
    AltNavigation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeStatus {
    #[default]
    Okay,
    /// The last search ended with an error.
    Unknown,
}

/// A change a scope publishes to its consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "update", rename_all = "snake_case")]
pub enum ScopeUpdate {
    SearchStarted {
        ticket: u64,
        query: String,
    },
    SearchInProgress {
        in_progress: bool,
    },
    StatusChanged {
        status: ScopeStatus,
    },
    SearchFinished {
        status: CompletionStatus,
    },
    /// Buffered results were dropped; consumers should search again.
    ResultsInvalidated,
    /// Announced before the first `Results` of the category.
    CategoryAdded {
        category_id: String,
        index: usize,
    },
    Results {
        category_id: String,
        delta: ModelDelta,
    },
    NavigationMerged {
        kind: NavigationKind,
        outcome: MergeOutcome,
    },
    HasNavigationChanged {
        kind: NavigationKind,
        has_navigation: bool,
    },
    CurrentNavigationChanged {
        kind: NavigationKind,
        navigation_id: String,
    },
    NavigationViews {
        kind: NavigationKind,
        events: Vec<ProjectionEvent>,
    },
}
