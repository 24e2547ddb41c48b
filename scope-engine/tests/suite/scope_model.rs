use pretty_assertions::assert_eq;
use scopes_engine::ChunkOutcome;
use scopes_engine::EngineConfig;
use scopes_engine::EngineError;
use scopes_engine::NavigationKind;
use scopes_engine::ScopeModel;
use scopes_engine::ScopeUpdate;
use scopes_engine::SearchChunk;
use scopes_engine::SearchTicket;
use scopes_navigation::NavigationSnapshot;
use scopes_navigation::NavigationView;
use scopes_results_model::CompletionStatus;
use scopes_results_model::ResultCollection;
use scopes_results_model::ResultRecord;
use std::time::Duration;

fn records(category_id: &str, uris: &[&str]) -> Vec<ResultRecord> {
    uris.iter()
        .map(|uri| ResultRecord::new(*uri, category_id))
        .collect()
}

fn storefront(books: Vec<NavigationSnapshot>) -> NavigationSnapshot {
    NavigationSnapshot::new("", "All").with_children(vec![
        NavigationSnapshot::new("books", "Books").with_children(books),
        NavigationSnapshot::new("movies", "Movies"),
    ])
}

fn finish(model: &mut ScopeModel, ticket: &SearchTicket, chunk: SearchChunk) -> Vec<ScopeUpdate> {
    match model.push_chunk(ticket, chunk, Duration::ZERO) {
        Ok(ChunkOutcome::Completed(updates)) => updates,
        other => panic!("expected a completed search, got {other:?}"),
    }
}

fn rows(model: &ScopeModel, category_id: &str) -> Option<usize> {
    model.collection(category_id).map(ResultCollection::len)
}

#[test]
fn browsing_searching_and_drilling_down() {
    let mut model = ScopeModel::new(EngineConfig::default());

    let (ticket, _) = model.start_search("", "");
    finish(
        &mut model,
        &ticket,
        SearchChunk::new(CompletionStatus::Finished)
            .with_results(records("music", &["a", "b"]))
            .with_departments(storefront(Vec::new())),
    );
    assert!(model.has_navigation(NavigationKind::Departments));
    assert_eq!(rows(&model, "music"), Some(2));

    let (ticket, _) = model.start_search("jazz", "");
    let updates = finish(
        &mut model,
        &ticket,
        SearchChunk::new(CompletionStatus::Finished).with_results(records("music", &["c"])),
    );
    assert!(updates.contains(&ScopeUpdate::HasNavigationChanged {
        kind: NavigationKind::Departments,
        has_navigation: false,
    }));
    assert_eq!(rows(&model, "music"), Some(1));

    let (ticket, updates) = model.start_search("", "books");
    assert_eq!(
        updates.first(),
        Some(&ScopeUpdate::CurrentNavigationChanged {
            kind: NavigationKind::Departments,
            navigation_id: "books".to_string(),
        })
    );
    let updates = finish(
        &mut model,
        &ticket,
        SearchChunk::new(CompletionStatus::Finished).with_departments(storefront(vec![
            NavigationSnapshot::new("books-kindle", "Kindle"),
            NavigationSnapshot::new("books-paper", "Paperback"),
        ])),
    );

    let replaced = updates.iter().find_map(|update| match update {
        ScopeUpdate::NavigationMerged { outcome, .. } => outcome.replaced_id(),
        _ => None,
    });
    assert_eq!(replaced, Some("books"));
    assert!(model.has_navigation(NavigationKind::Departments));
    assert_eq!(rows(&model, "music"), Some(0));

    let view = model
        .bind_navigation(NavigationKind::Departments, "books")
        .and_then(|handle| model.navigation_view(NavigationKind::Departments, handle))
        .map(NavigationView::len);
    assert_eq!(view, Some(2));
}

#[test]
fn old_results_survive_until_the_clear_timeout() {
    let mut model = ScopeModel::new(EngineConfig::default());
    let (ticket, _) = model.start_search("", "");
    finish(
        &mut model,
        &ticket,
        SearchChunk::new(CompletionStatus::Finished)
            .with_results([records("music", &["a"]), records("video", &["v"])].concat()),
    );

    let (stale, _) = model.start_search("", "");
    let (ticket, _) = model.start_search("rock", "");
    let outcome = model
        .push_chunk(
            &ticket,
            SearchChunk::new(CompletionStatus::Incomplete).with_results(records("music", &["b"])),
            Duration::from_millis(10),
        )
        .expect("push");
    assert_eq!(
        outcome,
        ChunkOutcome::Buffered {
            flush_in: Duration::from_millis(110),
        }
    );
    assert_eq!(rows(&model, "video"), Some(1));

    let err = model
        .clear_timeout_expired(&stale)
        .expect_err("superseded search");
    assert!(matches!(err, EngineError::StaleSearch { ticket: 2 }));

    let updates = model.clear_timeout_expired(&ticket).expect("clear");
    let touched: Vec<&str> = updates
        .iter()
        .filter_map(|update| match update {
            ScopeUpdate::Results { category_id, .. } => Some(category_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(touched, vec!["music", "video"]);
    assert_eq!(rows(&model, "music"), Some(1));
    assert_eq!(rows(&model, "video"), Some(0));
}
