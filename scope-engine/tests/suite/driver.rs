use pretty_assertions::assert_eq;
use scopes_engine::EngineConfig;
use scopes_engine::EngineError;
use scopes_engine::NavigationKind;
use scopes_engine::ResultsTtl;
use scopes_engine::ScopeDriver;
use scopes_engine::ScopeUpdate;
use scopes_engine::SearchChunk;
use scopes_navigation::NavigationSnapshot;
use scopes_results_model::CompletionStatus;
use scopes_results_model::ResultRecord;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

fn music(uris: &[&str]) -> Vec<ResultRecord> {
    uris.iter().map(|uri| ResultRecord::new(*uri, "music")).collect()
}

fn storefront() -> NavigationSnapshot {
    NavigationSnapshot::new("", "All").with_children(vec![
        NavigationSnapshot::new("books", "Books"),
        NavigationSnapshot::new("movies", "Movies"),
    ])
}

async fn next(updates: &mut UnboundedReceiver<ScopeUpdate>) -> ScopeUpdate {
    updates.recv().await.expect("driver published an update")
}

/// Collect updates up to and including the first one matching `last`.
async fn collect_until(
    updates: &mut UnboundedReceiver<ScopeUpdate>,
    last: impl Fn(&ScopeUpdate) -> bool,
) -> Vec<ScopeUpdate> {
    let mut collected = Vec::new();
    loop {
        let update = next(updates).await;
        let done = last(&update);
        collected.push(update);
        if done {
            return collected;
        }
    }
}

fn is_finished(update: &ScopeUpdate) -> bool {
    matches!(update, ScopeUpdate::SearchFinished { .. })
}

#[tokio::test(start_paused = true)]
async fn incomplete_chunks_are_flushed_after_the_aggregation_delay() {
    let (scope, mut updates, _task) =
        ScopeDriver::spawn(EngineConfig::default(), ResultsTtl::None);
    let generation = scope.search("", "").expect("search");
    assert_eq!(
        collect_until(&mut updates, |u| matches!(u, ScopeUpdate::SearchInProgress { .. })).await,
        vec![
            ScopeUpdate::SearchStarted {
                ticket: 1,
                query: String::new(),
            },
            ScopeUpdate::SearchInProgress { in_progress: true },
        ]
    );

    let pushed_at = Instant::now();
    scope
        .push_chunk(
            generation,
            SearchChunk::new(CompletionStatus::Incomplete).with_results(music(&["a", "b"])),
        )
        .expect("push");

    let first = next(&mut updates).await;
    let waited = pushed_at.elapsed();
    assert_eq!(
        first,
        ScopeUpdate::CategoryAdded {
            category_id: "music".to_string(),
            index: 0,
        }
    );
    assert!(waited >= Duration::from_millis(110), "flushed after {waited:?}");
    assert!(waited < Duration::from_millis(240), "flushed after {waited:?}");

    match next(&mut updates).await {
        ScopeUpdate::Results { category_id, delta } => {
            assert_eq!(category_id, "music");
            assert_eq!(delta.len, 2);
        }
        other => panic!("expected results, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn terminal_chunks_flush_immediately() {
    let (scope, mut updates, _task) =
        ScopeDriver::spawn(EngineConfig::default(), ResultsTtl::None);
    let generation = scope.search("", "").expect("search");
    let started = Instant::now();
    scope
        .push_chunk(
            generation,
            SearchChunk::new(CompletionStatus::Finished).with_results(music(&["a"])),
        )
        .expect("push");

    let collected = collect_until(&mut updates, is_finished).await;
    assert!(started.elapsed() < Duration::from_millis(110));
    assert_eq!(
        collected.last(),
        Some(&ScopeUpdate::SearchFinished {
            status: CompletionStatus::Finished,
        })
    );
    assert!(collected.contains(&ScopeUpdate::SearchInProgress { in_progress: false }));
}

#[tokio::test(start_paused = true)]
async fn chunks_of_superseded_searches_are_dropped() {
    let (scope, mut updates, _task) =
        ScopeDriver::spawn(EngineConfig::immediate(), ResultsTtl::None);
    let old = scope.search("jazz", "").expect("first search");
    let current = scope.search("blues", "").expect("second search");
    assert_eq!(current, old + 1);

    scope
        .push_chunk(
            old,
            SearchChunk::new(CompletionStatus::Finished).with_results(music(&["stale"])),
        )
        .expect("push stale");
    scope
        .push_chunk(
            current,
            SearchChunk::new(CompletionStatus::Finished).with_results(music(&["fresh"])),
        )
        .expect("push current");

    let collected = collect_until(&mut updates, is_finished).await;
    let results: Vec<usize> = collected
        .iter()
        .filter_map(|update| match update {
            ScopeUpdate::Results { delta, .. } => Some(delta.len),
            _ => None,
        })
        .collect();
    assert_eq!(results, vec![1]);
    assert!(collected.contains(&ScopeUpdate::SearchStarted {
        ticket: 2,
        query: "blues".to_string(),
    }));
}

#[tokio::test(start_paused = true)]
async fn finished_results_expire_after_their_ttl() {
    let (scope, mut updates, _task) =
        ScopeDriver::spawn(EngineConfig::default(), ResultsTtl::Small);
    let generation = scope.search("", "").expect("search");
    scope
        .push_chunk(
            generation,
            SearchChunk::new(CompletionStatus::Finished).with_results(music(&["a"])),
        )
        .expect("push");
    collect_until(&mut updates, is_finished).await;

    let finished_at = Instant::now();
    assert_eq!(next(&mut updates).await, ScopeUpdate::ResultsInvalidated);
    assert!(finished_at.elapsed() >= Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn failed_searches_do_not_arm_the_ttl() {
    let (scope, mut updates, task) =
        ScopeDriver::spawn(EngineConfig::default(), ResultsTtl::Small);
    let generation = scope.search("", "").expect("search");
    scope
        .push_chunk(generation, SearchChunk::new(CompletionStatus::Error))
        .expect("push");
    collect_until(&mut updates, is_finished).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    drop(scope);
    task.await.expect("driver exits cleanly");

    let mut rest = Vec::new();
    while let Some(update) = updates.recv().await {
        rest.push(update);
    }
    assert_eq!(rest, Vec::new());
}

#[tokio::test(start_paused = true)]
async fn navigation_is_bound_and_navigated_through_the_handle() {
    let (scope, mut updates, _task) =
        ScopeDriver::spawn(EngineConfig::default(), ResultsTtl::None);
    assert_eq!(
        scope
            .bind_navigation(NavigationKind::Departments, "")
            .await
            .expect("bind"),
        None
    );

    let generation = scope.search("", "").expect("search");
    scope
        .push_chunk(
            generation,
            SearchChunk::new(CompletionStatus::Finished).with_departments(storefront()),
        )
        .expect("push");
    let collected = collect_until(&mut updates, is_finished).await;
    assert!(collected.contains(&ScopeUpdate::HasNavigationChanged {
        kind: NavigationKind::Departments,
        has_navigation: true,
    }));

    let view = scope
        .bind_navigation(NavigationKind::Departments, "")
        .await
        .expect("bind")
        .expect("root is known");
    assert_eq!(
        scope
            .bind_navigation(NavigationKind::Departments, "garden")
            .await
            .expect("bind"),
        None
    );

    scope
        .navigate(NavigationKind::Departments, "books")
        .expect("navigate");
    assert_eq!(
        next(&mut updates).await,
        ScopeUpdate::CurrentNavigationChanged {
            kind: NavigationKind::Departments,
            navigation_id: "books".to_string(),
        }
    );
    match next(&mut updates).await {
        ScopeUpdate::NavigationViews { kind, events } => {
            assert_eq!(kind, NavigationKind::Departments);
            assert_eq!(events.len(), 1);
        }
        other => panic!("expected view events, got {other:?}"),
    }

    scope
        .unbind_navigation(NavigationKind::Departments, view)
        .expect("unbind");
}

#[tokio::test(start_paused = true)]
async fn handle_reports_a_stopped_driver() {
    let (scope, _updates, task) =
        ScopeDriver::spawn(EngineConfig::default(), ResultsTtl::None);
    task.abort();
    assert!(task.await.is_err());

    let err = scope.search("", "").expect_err("driver is gone");
    assert!(matches!(err, EngineError::DriverStopped));
    let err = scope
        .bind_navigation(NavigationKind::AltNavigation, "")
        .await
        .expect_err("driver is gone");
    assert!(matches!(err, EngineError::DriverStopped));
}
