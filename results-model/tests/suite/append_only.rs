use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use scopes_results_model::KeyedResult;
use scopes_results_model::ListReconciler;
use scopes_results_model::ResultRecord;
use scopes_results_model::RowOp;

fn result(n: usize) -> KeyedResult {
    KeyedResult::new(ResultRecord::new(format!("test:uri/{n}"), "cat"))
}

#[test]
fn growing_batches_only_insert() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..100 {
        let total = rng.random_range(1..40);
        let rows: Vec<KeyedResult> = (0..total).map(result).collect();

        // Start from a committed prefix of the same ranking.
        let committed = rng.random_range(0..=total);
        let mut reconciler = ListReconciler::new("cat");
        let seed = reconciler.begin_session();
        reconciler
            .merge_batch(&seed, &rows[..committed])
            .expect("seed");
        reconciler.end_session(seed).expect("seed end");

        let session = reconciler.begin_session();
        let mut end = committed;
        while end < total {
            end = (end + rng.random_range(1..=5)).min(total);
            let delta = reconciler
                .merge_batch(&session, &rows[..end])
                .expect("merge");
            assert!(
                delta
                    .ops
                    .iter()
                    .all(|op| matches!(op, RowOp::Insert { .. })),
                "unexpected ops {:?}",
                delta.ops
            );
            assert!(delta.ops.len() <= 1);
        }
        reconciler.end_session(session).expect("end");
        assert_eq!(reconciler.len(), total);
    }
}

#[test]
fn resubmitting_the_committed_order_is_idempotent() {
    let rows: Vec<KeyedResult> = (0..10).map(result).collect();
    let mut reconciler = ListReconciler::new("cat");
    let seed = reconciler.begin_session();
    reconciler.merge_batch(&seed, &rows).expect("seed");
    reconciler.end_session(seed).expect("seed end");

    for _ in 0..3 {
        let session = reconciler.begin_session();
        let delta = reconciler.merge_batch(&session, &rows).expect("merge");
        assert!(delta.is_empty(), "unexpected ops {:?}", delta.ops);
        reconciler.end_session(session).expect("end");
    }
}
