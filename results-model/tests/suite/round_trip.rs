use pretty_assertions::assert_eq;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use scopes_results_model::IdentityKey;
use scopes_results_model::KeyedResult;
use scopes_results_model::ListReconciler;
use scopes_results_model::ResultRecord;
use scopes_results_model::replay;
use std::collections::HashSet;

fn result(n: usize) -> KeyedResult {
    KeyedResult::new(ResultRecord::new(format!("test:uri/{n}"), "cat").with_field("rank", n))
}

fn keys(rows: &[KeyedResult]) -> Vec<IdentityKey> {
    rows.iter().map(KeyedResult::key).collect()
}

/// Seed the reconciler with `rows` through a complete session.
fn seeded(rows: &[KeyedResult]) -> ListReconciler {
    let mut reconciler = ListReconciler::new("cat");
    let session = reconciler.begin_session();
    reconciler
        .merge_batch(&session, rows)
        .expect("seed merge");
    reconciler.end_session(session).expect("seed end");
    reconciler
}

/// A reordered random subset of `old` mixed with fresh results.
fn next_generation(rng: &mut StdRng, old: &[KeyedResult], fresh_from: usize) -> Vec<KeyedResult> {
    let mut rows: Vec<KeyedResult> = old
        .iter()
        .filter(|_| rng.random_bool(0.7))
        .cloned()
        .collect();
    let fresh = rng.random_range(0..8);
    rows.extend((fresh_from..fresh_from + fresh).map(result));
    rows.shuffle(rng);
    rows
}

/// Split `len` into cumulative chunk ends, the last one being `len`.
fn chunk_ends(rng: &mut StdRng, len: usize) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut end = 0;
    while end < len {
        end = (end + rng.random_range(1..=4)).min(len);
        ends.push(end);
    }
    ends
}

#[test]
fn replayed_ops_reproduce_every_new_generation() {
    let mut rng = StdRng::seed_from_u64(0x5c0_9e5);
    for round in 0..200 {
        let old_len = rng.random_range(0..12);
        let old: Vec<KeyedResult> = (0..old_len).map(result).collect();
        let new = next_generation(&mut rng, &old, 1_000);
        let mut reconciler = seeded(&old);

        let old_keys: HashSet<IdentityKey> = keys(&old).into_iter().collect();
        let mut view: Vec<Option<IdentityKey>> = keys(&old).into_iter().map(Some).collect();

        let session = reconciler.begin_session();
        for end in chunk_ends(&mut rng, new.len()) {
            let delta = reconciler
                .merge_batch(&session, &new[..end])
                .expect("merge chunk");
            assert_eq!(delta.previous_len, view.len(), "round {round}");
            replay(&mut view, &delta.ops, |_| None).expect("replay chunk");
            assert_eq!(view.len(), reconciler.len(), "round {round}");
            assert_eq!(
                keys(&reconciler.collection().rows()[..end]),
                keys(&new[..end]),
                "round {round}: settled prefix"
            );
        }
        reconciler.end_session(session).expect("end");

        let final_keys = reconciler.collection().keys();
        assert_eq!(final_keys, keys(&new), "round {round}");
        for (row, slot) in view.iter().enumerate() {
            match slot {
                Some(key) => assert_eq!(*key, final_keys[row], "round {round} row {row}"),
                None => assert!(
                    !old_keys.contains(&final_keys[row]),
                    "round {round} row {row}: surviving row was reinserted"
                ),
            }
        }
    }
}

#[test]
fn consecutive_sessions_stay_in_sync() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut current: Vec<KeyedResult> = (0..6).map(result).collect();
    let mut reconciler = seeded(&current);
    let mut view = keys(&current);

    for generation in 1..50 {
        let new = next_generation(&mut rng, &current, generation * 100);
        let session = reconciler.begin_session();
        let delta = reconciler.merge_batch(&session, &new).expect("merge");
        reconciler.end_session(session).expect("end");

        let fresh = keys(&new);
        replay(&mut view, &delta.ops, |row| fresh[row]).expect("replay");
        assert_eq!(view, fresh, "generation {generation}");
        current = new;
    }
}
