//! Store and classifier invariants over generated inputs

use crate::common::{enter, signal};
use signal_desk::classify::{classify, ClassifierConfig, Tier};
use signal_desk::signal::{DecisionState, Signal};
use signal_desk::store::{BoundedStore, Mergeable};
use std::collections::HashSet;

/// Small deterministic generator so failures reproduce
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

fn random_batch(rng: &mut Lcg, len: usize, keys: u64) -> Vec<Signal> {
    (0..len)
        .map(|_| {
            let key = format!("k{}", rng.below(keys));
            enter(&key, 1_000 + rng.below(10_000) as i64)
        })
        .collect()
}

fn assert_invariants(store: &BoundedStore<Signal>) {
    let items = store.items();
    assert!(items.len() <= store.cap());

    let keys: HashSet<&str> = items.iter().map(|s| s.merge_key()).collect();
    assert_eq!(keys.len(), items.len(), "duplicate keys");

    for pair in items.windows(2) {
        assert!(pair[0].recency_ms() >= pair[1].recency_ms(), "not sorted");
    }
}

#[test]
fn merge_is_idempotent() {
    let mut rng = Lcg(7);
    for _ in 0..20 {
        let batch = random_batch(&mut rng, 40, 25);
        let mut once = BoundedStore::new(30);
        once.merge(batch.clone());

        let mut twice = once.clone();
        twice.merge(batch);
        assert_eq!(once.items(), twice.items());
    }
}

#[test]
fn cap_uniqueness_and_order_hold_after_every_merge() {
    let mut rng = Lcg(42);
    let mut store = BoundedStore::new(50);
    for _ in 0..100 {
        let len = rng.below(30) as usize;
        let batch = random_batch(&mut rng, len, 120);
        store.merge(batch);
        assert_invariants(&store);
    }
}

#[test]
fn newest_per_key_survives_regardless_of_order() {
    let mut rng = Lcg(99);
    let batch = random_batch(&mut rng, 60, 10);

    let mut forward = BoundedStore::new(100);
    forward.merge(batch.clone());

    let mut reversed = BoundedStore::new(100);
    for s in batch.iter().rev() {
        reversed.merge(vec![s.clone()]);
    }

    for key in forward.items().iter().map(|s| s.merge_key.clone()) {
        let newest = batch
            .iter()
            .filter(|s| s.merge_key == key)
            .map(|s| s.timestamp)
            .max()
            .unwrap();
        assert_eq!(forward.get(&key).unwrap().timestamp, newest);
        assert_eq!(reversed.get(&key).unwrap().timestamp, newest);
    }
}

#[test]
fn tie_goes_to_later_merged_record() {
    let mut first = enter("same", 500);
    first.id = "first".to_string();
    let mut second = enter("same", 500);
    second.id = "second".to_string();

    let mut store = BoundedStore::new(10);
    store.merge(vec![first.clone(), second.clone()]);
    assert_eq!(store.items()[0].id, "second");

    store.merge(vec![first]);
    assert_eq!(store.items()[0].id, "first");
}

#[test]
fn strict_result_suppresses_lower_tiers() {
    let pool = vec![
        signal("w", 100, DecisionState::WaitMonitor, 90.0, 90.0),
        signal("r", 100, DecisionState::Enter, 50.0, 56.0),
        signal("s", 100, DecisionState::EnterStrong, 76.0, 61.0),
    ];
    let result = classify(&pool, &[], &ClassifierConfig::default());
    assert_eq!(result.tier, Tier::Strict);
    let ids: Vec<&str> = result.signals.iter().map(|s| s.merge_key.as_str()).collect();
    assert_eq!(ids, vec!["s"]);
}

#[test]
fn candidates_only_consulted_when_primary_empty() {
    let primary = vec![signal("p", 100, DecisionState::WaitMonitor, 25.0, 12.0)];
    let candidates = vec![enter("c", 100)];

    let result = classify(&primary, &candidates, &ClassifierConfig::default());
    assert_eq!(result.tier, Tier::Watch);
    assert!(!result.used_fallback);

    let result = classify(&[], &candidates, &ClassifierConfig::default());
    assert_eq!(result.tier, Tier::Strict);
    assert!(result.used_fallback);
    assert_eq!(result.mode_label, "ENTER only (strict, fallback pool)");
}
