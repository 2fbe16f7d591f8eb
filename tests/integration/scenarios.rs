//! End-to-end merge and classification scenarios

use crate::common::{at_ms, signal};
use chrono::Utc;
use serde_json::json;
use signal_desk::classify::{classify, ClassifierConfig, Tier};
use signal_desk::signal::{normalize_signal, DecisionState, Origin, Signal};
use signal_desk::store::BoundedStore;

fn scenario_record(confidence: u32, strength: u32, state: &str) -> serde_json::Value {
    json!({
        "mergeKey": "EURUSD:BUY:H1:trend",
        "pair": "EURUSD",
        "timestamp": 100,
        "confidence": confidence,
        "strength": strength,
        "direction": "BUY",
        "decision": {"state": state, "blocked": false},
        "isValid": true,
        "entryPrice": 1.1,
        "stopLoss": 1.09,
        "takeProfit": 1.12
    })
}

fn store_with(record: serde_json::Value) -> BoundedStore<Signal> {
    let signal = normalize_signal(&record, Origin::Pull, Utc::now()).unwrap();
    let mut store = BoundedStore::new(200);
    store.merge(vec![signal]);
    store
}

#[test]
fn scenario_a_strict_entry() {
    let store = store_with(scenario_record(80, 65, "ENTER"));
    assert_eq!(store.len(), 1);
    assert_eq!(store.items()[0].merge_key, "EURUSD:BUY:H1:trend");

    let result = classify(store.items(), &[], &ClassifierConfig::default());
    assert_eq!(result.tier, Tier::Strict);
    assert_eq!(result.signals.len(), 1);
    assert!(!result.used_fallback);
}

#[test]
fn scenario_b_relaxed_entry() {
    let store = store_with(scenario_record(50, 56, "ENTER"));
    let result = classify(store.items(), &[], &ClassifierConfig::default());
    assert_eq!(result.tier, Tier::Relaxed);
    assert_eq!(result.signals.len(), 1);
}

#[test]
fn scenario_c_watch() {
    let store = store_with(scenario_record(30, 15, "WAIT_MONITOR"));
    let result = classify(store.items(), &[], &ClassifierConfig::default());
    assert_eq!(result.tier, Tier::Watch);
    assert_eq!(result.signals.len(), 1);
}

#[test]
fn scenario_d_recency_wins_in_either_order() {
    let older = signal("GBPUSD:SELL:M15:x", 100, DecisionState::Enter, 80.0, 65.0);
    let newer = signal("GBPUSD:SELL:M15:x", 200, DecisionState::Enter, 80.0, 65.0);

    for batches in [
        vec![vec![older.clone()], vec![newer.clone()]],
        vec![vec![newer.clone()], vec![older.clone()]],
        vec![vec![older.clone(), newer.clone()]],
        vec![vec![newer.clone(), older.clone()]],
    ] {
        let mut store = BoundedStore::new(200);
        for batch in batches {
            store.merge(batch);
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].timestamp, at_ms(200));
    }
}

#[test]
fn scenario_e_cap_keeps_most_recent() {
    let batch: Vec<Signal> = (0..250)
        .map(|i| signal(&format!("k{}", i), 1_000 + i, DecisionState::Enter, 80.0, 65.0))
        .collect();

    let mut store = BoundedStore::new(200);
    let stats = store.merge(batch);
    assert_eq!(store.len(), 200);
    assert_eq!(stats.evicted, 50);

    let oldest_kept = store.items().iter().map(|s| s.timestamp).min().unwrap();
    assert_eq!(oldest_kept, at_ms(1_050));
    assert_eq!(store.items()[0].timestamp, at_ms(1_249));
}
