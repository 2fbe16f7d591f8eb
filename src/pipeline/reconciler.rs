//! Single owner of all derived state

use super::route::Route;
use crate::classify::{classify, Classification, ClassifierConfig};
use crate::coalesce::Quote;
use crate::event::{normalize_event, OpsEvent};
use crate::liveness::{normalize_heartbeat, LivenessTracker};
use crate::normalize::records;
use crate::poll::{FetchScope, PullBatch, PullKind};
use crate::signal::{normalize_signals, Origin, Signal};
use crate::store::{BoundedStore, MergeStats, StoreConfig};
use crate::telemetry::{increment, set_gauge, CounterMetric, GaugeMetric};
use crate::ws::Envelope;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const SIGNAL_WRAPPERS: &[&str] = &["signals", "candidates", "items", "data"];

/// Events included in a snapshot
const RECENT_EVENTS: usize = 5;

/// What a single input did to the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Signals(MergeStats),
    Candidates(MergeStats),
    Events(MergeStats),
    Heartbeat,
    Quotes(usize),
    /// Pulled batch issued under a superseded scope
    Stale,
    /// Nothing usable in the input
    Ignored,
}

/// Point-in-time view of the reconciled state
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub classification: Classification,
    pub signal_count: usize,
    pub candidate_count: usize,
    pub event_count: usize,
    pub quote_count: usize,
    pub recent_events: Vec<OpsEvent>,
    pub live: bool,
    pub scope: FetchScope,
    pub taken_at: DateTime<Utc>,
}

/// Merges pushed and pulled records into bounded stores
pub struct Reconciler {
    signals: BoundedStore<Signal>,
    candidates: BoundedStore<Signal>,
    events: BoundedStore<OpsEvent>,
    quotes: HashMap<String, Quote>,
    liveness: LivenessTracker,
    classifier: ClassifierConfig,
    scope: FetchScope,
}

impl Reconciler {
    pub fn new(stores: &StoreConfig, classifier: ClassifierConfig) -> Self {
        Self {
            signals: BoundedStore::new(stores.signal_cap),
            candidates: BoundedStore::new(stores.candidate_cap),
            events: BoundedStore::new(stores.event_cap),
            quotes: HashMap::new(),
            liveness: LivenessTracker::new(),
            classifier,
            scope: FetchScope::default(),
        }
    }

    /// Override the liveness freshness window
    pub fn with_freshness(mut self, window: Duration) -> Self {
        self.liveness = LivenessTracker::with_window(window);
        self
    }

    pub fn with_scope(mut self, scope: FetchScope) -> Self {
        self.scope = scope;
        self
    }

    /// Track the current fetch scope; batches from older scopes are discarded
    pub fn set_scope(&mut self, scope: FetchScope) {
        self.scope = scope;
    }

    pub fn scope(&self) -> &FetchScope {
        &self.scope
    }

    /// Apply one pushed envelope
    pub fn apply_envelope(&mut self, envelope: &Envelope, now: DateTime<Utc>) -> Applied {
        match Route::of(&envelope.kind) {
            Route::Signal => {
                let raws = records(&envelope.payload, SIGNAL_WRAPPERS);
                Applied::Signals(self.merge_signals(PullKind::Signals, raws, Origin::Push, now))
            }
            Route::Candidate => {
                let raws = records(&envelope.payload, SIGNAL_WRAPPERS);
                Applied::Candidates(self.merge_signals(PullKind::Candidates, raws, Origin::Push, now))
            }
            Route::Heartbeat => match normalize_heartbeat(&envelope.payload, envelope.timestamp) {
                Some(session) => {
                    tracing::trace!(source = %session.source_id, "Heartbeat");
                    self.liveness.record_heartbeat(session);
                    self.publish_liveness(now);
                    Applied::Heartbeat
                }
                None => {
                    increment(CounterMetric::RecordsDropped, 1);
                    Applied::Ignored
                }
            },
            Route::Quote => {
                tracing::debug!(kind = %envelope.kind, "Quote envelope bypassed the coalescer, ignoring");
                Applied::Ignored
            }
            Route::Event => {
                let stats = self.events.merge(vec![OpsEvent::from_envelope(envelope)]);
                self.after_merge(GaugeMetric::EventLogLen, &stats);
                Applied::Events(stats)
            }
        }
    }

    /// Apply one pulled batch, unless its scope has been superseded
    pub fn apply_pull(&mut self, batch: &PullBatch, now: DateTime<Utc>) -> Applied {
        if batch.scope != self.scope {
            tracing::debug!(kind = %batch.kind, stale = ?batch.scope, current = ?self.scope, "Discarding superseded batch");
            increment(CounterMetric::StaleResponses, 1);
            return Applied::Stale;
        }

        let raws: Vec<&Value> = batch.records.iter().collect();
        match batch.kind {
            PullKind::Signals => {
                Applied::Signals(self.merge_signals(PullKind::Signals, raws, Origin::Pull, now))
            }
            PullKind::Candidates => {
                Applied::Candidates(self.merge_signals(PullKind::Candidates, raws, Origin::Pull, now))
            }
            PullKind::Events => Applied::Events(self.merge_events(raws, now)),
        }
    }

    /// Apply a coalesced quote batch
    pub fn apply_quotes(&mut self, quotes: HashMap<String, Quote>, now: DateTime<Utc>) -> Applied {
        let count = quotes.len();
        if count == 0 {
            return Applied::Ignored;
        }
        if let Some(latest) = quotes.values().map(|q| q.timestamp).max() {
            self.liveness.record_data(latest.min(now));
        }
        self.quotes.extend(quotes);
        self.publish_liveness(now);
        Applied::Quotes(count)
    }

    fn merge_signals(
        &mut self,
        kind: PullKind,
        raws: Vec<&Value>,
        origin: Origin,
        now: DateTime<Utc>,
    ) -> MergeStats {
        let (signals, dropped) = normalize_signals(raws, origin, now);
        if dropped > 0 {
            tracing::debug!(%kind, dropped, "Dropped malformed records");
            increment(CounterMetric::RecordsDropped, dropped as u64);
        }
        increment(CounterMetric::RecordsAccepted, signals.len() as u64);
        if !signals.is_empty() {
            self.liveness.record_data(now);
        }

        let (store, gauge) = match kind {
            PullKind::Candidates => (&mut self.candidates, GaugeMetric::CandidateStoreLen),
            _ => (&mut self.signals, GaugeMetric::SignalStoreLen),
        };
        let stats = store.merge(signals);
        self.after_merge(gauge, &stats);
        stats
    }

    fn merge_events(&mut self, raws: Vec<&Value>, now: DateTime<Utc>) -> MergeStats {
        let received = raws.len();
        let events: Vec<OpsEvent> = raws.into_iter().filter_map(|raw| normalize_event(raw, now)).collect();
        let dropped = received - events.len();
        if dropped > 0 {
            increment(CounterMetric::RecordsDropped, dropped as u64);
        }
        let stats = self.events.merge(events);
        self.after_merge(GaugeMetric::EventLogLen, &stats);
        stats
    }

    fn after_merge(&self, gauge: GaugeMetric, stats: &MergeStats) {
        increment(CounterMetric::StoreEvictions, stats.evicted as u64);
        set_gauge(gauge, stats.len as f64);
    }

    fn publish_liveness(&self, now: DateTime<Utc>) {
        let live = if self.liveness.any_live(now) { 1.0 } else { 0.0 };
        set_gauge(GaugeMetric::SourceLive, live);
    }

    /// Classify the current stores
    pub fn classify(&self) -> Classification {
        classify(self.signals.items(), self.candidates.items(), &self.classifier)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> Snapshot {
        Snapshot {
            classification: self.classify(),
            signal_count: self.signals.len(),
            candidate_count: self.candidates.len(),
            event_count: self.events.len(),
            quote_count: self.quotes.len(),
            recent_events: self.events.items().iter().take(RECENT_EVENTS).cloned().collect(),
            live: self.liveness.any_live(now),
            scope: self.scope.clone(),
            taken_at: now,
        }
    }

    pub fn signals(&self) -> &[Signal] {
        self.signals.items()
    }

    pub fn candidates(&self) -> &[Signal] {
        self.candidates.items()
    }

    pub fn events(&self) -> &[OpsEvent] {
        self.events.items()
    }

    pub fn quote(&self, symbol: &str) -> Option<&Quote> {
        self.quotes.get(symbol)
    }

    pub fn liveness(&self) -> &LivenessTracker {
        &self.liveness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Tier;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(&StoreConfig::default(), ClassifierConfig::default())
    }

    fn envelope(kind: &str, payload: Value) -> Envelope {
        Envelope {
            id: format!("env-{}", kind),
            kind: kind.to_string(),
            payload,
            timestamp: now(),
        }
    }

    fn strict_record(confidence: u32) -> Value {
        json!({
            "pair": "EURUSD",
            "direction": "BUY",
            "timeframe": "H1",
            "strategy": "trend",
            "timestamp": now().timestamp_millis(),
            "confidence": confidence,
            "strength": 65,
            "decision": {"state": "ENTER", "blocked": false},
            "isValid": true,
            "entryPrice": 1.1,
            "stopLoss": 1.09,
            "takeProfit": 1.12
        })
    }

    fn batch(kind: PullKind, scope: FetchScope, records: Vec<Value>) -> PullBatch {
        PullBatch {
            kind,
            scope,
            records,
            fetched_at: now(),
        }
    }

    #[test]
    fn test_push_signal_routes_to_signal_store() {
        let mut r = reconciler();
        let applied = r.apply_envelope(&envelope("new_signal", strict_record(80)), now());
        assert!(matches!(applied, Applied::Signals(stats) if stats.len == 1));
        assert_eq!(r.signals()[0].origin, Origin::Push);
        assert_eq!(r.classify().tier, Tier::Strict);
        assert!(r.liveness().any_live(now()));
    }

    #[test]
    fn test_push_and_pull_reconcile_by_key() {
        let mut r = reconciler();
        r.apply_pull(&batch(PullKind::Signals, FetchScope::default(), vec![strict_record(50)]), now());

        let mut newer = strict_record(90);
        newer["timestamp"] = json!((now() + Duration::seconds(5)).timestamp_millis());
        r.apply_envelope(&envelope("signal", newer), now());

        assert_eq!(r.signals().len(), 1);
        assert_eq!(r.signals()[0].confidence, Some(90.0));
        assert_eq!(r.signals()[0].origin, Origin::Push);

        // an older pulled copy does not overwrite the newer pushed one
        r.apply_pull(&batch(PullKind::Signals, FetchScope::default(), vec![strict_record(10)]), now());
        assert_eq!(r.signals()[0].confidence, Some(90.0));
    }

    #[test]
    fn test_candidates_feed_fallback() {
        let mut r = reconciler();
        r.apply_envelope(&envelope("signal_candidate", json!({"candidates": [strict_record(80)]})), now());
        assert!(r.signals().is_empty());
        let result = r.classify();
        assert!(result.used_fallback);
        assert_eq!(result.mode_label, "ENTER only (strict, fallback pool)");
    }

    #[test]
    fn test_stale_scope_batch_discarded() {
        let mut r = reconciler().with_scope(FetchScope::default().symbol("GBPUSD"));
        let stale = batch(PullKind::Signals, FetchScope::default().symbol("EURUSD"), vec![strict_record(80)]);
        assert_eq!(r.apply_pull(&stale, now()), Applied::Stale);
        assert!(r.signals().is_empty());

        r.set_scope(FetchScope::default().symbol("EURUSD"));
        assert!(matches!(r.apply_pull(&stale, now()), Applied::Signals(_)));
        assert_eq!(r.signals().len(), 1);
    }

    #[test]
    fn test_malformed_records_dropped_state_retained() {
        let mut r = reconciler();
        r.apply_pull(&batch(PullKind::Signals, FetchScope::default(), vec![strict_record(80)]), now());
        let applied = r.apply_pull(
            &batch(PullKind::Signals, FetchScope::default(), vec![json!({"pair": "EURUSD"}), json!(7)]),
            now(),
        );
        assert!(matches!(applied, Applied::Signals(stats) if stats.len == 1));
        assert_eq!(r.signals().len(), 1);
    }

    #[test]
    fn test_unknown_types_go_to_event_log() {
        let mut r = reconciler();
        r.apply_envelope(&envelope("order_filled", json!({"message": "filled"})), now());
        r.apply_pull(&batch(PullKind::Events, FetchScope::default(), vec![json!({"id": "p1", "type": "info"})]), now());
        assert_eq!(r.events().len(), 2);
        let snapshot = r.snapshot(now());
        assert_eq!(snapshot.event_count, 2);
        assert_eq!(snapshot.recent_events.len(), 2);
    }

    #[test]
    fn test_heartbeat_drives_liveness() {
        let mut r = reconciler();
        assert!(!r.snapshot(now()).live);
        r.apply_envelope(&envelope("heartbeat", json!({"source": "mt5"})), now());
        assert!(r.snapshot(now()).live);
        assert!(!r.snapshot(now() + Duration::minutes(3)).live);
    }

    #[test]
    fn test_quotes_merge_and_feed_freshness() {
        let mut r = reconciler();
        let quote = Quote {
            symbol: "EURUSD".into(),
            bid: Some(dec!(1.1)),
            ask: Some(dec!(1.1002)),
            last: None,
            timestamp: now(),
        };
        let applied = r.apply_quotes(HashMap::from([("EURUSD".to_string(), quote)]), now());
        assert_eq!(applied, Applied::Quotes(1));
        assert_eq!(r.quote("EURUSD").unwrap().bid, Some(dec!(1.1)));
        assert_eq!(r.liveness().last_data_at(), Some(now()));
        assert_eq!(r.apply_envelope(&envelope("tick", json!({"symbol": "EURUSD"})), now()), Applied::Ignored);
    }

    #[test]
    fn test_event_log_capped() {
        let mut r = reconciler();
        let records = (0..40).map(|i| json!({"id": format!("e{}", i), "timestamp": now().timestamp_millis() + i})).collect();
        r.apply_pull(&batch(PullKind::Events, FetchScope::default(), records), now());
        assert_eq!(r.events().len(), 28);
        assert_eq!(r.events()[0].id, "e39");
    }

    #[test]
    fn test_repeated_event_poll_is_idempotent() {
        let mut r = reconciler();
        let records = vec![json!({"type": "info", "message": "bridge restarted", "timestamp": now().timestamp_millis()})];
        for minutes in 0..3 {
            r.apply_pull(&batch(PullKind::Events, FetchScope::default(), records.clone()), now() + Duration::minutes(minutes));
        }
        assert_eq!(r.events().len(), 1);
        assert_eq!(r.events()[0].timestamp, now());
    }
}
