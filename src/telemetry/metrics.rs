//! Prometheus metrics

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Frames delivered to subscribers
    FramesReceived,
    /// Frames that were not JSON
    FramesDropped,
    /// Subscriber errors and panics during fan-out
    SubscriberFailures,
    /// Shared connection reconnects scheduled
    Reconnects,
    /// Raw records accepted by normalization
    RecordsAccepted,
    /// Raw records dropped as malformed
    RecordsDropped,
    /// Store entries evicted by the cap
    StoreEvictions,
    /// Pull fetches that failed
    FetchFailures,
    /// Pull responses discarded because their scope was superseded
    StaleResponses,
    /// Coalescer flushes
    CoalescerFlushes,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Signal store size
    SignalStoreLen,
    /// Candidate store size
    CandidateStoreLen,
    /// Event log size
    EventLogLen,
    /// 1 when any source is live
    SourceLive,
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::FramesReceived => "signaldesk_frames_received_total",
        CounterMetric::FramesDropped => "signaldesk_frames_dropped_total",
        CounterMetric::SubscriberFailures => "signaldesk_subscriber_failures_total",
        CounterMetric::Reconnects => "signaldesk_reconnects_total",
        CounterMetric::RecordsAccepted => "signaldesk_records_accepted_total",
        CounterMetric::RecordsDropped => "signaldesk_records_dropped_total",
        CounterMetric::StoreEvictions => "signaldesk_store_evictions_total",
        CounterMetric::FetchFailures => "signaldesk_fetch_failures_total",
        CounterMetric::StaleResponses => "signaldesk_stale_responses_total",
        CounterMetric::CoalescerFlushes => "signaldesk_coalescer_flushes_total",
    }
}

fn gauge_name(metric: GaugeMetric) -> &'static str {
    match metric {
        GaugeMetric::SignalStoreLen => "signaldesk_signal_store_len",
        GaugeMetric::CandidateStoreLen => "signaldesk_candidate_store_len",
        GaugeMetric::EventLogLen => "signaldesk_event_log_len",
        GaugeMetric::SourceLive => "signaldesk_source_live",
    }
}

/// Increment a counter
pub fn increment(metric: CounterMetric, by: u64) {
    if by == 0 {
        return;
    }
    metrics::counter!(counter_name(metric)).increment(by);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(gauge_name(metric)).set(value);
}
