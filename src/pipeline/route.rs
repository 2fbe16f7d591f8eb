//! Envelope routing by message type

/// Destination of a pushed envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Signal,
    Candidate,
    /// Through the coalescer, never straight into the reconciler
    Quote,
    Heartbeat,
    /// Everything else lands in the event log
    Event,
}

impl Route {
    /// Route for an envelope type, compared case-insensitively
    pub fn of(kind: &str) -> Self {
        match kind.trim().to_ascii_lowercase().as_str() {
            "signal" | "signals" | "signal_update" | "new_signal" | "trade_signal" => Route::Signal,
            "candidate" | "candidates" | "signal_candidate" => Route::Candidate,
            "quote" | "quotes" | "tick" | "price" | "price_update" => Route::Quote,
            "heartbeat" | "bridge_heartbeat" | "bridge_status" => Route::Heartbeat,
            _ => Route::Event,
        }
    }
}
