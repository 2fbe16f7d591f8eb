//! Shared fixtures

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use signal_desk::signal::{Decision, DecisionState, Direction, Signal};

pub fn at_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

/// Tradeable, valid signal with the given key, time and scores
pub fn signal(key: &str, ts_ms: i64, state: DecisionState, confidence: f64, strength: f64) -> Signal {
    let mut s = Signal::new(format!("{}@{}", key, ts_ms), "EURUSD", Direction::Buy, at_ms(ts_ms));
    s.merge_key = key.to_string();
    s.decision = Decision {
        state,
        blocked: false,
    };
    s.is_valid = true;
    s.confidence = Some(confidence);
    s.strength = Some(strength);
    s.entry_price = Some(dec!(1.1));
    s.stop_loss = Some(dec!(1.09));
    s.take_profit = Some(dec!(1.12));
    s
}

pub fn enter(key: &str, ts_ms: i64) -> Signal {
    signal(key, ts_ms, DecisionState::Enter, 80.0, 65.0)
}
