//! Signal normalization from loosely typed records

use super::types::{composite_key, Decision, DecisionState, Direction, Origin, Signal, SignalStatus};
use crate::normalize::{field, field_bool, field_decimal, field_f64, field_str, field_time};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

const ID: &[&str] = &["id", "signalId", "signal_id", "uuid"];
const MERGE_KEY: &[&str] = &["mergeKey", "merge_key"];
const PAIR: &[&str] = &["pair", "symbol", "instrument", "asset"];
const DIRECTION: &[&str] = &["direction", "side", "action", "signal"];
const TIMEFRAME: &[&str] = &["timeframe", "tf", "interval"];
const STRATEGY: &[&str] = &["strategy", "strategyName", "strategy_name", "setup"];
const TIMESTAMP: &[&str] = &[
    "timestamp",
    "time",
    "createdAt",
    "created_at",
    "generatedAt",
    "generated_at",
    "ts",
];
const OPENED_AT: &[&str] = &["openedAt", "opened_at", "openTime", "open_time"];
const CLOSED_AT: &[&str] = &["closedAt", "closed_at", "closeTime", "close_time"];
const EXPIRES_AT: &[&str] = &["expiresAt", "expires_at", "expiry", "validUntil", "valid_until"];
const ENTRY: &[&str] = &["entryPrice", "entry_price", "entry"];
const STOP: &[&str] = &["stopLoss", "stop_loss", "sl"];
const TARGET: &[&str] = &["takeProfit", "take_profit", "tp"];
const RISK_REWARD: &[&str] = &["riskReward", "risk_reward", "rr"];
const STATUS: &[&str] = &["status", "lifecycle"];
const IS_VALID: &[&str] = &["isValid", "is_valid", "valid"];
const DECISION_STATE: &[&str] = &["state", "decisionState", "decision_state"];
const BLOCKED: &[&str] = &["blocked", "isBlocked", "is_blocked"];

/// Normalize one raw record into a [`Signal`]
///
/// Returns `None` when the record has no pair or no recognizable direction.
/// A missing generation time defaults to `now`.
pub fn normalize_signal(raw: &Value, origin: Origin, now: DateTime<Utc>) -> Option<Signal> {
    let obj = raw.as_object()?;

    let pair = field_str(obj, PAIR)?.to_ascii_uppercase();
    let direction = Direction::parse(&field_str(obj, DIRECTION)?)?;
    let timestamp = field_time(obj, TIMESTAMP, now).unwrap_or(now);

    let id = field_str(obj, ID)
        .unwrap_or_else(|| format!("{}:{}:{}", pair, direction, timestamp.timestamp_millis()));

    let mut signal = Signal::new(id, pair, direction, timestamp);
    signal.origin = origin;
    signal.timeframe = field_str(obj, TIMEFRAME);
    signal.strategy = field_str(obj, STRATEGY);
    signal.opened_at = field_time(obj, OPENED_AT, now);
    signal.closed_at = field_time(obj, CLOSED_AT, now);
    signal.expires_at = field_time(obj, EXPIRES_AT, now);

    signal.entry_price = field_decimal(obj, ENTRY);
    signal.stop_loss = field_decimal(obj, STOP);
    signal.take_profit = field_decimal(obj, TARGET);
    signal.risk_reward = field_decimal(obj, RISK_REWARD).or_else(|| signal.derived_risk_reward());

    signal.confidence = field_f64(obj, &["confidence"]);
    signal.strength = field_f64(obj, &["strength"]);
    signal.score = field_f64(obj, &["score"]);
    signal.win_rate = field_f64(obj, &["winRate", "win_rate"]);

    signal.status = field_str(obj, STATUS)
        .map(|s| SignalStatus::parse(&s))
        .unwrap_or(SignalStatus::Pending);
    signal.status = signal.effective_status(now);
    signal.decision = parse_decision(obj);
    signal.is_valid = field_bool(obj, IS_VALID).unwrap_or(false);

    signal.merge_key = if signal.is_trade_linked() {
        signal.id.clone()
    } else {
        field_str(obj, MERGE_KEY).unwrap_or_else(|| {
            composite_key(
                &signal.pair,
                signal.direction,
                signal.timeframe.as_deref(),
                signal.strategy.as_deref(),
            )
        })
    };

    Some(signal)
}

/// Normalize a batch, returning the survivors and the number dropped
pub fn normalize_signals<'a>(
    raws: impl IntoIterator<Item = &'a Value>,
    origin: Origin,
    now: DateTime<Utc>,
) -> (Vec<Signal>, usize) {
    let mut dropped = 0;
    let signals = raws
        .into_iter()
        .filter_map(|raw| {
            let signal = normalize_signal(raw, origin, now);
            if signal.is_none() {
                dropped += 1;
            }
            signal
        })
        .collect();
    (signals, dropped)
}

/// `decision` may be an object, a bare state string, or flattened fields
fn parse_decision(obj: &Map<String, Value>) -> Decision {
    match field(obj, &["decision"]) {
        Some(Value::Object(nested)) => Decision {
            state: field_str(nested, DECISION_STATE)
                .map(|s| DecisionState::parse(&s))
                .unwrap_or(DecisionState::Unknown),
            blocked: field_bool(nested, BLOCKED).unwrap_or(false),
        },
        Some(Value::String(state)) => Decision {
            state: DecisionState::parse(state),
            blocked: field_bool(obj, BLOCKED).unwrap_or(false),
        },
        _ => Decision {
            state: field_str(obj, &["decisionState", "decision_state"])
                .map(|s| DecisionState::parse(&s))
                .unwrap_or(DecisionState::Unknown),
            blocked: field_bool(obj, BLOCKED).unwrap_or(false),
        },
    }
}
