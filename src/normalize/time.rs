//! Timestamp parsing with a plausibility clamp

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use super::coerce::field;

/// 2000-01-01T00:00:00Z; anything earlier is treated as garbage
const EPOCH_FLOOR_MS: i64 = 946_684_800_000;

/// Values below this magnitude are epoch seconds, above it epoch milliseconds
const SECONDS_MAGNITUDE_LIMIT: f64 = 1e11;

/// How far into the future a timestamp may plausibly lie
const MAX_FUTURE_DAYS: i64 = 3 * 365;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Accepted `[floor, ceiling]` range for timestamps as of `now`
pub fn plausible_range(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let floor = Utc
        .timestamp_millis_opt(EPOCH_FLOOR_MS)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    (floor, now + Duration::days(MAX_FUTURE_DAYS))
}

/// Parse epoch seconds, epoch milliseconds, numeric strings, RFC 3339 or
/// naive UTC date-times. Out-of-range values yield `None`.
pub fn parse_timestamp(value: &Value, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let parsed = match value {
        Value::Number(n) => from_epoch(n.as_f64()?),
        Value::String(s) => parse_text(s.trim()),
        _ => None,
    }?;

    let (floor, ceiling) = plausible_range(now);
    (parsed >= floor && parsed <= ceiling).then_some(parsed)
}

/// First parseable timestamp among `names`
pub fn field_time(
    obj: &Map<String, Value>,
    names: &[&str],
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    field(obj, names).and_then(|v| parse_timestamp(v, now))
}

fn from_epoch(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() || raw <= 0.0 {
        return None;
    }
    let millis = if raw.abs() < SECONDS_MAGNITUDE_LIMIT {
        raw * 1000.0
    } else {
        raw
    };
    Utc.timestamp_millis_opt(millis.round() as i64).single()
}

fn parse_text(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    if let Ok(raw) = text.parse::<f64>() {
        return from_epoch(raw);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}
