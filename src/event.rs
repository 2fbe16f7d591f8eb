//! Operational events for the bounded event log

use crate::normalize::{field, field_str, field_time};
use crate::store::Mergeable;
use crate::ws::Envelope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A generic operational event (not a signal)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpsEvent {
    pub id: String,
    pub kind: String,
    pub message: Option<String>,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl OpsEvent {
    /// Event from a streamed envelope whose type no other consumer claims
    pub fn from_envelope(envelope: &Envelope) -> Self {
        let message = envelope
            .payload
            .as_object()
            .and_then(|obj| field_str(obj, &["message", "msg", "text"]))
            .or_else(|| envelope.payload.as_str().map(str::to_string));

        Self {
            id: envelope.id.clone(),
            kind: envelope.kind.clone(),
            message,
            payload: envelope.payload.clone(),
            timestamp: envelope.timestamp,
        }
    }
}

impl Mergeable for OpsEvent {
    fn merge_key(&self) -> &str {
        &self.id
    }

    fn recency_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Normalize a polled event record; only non-objects are rejected
pub fn normalize_event(raw: &Value, now: DateTime<Utc>) -> Option<OpsEvent> {
    let obj = raw.as_object()?;
    let kind = field_str(obj, &["type", "kind", "event"]).unwrap_or_else(|| "event".to_string());
    let message = field_str(obj, &["message", "msg", "text"]);
    let payload = field(obj, &["payload", "data"]).cloned().unwrap_or_else(|| raw.clone());
    let reported_at = field_time(obj, &["timestamp", "time", "createdAt", "created_at"], now);

    let id = field_str(obj, &["id", "eventId", "event_id"])
        .unwrap_or_else(|| synthesized_id(&kind, reported_at, message.as_deref(), &payload));

    Some(OpsEvent {
        id,
        kind,
        message,
        payload,
        timestamp: reported_at.unwrap_or(now),
    })
}

/// Stable id for an event without one, so re-polling the same record is a no-op
fn synthesized_id(
    kind: &str,
    reported_at: Option<DateTime<Utc>>,
    message: Option<&str>,
    payload: &Value,
) -> String {
    let at = reported_at
        .map(|t| t.timestamp_millis().to_string())
        .unwrap_or_else(|| "-".to_string());
    match message {
        Some(message) => format!("{}:{}:{}", kind, at, message),
        None => format!("{}:{}:{}", kind, at, payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BoundedStore;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_from_envelope_extracts_message() {
        let envelope = Envelope {
            id: "e1".into(),
            kind: "bridge_error".into(),
            payload: json!({"message": "bridge offline"}),
            timestamp: now(),
        };
        let event = OpsEvent::from_envelope(&envelope);
        assert_eq!(event.id, "e1");
        assert_eq!(event.kind, "bridge_error");
        assert_eq!(event.message.as_deref(), Some("bridge offline"));
    }

    #[test]
    fn test_normalize_event_defaults() {
        let event = normalize_event(&json!({"msg": "hello"}), now()).unwrap();
        assert_eq!(event.kind, "event");
        assert_eq!(event.timestamp, now());
        assert_eq!(event.id, "event:-:hello");
        assert!(normalize_event(&json!([1, 2]), now()).is_none());
    }

    #[test]
    fn test_repolled_event_without_id_keeps_one_entry() {
        let raw = json!({"type": "info", "message": "bridge restarted", "timestamp": "2024-06-01T11:59:00Z"});
        let mut log = BoundedStore::new(28);
        for _ in 0..3 {
            let event = normalize_event(&raw, Utc::now()).unwrap();
            log.merge(vec![event]);
        }
        assert_eq!(log.len(), 1);
        assert_eq!(log.items()[0].id, format!("info:{}:bridge restarted", now().timestamp_millis() - 60_000));

        let other = json!({"type": "info", "message": "bridge stopped", "timestamp": "2024-06-01T11:59:00Z"});
        log.merge(vec![normalize_event(&other, Utc::now()).unwrap()]);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_event_log_dedups_by_id_and_caps() {
        let mut log = BoundedStore::new(28);
        let events: Vec<OpsEvent> = (0..40)
            .map(|i| {
                let raw = json!({"id": format!("ev{}", i % 30), "type": "info"});
                let mut event = normalize_event(&raw, now()).unwrap();
                event.timestamp = now() + Duration::seconds(i);
                event
            })
            .collect();
        log.merge(events);
        assert_eq!(log.len(), 28);
        assert_eq!(log.items()[0].id, "ev9");
    }
}
