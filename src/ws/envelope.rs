//! Normalized streaming message envelope

use crate::normalize::{field_str, field_time};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Every inbound frame, normalized to `{id, type, payload, timestamp}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Parse a text frame; `None` only when the frame is not JSON
    pub fn parse(text: &str, now: DateTime<Utc>) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        Some(Self::from_value(value, now))
    }

    /// Normalize a decoded frame, synthesizing id and timestamp if absent
    pub fn from_value(value: Value, now: DateTime<Utc>) -> Self {
        let Value::Object(mut obj) = value else {
            return Self {
                id: Uuid::new_v4().to_string(),
                kind: "message".to_string(),
                payload: value,
                timestamp: now,
            };
        };

        let kind = field_str(&obj, &["type", "event", "kind"]).unwrap_or_else(|| "message".into());
        let id = field_str(&obj, &["id"]).unwrap_or_else(|| Uuid::new_v4().to_string());
        let timestamp = field_time(&obj, &["timestamp", "ts", "time"], now).unwrap_or(now);

        let wrapped = ["payload", "data"]
            .iter()
            .find_map(|name| obj.remove(*name).filter(|v| !v.is_null()));
        let payload = match wrapped {
            Some(inner) => inner,
            None => Value::Object(obj),
        };

        Self {
            id,
            kind,
            payload,
            timestamp,
        }
    }

    /// Lower-cased type, for routing
    pub fn kind_lower(&self) -> String {
        self.kind.to_ascii_lowercase()
    }
}
