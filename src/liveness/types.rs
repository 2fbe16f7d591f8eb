//! Bridge session types

use crate::normalize::{field, field_str, field_time};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// How long a heartbeat or data update keeps a source live
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(120);

/// Heartbeat record for one bridge connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeSession {
    pub source_id: String,
    pub last_heartbeat_at: DateTime<Utc>,
    pub account: Option<String>,
    /// Free-form metadata reported with the heartbeat
    pub context: Value,
}

impl BridgeSession {
    pub fn new(source_id: impl Into<String>, last_heartbeat_at: DateTime<Utc>) -> Self {
        Self {
            source_id: source_id.into(),
            last_heartbeat_at,
            account: None,
            context: Value::Null,
        }
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Heartbeat within the freshness window
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        is_fresh(self.last_heartbeat_at, now, FRESHNESS_WINDOW)
    }
}

pub(crate) fn is_fresh(at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now.signed_duration_since(at).num_milliseconds() <= window.as_millis() as i64
}

/// Normalize a heartbeat payload
///
/// The source id falls back to `"default"` so a bare `{ "type": "heartbeat" }`
/// still counts.
pub fn normalize_heartbeat(raw: &Value, now: DateTime<Utc>) -> Option<BridgeSession> {
    let obj = raw.as_object()?;
    let source_id = field_str(obj, &["sourceId", "source_id", "source", "bridgeId", "bridge_id"])
        .unwrap_or_else(|| "default".to_string());

    Some(BridgeSession {
        source_id,
        last_heartbeat_at: field_time(
            obj,
            &["lastHeartbeatAt", "last_heartbeat_at", "timestamp", "time"],
            now,
        )
        .unwrap_or(now),
        account: field_str(obj, &["account", "accountId", "account_id", "login"]),
        context: field(obj, &["context", "meta", "metadata"])
            .cloned()
            .unwrap_or(Value::Null),
    })
}
