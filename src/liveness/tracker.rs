//! Source liveness derived from heartbeats and data freshness

use super::types::{is_fresh, BridgeSession, FRESHNESS_WINDOW};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// Most recent heartbeat among `sessions`
pub fn primary_session(sessions: &[BridgeSession]) -> Option<&BridgeSession> {
    sessions.iter().max_by_key(|s| s.last_heartbeat_at)
}

/// A source is live when any heartbeat, or failing that the last data
/// update, falls inside the freshness window
pub fn is_source_live(
    sessions: &[BridgeSession],
    fallback_fresh: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    live_within(sessions, fallback_fresh, now, FRESHNESS_WINDOW)
}

fn live_within(
    sessions: &[BridgeSession],
    fallback_fresh: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: Duration,
) -> bool {
    if sessions
        .iter()
        .any(|s| is_fresh(s.last_heartbeat_at, now, window))
    {
        return true;
    }
    fallback_fresh.is_some_and(|at| is_fresh(at, now, window))
}

/// Sessions per source plus the last data-update time
#[derive(Debug)]
pub struct LivenessTracker {
    sessions: HashMap<String, Vec<BridgeSession>>,
    last_data_at: Option<DateTime<Utc>>,
    window: Duration,
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessTracker {
    pub fn new() -> Self {
        Self::with_window(FRESHNESS_WINDOW)
    }

    /// Tracker with a custom freshness window
    pub fn with_window(window: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            last_data_at: None,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Insert or refresh a session, keyed by source and account
    ///
    /// An older heartbeat never moves a session backwards.
    pub fn record_heartbeat(&mut self, session: BridgeSession) {
        let entries = self.sessions.entry(session.source_id.clone()).or_default();
        match entries.iter_mut().find(|s| s.account == session.account) {
            Some(existing) if existing.last_heartbeat_at <= session.last_heartbeat_at => {
                *existing = session
            }
            Some(_) => {}
            None => entries.push(session),
        }
    }

    /// Note that fresh data arrived at `at`
    pub fn record_data(&mut self, at: DateTime<Utc>) {
        if self.last_data_at.map_or(true, |prev| at > prev) {
            self.last_data_at = Some(at);
        }
    }

    pub fn sessions(&self, source_id: &str) -> &[BridgeSession] {
        self.sessions
            .get(source_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn primary(&self, source_id: &str) -> Option<&BridgeSession> {
        primary_session(self.sessions(source_id))
    }

    pub fn last_data_at(&self) -> Option<DateTime<Utc>> {
        self.last_data_at
    }

    pub fn is_live(&self, source_id: &str, now: DateTime<Utc>) -> bool {
        live_within(self.sessions(source_id), self.last_data_at, now, self.window)
    }

    /// Live verdict across every known source
    pub fn any_live(&self, now: DateTime<Utc>) -> bool {
        let all: Vec<BridgeSession> = self.sessions.values().flatten().cloned().collect();
        live_within(&all, self.last_data_at, now, self.window)
    }

    pub fn source_count(&self) -> usize {
        self.sessions.len()
    }
}
