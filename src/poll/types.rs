//! Pull path types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which collection a fetch targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullKind {
    Signals,
    Candidates,
    Events,
}

impl PullKind {
    pub const ALL: [PullKind; 3] = [PullKind::Signals, PullKind::Candidates, PullKind::Events];

    /// Endpoint path relative to the API base
    pub fn path(&self) -> &'static str {
        match self {
            PullKind::Signals => "signals",
            PullKind::Candidates => "signals/candidates",
            PullKind::Events => "events",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PullKind::Signals => "signals",
            PullKind::Candidates => "candidates",
            PullKind::Events => "events",
        }
    }
}

impl fmt::Display for PullKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query scope shared by every fetch
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchScope {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
}

impl FetchScope {
    pub fn new(symbol: Option<String>, timeframe: Option<String>) -> Self {
        Self { symbol, timeframe }
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn timeframe(mut self, timeframe: impl Into<String>) -> Self {
        self.timeframe = Some(timeframe.into());
        self
    }

    /// Query parameters for the set fields
    pub fn query(&self) -> Vec<(&'static str, &str)> {
        let mut params = Vec::new();
        if let Some(symbol) = &self.symbol {
            params.push(("symbol", symbol.as_str()));
        }
        if let Some(timeframe) = &self.timeframe {
            params.push(("timeframe", timeframe.as_str()));
        }
        params
    }
}

/// Records returned by one successful fetch
#[derive(Debug, Clone, PartialEq)]
pub struct PullBatch {
    pub kind: PullKind,
    /// Scope the fetch was issued under
    pub scope: FetchScope,
    pub records: Vec<Value>,
    pub fetched_at: DateTime<Utc>,
}

/// Fetch errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Poll intervals and HTTP source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Base URL of the signal API; polling is off when unset
    pub api_url: Option<String>,
    pub signals_secs: u64,
    pub candidates_secs: u64,
    pub events_secs: u64,
    pub timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            signals_secs: 60,
            candidates_secs: 90,
            events_secs: 45,
            timeout_secs: 10,
        }
    }
}

impl PollConfig {
    pub fn interval(&self, kind: PullKind) -> Duration {
        let secs = match kind {
            PullKind::Signals => self.signals_secs,
            PullKind::Candidates => self.candidates_secs,
            PullKind::Events => self.events_secs,
        };
        Duration::from_secs(secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_query() {
        assert!(FetchScope::default().query().is_empty());
        let scope = FetchScope::default().symbol("EURUSD").timeframe("H1");
        assert_eq!(scope.query(), vec![("symbol", "EURUSD"), ("timeframe", "H1")]);
    }

    #[test]
    fn test_default_intervals() {
        let config = PollConfig::default();
        assert_eq!(config.interval(PullKind::Signals), Duration::from_secs(60));
        assert_eq!(config.interval(PullKind::Candidates), Duration::from_secs(90));
        assert_eq!(config.interval(PullKind::Events), Duration::from_secs(45));
    }

    #[test]
    fn test_zero_interval_floored() {
        let config = PollConfig {
            events_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.interval(PullKind::Events), Duration::from_secs(1));
    }
}
