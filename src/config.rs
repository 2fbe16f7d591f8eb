//! Configuration types for signal-desk
//!
//! Every section has defaults, so an empty file is a valid configuration.

use crate::classify::ClassifierConfig;
use crate::poll::PollConfig;
use crate::store::StoreConfig;
use crate::telemetry::LogFormat;
use crate::ws::WsConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transport: TransportConfig,
    pub store: StoreConfig,
    pub classifier: ClassifierConfig,
    pub coalescer: CoalescerConfig,
    pub liveness: LivenessConfig,
    pub poll: PollConfig,
    pub telemetry: TelemetryConfig,
}

/// Shared WebSocket connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Event stream URL; streaming is off when unset
    #[serde(default)]
    pub ws_url: Option<String>,

    /// Fixed delay before reconnecting (milliseconds)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Grace period before closing an unused socket (milliseconds)
    #[serde(default = "default_idle_close_ms")]
    pub idle_close_ms: u64,

    /// Ping cadence (seconds)
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Consecutive unanswered pings before the socket is dropped
    #[serde(default = "default_max_missed_pongs")]
    pub max_missed_pongs: u32,
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}
fn default_idle_close_ms() -> u64 {
    1500
}
fn default_ping_interval_secs() -> u64 {
    30
}
fn default_max_missed_pongs() -> u32 {
    2
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ws_url: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            idle_close_ms: default_idle_close_ms(),
            ping_interval_secs: default_ping_interval_secs(),
            max_missed_pongs: default_max_missed_pongs(),
        }
    }
}

impl TransportConfig {
    /// Connection settings for `url`
    pub fn ws_config(&self, url: impl Into<String>) -> WsConfig {
        WsConfig::new(url)
            .reconnect_delay(Duration::from_millis(self.reconnect_delay_ms))
            .idle_close_delay(Duration::from_millis(self.idle_close_ms))
            .ping_interval(Duration::from_secs(self.ping_interval_secs.max(1)))
            .max_missed_pongs(self.max_missed_pongs.max(1))
    }
}

/// Quote coalescer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoalescerConfig {
    /// Flush period (milliseconds)
    #[serde(default = "default_flush_delay_ms")]
    pub flush_delay_ms: u64,
}

fn default_flush_delay_ms() -> u64 {
    650
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            flush_delay_ms: default_flush_delay_ms(),
        }
    }
}

impl CoalescerConfig {
    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms.max(1))
    }
}

/// Source liveness configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessConfig {
    /// How long a heartbeat or data update counts as fresh (seconds)
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,
}

fn default_freshness_secs() -> u64 {
    120
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            freshness_secs: default_freshness_secs(),
        }
    }
}

impl LivenessConfig {
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus exporter port; no exporter when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
