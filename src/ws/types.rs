//! WebSocket transport types and configuration

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Transport configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// WebSocket URL to connect to
    pub url: String,
    /// Fixed delay before each reconnection attempt
    pub reconnect_delay: Duration,
    /// Grace period after the last subscriber leaves before the socket closes
    pub idle_close_delay: Duration,
    /// Interval for sending ping frames
    pub ping_interval: Duration,
    /// Consecutive unanswered pings before the socket is terminated
    pub max_missed_pongs: u32,
    /// Channel buffer between the socket task and the connection manager
    pub buffer_size: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect_delay: Duration::from_millis(5_000),
            idle_close_delay: Duration::from_millis(1_500),
            ping_interval: Duration::from_secs(30),
            max_missed_pongs: 2,
            buffer_size: 1024,
        }
    }
}

impl WsConfig {
    /// Create a new config with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the fixed reconnection delay
    pub fn reconnect_delay(mut self, d: Duration) -> Self {
        self.reconnect_delay = d;
        self
    }

    /// Set the idle grace period
    pub fn idle_close_delay(mut self, d: Duration) -> Self {
        self.idle_close_delay = d;
        self
    }

    /// Set ping interval
    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = d;
        self
    }

    /// Set how many pings may go unanswered
    pub fn max_missed_pongs(mut self, n: u32) -> Self {
        self.max_missed_pongs = n;
        self
    }
}

/// Events emitted by one physical socket session
#[derive(Debug, Clone, PartialEq)]
pub enum WsMessage {
    /// Connection established
    Connected,
    /// Text frame
    Text(String),
    /// Binary frame
    Binary(Vec<u8>),
    /// Closed cleanly by the server
    Closed,
    /// Connection failed or was terminated
    Failed(WsError),
}

/// WebSocket errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Heartbeat lost after {0} unanswered pings")]
    HeartbeatLost(u32),
    #[error("Stream ended unexpectedly")]
    StreamEnded,
}

/// Lifecycle of the shared connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No subscribers and no socket
    Idle,
    /// Socket requested, handshake in progress
    Connecting,
    Open,
    /// Server closed the socket; a reconnect may be pending
    Closed,
    /// Socket failed; a reconnect may be pending
    Errored,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Published view of the shared connection
#[derive(Debug, Clone, PartialEq)]
pub struct TransportStatus {
    pub state: ConnectionState,
    pub subscribers: usize,
    /// Reconnects since the last successful open
    pub reconnect_attempts: u32,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Default for TransportStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            subscribers: 0,
            reconnect_attempts: 0,
            last_message_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_config_default() {
        let config = WsConfig::default();
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.idle_close_delay, Duration::from_millis(1_500));
        assert_eq!(config.ping_interval, Duration::from_secs(30));
        assert_eq!(config.max_missed_pongs, 2);
    }

    #[test]
    fn test_ws_config_builder() {
        let config = WsConfig::new("wss://example.com")
            .reconnect_delay(Duration::from_millis(250))
            .idle_close_delay(Duration::from_secs(3))
            .ping_interval(Duration::from_secs(15))
            .max_missed_pongs(3);

        assert_eq!(config.url, "wss://example.com");
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
        assert_eq!(config.idle_close_delay, Duration::from_secs(3));
        assert_eq!(config.ping_interval, Duration::from_secs(15));
        assert_eq!(config.max_missed_pongs, 3);
    }

    #[test]
    fn test_ws_error_display() {
        let err = WsError::ConnectionFailed("timeout".to_string());
        assert_eq!(err.to_string(), "Connection failed: timeout");

        let err = WsError::HeartbeatLost(2);
        assert_eq!(err.to_string(), "Heartbeat lost after 2 unanswered pings");
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Idle.to_string(), "idle");
        assert_eq!(ConnectionState::Errored.to_string(), "errored");
    }

    #[test]
    fn test_status_starts_idle() {
        let status = TransportStatus::default();
        assert_eq!(status.state, ConnectionState::Idle);
        assert_eq!(status.subscribers, 0);
    }
}
