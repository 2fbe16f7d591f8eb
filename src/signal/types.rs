//! Signal types

use crate::store::Mergeable;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    Neutral,
}

impl Direction {
    /// Parse a producer direction, accepting common aliases
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUY" | "LONG" | "UP" | "BULLISH" => Some(Direction::Buy),
            "SELL" | "SHORT" | "DOWN" | "BEARISH" => Some(Direction::Sell),
            "NEUTRAL" | "FLAT" | "HOLD" | "NONE" => Some(Direction::Neutral),
            _ => None,
        }
    }

    /// Whether the direction names an actual trade
    pub fn is_directional(&self) -> bool {
        matches!(self, Direction::Buy | Direction::Sell)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
            Direction::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStatus {
    Pending,
    Active,
    Closed,
    Expired,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl SignalStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "NEW" | "OPEN_PENDING" => SignalStatus::Pending,
            "ACTIVE" | "OPEN" | "RUNNING" => SignalStatus::Active,
            "CLOSED" | "DONE" | "FILLED" => SignalStatus::Closed,
            "EXPIRED" => SignalStatus::Expired,
            "CANCELLED" | "CANCELED" => SignalStatus::Cancelled,
            _ => SignalStatus::Unknown,
        }
    }
}

/// Engine decision state attached to a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionState {
    Enter,
    EnterStrong,
    EnterTrade,
    WaitMonitor,
    Skip,
    #[serde(other)]
    Unknown,
}

impl DecisionState {
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "ENTER" => DecisionState::Enter,
            "ENTER_STRONG" => DecisionState::EnterStrong,
            "ENTER_TRADE" => DecisionState::EnterTrade,
            "WAIT_MONITOR" => DecisionState::WaitMonitor,
            "SKIP" | "NO_TRADE" => DecisionState::Skip,
            _ => DecisionState::Unknown,
        }
    }

    /// Any of the entry states
    pub fn is_enter(&self) -> bool {
        matches!(
            self,
            DecisionState::Enter | DecisionState::EnterStrong | DecisionState::EnterTrade
        )
    }
}

/// Decision metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub state: DecisionState,
    pub blocked: bool,
}

impl Default for Decision {
    fn default() -> Self {
        Self {
            state: DecisionState::Unknown,
            blocked: false,
        }
    }
}

/// Which path delivered the signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Pull,
    Push,
}

/// One trading opportunity observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Producer-assigned or synthesized identifier
    pub id: String,
    /// Deduplication key
    pub merge_key: String,
    pub pair: String,
    pub direction: Direction,
    pub timeframe: Option<String>,
    pub strategy: Option<String>,
    /// Generation time
    pub timestamp: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub entry_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub risk_reward: Option<Decimal>,
    pub confidence: Option<f64>,
    pub strength: Option<f64>,
    pub score: Option<f64>,
    pub win_rate: Option<f64>,
    pub status: SignalStatus,
    pub decision: Decision,
    /// Strict trade-validity flag
    pub is_valid: bool,
    pub origin: Origin,
}

impl Signal {
    /// Minimal signal; every optional field empty
    pub fn new(
        id: impl Into<String>,
        pair: impl Into<String>,
        direction: Direction,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        Self {
            merge_key: id.clone(),
            id,
            pair: pair.into(),
            direction,
            timeframe: None,
            strategy: None,
            timestamp,
            opened_at: None,
            closed_at: None,
            expires_at: None,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            risk_reward: None,
            confidence: None,
            strength: None,
            score: None,
            win_rate: None,
            status: SignalStatus::Pending,
            decision: Decision::default(),
            is_valid: false,
            origin: Origin::Pull,
        }
    }

    /// `opened_at` when the signal is a live trade, otherwise `timestamp`
    pub fn comparison_time(&self) -> DateTime<Utc> {
        self.opened_at.unwrap_or(self.timestamp)
    }

    /// Linked to a concrete trade instance
    pub fn is_trade_linked(&self) -> bool {
        self.opened_at.is_some() || self.closed_at.is_some()
    }

    /// Entry, stop and target all present
    pub fn is_tradeable(&self) -> bool {
        self.entry_price.is_some() && self.stop_loss.is_some() && self.take_profit.is_some()
    }

    /// Reported status, overridden by expiry
    pub fn effective_status(&self, now: DateTime<Utc>) -> SignalStatus {
        match self.expires_at {
            Some(expires) if expires <= now => SignalStatus::Expired,
            _ => self.status,
        }
    }

    /// Reward over risk from the price plan
    pub fn derived_risk_reward(&self) -> Option<Decimal> {
        let entry = self.entry_price?;
        let risk = entry.checked_sub(self.stop_loss?)?.abs();
        let reward = self.take_profit?.checked_sub(entry)?.abs();
        if risk.is_zero() {
            return None;
        }
        // None when the ratio leaves Decimal's range
        Some(reward.checked_div(risk)?.round_dp(2))
    }
}

impl Mergeable for Signal {
    fn merge_key(&self) -> &str {
        &self.merge_key
    }

    fn recency_ms(&self) -> i64 {
        self.comparison_time().timestamp_millis()
    }
}

/// Composite key for signals not tied to a trade instance
pub fn composite_key(
    pair: &str,
    direction: Direction,
    timeframe: Option<&str>,
    strategy: Option<&str>,
) -> String {
    format!(
        "{}:{}:{}:{}",
        pair,
        direction,
        timeframe.unwrap_or("-"),
        strategy.unwrap_or("-")
    )
}
