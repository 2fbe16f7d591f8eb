//! Per-symbol price updates

use crate::normalize::{field_decimal, field_str, field_time};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Latest known price for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub last: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Midpoint of bid and ask, else the last trade
    pub fn mid(&self) -> Option<Decimal> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => self.last,
        }
    }
}

/// Normalize a quote payload; requires a symbol and at least one price
pub fn normalize_quote(raw: &Value, now: DateTime<Utc>) -> Option<Quote> {
    let obj = raw.as_object()?;
    let symbol = field_str(obj, &["symbol", "pair", "instrument"])?.to_ascii_uppercase();

    let quote = Quote {
        symbol,
        bid: field_decimal(obj, &["bid", "bidPrice", "bid_price"]),
        ask: field_decimal(obj, &["ask", "askPrice", "ask_price"]),
        last: field_decimal(obj, &["last", "price", "lastPrice", "last_price"]),
        timestamp: field_time(obj, &["timestamp", "time", "ts"], now).unwrap_or(now),
    };

    if quote.bid.is_none() && quote.ask.is_none() && quote.last.is_none() {
        return None;
    }
    Some(quote)
}
