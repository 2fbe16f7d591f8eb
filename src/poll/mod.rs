//! Pull path
//!
//! Periodic HTTP fetches of signals, candidates and events, scoped by symbol
//! and timeframe. Results are forwarded to the reconciler as [`PullBatch`]es.

mod http;
mod poller;
mod types;

pub use http::{extract_records, HttpSignalSource};
pub use poller::{Poller, PollerHandle};
pub use types::{FetchScope, PollConfig, PullBatch, PullKind, SourceError};

use async_trait::async_trait;
use serde_json::Value;

/// Trait for pull-path data sources
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Fetch the raw records of one kind under `scope`
    async fn fetch(&self, kind: PullKind, scope: &FetchScope) -> Result<Vec<Value>, SourceError>;
}
