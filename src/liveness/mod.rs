//! Liveness tracking
//!
//! A source counts as live when a bridge heartbeat or, failing that, a data
//! update arrived within the freshness window.

mod tracker;
mod types;

pub use tracker::{is_source_live, primary_session, LivenessTracker};
pub use types::{normalize_heartbeat, BridgeSession, FRESHNESS_WINDOW};
