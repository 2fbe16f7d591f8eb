//! signal-desk: reconciles pushed and polled trading signals into a bounded,
//! tiered view
//!
//! This library provides the core components for:
//! - One shared, reference-counted WebSocket connection with fixed-delay reconnect
//! - Periodic HTTP polling of signals, candidates and events
//! - Boundary normalization of loosely typed producer records
//! - Merge-by-key stores with recency tie-break and a size cap
//! - Strict / relaxed / watch tier classification with a fallback pool
//! - Keyed update coalescing for high-frequency quotes
//! - Source liveness from heartbeats and data freshness
//! - Structured logging and Prometheus metrics

pub mod classify;
pub mod cli;
pub mod coalesce;
pub mod config;
pub mod event;
pub mod liveness;
pub mod normalize;
pub mod pipeline;
pub mod poll;
pub mod signal;
pub mod store;
pub mod telemetry;
pub mod ws;
