//! Tiered classification
//!
//! Signals are bucketed by trying an ordered list of policies (strict ENTER,
//! relaxed ENTER, WAIT_MONITOR watch) and keeping the first non-empty result.

mod policy;
mod types;

pub use policy::{classify, ladder, FilterResult, Gate, Ranking, RejectReason, TierPolicy};
pub use types::{Classification, ClassifierConfig, Thresholds, Tier};
