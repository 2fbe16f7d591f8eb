//! Signal model
//!
//! Strict internal signal records and the boundary normalizer that builds
//! them from loosely typed producer payloads.

mod normalize;
mod types;

pub use normalize::{normalize_signal, normalize_signals};
pub use types::{
    composite_key, Decision, DecisionState, Direction, Origin, Signal, SignalStatus,
};
