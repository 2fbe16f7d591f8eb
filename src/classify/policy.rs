//! Tier policies and the fallback driver

use super::types::{Classification, ClassifierConfig, Thresholds, Tier};
use crate::signal::{DecisionState, Signal};
use std::cmp::Ordering;

/// Result of applying a policy to a signal
#[derive(Debug, Clone, PartialEq)]
pub enum FilterResult {
    /// Signal passed every check
    Pass,
    /// Signal rejected
    Reject(RejectReason),
}

/// Reason for signal rejection
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Direction is neither BUY nor SELL
    NotDirectional,
    /// Decision carries the blocked flag
    Blocked,
    /// Decision state outside the policy's gate
    WrongState(DecisionState),
    /// `is_valid` unset where required
    NotValid,
    /// Missing entry, stop or target
    NotTradeable,
    /// Confidence absent or below threshold
    ConfidenceTooLow(Option<f64>),
    /// Strength absent or below threshold
    StrengthTooLow(Option<f64>),
}

/// Which decision states a policy admits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// ENTER, ENTER_STRONG, ENTER_TRADE
    Enter,
    /// WAIT_MONITOR
    WaitMonitor,
}

impl Gate {
    fn admits(&self, state: DecisionState) -> bool {
        match self {
            Gate::Enter => state.is_enter(),
            Gate::WaitMonitor => state == DecisionState::WaitMonitor,
        }
    }
}

/// Output ordering of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    /// Keep pool order
    Pool,
    /// Strength, then confidence, then recency, all descending
    Strength,
}

/// One named pass of the classifier
#[derive(Debug, Clone, PartialEq)]
pub struct TierPolicy {
    pub tier: Tier,
    pub gate: Gate,
    pub thresholds: Thresholds,
    pub require_valid: bool,
    pub ranking: Ranking,
}

impl TierPolicy {
    pub fn strict(thresholds: Thresholds) -> Self {
        Self {
            tier: Tier::Strict,
            gate: Gate::Enter,
            thresholds,
            require_valid: true,
            ranking: Ranking::Pool,
        }
    }

    pub fn relaxed(thresholds: Thresholds) -> Self {
        Self {
            tier: Tier::Relaxed,
            ..Self::strict(thresholds)
        }
    }

    pub fn watch(thresholds: Thresholds) -> Self {
        Self {
            tier: Tier::Watch,
            gate: Gate::WaitMonitor,
            thresholds,
            require_valid: false,
            ranking: Ranking::Strength,
        }
    }

    /// Run every check against one signal
    pub fn apply(&self, signal: &Signal) -> FilterResult {
        if !signal.direction.is_directional() {
            return FilterResult::Reject(RejectReason::NotDirectional);
        }
        if signal.decision.blocked {
            return FilterResult::Reject(RejectReason::Blocked);
        }
        if !self.gate.admits(signal.decision.state) {
            return FilterResult::Reject(RejectReason::WrongState(signal.decision.state));
        }
        if self.require_valid && !signal.is_valid {
            return FilterResult::Reject(RejectReason::NotValid);
        }
        if !signal.is_tradeable() {
            return FilterResult::Reject(RejectReason::NotTradeable);
        }
        if !meets(signal.confidence, self.thresholds.min_confidence) {
            return FilterResult::Reject(RejectReason::ConfidenceTooLow(signal.confidence));
        }
        if !meets(signal.strength, self.thresholds.min_strength) {
            return FilterResult::Reject(RejectReason::StrengthTooLow(signal.strength));
        }
        FilterResult::Pass
    }

    pub fn accepts(&self, signal: &Signal) -> bool {
        self.apply(signal) == FilterResult::Pass
    }

    /// Passing signals in output order, at most `limit`
    pub fn select(&self, pool: &[Signal], limit: usize) -> Vec<Signal> {
        let mut selected: Vec<Signal> = pool.iter().filter(|s| self.accepts(s)).cloned().collect();
        if self.ranking == Ranking::Strength {
            selected.sort_by(by_strength);
        }
        selected.truncate(limit);
        selected
    }

    pub fn label(&self, fallback: bool) -> String {
        let suffix = if fallback { ", fallback pool" } else { "" };
        match self.tier {
            Tier::Strict => format!("ENTER only (strict{})", suffix),
            Tier::Relaxed => format!(
                "ENTER relaxed (conf>={}, str>={}{})",
                self.thresholds.min_confidence, self.thresholds.min_strength, suffix
            ),
            Tier::Watch => format!("WATCH (wait/monitor{})", suffix),
        }
    }
}

/// Missing scores never satisfy a threshold
fn meets(value: Option<f64>, min: f64) -> bool {
    value.is_some_and(|v| v >= min)
}

fn by_strength(a: &Signal, b: &Signal) -> Ordering {
    let score = |v: Option<f64>| v.unwrap_or(f64::MIN);
    score(b.strength)
        .total_cmp(&score(a.strength))
        .then_with(|| score(b.confidence).total_cmp(&score(a.confidence)))
        .then_with(|| b.comparison_time().cmp(&a.comparison_time()))
}

/// Policies in evaluation order: strict, relaxed, watch
pub fn ladder(config: &ClassifierConfig) -> Vec<TierPolicy> {
    vec![
        TierPolicy::strict(config.strict()),
        TierPolicy::relaxed(config.relaxed()),
        TierPolicy::watch(config.watch()),
    ]
}

/// Classify the primary pool, falling back to candidates when it is empty
///
/// The first policy with a non-empty result wins; the last one is terminal
/// and may return nothing.
pub fn classify(primary: &[Signal], candidates: &[Signal], config: &ClassifierConfig) -> Classification {
    let used_fallback = primary.is_empty() && !candidates.is_empty();
    let pool = if used_fallback { candidates } else { primary };

    let policies = ladder(config);
    let mut last = None;
    for policy in &policies {
        let signals = policy.select(pool, config.max_results);
        if !signals.is_empty() {
            return Classification {
                tier: policy.tier,
                signals,
                mode_label: policy.label(used_fallback),
                used_fallback,
            };
        }
        last = Some(policy);
    }

    let terminal = last.map(|p| (p.tier, p.label(used_fallback)));
    let (tier, mode_label) = terminal.unwrap_or((Tier::Watch, String::new()));
    Classification {
        tier,
        signals: Vec::new(),
        mode_label,
        used_fallback,
    }
}
