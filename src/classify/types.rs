//! Classifier types

use crate::signal::Signal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output bucket of the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    /// High-conviction ENTER signals
    Strict,
    /// ENTER signals under the configurable thresholds
    Relaxed,
    /// WAIT_MONITOR signals worth watching
    Watch,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Strict => write!(f, "STRICT"),
            Tier::Relaxed => write!(f, "RELAXED"),
            Tier::Watch => write!(f, "WATCH"),
        }
    }
}

/// Minimum confidence and strength, both on a 0-100 scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub min_confidence: f64,
    pub min_strength: f64,
}

impl Thresholds {
    pub fn new(min_confidence: f64, min_strength: f64) -> Self {
        Self {
            min_confidence,
            min_strength,
        }
    }

    /// Clamp both values into `[0, 100]`; NaN becomes 0
    pub fn clamped(self) -> Self {
        Self {
            min_confidence: clamp_score(self.min_confidence),
            min_strength: clamp_score(self.min_strength),
        }
    }
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Classifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub strict_min_confidence: f64,
    pub strict_min_strength: f64,
    pub relaxed_min_confidence: f64,
    pub relaxed_min_strength: f64,
    pub watch_min_confidence: f64,
    pub watch_min_strength: f64,
    /// Cap on signals returned per pass
    pub max_results: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            strict_min_confidence: 75.0,
            strict_min_strength: 60.0,
            relaxed_min_confidence: 45.0,
            relaxed_min_strength: 55.0,
            watch_min_confidence: 20.0,
            watch_min_strength: 10.0,
            max_results: 50,
        }
    }
}

impl ClassifierConfig {
    /// Override the relaxed thresholds, clamped to `[0, 100]`
    pub fn with_relaxed(mut self, min_confidence: f64, min_strength: f64) -> Self {
        let t = Thresholds::new(min_confidence, min_strength).clamped();
        self.relaxed_min_confidence = t.min_confidence;
        self.relaxed_min_strength = t.min_strength;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn strict(&self) -> Thresholds {
        Thresholds::new(self.strict_min_confidence, self.strict_min_strength).clamped()
    }

    pub fn relaxed(&self) -> Thresholds {
        Thresholds::new(self.relaxed_min_confidence, self.relaxed_min_strength).clamped()
    }

    pub fn watch(&self) -> Thresholds {
        Thresholds::new(self.watch_min_confidence, self.watch_min_strength).clamped()
    }
}

/// Result of a classification run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub tier: Tier,
    pub signals: Vec<Signal>,
    /// Human-readable description of the pass that produced `signals`
    pub mode_label: String,
    /// Candidates were used because the primary pool was empty
    pub used_fallback: bool,
}
