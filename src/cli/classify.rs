//! Classify command implementation

use crate::classify::{classify, Classification, ClassifierConfig};
use crate::config::Config;
use crate::poll::extract_records;
use crate::signal::{normalize_signals, Origin, Signal};
use crate::store::BoundedStore;
use chrono::{DateTime, Utc};
use clap::Args;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// JSON file with primary signals
    #[arg(long)]
    pub input: PathBuf,

    /// JSON file with fallback candidates
    #[arg(long)]
    pub candidates: Option<PathBuf>,

    /// Relaxed pass minimum confidence
    #[arg(long)]
    pub relaxed_confidence: Option<f64>,

    /// Relaxed pass minimum strength
    #[arg(long)]
    pub relaxed_strength: Option<f64>,

    /// Output format: json or table
    #[arg(long, default_value = "table")]
    pub format: String,
}

impl ClassifyArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let result = self.classify(config, Utc::now())?;
        match self.format.as_str() {
            "json" => println!("{}", serde_json::to_string_pretty(&result)?),
            "table" => print!("{}", render_table(&result)),
            other => anyhow::bail!("Unknown format: {}", other),
        }
        Ok(())
    }

    /// Load, normalize, merge and classify the input files
    pub fn classify(&self, config: &Config, now: DateTime<Utc>) -> anyhow::Result<Classification> {
        let signals = load_store(&self.input, config.store.signal_cap, now)?;
        let candidates = match &self.candidates {
            Some(path) => load_store(path, config.store.candidate_cap, now)?,
            None => Vec::new(),
        };

        let classifier = self.classifier_config(&config.classifier);
        Ok(classify(&signals, &candidates, &classifier))
    }

    fn classifier_config(&self, base: &ClassifierConfig) -> ClassifierConfig {
        let confidence = self.relaxed_confidence.unwrap_or(base.relaxed_min_confidence);
        let strength = self.relaxed_strength.unwrap_or(base.relaxed_min_strength);
        base.clone().with_relaxed(confidence, strength)
    }
}

fn load_store(path: &Path, cap: usize, now: DateTime<Utc>) -> anyhow::Result<Vec<Signal>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let body: Value = serde_json::from_str(&content)?;
    let raws = extract_records(&body);

    let (signals, dropped) = normalize_signals(&raws, Origin::Pull, now);
    if dropped > 0 {
        tracing::warn!(path = %path.display(), dropped, "Skipped malformed records");
    }

    let mut store = BoundedStore::new(cap);
    let stats = store.merge(signals);
    tracing::debug!(path = %path.display(), received = stats.received, kept = stats.len, "Loaded signals");
    Ok(store.items().to_vec())
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Plain-text table of a classification
pub fn render_table(result: &Classification) -> String {
    let mut out = format!(
        "{} | tier {} | {} signal(s)\n",
        result.mode_label,
        result.tier,
        result.signals.len()
    );
    if result.signals.is_empty() {
        return out;
    }

    out.push_str(&format!(
        "{:<10} {:<5} {:<4} {:>5} {:>5} {:>10} {:>10} {:>10} {:>5}\n",
        "PAIR", "DIR", "TF", "CONF", "STR", "ENTRY", "STOP", "TARGET", "RR"
    ));
    for s in &result.signals {
        out.push_str(&format!(
            "{:<10} {:<5} {:<4} {:>5} {:>5} {:>10} {:>10} {:>10} {:>5}\n",
            s.pair,
            s.direction,
            s.timeframe.as_deref().unwrap_or("-"),
            fmt_opt(s.confidence),
            fmt_opt(s.strength),
            fmt_opt(s.entry_price),
            fmt_opt(s.stop_loss),
            fmt_opt(s.take_profit),
            fmt_opt(s.risk_reward),
        ));
    }
    out
}
