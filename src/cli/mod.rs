//! CLI interface for signal-desk
//!
//! Provides subcommands for:
//! - `run`: Stream and poll signals, logging the tiered view periodically
//! - `classify`: Classify signals from JSON files offline
//! - `config`: Show the effective configuration

mod classify;
mod run;

pub use classify::ClassifyArgs;
pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "signal-desk")]
#[command(about = "Reconciles pushed and polled trading signals into a tiered view")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the signal stream and API
    Run(RunArgs),
    /// Classify signals from JSON files
    Classify(ClassifyArgs),
    /// Show configuration
    Config,
}
