//! Run command implementation

use crate::coalesce::Coalescer;
use crate::config::Config;
use crate::pipeline::{
    push_handler, request_snapshot, run_reconciler, spawn_push_queue, PipelineInput, Reconciler, Snapshot,
};
use crate::poll::{FetchScope, HttpSignalSource, Poller};
use crate::ws::{SharedConnection, WsConnector};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Reconciler input queue depth
const INPUT_BUFFER: usize = 1024;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Event stream URL (overrides transport.ws_url)
    #[arg(long)]
    pub ws_url: Option<String>,

    /// Signal API base URL (overrides poll.api_url)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Restrict fetches to one symbol
    #[arg(long)]
    pub symbol: Option<String>,

    /// Restrict fetches to one timeframe
    #[arg(long)]
    pub timeframe: Option<String>,

    /// Seconds between snapshot reports
    #[arg(long, default_value = "30")]
    pub report_every_secs: u64,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let ws_url = self.ws_url.clone().or_else(|| config.transport.ws_url.clone());
        let api_url = self.api_url.clone().or_else(|| config.poll.api_url.clone());
        if ws_url.is_none() && api_url.is_none() {
            anyhow::bail!("Nothing to do: set a stream URL (--ws-url) or an API URL (--api-url)");
        }

        let scope = FetchScope::new(self.symbol.clone(), self.timeframe.clone());
        let (inputs_tx, inputs_rx) = mpsc::channel::<PipelineInput>(INPUT_BUFFER);

        let reconciler = Reconciler::new(&config.store, config.classifier.clone())
            .with_freshness(config.liveness.freshness())
            .with_scope(scope.clone());

        let poller = match &api_url {
            Some(url) => {
                let source = HttpSignalSource::new(url.as_str(), config.poll.timeout())?;
                tracing::info!(api_url = %url, ?scope, "Polling signal API");
                let poller = Poller::new(Arc::new(source), config.poll.clone(), scope.clone());
                Some(poller.start(inputs_tx.clone()).await)
            }
            None => None,
        };

        let scope_rx = poller.as_ref().map(|p| p.scope_receiver());
        let reconciler_task = tokio::spawn(run_reconciler(reconciler, inputs_rx, scope_rx));

        let coalescer = Coalescer::spawn(config.coalescer.flush_delay(), inputs_tx.clone());

        let (connection, subscription) = match &ws_url {
            Some(url) => {
                let ws_config = config.transport.ws_config(url.as_str());
                let connection = SharedConnection::spawn(ws_config.clone(), WsConnector::new(ws_config));
                let pushes = spawn_push_queue(inputs_tx.clone());
                let subscription = connection.subscribe(push_handler(pushes, coalescer.sender()));
                tracing::info!(ws_url = %url, "Subscribed to signal stream");
                (Some(connection), Some(subscription))
            }
            None => (None, None),
        };

        let mut ticker = interval(Duration::from_secs(self.report_every_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match request_snapshot(&inputs_tx).await {
                        Some(snapshot) => report(&snapshot, connection.as_ref()),
                        None => {
                            tracing::error!("Reconciler stopped unexpectedly");
                            break;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutting down");
                    break;
                }
            }
        }

        drop(subscription);
        drop(poller);
        reconciler_task.abort();
        Ok(())
    }
}

fn report(snapshot: &Snapshot, connection: Option<&SharedConnection>) {
    let classification = &snapshot.classification;
    let transport = connection
        .map(|c| c.state().to_string())
        .unwrap_or_else(|| "off".to_string());
    tracing::info!(
        tier = %classification.tier,
        mode = %classification.mode_label,
        shown = classification.signals.len(),
        signals = snapshot.signal_count,
        candidates = snapshot.candidate_count,
        events = snapshot.event_count,
        quotes = snapshot.quote_count,
        live = snapshot.live,
        transport = %transport,
        "Snapshot"
    );

    for signal in &classification.signals {
        tracing::info!(
            pair = %signal.pair,
            direction = %signal.direction,
            timeframe = signal.timeframe.as_deref().unwrap_or("-"),
            confidence = ?signal.confidence,
            strength = ?signal.strength,
            entry = ?signal.entry_price,
            "Signal"
        );
    }
}
