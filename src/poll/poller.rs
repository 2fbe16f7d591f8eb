//! Periodic fetch loops, one per kind

use super::types::{FetchScope, PollConfig, PullBatch, PullKind, SourceError};
use super::SignalSource;
use crate::telemetry::{increment, CounterMetric};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Drives the pull path against a [`SignalSource`]
pub struct Poller {
    source: Arc<dyn SignalSource>,
    config: PollConfig,
    scope: watch::Sender<FetchScope>,
}

impl Poller {
    pub fn new(source: Arc<dyn SignalSource>, config: PollConfig, scope: FetchScope) -> Self {
        let (scope, _) = watch::channel(scope);
        Self {
            source,
            config,
            scope,
        }
    }

    /// Fetch all three kinds concurrently, forwarding each success on its own
    pub async fn refresh_all<T>(&self, output: &mpsc::Sender<T>)
    where
        T: From<PullBatch> + Send,
    {
        let scope = self.scope.borrow().clone();
        let source = self.source.as_ref();
        tokio::join!(
            fetch_and_forward(source, PullKind::Signals, &scope, output),
            fetch_and_forward(source, PullKind::Candidates, &scope, output),
            fetch_and_forward(source, PullKind::Events, &scope, output),
        );
    }

    /// Run the initial refresh, then start one loop per kind
    pub async fn start<T>(self, output: mpsc::Sender<T>) -> PollerHandle
    where
        T: From<PullBatch> + Send + 'static,
    {
        self.refresh_all(&output).await;

        let tasks = PullKind::ALL
            .iter()
            .map(|&kind| {
                let source = self.source.clone();
                let period = self.config.interval(kind);
                let scope_rx = self.scope.subscribe();
                let output = output.clone();
                tokio::spawn(poll_loop(source, kind, period, scope_rx, output))
            })
            .collect();

        tracing::info!(
            signals_secs = self.config.signals_secs,
            candidates_secs = self.config.candidates_secs,
            events_secs = self.config.events_secs,
            "Poller started"
        );

        PollerHandle {
            scope: self.scope,
            tasks,
        }
    }
}

/// Running poll loops; aborted on drop
pub struct PollerHandle {
    scope: watch::Sender<FetchScope>,
    tasks: Vec<JoinHandle<()>>,
}

impl PollerHandle {
    /// Change the fetch scope; in-flight fetches are abandoned and every
    /// loop refetches under the new scope
    pub fn set_scope(&self, scope: FetchScope) {
        self.scope.send_replace(scope);
    }

    pub fn scope(&self) -> FetchScope {
        self.scope.borrow().clone()
    }

    /// Receiver tracking the current scope
    pub fn scope_receiver(&self) -> watch::Receiver<FetchScope> {
        self.scope.subscribe()
    }

    pub fn shutdown(self) {}
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn poll_loop<T>(
    source: Arc<dyn SignalSource>,
    kind: PullKind,
    period: Duration,
    mut scope_rx: watch::Receiver<FetchScope>,
    output: mpsc::Sender<T>,
) where
    T: From<PullBatch> + Send,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately and the initial refresh already ran
    ticker.tick().await;

    let mut refetch = false;
    loop {
        if !refetch {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = scope_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
        refetch = false;

        let scope = scope_rx.borrow_and_update().clone();
        tokio::select! {
            result = source.fetch(kind, &scope) => {
                if !forward(kind, &scope, result, &output).await {
                    return;
                }
            }
            changed = scope_rx.changed() => {
                if changed.is_err() {
                    return;
                }
                tracing::debug!(%kind, ?scope, "Scope changed, abandoning fetch");
                increment(CounterMetric::StaleResponses, 1);
                refetch = true;
            }
        }
    }
}

async fn fetch_and_forward<T>(
    source: &dyn SignalSource,
    kind: PullKind,
    scope: &FetchScope,
    output: &mpsc::Sender<T>,
) where
    T: From<PullBatch> + Send,
{
    let result = source.fetch(kind, scope).await;
    forward(kind, scope, result, output).await;
}

/// Send a successful batch downstream; `false` once downstream is gone
async fn forward<T>(
    kind: PullKind,
    scope: &FetchScope,
    result: Result<Vec<Value>, SourceError>,
    output: &mpsc::Sender<T>,
) -> bool
where
    T: From<PullBatch> + Send,
{
    match result {
        Ok(records) => {
            tracing::debug!(%kind, count = records.len(), "Fetched");
            let batch = PullBatch {
                kind,
                scope: scope.clone(),
                records,
                fetched_at: Utc::now(),
            };
            output.send(T::from(batch)).await.is_ok()
        }
        Err(e) => {
            tracing::warn!(%kind, error = %e, "Fetch failed, keeping previous state");
            increment(CounterMetric::FetchFailures, 1);
            true
        }
    }
}
