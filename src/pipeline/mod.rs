//! Reconciliation pipeline
//!
//! The push path (shared WebSocket), the pull path (poll loops) and the quote
//! coalescer all feed one channel. A single task owns the [`Reconciler`] and
//! applies inputs one at a time, so store mutations never interleave.

mod reconciler;
mod route;

pub use reconciler::{Applied, Reconciler, Snapshot};
pub use route::Route;

use crate::coalesce::{normalize_quote, Quote};
use crate::normalize::records;
use crate::poll::{FetchScope, PullBatch};
use crate::telemetry::{increment, CounterMetric};
use crate::ws::Envelope;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot, watch};

const QUOTE_WRAPPERS: &[&str] = &["quotes", "ticks", "prices", "items", "data"];

/// Everything the reconciler task consumes
#[derive(Debug)]
pub enum PipelineInput {
    /// Envelope from the push path
    Push(Envelope),
    /// Batch from the pull path
    Pulled(PullBatch),
    /// Coalesced quotes keyed by symbol
    Quotes(HashMap<String, Quote>),
    /// Request for a snapshot of the current state
    Snapshot(oneshot::Sender<Snapshot>),
}

impl From<PullBatch> for PipelineInput {
    fn from(batch: PullBatch) -> Self {
        PipelineInput::Pulled(batch)
    }
}

impl From<HashMap<String, Quote>> for PipelineInput {
    fn from(quotes: HashMap<String, Quote>) -> Self {
        PipelineInput::Quotes(quotes)
    }
}

/// Own the reconciler until every input sender is dropped, then hand it back
///
/// When `scope` is given, pulled batches are checked against its latest value.
pub async fn run_reconciler(
    mut reconciler: Reconciler,
    mut inputs: mpsc::Receiver<PipelineInput>,
    scope: Option<watch::Receiver<FetchScope>>,
) -> Reconciler {
    while let Some(input) = inputs.recv().await {
        let now = Utc::now();
        match input {
            PipelineInput::Push(envelope) => {
                let applied = reconciler.apply_envelope(&envelope, now);
                tracing::trace!(kind = %envelope.kind, ?applied, "Applied push");
            }
            PipelineInput::Pulled(batch) => {
                if let Some(scope) = &scope {
                    let current = scope.borrow().clone();
                    if &current != reconciler.scope() {
                        reconciler.set_scope(current);
                    }
                }
                let applied = reconciler.apply_pull(&batch, now);
                tracing::debug!(kind = %batch.kind, records = batch.records.len(), ?applied, "Applied pull");
            }
            PipelineInput::Quotes(quotes) => {
                reconciler.apply_quotes(quotes, now);
            }
            PipelineInput::Snapshot(reply) => {
                let _ = reply.send(reconciler.snapshot(now));
            }
        }
    }
    tracing::debug!("Reconciler inputs closed");
    reconciler
}

/// Ask the reconciler task for a snapshot; `None` once it has stopped
pub async fn request_snapshot(inputs: &mpsc::Sender<PipelineInput>) -> Option<Snapshot> {
    let (tx, rx) = oneshot::channel();
    inputs.send(PipelineInput::Snapshot(tx)).await.ok()?;
    rx.await.ok()
}

/// Lossless queue for pushed envelopes
///
/// Envelopes buffer without bound and a forwarding task feeds them to the
/// reconciler input in arrival order, waiting whenever that input is full.
pub fn spawn_push_queue(inputs: mpsc::Sender<PipelineInput>) -> mpsc::UnboundedSender<Envelope> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            if inputs.send(PipelineInput::Push(envelope)).await.is_err() {
                tracing::debug!("Reconciler stopped, closing push queue");
                break;
            }
        }
    });
    tx
}

/// Subscriber for the shared connection
///
/// Quote envelopes go to the coalescer; everything else to the push queue
/// from [`spawn_push_queue`]. Neither path drops on a burst.
pub fn push_handler(
    pushes: mpsc::UnboundedSender<Envelope>,
    quotes: mpsc::UnboundedSender<(String, Quote)>,
) -> impl Fn(&Envelope) -> anyhow::Result<()> + Send + Sync + 'static {
    move |envelope: &Envelope| {
        if Route::of(&envelope.kind) == Route::Quote {
            let mut dropped = 0;
            for raw in records(&envelope.payload, QUOTE_WRAPPERS) {
                match normalize_quote(raw, envelope.timestamp) {
                    Some(quote) => {
                        quotes
                            .send((quote.symbol.clone(), quote))
                            .map_err(|_| anyhow::anyhow!("Coalescer stopped"))?;
                    }
                    None => dropped += 1,
                }
            }
            increment(CounterMetric::RecordsDropped, dropped);
            return Ok(());
        }

        pushes
            .send(envelope.clone())
            .map_err(|_| anyhow::anyhow!("Push queue closed"))
    }
}
