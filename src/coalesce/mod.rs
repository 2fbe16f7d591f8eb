//! Update coalescing
//!
//! High-frequency keyed updates (per-symbol quotes) are buffered into a map
//! and flushed as one batch on a fixed timer, so downstream state changes once
//! per period instead of once per network message.

mod quote;

pub use quote::{normalize_quote, Quote};

use crate::telemetry::{increment, CounterMetric};
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Default flush delay
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_millis(650);

/// Latest-wins buffer of keyed updates
#[derive(Debug)]
pub struct CoalesceBuffer<K, V> {
    pending: HashMap<K, V>,
}

impl<K: Eq + Hash, V> CoalesceBuffer<K, V> {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }

    /// Buffer an update, replacing any pending one for the same key
    ///
    /// Returns `true` when this is the first update since the last drain,
    /// i.e. when the caller should arm the flush timer.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let first = self.pending.is_empty();
        self.pending.insert(key, value);
        first
    }

    /// Take everything buffered so far
    pub fn drain(&mut self) -> HashMap<K, V> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<K: Eq + Hash, V> Default for CoalesceBuffer<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Running coalescer task
pub struct Coalescer<K, V> {
    input: mpsc::UnboundedSender<(K, V)>,
    task: JoinHandle<()>,
}

impl<K, V> Coalescer<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Send + 'static,
{
    /// Spawn a coalescer delivering batches to `output` every `flush_delay`
    pub fn spawn<T>(flush_delay: Duration, output: mpsc::Sender<T>) -> Self
    where
        T: From<HashMap<K, V>> + Send + 'static,
    {
        let (input, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_coalescer(flush_delay, rx, output));
        Self { input, task }
    }

    /// Sender side for producers; never blocks
    pub fn sender(&self) -> mpsc::UnboundedSender<(K, V)> {
        self.input.clone()
    }

    /// Buffer one update
    pub fn push(&self, key: K, value: V) {
        let _ = self.input.send((key, value));
    }

    /// Stop accepting input, flush what is pending and wait for the task
    ///
    /// Completes once every other sender handed out by [`Coalescer::sender`]
    /// has been dropped too.
    pub async fn shutdown(self) {
        drop(self.input);
        let _ = self.task.await;
    }
}

async fn run_coalescer<K, V, T>(
    flush_delay: Duration,
    mut input: mpsc::UnboundedReceiver<(K, V)>,
    output: mpsc::Sender<T>,
) where
    K: Eq + Hash,
    T: From<HashMap<K, V>>,
{
    let mut buffer = CoalesceBuffer::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let flush_at = deadline;
        tokio::select! {
            update = input.recv() => match update {
                Some((key, value)) => {
                    if buffer.insert(key, value) {
                        deadline = Some(Instant::now() + flush_delay);
                    }
                }
                None => break,
            },
            _ = async {
                match flush_at {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            } => {
                deadline = None;
                if !flush(&mut buffer, &output).await {
                    return;
                }
            }
        }
    }

    if !buffer.is_empty() {
        flush(&mut buffer, &output).await;
    }
}

/// Deliver the buffer as one batch; `false` once downstream is gone
async fn flush<K, V, T>(buffer: &mut CoalesceBuffer<K, V>, output: &mpsc::Sender<T>) -> bool
where
    K: Eq + Hash,
    T: From<HashMap<K, V>>,
{
    let batch = buffer.drain();
    let size = batch.len();
    if output.send(T::from(batch)).await.is_err() {
        tracing::debug!("Coalescer output dropped, stopping");
        return false;
    }
    increment(CounterMetric::CoalescerFlushes, 1);
    tracing::trace!(keys = size, "Coalescer flushed");
    true
}
