//! Bounded merge-by-key stores
//!
//! One dedup/cap primitive backs both the signal stores and the operational
//! event log. Entries are grouped by key, the most recent entry per key
//! survives, and the result is ordered newest first and truncated to a cap.

mod merge;

pub use merge::{merge_capped, MergeStats};

use serde::{Deserialize, Serialize};

/// Capacity of each store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub signal_cap: usize,
    pub candidate_cap: usize,
    pub event_cap: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            signal_cap: 200,
            candidate_cap: 200,
            event_cap: 28,
        }
    }
}

/// A record that can live in a [`BoundedStore`]
pub trait Mergeable: Clone {
    /// Deduplication key; empty keys are dropped on merge
    fn merge_key(&self) -> &str;
    /// Comparison timestamp in epoch milliseconds
    fn recency_ms(&self) -> i64;
}

/// Ordered, deduplicated, capped collection
///
/// Only [`BoundedStore::merge`] mutates the contents.
#[derive(Debug, Clone)]
pub struct BoundedStore<T> {
    items: Vec<T>,
    cap: usize,
}

impl<T: Mergeable> BoundedStore<T> {
    /// Create an empty store holding at most `cap` entries
    pub fn new(cap: usize) -> Self {
        Self {
            items: Vec::new(),
            cap,
        }
    }

    /// Merge a batch of newly observed records
    ///
    /// An empty batch leaves the store untouched.
    pub fn merge(&mut self, incoming: Vec<T>) -> MergeStats {
        let received = incoming.len();
        if incoming.is_empty() {
            return MergeStats {
                received,
                len: self.items.len(),
                ..Default::default()
            };
        }

        let (merged, stats) = merge_capped(&self.items, incoming, self.cap);
        self.items = merged;
        stats
    }

    /// Entries, newest first
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.items.iter().find(|item| item.merge_key() == key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}
