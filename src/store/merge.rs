//! The merge-by-key algorithm

use super::Mergeable;
use std::collections::HashMap;

/// Outcome of a single merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Records in the incoming batch
    pub received: usize,
    /// Incoming records dropped for having no key
    pub dropped: usize,
    /// Survivors that fell off the end because of the cap
    pub evicted: usize,
    /// Store length after the merge
    pub len: usize,
}

/// Merge `incoming` into `existing`, keeping the newest entry per key
///
/// Ties on the comparison timestamp go to the later-merged record: incoming
/// beats existing, and within one batch the last record wins. The result is
/// sorted newest first and truncated to `cap`.
pub fn merge_capped<T: Mergeable>(
    existing: &[T],
    incoming: Vec<T>,
    cap: usize,
) -> (Vec<T>, MergeStats) {
    let received = incoming.len();
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(existing.len() + received);
    let mut survivors: Vec<T> = Vec::with_capacity(existing.len() + received);
    let mut dropped = 0;

    let candidates = existing
        .iter()
        .cloned()
        .map(|item| (item, false))
        .chain(incoming.into_iter().map(|item| (item, true)));

    for (item, is_incoming) in candidates {
        if item.merge_key().is_empty() {
            if is_incoming {
                dropped += 1;
            }
            continue;
        }

        match slots.get(item.merge_key()) {
            Some(&slot) => {
                if item.recency_ms() >= survivors[slot].recency_ms() {
                    survivors[slot] = item;
                }
            }
            None => {
                slots.insert(item.merge_key().to_string(), survivors.len());
                survivors.push(item);
            }
        }
    }

    survivors.sort_by(|a, b| b.recency_ms().cmp(&a.recency_ms()));

    let evicted = survivors.len().saturating_sub(cap);
    survivors.truncate(cap);

    let stats = MergeStats {
        received,
        dropped,
        evicted,
        len: survivors.len(),
    };
    (survivors, stats)
}
