//! Access counting for pre-warming

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counts document accesses and reports the documents read often enough to
/// be kept warm.
///
/// Counters only grow; they are cleared by [`reset`](Self::reset).
#[derive(Debug)]
pub struct HotDocumentTracker {
    counts: DashMap<String, AtomicU64>,
    threshold: u64,
}

impl HotDocumentTracker {
    pub fn new(threshold: u64) -> Self {
        Self {
            counts: DashMap::new(),
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Record one access; returns `true` when this access made `path` hot
    pub fn record_access(&self, path: &str) -> bool {
        let count = match self.counts.get(path) {
            Some(counter) => counter.fetch_add(1, Ordering::Relaxed) + 1,
            None => {
                let entry = self
                    .counts
                    .entry(path.to_string())
                    .or_insert_with(|| AtomicU64::new(0));
                entry.fetch_add(1, Ordering::Relaxed) + 1
            }
        };
        count == self.threshold
    }

    pub fn access_count(&self, path: &str) -> u64 {
        self.counts
            .get(path)
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }

    pub fn is_hot(&self, path: &str) -> bool {
        self.access_count(path) >= self.threshold
    }

    /// Hot documents, most accessed first
    pub fn hot_documents(&self) -> Vec<(String, u64)> {
        let mut hot: Vec<(String, u64)> = self
            .counts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .filter(|(_, count)| *count >= self.threshold)
            .collect();
        hot.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        hot
    }

    /// Stop tracking `path`; returns whether it was tracked
    pub fn forget(&self, path: &str) -> bool {
        self.counts.remove(path).is_some()
    }

    /// Number of documents with at least one recorded access
    pub fn tracked(&self) -> usize {
        self.counts.len()
    }

    pub fn reset(&self) {
        self.counts.clear();
    }
}
