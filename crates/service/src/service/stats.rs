//! Service-wide statistics

use doclib_cache::CacheStats;
use serde::Serialize;
use std::sync::atomic::Ordering;

use super::DocService;

/// Snapshot of every cache plus lock, access and watcher state
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub version: u64,
    pub caches: Vec<CacheStats>,
    pub locks: usize,
    pub locks_in_use: usize,
    pub hot_documents: usize,
    pub tracked_documents: usize,
    /// Document bodies read from disk since startup
    pub file_reads: u64,
    pub watcher_alive: bool,
}

impl ServiceStats {
    /// Statistics of the cache called `name`
    pub fn cache(&self, name: &str) -> Option<&CacheStats> {
        self.caches.iter().find(|stats| stats.name == name)
    }
}

impl DocService {
    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            version: self.version.current(),
            caches: vec![
                self.content.stats(),
                self.metadata.stats(),
                self.degraded.stats(),
                self.breadcrumbs.stats(),
                self.trees.stats(),
                self.recent.stats(),
            ],
            locks: self.locks.len(),
            locks_in_use: self.locks.in_use(),
            hot_documents: self.hot.hot_documents().len(),
            tracked_documents: self.hot.tracked(),
            file_reads: self.file_reads.load(Ordering::Relaxed),
            watcher_alive: self.watcher_alive(),
        }
    }
}
