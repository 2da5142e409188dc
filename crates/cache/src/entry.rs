//! Cache entry stored by [`TtlLruCache`](crate::TtlLruCache)

use std::time::Duration;
use tokio::time::Instant;

/// One cached value with the time and version it was stored at.
///
/// Entries are replaced wholesale on update and never mutated in place.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
    pub version: u64,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, version: u64) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            version,
        }
    }

    /// Age of the entry at `now`
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }

    /// An entry is fresh while its age does not exceed `ttl`
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        self.age(now) > ttl
    }
}
