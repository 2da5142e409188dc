//! Bounded LRU cache with per-entry time-to-live
//!
//! Every operation takes the cache mutex for a short, non-blocking critical
//! section. No I/O ever happens while the mutex is held; slow computations go
//! through [`TtlLruCache::get_or_compute`], which serializes them per key via
//! a [`KeyLockManager`].

use doclib_core::Result;
use lru::LruCache;
use parking_lot::Mutex;
use std::future::Future;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::entry::CacheEntry;
use crate::lock::KeyLockManager;
use crate::stats::{CacheCounters, CacheStats};
use crate::version::GlobalVersion;


/// Separator between the cache name and the entry key in lock keys
pub const LOCK_KEY_SEPARATOR: char = ':';

/// A named, bounded, TTL-expiring LRU cache.
///
/// Values are cloned out on read, so `V` is usually an `Arc` or a small
/// owned type. Entries are stamped with the [`GlobalVersion`] current at
/// insertion; [`get_if_current`](Self::get_if_current) rejects entries
/// stamped before the latest invalidation.
pub struct TtlLruCache<V> {
    name: String,
    ttl: Duration,
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    counters: CacheCounters,
    version: GlobalVersion,
}

enum Lookup<V> {
    Fresh(V),
    Expired,
    Outdated,
    Rejected,
    Absent,
}

impl<V: Clone> TtlLruCache<V> {
    /// Create a cache holding at most `capacity` entries (minimum one)
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
        ttl: Duration,
        version: GlobalVersion,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            name: name.into(),
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
            counters: CacheCounters::default(),
            version,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The version counter entries are stamped with
    pub fn version(&self) -> &GlobalVersion {
        &self.version
    }

    /// Fetch a fresh value and mark it most recently used.
    ///
    /// An expired entry is removed and counts as both an expiration and a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        self.lookup(key, None, |_| true)
    }

    /// Like [`get`](Self::get), but an entry for which `is_valid` returns
    /// `false` is removed and counted as a miss.
    pub fn get_valid<F>(&self, key: &str, is_valid: F) -> Option<V>
    where
        F: Fn(&V) -> bool,
    {
        self.lookup(key, None, is_valid)
    }

    /// Like [`get`](Self::get), but also treats entries stamped before the
    /// current global version as misses and drops them.
    pub fn get_if_current(&self, key: &str) -> Option<V> {
        let current = self.version.current();
        self.lookup(key, Some(current), |_| true)
    }

    fn lookup<F>(&self, key: &str, min_version: Option<u64>, is_valid: F) -> Option<V>
    where
        F: Fn(&V) -> bool,
    {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let state = match entries.get(key) {
            None => Lookup::Absent,
            Some(entry) if entry.is_expired(self.ttl, now) => Lookup::Expired,
            Some(entry) if min_version.is_some_and(|v| entry.version < v) => Lookup::Outdated,
            Some(entry) if !is_valid(&entry.value) => Lookup::Rejected,
            Some(entry) => Lookup::Fresh(entry.value.clone()),
        };

        match state {
            Lookup::Fresh(value) => {
                self.counters.record_hit();
                Some(value)
            }
            Lookup::Expired => {
                entries.pop(key);
                self.counters.record_expirations(1);
                self.counters.record_miss();
                trace!(cache = %self.name, key, "entry expired");
                None
            }
            Lookup::Outdated => {
                entries.pop(key);
                self.counters.record_miss();
                trace!(cache = %self.name, key, "entry outdated by invalidation");
                None
            }
            Lookup::Rejected => {
                entries.pop(key);
                self.counters.record_miss();
                trace!(cache = %self.name, key, "entry rejected by validator");
                None
            }
            Lookup::Absent => {
                self.counters.record_miss();
                None
            }
        }
    }

    /// Read a fresh value without touching recency or statistics
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.entries
            .lock()
            .peek(key)
            .filter(|entry| !entry.is_expired(self.ttl, now))
            .map(|entry| entry.value.clone())
    }

    /// Like [`peek`](Self::peek), additionally rejecting outdated entries
    pub fn peek_current(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let current = self.version.current();
        self.entries
            .lock()
            .peek(key)
            .filter(|entry| !entry.is_expired(self.ttl, now) && entry.version >= current)
            .map(|entry| entry.value.clone())
    }

    /// Whether a fresh entry exists for `key`
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(self.ttl, now))
    }

    /// Insert or replace, stamped with the current global version
    pub fn put(&self, key: impl Into<String>, value: V) {
        let version = self.version.current();
        self.put_versioned(key, value, version);
    }

    /// Insert or replace with an explicit version stamp.
    ///
    /// Used by producers that captured the version before a slow build so
    /// that an invalidation racing with the build outdates the result.
    pub fn put_versioned(&self, key: impl Into<String>, value: V, version: u64) {
        let key = key.into();
        let mut entries = self.entries.lock();

        if !entries.contains(&key) && entries.len() >= entries.cap().get() {
            if let Some((evicted, _)) = entries.pop_lru() {
                self.counters.record_eviction();
                trace!(cache = %self.name, key = %evicted, "evicted least recently used entry");
            }
        }

        entries.put(key, CacheEntry::new(value, version));
    }

    /// Remove one entry; returns whether it existed
    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    /// Remove every entry whose key matches `predicate`
    pub fn remove_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let mut entries = self.entries.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    /// Drop all entries; returns how many were removed
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let removed = entries.len();
        entries.clear();
        removed
    }

    /// Remove all expired entries; returns how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        drop(entries);

        if !expired.is_empty() {
            self.counters.record_expirations(expired.len() as u64);
            debug!(cache = %self.name, removed = expired.len(), "removed expired entries");
        }
        expired.len()
    }

    /// Keys currently held, most recently used first
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn stats(&self) -> CacheStats {
        let (size, capacity) = {
            let entries = self.entries.lock();
            (entries.len(), entries.cap().get())
        };
        self.counters.snapshot(&self.name, size, capacity)
    }

    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    /// Lock key guarding computations of `key` in this cache
    pub fn lock_key(&self, key: &str) -> String {
        format!("{}{}{}", self.name, LOCK_KEY_SEPARATOR, key)
    }

    /// Return the cached value or compute it at most once across concurrent
    /// callers.
    ///
    /// Waiters re-check the cache after acquiring the key lock and reuse the
    /// leader's value, or its error when the leader failed. Only successful
    /// results are stored.
    pub async fn get_or_compute<F, Fut>(
        &self,
        locks: &KeyLockManager,
        key: &str,
        compute: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        self.fill(locks, key, compute).await
    }

    /// [`get_or_compute`](Self::get_or_compute) with version checking on
    /// both the fast path and the re-check.
    pub async fn get_or_compute_current<F, Fut>(
        &self,
        locks: &KeyLockManager,
        key: &str,
        compute: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get_if_current(key) {
            return Ok(value);
        }
        self.fill_with(locks, key, true, compute).await
    }

    /// The slow path of [`get_or_compute`](Self::get_or_compute), for callers
    /// that already checked the cache themselves.
    pub async fn fill<F, Fut>(&self, locks: &KeyLockManager, key: &str, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        self.fill_with(locks, key, false, compute).await
    }

    async fn fill_with<F, Fut>(
        &self,
        locks: &KeyLockManager,
        key: &str,
        require_current: bool,
        compute: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let lock_key = self.lock_key(key);
        locks
            .with_lock(
                &lock_key,
                || {
                    if require_current {
                        self.peek_current(key)
                    } else {
                        self.peek(key)
                    }
                },
                move || async move {
                    let version = self.version.current();
                    let value = compute().await?;
                    self.put_versioned(key, value.clone(), version);
                    Ok(value)
                },
            )
            .await
    }
}

impl<V> std::fmt::Debug for TtlLruCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlLruCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("len", &self.entries.lock().len())
            .finish()
    }
}
