//! Per-key computation locks
//!
//! At most one computation runs per key at a time. Callers that queue behind
//! a running computation re-check the cache once they hold the lock, and when
//! the computation they waited on failed they receive a clone of its error
//! instead of retrying it.

use dashmap::DashMap;
use doclib_core::{Error, Result};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};


#[derive(Default)]
struct KeyLock {
    mutex: tokio::sync::Mutex<()>,
    /// Callers currently holding or waiting for this lock
    users: AtomicUsize,
    /// Number of computations completed under this lock
    completed: AtomicU64,
    /// Failure of the most recent computation, tagged with its generation
    last_failure: parking_lot::Mutex<Option<(u64, Error)>>,
}

/// Keeps `users` accurate when a waiting future is dropped
struct Registration {
    lock: Arc<KeyLock>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.lock.users.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Registry of lazily created per-key locks
#[derive(Default)]
pub struct KeyLockManager {
    locks: DashMap<String, Arc<KeyLock>>,
}

impl KeyLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, key: &str) -> Registration {
        // The increment happens under the shard lock so reclaim never sees a
        // lock with zero users that is about to be handed out.
        let entry = self.locks.entry(key.to_string()).or_default();
        entry.users.fetch_add(1, Ordering::AcqRel);
        Registration {
            lock: Arc::clone(entry.value()),
        }
    }

    /// Run `compute` for `key` unless `recheck` finds a value first.
    ///
    /// `recheck` runs after the lock is acquired. If another caller completed
    /// a failed computation while this one was waiting, that error is
    /// returned. Dropping the returned future while it waits leaves the lock
    /// usable by everyone else.
    pub async fn with_lock<V, R, F, Fut>(&self, key: &str, recheck: R, compute: F) -> Result<V>
    where
        R: FnOnce() -> Option<V>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let registration = self.register(key);
        let lock = &registration.lock;
        let observed = lock.completed.load(Ordering::Acquire);
        let _guard = lock.mutex.lock().await;

        if let Some(value) = recheck() {
            trace!(key, "value produced while waiting for lock");
            return Ok(value);
        }

        let completed = lock.completed.load(Ordering::Acquire);
        if completed != observed {
            let shared = lock
                .last_failure
                .lock()
                .as_ref()
                .filter(|(generation, _)| *generation == completed)
                .map(|(_, error)| error.clone());
            if let Some(error) = shared {
                debug!(key, error = %error, "sharing failure of concurrent computation");
                return Err(error);
            }
        }

        let result = compute().await;
        let generation = lock.completed.fetch_add(1, Ordering::AcqRel) + 1;
        *lock.last_failure.lock() = result
            .as_ref()
            .err()
            .map(|error| (generation, error.clone()));
        result
    }

    /// Drop locks that nobody uses and whose key `is_live` no longer reports
    /// as cached. Returns the number of locks removed.
    pub fn reclaim<F>(&self, is_live: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let mut removed = 0;
        self.locks.retain(|key, lock| {
            let keep = lock.users.load(Ordering::Acquire) > 0 || is_live(key);
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            debug!(removed, remaining = self.locks.len(), "reclaimed idle key locks");
        }
        removed
    }

    /// Number of locks currently registered
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Number of locks with at least one holder or waiter
    pub fn in_use(&self) -> usize {
        self.locks
            .iter()
            .filter(|entry| entry.value().users.load(Ordering::Acquire) > 0)
            .count()
    }
}

impl std::fmt::Debug for KeyLockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLockManager")
            .field("locks", &self.locks.len())
            .finish()
    }
}
