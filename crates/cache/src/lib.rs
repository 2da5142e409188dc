//! Caching primitives for doclib
//!
//! - [`TtlLruCache`]: bounded, TTL-expiring LRU cache with version stamps
//! - [`KeyLockManager`]: per-key locks that collapse concurrent misses
//! - [`GlobalVersion`]: invalidation counter shared by a service's caches
//! - [`HotDocumentTracker`]: access counts driving pre-warming

pub mod entry;
pub mod hot;
pub mod lock;
pub mod stats;
pub mod ttl;
pub mod version;

pub use entry::CacheEntry;
pub use hot::HotDocumentTracker;
pub use lock::KeyLockManager;
pub use stats::CacheStats;
pub use ttl::{TtlLruCache, LOCK_KEY_SEPARATOR};
pub use version::GlobalVersion;
