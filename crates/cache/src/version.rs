//! Global invalidation counter shared by every cache of a service

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic counter bumped once per invalidation batch.
///
/// Cheap to clone; all clones observe the same counter. Writers must apply
/// their removals before calling [`bump`](Self::bump) so that a reader who
/// observes version `N` also observes every removal batched at or before `N`.
#[derive(Debug, Clone, Default)]
pub struct GlobalVersion(Arc<AtomicU64>);

impl GlobalVersion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Increment and return the new version
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}
