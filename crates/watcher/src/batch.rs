//! Routing of debounced changes into cache invalidations

use doclib_core::LibraryPath;
use std::collections::BTreeSet;
use std::path::Path;

use crate::event::{ChangeKind, EntryKind, RawChange};

/// Invalidations derived from one debounced batch of raw changes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationBatch {
    /// A directory listing changed: tree and recent-documents caches are stale
    pub structural: bool,
    /// Events were dropped by the platform; every cache is stale
    pub rescan: bool,
    /// Files whose content, metadata and breadcrumb entries are stale
    pub files: BTreeSet<String>,
    /// Directories whose descendants' entries are stale
    pub directories: BTreeSet<String>,
    /// Raw events folded into this batch
    pub raw_events: usize,
}

impl InvalidationBatch {
    /// Whether applying this batch would change anything
    pub fn is_empty(&self) -> bool {
        !self.structural && !self.rescan && self.files.is_empty() && self.directories.is_empty()
    }
}

/// Receives invalidation batches from the watcher's consumer task.
///
/// Implementations remove entries and then advance the global version
/// exactly once per call.
pub trait InvalidationSink: Send + Sync + 'static {
    fn apply(&self, batch: &InvalidationBatch);
}

/// Fold raw changes below `root` into an invalidation batch.
///
/// Hidden paths and paths outside the root are ignored. Any change to a
/// directory, and any create, remove or rename, marks the batch structural;
/// file paths are additionally listed for fine-grained removal. A path of
/// unknown kind that no longer exists after a listing change may have been
/// a directory, so it is listed both as a file and as a directory.
pub fn route(root: &Path, changes: &[RawChange]) -> InvalidationBatch {
    let mut batch = InvalidationBatch {
        raw_events: changes.len(),
        ..InvalidationBatch::default()
    };

    for change in changes {
        if change.kind == ChangeKind::Rescan {
            batch.rescan = true;
            batch.structural = true;
            continue;
        }

        let Some(path) = LibraryPath::from_fs_path(root, &change.path) else {
            continue;
        };
        if path.is_root() {
            batch.structural = true;
            continue;
        }

        let (as_file, as_directory) = match change.entry {
            EntryKind::Directory => (false, true),
            EntryKind::File => (true, false),
            EntryKind::Unknown if change.path.is_dir() => (false, true),
            EntryKind::Unknown if change.kind.changes_listing() && !change.path.exists() => {
                (true, true)
            }
            EntryKind::Unknown => (true, false),
        };

        if as_directory || change.kind.changes_listing() {
            batch.structural = true;
        }
        if as_directory {
            batch.directories.insert(path.to_string());
        }
        if as_file {
            batch.files.insert(path.to_string());
        }
    }

    batch
}
