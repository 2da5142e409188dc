//! Cache invalidation driven by the watcher or by explicit requests

use doclib_core::{LibraryPath, Result};
use doclib_watcher::{InvalidationBatch, InvalidationSink};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use super::DocService;

/// Applies watcher batches to a service without keeping it alive
pub(crate) struct ServiceSink {
    service: Weak<DocService>,
}

impl ServiceSink {
    pub fn new(service: Weak<DocService>) -> Self {
        Self { service }
    }
}

impl InvalidationSink for ServiceSink {
    fn apply(&self, batch: &InvalidationBatch) {
        if let Some(service) = self.service.upgrade() {
            service.apply_batch(batch);
        }
    }
}

impl DocService {
    /// A sink that applies batches to this service, for custom watchers
    pub fn invalidation_sink(self: &Arc<Self>) -> Arc<dyn InvalidationSink> {
        Arc::new(ServiceSink::new(Arc::downgrade(self)))
    }

    /// Remove every entry the batch names, then advance the version once.
    ///
    /// Returns the new version.
    pub fn apply_batch(&self, batch: &InvalidationBatch) -> u64 {
        if batch.rescan {
            self.clear_caches();
        } else {
            for file in &batch.files {
                self.remove_file_entries(file);
            }
            for directory in &batch.directories {
                self.remove_directory_entries(directory);
            }
            if batch.structural {
                self.trees.clear();
                self.recent.clear();
            }
        }

        let version = self.version.bump();
        info!(
            version,
            files = batch.files.len(),
            directories = batch.directories.len(),
            structural = batch.structural,
            rescan = batch.rescan,
            "invalidated caches"
        );
        version
    }

    /// Invalidate one path.
    ///
    /// A file loses exactly its own entries. A directory also loses the
    /// entries of everything below it together with the tree and recent
    /// listings. Returns the new version.
    pub fn invalidate_path(&self, path: &str) -> Result<u64> {
        let path = LibraryPath::parse(path)?;
        if path.is_root() {
            return Ok(self.invalidate_all());
        }

        let mut batch = InvalidationBatch {
            raw_events: 1,
            ..InvalidationBatch::default()
        };
        if path.to_fs_path(&self.root).is_dir() {
            batch.structural = true;
            batch.directories.insert(path.to_string());
        } else {
            batch.files.insert(path.to_string());
        }
        Ok(self.apply_batch(&batch))
    }

    /// Drop every cached entry and advance the version. Returns the new
    /// version.
    pub fn invalidate_all(&self) -> u64 {
        self.apply_batch(&InvalidationBatch {
            structural: true,
            rescan: true,
            ..InvalidationBatch::default()
        })
    }

    /// [`invalidate_all`](Self::invalidate_all) that also forgets which
    /// documents are hot
    pub fn reset_caches(&self) -> u64 {
        self.hot.reset();
        self.invalidate_all()
    }

    fn clear_caches(&self) {
        let removed = self.content.clear()
            + self.metadata.clear()
            + self.degraded.clear()
            + self.breadcrumbs.clear()
            + self.trees.clear()
            + self.recent.clear();
        debug!(removed, "cleared all caches");
    }

    fn remove_file_entries(&self, key: &str) {
        self.content.remove(key);
        self.metadata.remove(key);
        self.degraded.remove(key);
        self.breadcrumbs.remove(key);
    }

    fn remove_directory_entries(&self, directory: &str) {
        let prefix = format!("{directory}/");
        let affected = |key: &str| key == directory || key.starts_with(&prefix);
        let removed = self.content.remove_where(affected)
            + self.metadata.remove_where(affected)
            + self.degraded.remove_where(affected)
            + self.breadcrumbs.remove_where(affected);
        debug!(directory, removed, "removed entries below directory");
    }
}
