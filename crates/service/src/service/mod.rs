//! The document service facade

mod documents;
mod invalidation;
mod navigation;
mod stats;

pub use stats::ServiceStats;

use doclib_cache::{GlobalVersion, HotDocumentTracker, KeyLockManager, TtlLruCache, LOCK_KEY_SEPARATOR};
use doclib_core::{
    BreadcrumbItem, DocLibConfig, Document, DocumentMetadata, Error, RecentDocument, Result,
    TreeSnapshot,
};
use doclib_tree::TreeBuilder;
use doclib_watcher::ChangeWatcher;
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::extractor::{MetadataExtractor, NullExtractor};
use invalidation::ServiceSink;

pub(crate) const CONTENT_CACHE: &str = "content";
pub(crate) const METADATA_CACHE: &str = "metadata";
pub(crate) const DEGRADED_CACHE: &str = "degraded";
pub(crate) const BREADCRUMB_CACHE: &str = "breadcrumb";
pub(crate) const TREE_CACHE: &str = "tree";
pub(crate) const RECENT_CACHE: &str = "recent";

/// A document body with the file modification time it was read at
#[derive(Debug, Clone)]
pub(crate) struct CachedDocument {
    pub document: Arc<Document>,
    pub modified: SystemTime,
}

/// Cached access to a document library.
///
/// Built once from a [`DocLibConfig`] and shared as `Arc<DocService>`. Each
/// result kind lives in its own [`TtlLruCache`]; only the [`GlobalVersion`]
/// and the root path are shared between them.
pub struct DocService {
    config: DocLibConfig,
    root: PathBuf,
    version: GlobalVersion,
    locks: KeyLockManager,
    content: TtlLruCache<CachedDocument>,
    metadata: TtlLruCache<DocumentMetadata>,
    degraded: TtlLruCache<DocumentMetadata>,
    breadcrumbs: TtlLruCache<Arc<Vec<BreadcrumbItem>>>,
    trees: TtlLruCache<Arc<TreeSnapshot>>,
    recent: TtlLruCache<Arc<Vec<RecentDocument>>>,
    hot: HotDocumentTracker,
    builder: TreeBuilder,
    last_good_tree: RwLock<Option<Arc<TreeSnapshot>>>,
    extractor: Arc<dyn MetadataExtractor>,
    watcher: Mutex<Option<ChangeWatcher>>,
    file_reads: AtomicU64,
}

impl DocService {
    /// Create a service without a metadata extractor
    pub fn new(config: DocLibConfig) -> Result<Arc<Self>> {
        Self::with_extractor(config, Arc::new(NullExtractor))
    }

    pub fn with_extractor(
        config: DocLibConfig,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        // Watcher events carry canonical paths
        let root = std::fs::canonicalize(&config.docs_root).unwrap_or_else(|e| {
            warn!(root = %config.docs_root.display(), error = %e, "library root is not accessible yet");
            config.docs_root.clone()
        });

        let version = GlobalVersion::new();
        let service = Self {
            content: TtlLruCache::new(
                CONTENT_CACHE,
                config.content_cache_size,
                config.content_cache_ttl,
                version.clone(),
            ),
            metadata: TtlLruCache::new(
                METADATA_CACHE,
                config.metadata_cache_size,
                config.metadata_cache_ttl,
                version.clone(),
            ),
            degraded: TtlLruCache::new(
                DEGRADED_CACHE,
                config.metadata_cache_size,
                config.degraded_ttl,
                version.clone(),
            ),
            breadcrumbs: TtlLruCache::new(
                BREADCRUMB_CACHE,
                config.breadcrumb_cache_size,
                config.breadcrumb_cache_ttl,
                version.clone(),
            ),
            trees: TtlLruCache::new(
                TREE_CACHE,
                config.tree_cache_size,
                config.tree_cache_ttl,
                version.clone(),
            ),
            recent: TtlLruCache::new(RECENT_CACHE, 1, config.recent_docs_ttl, version.clone()),
            hot: HotDocumentTracker::new(config.hot_document_threshold),
            builder: TreeBuilder::new(root.clone()),
            last_good_tree: RwLock::new(None),
            extractor,
            watcher: Mutex::new(None),
            file_reads: AtomicU64::new(0),
            locks: KeyLockManager::new(),
            version,
            root,
            config,
        };

        info!(root = %service.root.display(), "document service ready");
        Ok(Arc::new(service))
    }

    pub fn config(&self) -> &DocLibConfig {
        &self.config
    }

    /// Canonical library root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current global invalidation version
    pub fn version(&self) -> u64 {
        self.version.current()
    }

    /// Start the change watcher unless watching is disabled
    pub fn start_watching(self: &Arc<Self>) -> Result<()> {
        if !self.config.watch {
            debug!("file watching disabled by configuration");
            return Ok(());
        }
        let mut slot = self.watcher.lock();
        if slot.is_none() {
            *slot = Some(self.spawn_watcher()?);
        }
        Ok(())
    }

    pub fn stop_watching(&self) {
        if let Some(mut watcher) = self.watcher.lock().take() {
            watcher.stop();
            info!("stopped watching library");
        }
    }

    pub fn watcher_alive(&self) -> bool {
        self.watcher
            .lock()
            .as_ref()
            .is_some_and(ChangeWatcher::is_alive)
    }

    /// Make sure a healthy watcher is running; returns whether it had to be
    /// (re)started. Everything is invalidated after a restart because events
    /// may have been missed while the watcher was down.
    pub fn ensure_watcher(self: &Arc<Self>) -> Result<bool> {
        if !self.config.watch {
            return Ok(false);
        }

        let mut slot = self.watcher.lock();
        match slot.as_mut() {
            Some(watcher) if watcher.is_alive() => return Ok(false),
            Some(watcher) => watcher.restart()?,
            None => *slot = Some(self.spawn_watcher()?),
        }
        drop(slot);

        let version = self.invalidate_all();
        info!(version, "change watcher recovered; caches invalidated");
        Ok(true)
    }

    fn spawn_watcher(self: &Arc<Self>) -> Result<ChangeWatcher> {
        let sink = Arc::new(ServiceSink::new(Arc::downgrade(self)));
        ChangeWatcher::start(self.root.clone(), self.config.debounce_window, sink)
    }

    /// Whether a lock key still guards a cached entry
    pub(crate) fn lock_is_live(&self, lock_key: &str) -> bool {
        let Some((cache, key)) = lock_key.split_once(LOCK_KEY_SEPARATOR) else {
            return false;
        };
        match cache {
            CONTENT_CACHE => self.content.contains(key),
            METADATA_CACHE => self.metadata.contains(key),
            BREADCRUMB_CACHE => self.breadcrumbs.contains(key),
            TREE_CACHE => self.trees.contains(key),
            RECENT_CACHE => self.recent.contains(key),
            _ => false,
        }
    }

    /// Remove expired entries from every cache
    pub fn cleanup_expired(&self) -> usize {
        self.content.cleanup_expired()
            + self.metadata.cleanup_expired()
            + self.degraded.cleanup_expired()
            + self.breadcrumbs.cleanup_expired()
            + self.trees.cleanup_expired()
            + self.recent.cleanup_expired()
    }

    /// Drop key locks nobody uses whose entries are gone
    pub fn reclaim_locks(&self) -> usize {
        self.locks.reclaim(|key| self.lock_is_live(key))
    }

    /// Stop pre-warming a document that no longer exists
    pub(crate) fn forget_hot(&self, path: &str) {
        if self.hot.forget(path) {
            debug!(path, "forgot hot document");
        }
    }

    /// Hot documents whose content is not cached
    pub fn prewarm_candidates(&self) -> Vec<String> {
        self.hot
            .hot_documents()
            .into_iter()
            .map(|(path, _)| path)
            .filter(|path| !self.content.contains(path))
            .collect()
    }
}

impl std::fmt::Debug for DocService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocService")
            .field("root", &self.root)
            .field("version", &self.version.current())
            .finish()
    }
}

/// Run `operation`, retrying once if it fails with a transient I/O error
pub(crate) async fn retry_transient<T, F, Fut>(operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match operation().await {
        Err(error) if error.is_transient() => {
            debug!(error = %error, "retrying after transient I/O error");
            operation().await
        }
        other => other,
    }
}

pub(crate) fn join_error(root: &Path, error: tokio::task::JoinError) -> Error {
    Error::file_system(
        root,
        "blocking task",
        std::io::Error::new(std::io::ErrorKind::Other, error.to_string()),
    )
}
