//! Tree, breadcrumb and recent-document listings

use doclib_core::{
    format_timestamp, BreadcrumbItem, Error, LibraryPath, RecentDocument, Result, TreeSnapshot,
    is_servable_name, DOCUMENT_EXTENSION, MAX_TREE_DEPTH_CEILING,
};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{error, warn};
use walkdir::{DirEntry, WalkDir};

use super::{join_error, DocService};

const TOP_LEVEL_KEY: &str = "";
const RECENT_KEY: &str = "all";

impl DocService {
    /// The top level of the library tree.
    ///
    /// Never fails: when the library cannot be listed the last good tree is
    /// served marked `stale`, or an empty tree carrying the error.
    pub async fn get_tree(&self) -> Arc<TreeSnapshot> {
        let requested_at = self.version.current();
        let result = self
            .trees
            .get_or_compute_current(&self.locks, TOP_LEVEL_KEY, || async {
                let version = self.version.current();
                let root = self.builder.spawn_top_level().await?;
                let snapshot = Arc::new(TreeSnapshot::new(root, version));
                *self.last_good_tree.write() = Some(snapshot.clone());
                Ok(snapshot)
            })
            .await;

        match result {
            Ok(snapshot) => snapshot,
            Err(error) => self.fallback_tree(requested_at, &error),
        }
    }

    fn fallback_tree(&self, version: u64, error: &Error) -> Arc<TreeSnapshot> {
        if let Some(last) = self.last_good_tree.read().as_ref() {
            warn!(error = %error, built_version = last.version, "tree rebuild failed, serving last good tree");
            let mut stale = TreeSnapshot::clone(last);
            stale.stale = true;
            return Arc::new(stale);
        }
        error!(error = %error, "tree build failed and no previous tree exists");
        Arc::new(TreeSnapshot::failed(version, error.to_string()))
    }

    /// The subtree at `path`, expanded to the configured maximum depth
    pub async fn get_subtree(&self, path: &str) -> Result<Arc<TreeSnapshot>> {
        self.get_subtree_with_depth(path, self.config.max_tree_depth)
            .await
    }

    /// The subtree at `path`, expanded `depth` levels (at most the ceiling)
    pub async fn get_subtree_with_depth(
        &self,
        path: &str,
        depth: usize,
    ) -> Result<Arc<TreeSnapshot>> {
        let path = LibraryPath::parse(path)?;
        let depth = depth.min(MAX_TREE_DEPTH_CEILING);
        let key = format!("{path}@{depth}");

        self.trees
            .get_or_compute_current(&self.locks, &key, || async {
                let version = self.version.current();
                let root = self.builder.spawn_subtree(path.clone(), depth).await?;
                Ok(Arc::new(TreeSnapshot::new(root, version)))
            })
            .await
    }

    /// One item per path component, from the top of the library down
    pub async fn get_breadcrumb(&self, path: &str) -> Result<Vec<BreadcrumbItem>> {
        let path = LibraryPath::parse(path)?;
        let items = self
            .breadcrumbs
            .get_or_compute(&self.locks, path.as_str(), || async {
                let items = path
                    .ancestors_inclusive()
                    .into_iter()
                    .map(|(name, prefix)| BreadcrumbItem {
                        name,
                        path: prefix.to_string(),
                    })
                    .collect();
                Ok(Arc::new(items))
            })
            .await?;
        Ok(items.as_ref().clone())
    }

    /// The `limit` most recently modified documents
    pub async fn get_recent_docs(&self, limit: usize) -> Result<Vec<RecentDocument>> {
        let all = self
            .recent
            .get_or_compute(&self.locks, RECENT_KEY, || async {
                let root = self.root.clone();
                let documents = tokio::task::spawn_blocking(move || scan_documents(&root))
                    .await
                    .map_err(|e| join_error(&self.root, e))??;
                Ok(Arc::new(documents))
            })
            .await?;
        Ok(all.iter().take(limit).cloned().collect())
    }
}

/// Entries below the root that cannot be addressed by a library path
fn is_unservable(entry: &DirEntry) -> bool {
    entry.depth() > 0 && !entry.file_name().to_str().is_some_and(is_servable_name)
}

/// Every visible document below `root`, newest first
fn scan_documents(root: &Path) -> Result<Vec<RecentDocument>> {
    std::fs::metadata(root).map_err(|e| Error::file_system(root, "stat", e))?;

    let mut found: Vec<(SystemTime, RecentDocument)> = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_entry(|e| !is_unservable(e)) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file()
            || entry.path().extension().and_then(|ext| ext.to_str()) != Some(DOCUMENT_EXTENSION)
        {
            continue;
        }
        let Some(path) = LibraryPath::from_fs_path(root, entry.path()) else {
            continue;
        };
        let Some(modified) = entry.metadata().ok().and_then(|m| m.modified().ok()) else {
            continue;
        };

        found.push((
            modified,
            RecentDocument {
                name: path.name().to_string(),
                path: path.to_string(),
                last_modified: format_timestamp(modified),
            },
        ));
    }

    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.path.cmp(&b.1.path)));
    Ok(found.into_iter().map(|(_, doc)| doc).collect())
}
