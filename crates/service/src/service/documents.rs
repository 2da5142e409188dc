//! Document content, metadata and raw file access

use doclib_core::{
    format_timestamp, mime_type_for, Document, DocumentMetadata, Error, FileResponse, LibraryPath,
    Result,
};
use std::fs::Metadata;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

use super::{retry_transient, CachedDocument, DocService};

impl DocService {
    /// Read a document, serving it from cache while the file is unchanged.
    ///
    /// Concurrent misses for the same path read the file once.
    pub async fn get_content(&self, path: &str) -> Result<Arc<Document>> {
        let path = LibraryPath::parse(path)?;
        let document = self.load_content(&path).await?;
        if self.hot.record_access(path.as_str()) {
            debug!(path = %path, "document became hot");
        }
        Ok(document)
    }

    /// [`get_content`](Self::get_content) without access tracking
    pub(crate) async fn load_content(&self, path: &LibraryPath) -> Result<Arc<Document>> {
        if path.is_root() {
            return Err(Error::invalid_path("", "the library root is not a document"));
        }
        let fs_path = path.to_fs_path(&self.root);
        let metadata = retry_transient(|| stat_file(path, &fs_path)).await?;
        let modified = modified_time(path, &metadata)?;

        let key = path.as_str();
        if let Some(cached) = self
            .content
            .get_valid(key, |cached| cached.modified == modified)
        {
            return Ok(cached.document);
        }

        let cached = self
            .content
            .fill(&self.locks, key, || async {
                retry_transient(|| self.read_document(path, &fs_path)).await
            })
            .await?;
        Ok(cached.document)
    }

    async fn read_document(&self, path: &LibraryPath, fs_path: &Path) -> Result<CachedDocument> {
        let metadata = stat_file(path, fs_path).await?;
        let modified = modified_time(path, &metadata)?;

        self.file_reads.fetch_add(1, Ordering::Relaxed);
        let bytes = tokio::fs::read(fs_path)
            .await
            .map_err(|e| Error::file_system(path.as_str(), "read", e))?;
        let size = bytes.len() as u64;
        let content = String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());

        debug!(path = %path, size, "read document from disk");
        Ok(CachedDocument {
            document: Arc::new(Document {
                path: path.to_string(),
                content,
                size,
                last_modified: format_timestamp(modified),
                version: self.version.current(),
            }),
            modified,
        })
    }

    /// Metadata for a file, enriched by the configured extractor.
    ///
    /// Extractor calls are bounded by `metadata_timeout`. After a failure a
    /// degraded record is served for `degraded_ttl` while the error is
    /// reported to the callers that were waiting on the failed call.
    pub async fn get_metadata(&self, path: &str) -> Result<DocumentMetadata> {
        let path = LibraryPath::parse(path)?;
        let key = path.as_str();

        if let Some(metadata) = self.metadata.get(key) {
            return Ok(metadata);
        }
        if let Some(degraded) = self.degraded.get(key) {
            return Ok(degraded);
        }

        let fs_path = path.to_fs_path(&self.root);
        self.metadata
            .fill(&self.locks, key, || self.extract_metadata(&path, &fs_path))
            .await
    }

    async fn extract_metadata(&self, path: &LibraryPath, fs_path: &Path) -> Result<DocumentMetadata> {
        let stat = retry_transient(|| async {
            tokio::fs::metadata(fs_path)
                .await
                .map_err(|e| Error::file_system(path.as_str(), "stat", e))
        })
        .await?;

        let mut metadata = DocumentMetadata {
            path: path.to_string(),
            size: stat.len(),
            last_modified: format_timestamp(modified_time(path, &stat)?),
            page_count: None,
            degraded: false,
        };
        if stat.is_dir() {
            return Ok(metadata);
        }

        let limit = self.config.metadata_timeout;
        let error = match tokio::time::timeout(limit, self.extractor.extract(fs_path)).await {
            Ok(Ok(extracted)) => {
                metadata.page_count = extracted.page_count;
                return Ok(metadata);
            }
            Ok(Err(error)) => error,
            Err(_) => Error::timeout(format!("metadata extraction for {path}"), limit),
        };

        warn!(path = %path, error = %error, "metadata extraction failed, serving degraded metadata");
        metadata.degraded = true;
        self.degraded.put(path.as_str(), metadata);
        Err(error)
    }

    /// Location and MIME type of a file served as-is
    pub async fn get_file(&self, path: &str) -> Result<FileResponse> {
        let path = LibraryPath::parse(path)?;
        if path.is_root() {
            return Err(Error::invalid_path("", "the library root is not a file"));
        }
        let fs_path = path.to_fs_path(&self.root);
        retry_transient(|| stat_file(&path, &fs_path)).await?;

        Ok(FileResponse {
            mime_type: mime_type_for(path.name()).to_string(),
            absolute_path: fs_path,
        })
    }
}

/// Stat a path that must be a regular file
async fn stat_file(path: &LibraryPath, fs_path: &Path) -> Result<Metadata> {
    let metadata = tokio::fs::metadata(fs_path)
        .await
        .map_err(|e| Error::file_system(path.as_str(), "stat", e))?;
    if metadata.is_dir() {
        return Err(Error::invalid_path(path.as_str(), "is a directory"));
    }
    Ok(metadata)
}

fn modified_time(path: &LibraryPath, metadata: &Metadata) -> Result<SystemTime> {
    metadata
        .modified()
        .map_err(|e| Error::file_system(path.as_str(), "stat", e))
}
