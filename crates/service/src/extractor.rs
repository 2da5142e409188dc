//! External metadata extraction

use async_trait::async_trait;
use doclib_core::Result;
use std::path::Path;

/// Metadata produced by an extractor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedMetadata {
    pub page_count: Option<u32>,
}

/// A slow external collaborator that inspects a file, such as a PDF page
/// counter.
///
/// The service bounds every call with its own timeout, so implementations
/// need not enforce one.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<ExtractedMetadata>;
}

/// Extractor that knows nothing beyond what `stat` reports
#[derive(Debug, Clone, Copy, Default)]
pub struct NullExtractor;

#[async_trait]
impl MetadataExtractor for NullExtractor {
    async fn extract(&self, _path: &Path) -> Result<ExtractedMetadata> {
        Ok(ExtractedMetadata::default())
    }
}
