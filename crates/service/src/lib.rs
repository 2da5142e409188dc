//! Cached document service for a file-backed library
//!
//! [`DocService`] owns one cache per kind of result, the key locks that
//! collapse concurrent misses, the tree builder and the change watcher.
//! [`MaintenanceScheduler`] keeps it healthy in the background.

pub mod extractor;
pub mod maintenance;
pub mod service;

pub use extractor::{ExtractedMetadata, MetadataExtractor, NullExtractor};
pub use maintenance::{MaintenanceReport, MaintenanceScheduler};
pub use service::{DocService, ServiceStats};
