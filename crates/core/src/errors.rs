use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Result type alias for doclib operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for doclib operations
///
/// The type is `Clone` so that a single failed computation can be handed to
/// every caller that was waiting on the same cache key.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The requested document or directory does not exist on disk
    #[error("not found: '{}'", .path.display())]
    NotFound { path: PathBuf },

    /// The requested path escapes the library root or is otherwise unusable
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// An external computation exceeded its deadline
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// A stat/read raced with a concurrent mutation of the file
    #[error("transient I/O failure during {operation} on '{}': {source}", .path.display())]
    TransientIo {
        path: PathBuf,
        operation: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Any other file system failure
    #[error("file system {operation} operation failed for '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The change watcher stopped delivering events
    #[error("change watcher is down: {reason}")]
    WatcherDown { reason: String },

    /// The external metadata extractor failed
    #[error("metadata extraction failed for '{path}': {message}")]
    Extraction { path: String, message: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
        }
    }
}

impl Error {
    /// Create a not-found error
    #[must_use]
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Error::NotFound { path: path.into() }
    }

    /// Create an invalid path error
    #[must_use]
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a watcher-down error
    #[must_use]
    pub fn watcher_down(reason: impl Into<String>) -> Self {
        Error::WatcherDown {
            reason: reason.into(),
        }
    }

    /// Create an extraction error
    #[must_use]
    pub fn extraction(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Extraction {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Classify an I/O error raised while touching `path`.
    ///
    /// `NotFound` maps to [`Error::NotFound`]; races with a concurrent writer
    /// map to [`Error::TransientIo`]; everything else is [`Error::Io`].
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return Error::NotFound { path };
        }
        if is_transient_kind(source.kind()) {
            Error::TransientIo {
                path,
                operation: operation.into(),
                source: Arc::new(source),
            }
        } else {
            Error::Io {
                path,
                operation: operation.into(),
                source: Arc::new(source),
            }
        }
    }

    /// Check if this error is transient and worth one internal retry
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Error::TransientIo { .. })
    }

    /// Check if this error means the path does not exist
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

fn is_transient_kind(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind;
    matches!(
        kind,
        ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
            | ErrorKind::UnexpectedEof
            | ErrorKind::InvalidData
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_file_system_classification() {
        let err = Error::file_system("a.md", "read", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_not_found());
        assert!(!err.is_transient());

        let err = Error::file_system("a.md", "read", io::Error::from(io::ErrorKind::InvalidData));
        assert!(err.is_transient());

        let err = Error::file_system(
            "a.md",
            "read",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_error_is_cloneable_with_source() {
        let err = Error::file_system("a.md", "stat", io::Error::from(io::ErrorKind::Interrupted));
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
        assert!(std::error::Error::source(&cloned).is_some());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::timeout("extract metadata", Duration::from_secs(2));
        assert_eq!(err.to_string(), "operation 'extract metadata' timed out after 2s");

        let err = Error::not_found("docs/a.md");
        assert_eq!(err.to_string(), "not found: 'docs/a.md'");
    }
}
