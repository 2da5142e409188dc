/// Constants used throughout the doclib codebase
// Names starting with this marker are never listed, watched or served
pub const HIDDEN_MARKER: char = '.';

// Extension of documents served as text and listed as recent
pub const DOCUMENT_EXTENSION: &str = "md";

// Hard ceiling on tree recursion regardless of configuration
pub const MAX_TREE_DEPTH_CEILING: usize = 999;

// Name given to the synthetic root node of the library tree
pub const ROOT_NODE_NAME: &str = "root";

// Environment variable names
pub const DOCLIB_ROOT_VAR: &str = "DOCLIB_ROOT";
pub const DOCLIB_LOG_VAR: &str = "DOCLIB_LOG";
pub const DOCLIB_CONFIG_VAR: &str = "DOCLIB_CONFIG";

// Fallback MIME type for unknown extensions
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

// Extension to MIME type table for non-document files in the library
const MIME_TYPES: &[(&str, &str)] = &[
    ("md", "text/markdown"),
    ("txt", "text/plain"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("ico", "image/x-icon"),
    ("mp4", "video/mp4"),
    ("zip", "application/zip"),
];

/// Guess a MIME type from a file name's extension
#[must_use]
pub fn mime_type_for(name: &str) -> &'static str {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return DEFAULT_MIME_TYPE;
    };
    let ext = ext.to_ascii_lowercase();
    MIME_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map_or(DEFAULT_MIME_TYPE, |(_, mime)| mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for("a/b/diagram.PNG"), "image/png");
        assert_eq!(mime_type_for("notes.md"), "text/markdown");
        assert_eq!(mime_type_for("Makefile"), DEFAULT_MIME_TYPE);
        assert_eq!(mime_type_for("archive.tar.xyz"), DEFAULT_MIME_TYPE);
    }
}
