use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::constants::{HIDDEN_MARKER, ROOT_NODE_NAME};
use crate::errors::{Error, Result};

/// A validated path relative to the library root.
///
/// Always `/`-separated with no leading or trailing separator. The empty
/// path denotes the root itself. Parent references, current-directory
/// references and hidden components are rejected at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LibraryPath(String);

impl LibraryPath {
    /// The library root
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse a request path such as `guides/1_intro.md` or `/guides/`
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.replace('\\', "/");
        let mut parts = Vec::new();
        for part in normalized.split('/').filter(|p| !p.is_empty()) {
            if part.contains(':') {
                return Err(Error::invalid_path(raw, "drive or scheme prefixes are not allowed"));
            }
            if part == ".." || part == "." {
                return Err(Error::invalid_path(raw, "relative components are not allowed"));
            }
            if part.starts_with(HIDDEN_MARKER) {
                return Err(Error::invalid_path(raw, "hidden entries are not served"));
            }
            parts.push(part);
        }
        Ok(Self(parts.join("/")))
    }

    /// Build a library path from a file system path below `root`.
    ///
    /// Returns `None` for paths outside the root or with a component that
    /// [`is_servable_name`] rejects.
    #[must_use]
    pub fn from_fs_path(root: &Path, path: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;
        let mut parts = Vec::new();
        for component in relative.components() {
            let part = component.as_os_str().to_str()?;
            if !is_servable_name(part) {
                return None;
            }
            parts.push(part.to_string());
        }
        Some(Self(parts.join("/")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Last component, or the root node name for the root
    #[must_use]
    pub fn name(&self) -> &str {
        if self.is_root() {
            ROOT_NODE_NAME
        } else {
            self.0.rsplit('/').next().unwrap_or(&self.0)
        }
    }

    /// Child path for an entry directly below this one
    #[must_use]
    pub fn join(&self, name: &str) -> Self {
        if self.is_root() {
            Self(name.to_string())
        } else {
            Self(format!("{}/{}", self.0, name))
        }
    }

    /// Absolute location of this path below `root`
    #[must_use]
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        self.0
            .split('/')
            .filter(|p| !p.is_empty())
            .fold(root.to_path_buf(), |acc, part| acc.join(part))
    }

    /// Every prefix of this path, shortest first (`a`, `a/b`, `a/b/c.md`)
    #[must_use]
    pub fn ancestors_inclusive(&self) -> Vec<(String, Self)> {
        let mut current = Self::root();
        let mut out = Vec::new();
        for part in self.0.split('/').filter(|p| !p.is_empty()) {
            current = current.join(part);
            out.push((part.to_string(), current.clone()));
        }
        out
    }
}

impl fmt::Display for LibraryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LibraryPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<LibraryPath> for String {
    fn from(value: LibraryPath) -> Self {
        value.0
    }
}

/// Whether a directory entry name can appear in a [`LibraryPath`].
///
/// Hidden names and names that [`LibraryPath::parse`] would split or reject
/// (`:` and `\`) are never listed or served.
#[must_use]
pub fn is_servable_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with(HIDDEN_MARKER) && !name.contains([':', '\\'])
}

/// One node of the library tree.
///
/// A directory with `has_children == true` and no `children` has not been
/// expanded yet; callers fetch it with a subtree request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub is_file: bool,
    pub has_children: bool,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    #[must_use]
    pub fn leaf(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_dir: false,
            is_file: true,
            has_children: false,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn branch(name: impl Into<String>, path: impl Into<String>, has_children: bool) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_dir: true,
            is_file: false,
            has_children,
            children: Vec::new(),
        }
    }

    /// Whether this node is a directory whose children were not loaded
    #[must_use]
    pub fn is_unexpanded(&self) -> bool {
        self.is_dir && self.has_children && self.children.is_empty()
    }

    /// Names of the direct children, in order
    #[must_use]
    pub fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.name.as_str()).collect()
    }
}

/// A built tree together with the version it was built against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub root: TreeNode,
    pub version: u64,
    pub built_at: DateTime<Utc>,
    /// Served from the last known-good build after a failed rebuild
    pub stale: bool,
    /// Set when no good build exists and `root` is an explicit empty tree
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TreeSnapshot {
    #[must_use]
    pub fn new(root: TreeNode, version: u64) -> Self {
        Self {
            root,
            version,
            built_at: Utc::now(),
            stale: false,
            error: None,
        }
    }

    /// An empty tree carrying the reason no tree could be built
    #[must_use]
    pub fn failed(version: u64, error: impl Into<String>) -> Self {
        Self {
            root: TreeNode::branch(ROOT_NODE_NAME, "", false),
            version,
            built_at: Utc::now(),
            stale: false,
            error: Some(error.into()),
        }
    }
}

/// A text document read from the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub path: String,
    pub content: String,
    pub size: u64,
    pub last_modified: String,
    pub version: u64,
}

/// Metadata for a library file, enriched by the external extractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub path: String,
    pub size: u64,
    pub last_modified: String,
    pub page_count: Option<u32>,
    /// Served from the short-lived fallback after an extractor failure
    pub degraded: bool,
}

/// One step of a breadcrumb trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreadcrumbItem {
    pub name: String,
    pub path: String,
}

/// A document listed by modification time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentDocument {
    pub path: String,
    pub name: String,
    pub last_modified: String,
}

/// Location and content type of a non-document file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResponse {
    pub absolute_path: PathBuf,
    pub mime_type: String,
}

/// Format a file modification time as RFC 3339
#[must_use]
pub fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_path_normalization() {
        assert_eq!(LibraryPath::parse("/guides//intro.md/").unwrap().as_str(), "guides/intro.md");
        assert_eq!(LibraryPath::parse("a\\b.md").unwrap().as_str(), "a/b.md");
        assert!(LibraryPath::parse("").unwrap().is_root());
        assert!(LibraryPath::parse("/").unwrap().is_root());
    }

    #[test]
    fn test_library_path_rejects_escapes() {
        assert!(matches!(
            LibraryPath::parse("../etc/passwd"),
            Err(Error::InvalidPath { .. })
        ));
        assert!(LibraryPath::parse("a/./b").is_err());
        assert!(LibraryPath::parse("a/.git/config").is_err());
    }

    #[test]
    fn test_library_path_navigation() {
        let path = LibraryPath::parse("a/b/c.md").unwrap();
        assert_eq!(path.name(), "c.md");
        assert_eq!(LibraryPath::root().name(), ROOT_NODE_NAME);
        assert_eq!(LibraryPath::root().join("a").join("b").as_str(), "a/b");

        let crumbs: Vec<String> = path
            .ancestors_inclusive()
            .into_iter()
            .map(|(_, p)| p.to_string())
            .collect();
        assert_eq!(crumbs, vec!["a", "a/b", "a/b/c.md"]);
    }

    #[test]
    fn test_library_path_from_fs_path() {
        let root = Path::new("/srv/docs");
        let path = LibraryPath::from_fs_path(root, Path::new("/srv/docs/a/b.md")).unwrap();
        assert_eq!(path.as_str(), "a/b.md");
        assert_eq!(path.to_fs_path(root), PathBuf::from("/srv/docs/a/b.md"));
        assert!(LibraryPath::from_fs_path(root, Path::new("/srv/docs/.cache/x")).is_none());
        assert!(LibraryPath::from_fs_path(root, Path::new("/elsewhere/x")).is_none());
    }

    #[test]
    fn test_unexpanded_marker() {
        let lazy = TreeNode::branch("guides", "guides", true);
        assert!(lazy.is_unexpanded());
        let empty = TreeNode::branch("empty", "empty", false);
        assert!(!empty.is_unexpanded());
    }
}
