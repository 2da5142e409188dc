//! Lazy directory tree builder

use doclib_core::{is_servable_name, Error, LibraryPath, Result, TreeNode, MAX_TREE_DEPTH_CEILING};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::ordering::sort_nodes;

/// Kind of a visible directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Directory,
    /// A symlink resolving to a directory; listed but never descended into
    LinkedDirectory,
}

type Listing = Vec<(String, EntryKind)>;

/// Builds [`TreeNode`]s from the library directory.
///
/// `max_depth` counts how many levels of children are listed below the
/// requested node. Depth 0 yields the node alone (a lazy branch when the
/// directory has visible entries); depth 1 lists its direct children with
/// subdirectories left lazy. Depth is clamped to
/// [`MAX_TREE_DEPTH_CEILING`].
///
/// Symlinks to directories appear as lazy branches and are only expanded
/// when requested by their own path, so link cycles cannot multiply the walk.
///
/// All methods perform blocking I/O; async callers use the `spawn_*`
/// variants which run on Tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    root: Arc<PathBuf>,
}

impl TreeBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The root node with its first level of entries, without recursion
    pub fn build_top_level(&self) -> Result<TreeNode> {
        self.build_subtree(&LibraryPath::root(), 1)
    }

    /// The node at `path` expanded `max_depth` levels deep.
    ///
    /// A file path yields a single leaf. Errors reading `path` itself are
    /// returned; unreadable directories below it are logged and skipped.
    pub fn build_subtree(&self, path: &LibraryPath, max_depth: usize) -> Result<TreeNode> {
        let depth = max_depth.min(MAX_TREE_DEPTH_CEILING);
        let fs_path = path.to_fs_path(&self.root);
        let metadata =
            fs::metadata(&fs_path).map_err(|e| Error::file_system(path.as_str(), "stat", e))?;

        if !metadata.is_dir() {
            return Ok(TreeNode::leaf(path.name(), path.as_str()));
        }

        if depth == 0 {
            let has_children = has_visible_entries(&fs_path)
                .map_err(|e| Error::file_system(path.as_str(), "read_dir", e))?;
            return Ok(TreeNode::branch(path.name(), path.as_str(), has_children));
        }

        let listing =
            read_visible(&fs_path).map_err(|e| Error::file_system(path.as_str(), "read_dir", e))?;
        let node = self.expand(path, listing, depth);
        debug!(path = %path, depth, children = node.children.len(), "built subtree");
        Ok(node)
    }

    /// [`build_top_level`](Self::build_top_level) on the blocking pool
    pub async fn spawn_top_level(&self) -> Result<TreeNode> {
        let builder = self.clone();
        tokio::task::spawn_blocking(move || builder.build_top_level())
            .await
            .map_err(|e| join_failure(&self.root, e))?
    }

    /// [`build_subtree`](Self::build_subtree) on the blocking pool
    pub async fn spawn_subtree(&self, path: LibraryPath, max_depth: usize) -> Result<TreeNode> {
        let builder = self.clone();
        tokio::task::spawn_blocking(move || builder.build_subtree(&path, max_depth))
            .await
            .map_err(|e| join_failure(&self.root, e))?
    }

    /// Expand a directory whose listing is known; `remaining >= 1`
    fn expand(&self, path: &LibraryPath, listing: Listing, remaining: usize) -> TreeNode {
        let mut children: Vec<TreeNode> = listing
            .into_iter()
            .filter_map(|(name, kind)| {
                let child = path.join(&name);
                match kind {
                    EntryKind::Directory => self.child_directory(child, remaining - 1),
                    EntryKind::LinkedDirectory => self.child_directory(child, 0),
                    EntryKind::File => Some(TreeNode::leaf(name, child.as_str())),
                }
            })
            .collect();
        sort_nodes(&mut children);

        let mut node = TreeNode::branch(path.name(), path.as_str(), !children.is_empty());
        node.children = children;
        node
    }

    fn child_directory(&self, path: LibraryPath, remaining: usize) -> Option<TreeNode> {
        let fs_path = path.to_fs_path(&self.root);
        let result = if remaining == 0 {
            has_visible_entries(&fs_path)
                .map(|has_children| TreeNode::branch(path.name(), path.as_str(), has_children))
        } else {
            read_visible(&fs_path).map(|listing| self.expand(&path, listing, remaining))
        };

        match result {
            Ok(node) => Some(node),
            Err(error) => {
                warn!(path = %path, error = %error, "skipping unreadable directory");
                None
            }
        }
    }
}

/// Classify an entry, resolving symlinks; `None` for anything that is
/// neither a file nor a directory, including dangling links
fn entry_kind(entry: &fs::DirEntry) -> Option<EntryKind> {
    let file_type = entry.file_type().ok()?;
    if file_type.is_symlink() {
        let target = fs::metadata(entry.path()).ok()?;
        return if target.is_dir() {
            Some(EntryKind::LinkedDirectory)
        } else if target.is_file() {
            Some(EntryKind::File)
        } else {
            None
        };
    }
    if file_type.is_dir() {
        Some(EntryKind::Directory)
    } else if file_type.is_file() {
        Some(EntryKind::File)
    } else {
        None
    }
}

fn read_visible(dir: &Path) -> io::Result<Listing> {
    let mut listing = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !is_servable_name(&name) {
            continue;
        }
        if let Some(kind) = entry_kind(&entry) {
            listing.push((name, kind));
        }
    }
    Ok(listing)
}

fn has_visible_entries(dir: &Path) -> io::Result<bool> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let visible = entry
            .file_name()
            .to_str()
            .is_some_and(is_servable_name);
        if visible && entry_kind(&entry).is_some() {
            return Ok(true);
        }
    }
    Ok(false)
}

fn join_failure(root: &Path, error: tokio::task::JoinError) -> Error {
    Error::file_system(
        root,
        "tree build",
        io::Error::new(io::ErrorKind::Other, error.to_string()),
    )
}
