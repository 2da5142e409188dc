//! Ordering of tree entries by numeric name prefix
//!
//! Names such as `1_intro.md`, `1.2_setup` or `10_faq.md` carry a dotted
//! numeric prefix before the first underscore. Numbered names come first,
//! compared component-wise as integers; a single number `n` compares as
//! `n.0`. Everything else follows, ordered by name.

use doclib_core::{TreeNode, DOCUMENT_EXTENSION};
use std::cmp::Ordering;

/// Sort key derived from an entry name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Numbered(Vec<u64>),
    Unnumbered,
}

impl SortKey {
    pub fn from_name(name: &str) -> Self {
        let stem = name
            .strip_suffix(&format!(".{DOCUMENT_EXTENSION}"))
            .unwrap_or(name);

        let Some((prefix, _)) = stem.split_once('_') else {
            return Self::Unnumbered;
        };

        let mut parts = Vec::new();
        for part in prefix.split('.') {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Self::Unnumbered;
            }
            match part.parse::<u64>() {
                Ok(n) => parts.push(n),
                Err(_) => return Self::Unnumbered,
            }
        }
        if parts.len() == 1 {
            parts.push(0);
        }
        Self::Numbered(parts)
    }
}

/// Compare two entry names: numbered before unnumbered, ties by name
pub fn compare_names(a: &str, b: &str) -> Ordering {
    SortKey::from_name(a)
        .cmp(&SortKey::from_name(b))
        .then_with(|| a.cmp(b))
}

/// Sort siblings: directories first, then files, each group by name key
pub fn sort_nodes(nodes: &mut [TreeNode]) {
    nodes.sort_by_cached_key(|node| (!node.is_dir, SortKey::from_name(&node.name), node.name.clone()));
}
