//! Canonical path keys.
//!
//! A [`PathKey`] is the normalized title sequence from a root down to a node.
//! It is the only correspondence between the two variant trees: equal keys
//! mean the same section, whatever the node ids.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};
use tracing::debug;

use manualmerge_shared::{ManualMergeError, Result, SourceTree};

/// Joins title segments. Normalized titles never contain it.
pub const PATH_SEPARATOR: char = '\n';

/// Number of hex characters kept from the SHA-256 digest.
pub const MERGED_ID_LEN: usize = 16;

/// Collapse whitespace runs to single spaces and trim. Case is preserved.
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ordered, normalized root-to-node titles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(String);

impl PathKey {
    /// Key of a top-level node.
    pub fn root(title: &str) -> Self {
        Self(normalize_title(title))
    }

    /// Key of a child titled `title` under this key.
    pub fn child(&self, title: &str) -> Self {
        let mut key = String::with_capacity(self.0.len() + title.len() + 1);
        key.push_str(&self.0);
        key.push(PATH_SEPARATOR);
        key.push_str(&normalize_title(title));
        Self(key)
    }

    /// Build a key from already-ordered segments (root first).
    pub fn from_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        let mut iter = segments.into_iter();
        let mut key = Self::root(iter.next().unwrap_or_default());
        for segment in iter {
            key = key.child(segment);
        }
        key
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(PATH_SEPARATOR)
    }

    /// The node's own normalized title.
    pub fn title(&self) -> &str {
        self.0
            .rsplit_once(PATH_SEPARATOR)
            .map_or(self.0.as_str(), |(_, last)| last)
    }

    pub fn depth(&self) -> usize {
        self.0.matches(PATH_SEPARATOR).count()
    }

    /// Deterministic merged id: truncated hex SHA-256 of the key bytes.
    pub fn merged_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        let mut hex = format!("{:x}", hasher.finalize());
        hex.truncate(MERGED_ID_LEN);
        hex
    }
}

impl std::fmt::Display for PathKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments().collect::<Vec<_>>().join(" > "))
    }
}

/// Compute the path key of `id` by walking `parentId` links up to a root.
///
/// Fails on a missing node or a parent loop; both mean the tree is malformed.
pub fn path_key(tree: &SourceTree, id: &str) -> Result<PathKey> {
    let mut titles = Vec::new();
    let mut seen = HashSet::new();
    let mut current = id;

    loop {
        if !seen.insert(current) {
            return Err(ManualMergeError::Cycle {
                path: format!("parent chain of '{id}' revisits '{current}'"),
            });
        }
        let node = tree.node(current).ok_or_else(|| {
            ManualMergeError::structure(format!("node '{current}' referenced but not defined"))
        })?;
        titles.push(node.title.as_str());
        match node.parent_id.as_deref() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    Ok(PathKey::from_segments(titles.into_iter().rev()))
}

/// Path keys of every node reachable from a tree's roots.
///
/// Nodes are recorded in depth-first pre-order. Several nodes of one tree may
/// share a key (sibling sections with the same title); they are kept in order.
#[derive(Debug, Clone, Default)]
pub struct PathIndex {
    by_node: HashMap<String, PathKey>,
    by_key: HashMap<PathKey, Vec<String>>,
    order: Vec<String>,
}

impl PathIndex {
    pub fn build(tree: &SourceTree) -> Result<Self> {
        let mut index = Self::default();
        let mut stack: Vec<&str> = tree.roots.iter().rev().map(String::as_str).collect();

        while let Some(id) = stack.pop() {
            if index.by_node.contains_key(id) {
                continue;
            }
            let key = path_key(tree, id)?;
            index.by_key.entry(key.clone()).or_default().push(id.to_string());
            index.by_node.insert(id.to_string(), key);
            index.order.push(id.to_string());

            if let Some(node) = tree.node(id) {
                stack.extend(node.children.iter().rev().map(String::as_str));
            }
        }

        let unreachable = tree.nodes.len().saturating_sub(index.order.len());
        if unreachable > 0 {
            debug!(unreachable, "nodes not reachable from any root were ignored");
        }

        Ok(index)
    }

    pub fn key_of(&self, id: &str) -> Option<&PathKey> {
        self.by_node.get(id)
    }

    /// Node ids sharing `key`, in pre-order. Empty if the key is absent.
    pub fn nodes_for(&self, key: &PathKey) -> &[String] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, key: &PathKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// Reachable node ids in depth-first pre-order.
    pub fn preorder(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
