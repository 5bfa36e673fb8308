//! Loading and structural validation of one variant's manifest.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use manualmerge_shared::{
    ContentRef, MANIFEST_FILE_NAME, ManualMergeError, Result, SourceManifest, SourceTree,
    VariantCode,
};

use crate::path_key::{PathIndex, path_key};

/// Path of the manifest inside a variant directory.
pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE_NAME)
}

/// Load and parse `manifest.json` from a variant directory.
pub fn load_manifest(dir: &Path) -> Result<SourceManifest> {
    let path = manifest_path(dir);
    let content = std::fs::read_to_string(&path).map_err(|e| ManualMergeError::io(&path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| ManualMergeError::parse(format!("invalid {}: {e}", path.display())))
}

/// Check that a tree is a forest: referenced ids exist, roots have no parent,
/// every child points back at the node listing it, and every parent chain
/// ends, including chains of nodes no root reaches.
pub fn validate_tree(tree: &SourceTree) -> Result<()> {
    for root in &tree.roots {
        let node = tree.node(root).ok_or_else(|| {
            ManualMergeError::structure(format!("root '{root}' is not defined"))
        })?;
        if let Some(parent) = &node.parent_id {
            return Err(ManualMergeError::structure(format!(
                "root '{root}' has parent '{parent}'"
            )));
        }
    }

    // Sorted so the first reported defect is stable across runs.
    let mut ids: Vec<&String> = tree.nodes.keys().collect();
    ids.sort();

    for id in &ids {
        path_key(tree, id).map_err(|e| match e {
            ManualMergeError::Cycle { path } => {
                ManualMergeError::structure(format!("parent cycle: {path}"))
            }
            other => other,
        })?;
    }

    for id in ids {
        for child in &tree.nodes[id].children {
            let child_node = tree.node(child).ok_or_else(|| {
                ManualMergeError::structure(format!("child '{child}' of '{id}' is not defined"))
            })?;
            if child_node.parent_id.as_deref() != Some(id.as_str()) {
                return Err(ManualMergeError::structure(format!(
                    "child '{child}' is listed under '{id}' but has parent {:?}",
                    child_node.parent_id
                )));
            }
        }
    }

    Ok(())
}

/// One variant, ready to merge: validated tree, path index, and content
/// references keyed by leaf node id.
#[derive(Debug, Clone)]
pub struct VariantInput {
    pub code: VariantCode,
    pub manifest: SourceManifest,
    pub index: PathIndex,
    content: HashMap<String, ContentRef>,
}

impl VariantInput {
    #[instrument(skip_all, fields(variant = %code))]
    pub fn new(code: VariantCode, manifest: SourceManifest) -> Result<Self> {
        validate_tree(&manifest.tree)?;
        let index = PathIndex::build(&manifest.tree)?;

        let mut content = HashMap::with_capacity(manifest.sections.len());
        for section in &manifest.sections {
            if content.contains_key(&section.id) {
                debug!(id = %section.id, slug = %section.slug, "duplicate section id, keeping first");
                continue;
            }
            content.insert(section.id.clone(), section.content_ref());
        }

        debug!(
            nodes = index.len(),
            sections = content.len(),
            "variant indexed"
        );

        Ok(Self {
            code,
            manifest,
            index,
            content,
        })
    }

    pub fn tree(&self) -> &SourceTree {
        &self.manifest.tree
    }

    /// Content reference for a node, if a section names it.
    pub fn content_for(&self, id: &str) -> Option<&ContentRef> {
        self.content.get(id)
    }

    /// Prefix every file reference with this variant's code.
    pub fn namespace_content(&mut self) {
        let prefix = self.code.to_string();
        for content in self.content.values_mut() {
            *content = content.namespaced(&prefix);
        }
    }

    /// Reachable nodes flagged as leaves.
    pub fn leaf_count(&self) -> usize {
        self.index
            .preorder()
            .filter(|id| self.tree().node(id).is_some_and(|n| n.is_leaf))
            .count()
    }
}
