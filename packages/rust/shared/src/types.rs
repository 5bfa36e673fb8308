//! Core domain types for service manual manifests.
//!
//! Two families live here: the per-variant input manifests produced by the
//! scraper ([`SourceManifest`]) and the unified output ([`MergedManifest`]).
//! Both use camelCase JSON.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Current schema version for the merged manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// File name of a manifest inside a variant or output directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

// ---------------------------------------------------------------------------
// VariantCode
// ---------------------------------------------------------------------------

/// Short code naming one product variant (e.g. `EU`, `US`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantCode(pub String);

impl VariantCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VariantCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VariantCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

// ---------------------------------------------------------------------------
// ContentRef
// ---------------------------------------------------------------------------

/// Locates one variant's rendered content for a leaf section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRef {
    /// Variant-specific slug.
    pub slug: String,
    /// Rendered content file, relative to the manifest directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_file: Option<String>,
    /// Additional files (images, attachments) relative to the manifest directory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl ContentRef {
    /// Return a copy whose file references are prefixed with `prefix/`.
    ///
    /// The slug is left untouched; only on-disk locations move.
    pub fn namespaced(&self, prefix: &str) -> Self {
        let join = |file: &str| format!("{prefix}/{}", file.trim_start_matches('/'));
        Self {
            slug: self.slug.clone(),
            content_file: self.content_file.as_deref().map(join),
            files: self.files.iter().map(|f| join(f)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Source manifests (input)
// ---------------------------------------------------------------------------

/// The `manifest.json` written by the scraper for one variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceManifest {
    /// Variant code hint recorded by the scraper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Human-readable manual title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Section hierarchy.
    pub tree: SourceTree,
    /// Leaf sections with their content references.
    #[serde(default)]
    pub sections: Vec<SourceSection>,
}

/// Hierarchy of one variant. Node ids are opaque and never shared across variants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceTree {
    #[serde(default)]
    pub nodes: HashMap<String, SourceNode>,
    #[serde(default)]
    pub roots: Vec<String>,
}

impl SourceTree {
    pub fn node(&self, id: &str) -> Option<&SourceNode> {
        self.nodes.get(id)
    }
}

/// One node of a [`SourceTree`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceNode {
    pub title: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub is_leaf: bool,
}

/// A leaf section entry in a source manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSection {
    /// Id of the leaf node this section renders.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_file: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl SourceSection {
    pub fn content_ref(&self) -> ContentRef {
        ContentRef {
            slug: self.slug.clone(),
            content_file: self.content_file.clone(),
            files: self.files.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merged manifest (output)
// ---------------------------------------------------------------------------

/// The unified `manifest.json` covering both variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Variant codes in merge order (A first).
    pub variants: Vec<VariantCode>,
    pub tree: MergedTree,
    /// Leaf sections in depth-first pre-order of the merged forest.
    pub sections: Vec<MergedSection>,
}

/// Merged forest. `nodes` is id-sorted so serialization is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedTree {
    pub roots: Vec<String>,
    pub nodes: BTreeMap<String, MergedNode>,
}

/// One node of the merged forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedNode {
    /// Hash-derived id, a pure function of the node's path.
    pub id: String,
    pub title: String,
    pub variants_available: Vec<VariantCode>,
    pub parent_id: Option<String>,
    pub children: Vec<String>,
    pub is_leaf: bool,
    /// Per-variant content references (leaves only).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variants: BTreeMap<VariantCode, ContentRef>,
}

/// A leaf section of the merged manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedSection {
    /// Merged node id.
    pub id: String,
    pub title: String,
    /// Slug of the first available variant.
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_file: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    pub variants_available: Vec<VariantCode>,
    /// Present only when content exists in more than one variant.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variants: BTreeMap<VariantCode, ContentRef>,
}
