//! Builders for small variant manifests used across unit tests.

use manualmerge_shared::{SourceManifest, SourceNode, SourceSection, SourceTree, VariantCode};

use crate::source::VariantInput;

/// Builds a [`SourceManifest`] from title paths. Ids are `<prefix>-<n>`.
pub(crate) struct TreeBuilder {
    prefix: String,
    variant: Option<String>,
    tree: SourceTree,
    sections: Vec<SourceSection>,
    next_id: usize,
}

impl TreeBuilder {
    pub(crate) fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            variant: None,
            tree: SourceTree::default(),
            sections: Vec::new(),
            next_id: 0,
        }
    }

    pub(crate) fn variant(mut self, code: &str) -> Self {
        self.variant = Some(code.to_string());
        self
    }

    /// Ensure `path` exists and flag its last node as a leaf. With a slug, a
    /// section pointing at `content/<slug>.html` is added.
    pub(crate) fn leaf(mut self, path: &[&str], slug: Option<&str>) -> Self {
        let id = self.ensure(path);
        if let Some(node) = self.tree.nodes.get_mut(&id) {
            node.is_leaf = true;
        }
        if let Some(slug) = slug {
            self.sections.push(SourceSection {
                id,
                title: path.last().map(|t| t.to_string()),
                slug: slug.to_string(),
                content_file: Some(format!("content/{slug}.html")),
                files: vec![],
            });
        }
        self
    }

    /// Ensure `path` exists without touching leaf flags.
    pub(crate) fn internal(mut self, path: &[&str]) -> Self {
        self.ensure(path);
        self
    }

    pub(crate) fn build(self) -> SourceManifest {
        SourceManifest {
            variant: self.variant,
            title: None,
            tree: self.tree,
            sections: self.sections,
        }
    }

    fn ensure(&mut self, path: &[&str]) -> String {
        let mut parent: Option<String> = None;
        for title in path {
            let siblings = match &parent {
                Some(p) => &self.tree.nodes[p].children,
                None => &self.tree.roots,
            };
            let existing = siblings
                .iter()
                .find(|id| self.tree.nodes[*id].title == *title)
                .cloned();

            let id = match existing {
                Some(id) => id,
                None => {
                    self.next_id += 1;
                    let id = format!("{}-{}", self.prefix, self.next_id);
                    self.tree.nodes.insert(
                        id.clone(),
                        SourceNode {
                            title: title.to_string(),
                            parent_id: parent.clone(),
                            children: vec![],
                            is_leaf: false,
                        },
                    );
                    match &parent {
                        Some(p) => {
                            if let Some(node) = self.tree.nodes.get_mut(p) {
                                node.children.push(id.clone());
                            }
                        }
                        None => self.tree.roots.push(id.clone()),
                    }
                    id
                }
            };
            parent = Some(id);
        }
        parent.unwrap_or_default()
    }
}

/// Wrap a built manifest as a validated, indexed variant.
pub(crate) fn variant(code: &str, manifest: SourceManifest) -> VariantInput {
    VariantInput::new(VariantCode::new(code), manifest).expect("valid test manifest")
}
