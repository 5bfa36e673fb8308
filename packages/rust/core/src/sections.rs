//! Unified leaf section list for the presentation layer.

use std::collections::BTreeMap;

use manualmerge_shared::{MergedNode, MergedSection, MergedTree};

/// One section per merged leaf with content, in depth-first pre-order.
///
/// The section's own slug and files come from the first variant (in
/// `variants_available` order) that has content. The per-variant map is only
/// attached when more than one variant has content.
pub fn build_sections(tree: &MergedTree) -> Vec<MergedSection> {
    let mut sections = Vec::new();
    let mut stack: Vec<&str> = tree.roots.iter().rev().map(String::as_str).collect();

    while let Some(id) = stack.pop() {
        let Some(node) = tree.nodes.get(id) else {
            continue;
        };
        if let Some(section) = section_for(node) {
            sections.push(section);
        }
        stack.extend(node.children.iter().rev().map(String::as_str));
    }

    sections
}

fn section_for(node: &MergedNode) -> Option<MergedSection> {
    if !node.is_leaf {
        return None;
    }
    let primary = node
        .variants_available
        .iter()
        .find_map(|code| node.variants.get(code))?;

    let variants = if node.variants.len() > 1 {
        node.variants.clone()
    } else {
        BTreeMap::new()
    };

    Some(MergedSection {
        id: node.id.clone(),
        title: node.title.clone(),
        slug: primary.slug.clone(),
        content_file: primary.content_file.clone(),
        files: primary.files.clone(),
        variants_available: node.variants_available.clone(),
        variants,
    })
}
