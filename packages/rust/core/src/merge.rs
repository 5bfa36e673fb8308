//! Tree alignment and merge.
//!
//! Nodes of the two variant trees correspond only through their [`PathKey`].
//! Every distinct key becomes exactly one [`MergedNode`] whose id is a hash of
//! the key, so unchanged inputs always yield the same ids.
//!
//! Ordering is fixed by construction: variant A's roots and children first, then
//! anything only variant B has, deduplicated by key.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info, instrument};

use manualmerge_shared::{
    CURRENT_SCHEMA_VERSION, ContentRef, LeafConflictPolicy, ManualMergeError, MergedManifest,
    MergedNode, MergedTree, Result, VariantCode,
};

use crate::leaves::{AvailabilityMap, collect_leaves, map_leaves};
use crate::path_key::PathKey;
use crate::sections::build_sections;
use crate::source::VariantInput;

/// Accumulates merged nodes across the recursive merge.
///
/// `ids` memoizes finished keys; `expanding` holds the keys on the current
/// descent so a path that re-enters itself fails instead of recursing forever.
pub struct MergeContext<'a> {
    a: &'a VariantInput,
    b: Option<&'a VariantInput>,
    availability: &'a AvailabilityMap,
    policy: LeafConflictPolicy,
    nodes: BTreeMap<String, MergedNode>,
    ids: HashMap<PathKey, String>,
    owners: HashMap<String, PathKey>,
    expanding: HashSet<PathKey>,
}

impl<'a> MergeContext<'a> {
    pub fn new(
        a: &'a VariantInput,
        b: Option<&'a VariantInput>,
        availability: &'a AvailabilityMap,
        policy: LeafConflictPolicy,
    ) -> Self {
        Self {
            a,
            b,
            availability,
            policy,
            nodes: BTreeMap::new(),
            ids: HashMap::new(),
            owners: HashMap::new(),
            expanding: HashSet::new(),
        }
    }

    /// Materialize the merged node for `key` and its whole subtree.
    pub fn merge_key(&mut self, key: &PathKey) -> Result<String> {
        if let Some(id) = self.ids.get(key) {
            return Ok(id.clone());
        }
        if !self.expanding.insert(key.clone()) {
            return Err(ManualMergeError::Cycle {
                path: key.to_string(),
            });
        }

        let id = key.merged_id();
        match self.owners.get(&id) {
            Some(owner) if owner != key => {
                return Err(ManualMergeError::IdCollision {
                    id,
                    first: owner.to_string(),
                    second: key.to_string(),
                });
            }
            Some(_) => {}
            None => {
                self.owners.insert(id.clone(), key.clone());
            }
        }

        let (a, b) = (self.a, self.b);
        let a_nodes = a.index.nodes_for(key);
        let b_nodes = b.map(|b| b.index.nodes_for(key)).unwrap_or(&[]);

        let is_leaf = self.resolve_leaf(key, a_nodes, b_nodes);
        let (variants_available, variants) =
            self.resolve_availability(key, is_leaf, !a_nodes.is_empty(), !b_nodes.is_empty());

        let child_keys = union_children(a, a_nodes, b.map(|b| (b, b_nodes)));
        let mut children = Vec::with_capacity(child_keys.len());
        for child in &child_keys {
            children.push(self.merge_key(child)?);
        }

        self.expanding.remove(key);
        self.ids.insert(key.clone(), id.clone());
        self.nodes.insert(
            id.clone(),
            MergedNode {
                id: id.clone(),
                title: key.title().to_string(),
                variants_available,
                parent_id: None,
                children,
                is_leaf,
                variants,
            },
        );

        Ok(id)
    }

    pub fn into_nodes(self) -> BTreeMap<String, MergedNode> {
        self.nodes
    }

    fn resolve_leaf(&self, key: &PathKey, a_nodes: &[String], b_nodes: &[String]) -> bool {
        let mut flags = leaf_flags(self.a, a_nodes).collect::<Vec<_>>();
        if let Some(b) = self.b {
            flags.extend(leaf_flags(b, b_nodes));
        }

        let any = flags.iter().any(|f| *f);
        let all = !flags.is_empty() && flags.iter().all(|f| *f);
        if any && !all {
            debug!(path = %key, policy = %self.policy, "leaf/internal conflict");
        }

        match self.policy {
            LeafConflictPolicy::PreferLeaf => any,
            LeafConflictPolicy::PreferInternal => all,
        }
    }

    fn resolve_availability(
        &self,
        key: &PathKey,
        is_leaf: bool,
        in_a: bool,
        in_b: bool,
    ) -> (Vec<VariantCode>, BTreeMap<VariantCode, ContentRef>) {
        if is_leaf {
            if let Some(avail) = self.availability.get(key) {
                return (avail.variants.clone(), avail.content.clone());
            }
        }

        let mut present = Vec::with_capacity(2);
        if in_a {
            present.push(self.a.code.clone());
        }
        if let (true, Some(b)) = (in_b, self.b) {
            present.push(b.code.clone());
        }
        (present, BTreeMap::new())
    }
}

fn leaf_flags<'i>(input: &'i VariantInput, ids: &'i [String]) -> impl Iterator<Item = bool> + 'i {
    ids.iter()
        .filter_map(|id| input.tree().node(id))
        .map(|node| node.is_leaf)
}

/// Child keys of every candidate node: A's in order, then B-only keys.
fn union_children(
    a: &VariantInput,
    a_nodes: &[String],
    b: Option<(&VariantInput, &[String])>,
) -> Vec<PathKey> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();

    let sides = std::iter::once((a, a_nodes)).chain(b);
    for (input, ids) in sides {
        for id in ids {
            let Some(node) = input.tree().node(id) else {
                continue;
            };
            for child in &node.children {
                if let Some(key) = input.index.key_of(child) {
                    if seen.insert(key.clone()) {
                        keys.push(key.clone());
                    }
                }
            }
        }
    }

    keys
}

/// Root keys in merged order: A's roots, then roots only B has.
pub fn align_roots(a: &VariantInput, b: Option<&VariantInput>) -> Vec<PathKey> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();

    for input in std::iter::once(a).chain(b) {
        for root in &input.tree().roots {
            let Some(node) = input.tree().node(root) else {
                continue;
            };
            let key = PathKey::root(&node.title);
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
    }

    keys
}

/// Merge both trees into one forest and derive parent links.
#[instrument(skip_all, fields(variant_a = %a.code))]
pub fn merge_trees(
    a: &VariantInput,
    b: Option<&VariantInput>,
    availability: &AvailabilityMap,
    policy: LeafConflictPolicy,
) -> Result<MergedTree> {
    let root_keys = align_roots(a, b);
    let mut ctx = MergeContext::new(a, b, availability, policy);

    let mut roots = Vec::with_capacity(root_keys.len());
    for key in &root_keys {
        roots.push(ctx.merge_key(key)?);
    }

    let mut nodes = ctx.into_nodes();
    link_parents(&mut nodes)?;

    info!(roots = roots.len(), nodes = nodes.len(), "trees merged");

    Ok(MergedTree { roots, nodes })
}

/// Set `parent_id` on every node from its parent's `children`, in one pass.
fn link_parents(nodes: &mut BTreeMap<String, MergedNode>) -> Result<()> {
    let links: Vec<(String, String)> = nodes
        .values()
        .flat_map(|node| {
            node.children
                .iter()
                .map(move |child| (child.clone(), node.id.clone()))
        })
        .collect();

    for (child, parent) in links {
        let node = nodes.get_mut(&child).ok_or_else(|| {
            ManualMergeError::structure(format!("merged child '{child}' of '{parent}' missing"))
        })?;
        match &node.parent_id {
            Some(existing) if *existing != parent => {
                return Err(ManualMergeError::structure(format!(
                    "merged node '{child}' claimed by '{existing}' and '{parent}'"
                )));
            }
            _ => node.parent_id = Some(parent),
        }
    }

    Ok(())
}

/// Run the whole in-memory merge: leaves, availability, trees, sections.
pub fn merge_variants(
    a: &VariantInput,
    b: Option<&VariantInput>,
    policy: LeafConflictPolicy,
) -> Result<MergedManifest> {
    if let Some(b) = b {
        if b.code == a.code {
            return Err(ManualMergeError::config(format!(
                "both variants use code '{}'",
                a.code
            )));
        }
    }

    let leaves_a = collect_leaves(a);
    let leaves_b = b.map(collect_leaves);
    let availability = map_leaves(&leaves_a, leaves_b.as_ref());
    debug!(leaf_paths = availability.len(), "leaf availability mapped");

    let tree = merge_trees(a, b, &availability, policy)?;
    let sections = build_sections(&tree);

    let mut variants = vec![a.code.clone()];
    variants.extend(b.map(|b| b.code.clone()));

    Ok(MergedManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        variants,
        tree,
        sections,
    })
}
