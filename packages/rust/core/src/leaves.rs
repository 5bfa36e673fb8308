//! Leaf collection and cross-variant availability.
//!
//! Each variant's leaves are keyed by [`PathKey`]; the two collections are then
//! folded into one [`AvailabilityMap`] that the tree merger consults for leaf
//! variant tags and per-variant content.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, instrument};

use manualmerge_shared::{ContentRef, VariantCode};

use crate::path_key::PathKey;
use crate::source::VariantInput;

/// One resolvable leaf of one variant.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafRecord {
    pub path_key: PathKey,
    pub variant: VariantCode,
    pub content: ContentRef,
}

/// Leaves of one variant, plus the variant they came from.
#[derive(Debug, Clone)]
pub struct LeafSet {
    pub variant: VariantCode,
    pub records: HashMap<PathKey, LeafRecord>,
}

impl LeafSet {
    pub fn get(&self, key: &PathKey) -> Option<&LeafRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Where a leaf section exists and under which content reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeafAvailability {
    /// Variant A before variant B whenever both are present.
    pub variants: Vec<VariantCode>,
    pub content: BTreeMap<VariantCode, ContentRef>,
}

pub type AvailabilityMap = HashMap<PathKey, LeafAvailability>;

/// Collect every leaf of `input` that has a resolvable content reference.
///
/// Leaves without a section are skipped. When two leaves share a key, the
/// first in pre-order wins.
#[instrument(skip_all, fields(variant = %input.code))]
pub fn collect_leaves(input: &VariantInput) -> LeafSet {
    let mut records = HashMap::new();
    let mut unresolved = 0usize;

    for id in input.index.preorder() {
        let Some(node) = input.tree().node(id) else {
            continue;
        };
        if !node.is_leaf {
            continue;
        }
        let Some(content) = input.content_for(id) else {
            unresolved += 1;
            continue;
        };
        let Some(key) = input.index.key_of(id) else {
            continue;
        };
        if records.contains_key(key) {
            debug!(path = %key, id, "duplicate leaf path, keeping first");
            continue;
        }
        records.insert(
            key.clone(),
            LeafRecord {
                path_key: key.clone(),
                variant: input.code.clone(),
                content: content.clone(),
            },
        );
    }

    debug!(leaves = records.len(), unresolved, "leaves collected");

    LeafSet {
        variant: input.code.clone(),
        records,
    }
}

/// Fold variant A's and (optionally) variant B's leaves into one map.
pub fn map_leaves(a: &LeafSet, b: Option<&LeafSet>) -> AvailabilityMap {
    let mut map = AvailabilityMap::with_capacity(a.len() + b.map_or(0, LeafSet::len));

    for (key, record) in &a.records {
        let entry = map.entry(key.clone()).or_default();
        entry.variants.push(record.variant.clone());
        entry.content.insert(record.variant.clone(), record.content.clone());

        if let Some(other) = b.and_then(|b| b.get(key)) {
            entry.variants.push(other.variant.clone());
            entry.content.insert(other.variant.clone(), other.content.clone());
        }
    }

    if let Some(b) = b {
        for (key, record) in &b.records {
            if a.get(key).is_some() {
                continue;
            }
            map.insert(
                key.clone(),
                LeafAvailability {
                    variants: vec![record.variant.clone()],
                    content: BTreeMap::from([(record.variant.clone(), record.content.clone())]),
                },
            );
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TreeBuilder, variant};

    fn key(segments: &[&str]) -> PathKey {
        PathKey::from_segments(segments.iter().copied())
    }

    #[test]
    fn collects_only_leaves_with_content() {
        let input = variant(
            "A",
            TreeBuilder::new("a")
                .leaf(&["Engine", "Oil Filter"], Some("oil-filter-a"))
                .leaf(&["Engine", "Spark Plugs"], None)
                .internal(&["Body", "Doors"])
                .build(),
        );

        let leaves = collect_leaves(&input);
        assert_eq!(leaves.len(), 1);
        let record = leaves.get(&key(&["Engine", "Oil Filter"])).unwrap();
        assert_eq!(record.variant, VariantCode::new("A"));
        assert_eq!(record.content.slug, "oil-filter-a");
        assert!(leaves.get(&key(&["Engine", "Spark Plugs"])).is_none());
    }

    #[test]
    fn present_in_both_orders_a_before_b() {
        let a = variant(
            "A",
            TreeBuilder::new("a")
                .leaf(&["Engine", "Oil Filter"], Some("oil-filter-a"))
                .build(),
        );
        let b = variant(
            "B",
            TreeBuilder::new("b")
                .leaf(&["Engine", "Oil Filter"], Some("oil-filter-b"))
                .build(),
        );

        let map = map_leaves(&collect_leaves(&a), Some(&collect_leaves(&b)));
        let avail = &map[&key(&["Engine", "Oil Filter"])];
        assert_eq!(avail.variants, vec![VariantCode::new("A"), VariantCode::new("B")]);
        assert_eq!(avail.content[&VariantCode::new("A")].slug, "oil-filter-a");
        assert_eq!(avail.content[&VariantCode::new("B")].slug, "oil-filter-b");
    }

    #[test]
    fn order_does_not_depend_on_code_sorting() {
        // "ZZ" sorts after "AA", but it is variant A and must come first.
        let a = variant("ZZ", TreeBuilder::new("a").leaf(&["Engine"], Some("x")).build());
        let b = variant("AA", TreeBuilder::new("b").leaf(&["Engine"], Some("y")).build());

        let map = map_leaves(&collect_leaves(&a), Some(&collect_leaves(&b)));
        assert_eq!(
            map[&key(&["Engine"])].variants,
            vec![VariantCode::new("ZZ"), VariantCode::new("AA")]
        );
    }

    #[test]
    fn single_side_leaves_tagged_with_their_variant() {
        let a = variant(
            "A",
            TreeBuilder::new("a")
                .leaf(&["Engine", "Turbo Wastegate"], Some("turbo-a"))
                .build(),
        );
        let b = variant(
            "B",
            TreeBuilder::new("b")
                .leaf(&["Electrical", "Battery"], Some("battery-b"))
                .build(),
        );

        let map = map_leaves(&collect_leaves(&a), Some(&collect_leaves(&b)));
        assert_eq!(map.len(), 2);
        assert_eq!(
            map[&key(&["Engine", "Turbo Wastegate"])].variants,
            vec![VariantCode::new("A")]
        );
        let battery = &map[&key(&["Electrical", "Battery"])];
        assert_eq!(battery.variants, vec![VariantCode::new("B")]);
        assert!(!battery.content.contains_key(&VariantCode::new("A")));
    }

    #[test]
    fn single_variant_mode() {
        let a = variant(
            "A",
            TreeBuilder::new("a")
                .leaf(&["Engine", "Oil Filter"], Some("oil-filter-a"))
                .build(),
        );
        let map = map_leaves(&collect_leaves(&a), None);
        assert_eq!(map.len(), 1);
        assert_eq!(
            map[&key(&["Engine", "Oil Filter"])].variants,
            vec![VariantCode::new("A")]
        );
    }

    #[test]
    fn whitespace_differences_still_match() {
        let a = variant("A", TreeBuilder::new("a").leaf(&["Engine", "Oil Filter"], Some("a")).build());
        let b = variant("B", TreeBuilder::new("b").leaf(&["Engine ", "Oil   Filter"], Some("b")).build());

        let map = map_leaves(&collect_leaves(&a), Some(&collect_leaves(&b)));
        assert_eq!(map.len(), 1);
        assert_eq!(map[&key(&["Engine", "Oil Filter"])].variants.len(), 2);
    }
}
