//! Merge engine and pipeline for manualmerge.
//!
//! Aligns two variant trees of a service manual by normalized title path,
//! produces one merged forest tagged with per-variant availability, and
//! assembles the output directory.

pub mod assembler;
pub mod leaves;
pub mod merge;
pub mod path_key;
pub mod pipeline;
pub mod sections;
pub mod source;

#[cfg(test)]
mod test_support;

pub use merge::{align_roots, merge_trees, merge_variants};
pub use path_key::{PathIndex, PathKey, normalize_title, path_key};
pub use source::{VariantInput, load_manifest};
