//! Shared types, error model, and configuration for manualmerge.
//!
//! This crate is the foundation depended on by all other manualmerge crates.
//! It provides:
//! - [`ManualMergeError`]: the unified error type
//! - Manifest types ([`SourceManifest`], [`MergedManifest`], [`ContentRef`], [`VariantCode`])
//! - Configuration ([`AppConfig`], [`MergeOptions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AssetsConfig, DefaultsConfig, LeafConflictPolicy, MergeOptions, VariantsConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{ManualMergeError, Result};
pub use types::{
    CURRENT_SCHEMA_VERSION, ContentRef, MANIFEST_FILE_NAME, MergedManifest, MergedNode,
    MergedSection, MergedTree, SourceManifest, SourceNode, SourceSection, SourceTree, VariantCode,
};
