//! Application configuration for manualmerge.
//!
//! User config lives at `~/.manualmerge/manualmerge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ManualMergeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "manualmerge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".manualmerge";

// ---------------------------------------------------------------------------
// Config structs (matching manualmerge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Fallback variant codes.
    #[serde(default)]
    pub variants: VariantsConfig,

    /// Asset copying behaviour.
    #[serde(default)]
    pub assets: AssetsConfig,
}

/// How to treat a node that is a leaf in one variant and internal in the other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeafConflictPolicy {
    /// Leaf if any variant marks it leaf.
    #[default]
    PreferLeaf,
    /// Leaf only if every variant containing it marks it leaf.
    PreferInternal,
}

impl std::str::FromStr for LeafConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "prefer-leaf" => Ok(Self::PreferLeaf),
            "prefer-internal" => Ok(Self::PreferInternal),
            other => Err(format!(
                "unknown leaf conflict policy '{other}': expected 'prefer-leaf' or 'prefer-internal'"
            )),
        }
    }
}

impl std::fmt::Display for LeafConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreferLeaf => f.write_str("prefer-leaf"),
            Self::PreferInternal => f.write_str("prefer-internal"),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default output directory for the merged manual.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Leaf/internal conflict resolution.
    #[serde(default)]
    pub leaf_conflict: LeafConflictPolicy,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            leaf_conflict: LeafConflictPolicy::default(),
        }
    }
}

fn default_output_dir() -> String {
    "merged".into()
}

/// `[variants]` section. Used when neither the CLI nor the manifest names a code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantsConfig {
    #[serde(default = "default_code_a")]
    pub a: String,
    #[serde(default = "default_code_b")]
    pub b: String,
}

impl Default for VariantsConfig {
    fn default() -> Self {
        Self {
            a: default_code_a(),
            b: default_code_b(),
        }
    }
}

fn default_code_a() -> String {
    "A".into()
}
fn default_code_b() -> String {
    "B".into()
}

/// `[assets]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Directories (relative to each variant directory) copied into the output.
    #[serde(default = "default_copy_dirs")]
    pub copy_dirs: Vec<String>,

    /// Copy each variant under `<output>/<code>/` instead of sharing one tree.
    #[serde(default = "default_true")]
    pub namespace_assets: bool,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            copy_dirs: default_copy_dirs(),
            namespace_assets: true,
        }
    }
}

fn default_copy_dirs() -> Vec<String> {
    vec!["content".into(), "images".into()]
}
fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Merge options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime merge options, derived from the config file, then overridden by CLI flags.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub leaf_conflict: LeafConflictPolicy,
    pub copy_dirs: Vec<String>,
    pub namespace_assets: bool,
    /// Code used for variant A when neither flag nor manifest provides one.
    pub fallback_code_a: String,
    /// Code used for variant B when neither flag nor manifest provides one.
    pub fallback_code_b: String,
}

impl From<&AppConfig> for MergeOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            leaf_conflict: config.defaults.leaf_conflict,
            copy_dirs: config.assets.copy_dirs.clone(),
            namespace_assets: config.assets.namespace_assets,
            fallback_code_a: config.variants.a.clone(),
            fallback_code_b: config.variants.b.clone(),
        }
    }
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.manualmerge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ManualMergeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.manualmerge/manualmerge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ManualMergeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ManualMergeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ManualMergeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ManualMergeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ManualMergeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
