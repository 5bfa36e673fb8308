//! Output directory assembler.
//!
//! Copies each variant's content directories next to the merged manifest,
//! then writes `manifest.json`. The manifest goes last, via temp file and
//! rename, so a failed run never leaves one behind.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use manualmerge_shared::{
    CURRENT_SCHEMA_VERSION, MANIFEST_FILE_NAME, ManualMergeError, MergedManifest, Result,
    VariantCode,
};

/// Configuration for assembling the output directory.
#[derive(Debug, Clone)]
pub struct AssembleConfig {
    /// Directory receiving the merged manual.
    pub output_dir: PathBuf,
    /// Directories (relative to each variant directory) to copy.
    pub copy_dirs: Vec<String>,
    /// Copy under `<output>/<code>/` instead of sharing one tree.
    pub namespace_assets: bool,
}

/// A variant directory to copy assets from.
#[derive(Debug, Clone)]
pub struct AssetSource {
    pub code: VariantCode,
    pub dir: PathBuf,
}

/// Counts from one asset copy pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files_copied: usize,
    /// Files that already existed at the destination: written by an earlier
    /// variant in the shared layout, or left over from a previous run.
    pub files_overwritten: usize,
}

/// Copy every configured directory of every source, in source order.
#[instrument(skip_all, fields(output = %config.output_dir.display(), sources = sources.len()))]
pub fn copy_assets(config: &AssembleConfig, sources: &[AssetSource]) -> Result<CopyStats> {
    let mut stats = CopyStats::default();

    for source in sources {
        let target_root = if config.namespace_assets {
            config.output_dir.join(source.code.as_str())
        } else {
            config.output_dir.clone()
        };

        for dir in &config.copy_dirs {
            let from = source.dir.join(dir);
            if !from.is_dir() {
                debug!(variant = %source.code, path = %from.display(), "asset directory missing, skipping");
                continue;
            }
            copy_dir(&from, &target_root.join(dir), &mut stats)?;
        }
    }

    info!(
        copied = stats.files_copied,
        overwritten = stats.files_overwritten,
        "assets copied"
    );

    Ok(stats)
}

/// Write the merged manifest atomically. Returns the manifest path.
#[instrument(skip_all, fields(output = %output_dir.display()))]
pub fn write_manifest(output_dir: &Path, manifest: &MergedManifest) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).map_err(|e| ManualMergeError::io(output_dir, e))?;

    let target = output_dir.join(MANIFEST_FILE_NAME);
    let temp = output_dir.join(format!(".{MANIFEST_FILE_NAME}.tmp"));

    write_json(&temp, manifest)?;
    std::fs::rename(&temp, &target).map_err(|e| ManualMergeError::io(&target, e))?;

    info!(
        path = %target.display(),
        nodes = manifest.tree.nodes.len(),
        sections = manifest.sections.len(),
        "merged manifest written"
    );

    Ok(target)
}

/// Result of checking an assembled output directory.
#[derive(Debug, Clone, Default)]
pub struct OutputReport {
    pub sections: usize,
    /// Section file references that do not exist under the output directory.
    pub missing_files: Vec<String>,
}

/// Verify that an output directory holds a readable merged manifest and report
/// section file references that do not resolve.
pub fn validate_output(output_dir: &Path) -> Result<OutputReport> {
    let manifest_path = output_dir.join(MANIFEST_FILE_NAME);
    if !manifest_path.exists() {
        return Err(ManualMergeError::validation(format!(
            "missing {}",
            manifest_path.display()
        )));
    }

    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| ManualMergeError::io(&manifest_path, e))?;
    let manifest: MergedManifest = serde_json::from_str(&content)
        .map_err(|e| ManualMergeError::validation(format!("invalid merged manifest: {e}")))?;

    if manifest.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(ManualMergeError::validation(format!(
            "unsupported schemaVersion: {} (expected {})",
            manifest.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }

    let mut report = OutputReport {
        sections: manifest.sections.len(),
        missing_files: Vec::new(),
    };

    for section in &manifest.sections {
        let mut refs: Vec<&String> = section
            .content_file
            .iter()
            .chain(&section.files)
            .collect();
        for content in section.variants.values() {
            refs.extend(content.content_file.iter().chain(&content.files));
        }
        for file in refs {
            if !output_dir.join(file).exists() && !report.missing_files.contains(file) {
                debug!(section = %section.title, file = %file, "section file missing (non-fatal)");
                report.missing_files.push(file.clone());
            }
        }
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write a JSON file (pretty-printed).
fn write_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(|e| {
        ManualMergeError::validation(format!("JSON serialization failed: {e}"))
    })?;
    std::fs::write(path, json).map_err(|e| ManualMergeError::io(path, e))?;
    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}

/// Recursively copy `from` into `to`, counting overwrites.
fn copy_dir(from: &Path, to: &Path, stats: &mut CopyStats) -> Result<()> {
    std::fs::create_dir_all(to).map_err(|e| ManualMergeError::io(to, e))?;

    let entries = std::fs::read_dir(from).map_err(|e| ManualMergeError::io(from, e))?;
    let mut entries = entries
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| ManualMergeError::io(from, e))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let src = entry.path();
        let dst = to.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| ManualMergeError::io(&src, e))?;

        if file_type.is_dir() {
            copy_dir(&src, &dst, stats)?;
            continue;
        }

        if dst.exists() {
            warn!(path = %dst.display(), "asset overwritten");
            stats.files_overwritten += 1;
        }
        std::fs::copy(&src, &dst).map_err(|e| ManualMergeError::io(&dst, e))?;
        stats.files_copied += 1;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
