//! End-to-end `merge` pipeline: variant directories → load → merge → assets → manifest.
//!
//! All reads happen before the merge and all writes after it. The merged
//! manifest is the last thing written.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, instrument};

use manualmerge_shared::{ManualMergeError, MergeOptions, Result, VariantCode};

use crate::assembler::{AssembleConfig, AssetSource, copy_assets, write_manifest};
use crate::leaves::collect_leaves;
use crate::merge::merge_variants;
use crate::source::{VariantInput, load_manifest};

/// Configuration for the `merge_manuals` pipeline.
#[derive(Debug, Clone)]
pub struct MergeRunConfig {
    /// Directory holding variant A's `manifest.json`.
    pub variant_a_dir: PathBuf,
    /// Directory holding variant B's `manifest.json`, if merging two variants.
    pub variant_b_dir: Option<PathBuf>,
    /// Output directory for the merged manual.
    pub output_dir: PathBuf,
    /// Explicit code for variant A (overrides the manifest).
    pub code_a: Option<String>,
    /// Explicit code for variant B (overrides the manifest).
    pub code_b: Option<String>,
    pub options: MergeOptions,
}

/// Per-variant counts reported after a run.
#[derive(Debug, Clone)]
pub struct VariantSummary {
    pub code: VariantCode,
    pub nodes: usize,
    pub leaves: usize,
    /// Merged sections available in this variant.
    pub sections: usize,
}

/// Result of the `merge_manuals` pipeline.
#[derive(Debug)]
pub struct MergeRunResult {
    /// Path of the written merged manifest.
    pub manifest_path: PathBuf,
    pub variants: Vec<VariantSummary>,
    pub root_count: usize,
    pub node_count: usize,
    pub section_count: usize,
    /// Sections with content in more than one variant.
    pub shared_sections: usize,
    pub files_copied: usize,
    pub files_overwritten: usize,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &MergeRunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &MergeRunResult) {}
}

/// Pick a variant code: explicit flag, then manifest hint, then fallback.
///
/// Codes become directory names when assets are namespaced, so they must be
/// non-empty and free of path separators.
pub fn resolve_code(
    flag: Option<&str>,
    manifest: Option<&str>,
    fallback: &str,
) -> Result<VariantCode> {
    let code = flag.or(manifest).unwrap_or(fallback).trim();
    if code.is_empty() {
        return Err(ManualMergeError::config("variant code must not be empty"));
    }
    if code.contains(['/', '\\']) || code == "." || code == ".." {
        return Err(ManualMergeError::config(format!(
            "variant code '{code}' is not usable as a directory name"
        )));
    }
    Ok(VariantCode::new(code))
}

/// Run the full `merge` pipeline.
///
/// 1. Load and validate both manifests
/// 2. Merge trees in memory
/// 3. Copy content/asset directories
/// 4. Write the merged manifest
#[instrument(skip_all, fields(a = %config.variant_a_dir.display(), out = %config.output_dir.display()))]
pub fn merge_manuals(
    config: &MergeRunConfig,
    progress: &dyn ProgressReporter,
) -> Result<MergeRunResult> {
    let start = Instant::now();
    let options = &config.options;

    // --- Phase 1: Load ---
    progress.phase("Loading manifests");
    let manifest_a = load_manifest(&config.variant_a_dir)?;
    let manifest_b = config
        .variant_b_dir
        .as_deref()
        .map(load_manifest)
        .transpose()?;

    let code_a = resolve_code(
        config.code_a.as_deref(),
        manifest_a.variant.as_deref(),
        &options.fallback_code_a,
    )?;
    let mut a = VariantInput::new(code_a, manifest_a)?;

    let mut b = match manifest_b {
        Some(manifest) => {
            let code = resolve_code(
                config.code_b.as_deref(),
                manifest.variant.as_deref(),
                &options.fallback_code_b,
            )?;
            Some(VariantInput::new(code, manifest)?)
        }
        None => None,
    };

    if options.namespace_assets {
        a.namespace_content();
        if let Some(b) = b.as_mut() {
            b.namespace_content();
        }
    }

    info!(
        variant_a = %a.code,
        variant_b = %b.as_ref().map(|b| b.code.to_string()).unwrap_or_default(),
        policy = %options.leaf_conflict,
        "manifests loaded"
    );

    // --- Phase 2: Merge ---
    progress.phase("Merging trees");
    let manifest = merge_variants(&a, b.as_ref(), options.leaf_conflict)?;

    // --- Phase 3: Assets ---
    progress.phase("Copying assets");
    let mut sources = vec![AssetSource {
        code: a.code.clone(),
        dir: config.variant_a_dir.clone(),
    }];
    if let (Some(b), Some(dir)) = (&b, &config.variant_b_dir) {
        sources.push(AssetSource {
            code: b.code.clone(),
            dir: dir.clone(),
        });
    }
    let assemble_config = AssembleConfig {
        output_dir: config.output_dir.clone(),
        copy_dirs: options.copy_dirs.clone(),
        namespace_assets: options.namespace_assets,
    };
    let stats = copy_assets(&assemble_config, &sources)?;

    // --- Phase 4: Manifest ---
    progress.phase("Writing merged manifest");
    let manifest_path = write_manifest(&config.output_dir, &manifest)?;

    let variants = std::iter::once(&a)
        .chain(b.as_ref())
        .map(|input| VariantSummary {
            code: input.code.clone(),
            nodes: input.index.len(),
            leaves: input.leaf_count(),
            sections: manifest
                .sections
                .iter()
                .filter(|s| s.variants_available.contains(&input.code))
                .count(),
        })
        .collect();

    let result = MergeRunResult {
        manifest_path,
        variants,
        root_count: manifest.tree.roots.len(),
        node_count: manifest.tree.nodes.len(),
        section_count: manifest.sections.len(),
        shared_sections: manifest
            .sections
            .iter()
            .filter(|s| s.variants_available.len() > 1)
            .count(),
        files_copied: stats.files_copied,
        files_overwritten: stats.files_overwritten,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        roots = result.root_count,
        nodes = result.node_count,
        sections = result.section_count,
        shared = result.shared_sections,
        elapsed_ms = result.elapsed.as_millis(),
        "merge pipeline complete"
    );

    Ok(result)
}

/// Summary of one variant directory, without merging.
#[derive(Debug, Clone)]
pub struct InspectReport {
    pub code: VariantCode,
    pub roots: usize,
    pub nodes: usize,
    pub leaves: usize,
    pub sections: usize,
    /// Leaf paths with no resolvable content reference.
    pub unresolved: Vec<String>,
}

/// Load and validate one variant directory and report what a merge would see.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn inspect_variant(dir: &Path, code: Option<&str>, fallback: &str) -> Result<InspectReport> {
    let manifest = load_manifest(dir)?;
    let code = resolve_code(code, manifest.variant.as_deref(), fallback)?;
    let input = VariantInput::new(code, manifest)?;
    let leaves = collect_leaves(&input);

    let unresolved = input
        .index
        .preorder()
        .filter(|id| input.tree().node(id).is_some_and(|n| n.is_leaf))
        .filter(|id| input.content_for(id).is_none())
        .filter_map(|id| input.index.key_of(id))
        .map(|key| key.to_string())
        .collect();

    Ok(InspectReport {
        roots: input.tree().roots.len(),
        nodes: input.index.len(),
        leaves: input.leaf_count(),
        sections: leaves.len(),
        unresolved,
        code: input.code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::validate_output;
    use manualmerge_shared::{MANIFEST_FILE_NAME, MergedManifest};

    const FIXTURE_A: &str = "../../../fixtures/json/variant-a";
    const FIXTURE_B: &str = "../../../fixtures/json/variant-b";

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mm-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn make_config(out: &Path, with_b: bool) -> MergeRunConfig {
        MergeRunConfig {
            variant_a_dir: PathBuf::from(FIXTURE_A),
            variant_b_dir: with_b.then(|| PathBuf::from(FIXTURE_B)),
            output_dir: out.to_path_buf(),
            code_a: None,
            code_b: None,
            options: MergeOptions::default(),
        }
    }

    fn read_manifest(out: &Path) -> MergedManifest {
        let content = std::fs::read_to_string(out.join(MANIFEST_FILE_NAME)).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    #[test]
    fn merges_fixture_variants() {
        let tmp = temp_dir();
        let out = tmp.join("out");
        let result = merge_manuals(&make_config(&out, true), &SilentProgress).unwrap();

        assert_eq!(result.root_count, 3);
        assert_eq!(result.section_count, 5);
        assert_eq!(result.shared_sections, 1);
        assert_eq!(result.variants[0].code, VariantCode::new("EU"));
        assert_eq!(result.variants[1].code, VariantCode::new("US"));
        assert_eq!(result.variants[1].sections, 3);

        let manifest = read_manifest(&out);
        let roots: Vec<_> = manifest
            .tree
            .roots
            .iter()
            .map(|id| manifest.tree.nodes[id].title.as_str())
            .collect();
        assert_eq!(roots, vec!["Body", "Engine", "Electrical"]);

        let filter = manifest
            .sections
            .iter()
            .find(|s| s.title == "Oil Filter")
            .unwrap();
        assert_eq!(
            filter.variants_available,
            vec![VariantCode::new("EU"), VariantCode::new("US")]
        );
        assert_eq!(filter.variants[&VariantCode::new("EU")].slug, "oil-filter-eu");
        assert_eq!(filter.variants[&VariantCode::new("US")].slug, "oil-filter-us");

        let turbo = manifest
            .sections
            .iter()
            .find(|s| s.title == "Turbo Wastegate")
            .unwrap();
        assert_eq!(turbo.variants_available, vec![VariantCode::new("EU")]);
        assert!(turbo.variants.is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn namespaced_references_resolve() {
        let tmp = temp_dir();
        let out = tmp.join("out");
        let result = merge_manuals(&make_config(&out, true), &SilentProgress).unwrap();
        assert_eq!(result.files_overwritten, 0);

        assert!(out.join("EU/content/oil-filter.html").exists());
        assert!(out.join("US/content/oil-filter.html").exists());
        assert!(out.join("US/images/filter.png").exists());

        let report = validate_output(&out).unwrap();
        assert!(report.missing_files.is_empty(), "{:?}", report.missing_files);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn shared_layout_overwrites_colliding_files() {
        let tmp = temp_dir();
        let out = tmp.join("out");
        let mut config = make_config(&out, true);
        config.options.namespace_assets = false;

        let result = merge_manuals(&config, &SilentProgress).unwrap();
        assert_eq!(result.files_overwritten, 1);
        let body = std::fs::read_to_string(out.join("content/oil-filter.html")).unwrap();
        assert!(body.contains("(US)"));

        let manifest = read_manifest(&out);
        let filter = manifest.sections.iter().find(|s| s.title == "Oil Filter").unwrap();
        assert_eq!(filter.content_file.as_deref(), Some("content/oil-filter.html"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn repeated_runs_are_byte_identical() {
        let tmp = temp_dir();
        merge_manuals(&make_config(&tmp.join("one"), true), &SilentProgress).unwrap();
        merge_manuals(&make_config(&tmp.join("two"), true), &SilentProgress).unwrap();

        let one = std::fs::read(tmp.join("one").join(MANIFEST_FILE_NAME)).unwrap();
        let two = std::fs::read(tmp.join("two").join(MANIFEST_FILE_NAME)).unwrap();
        assert_eq!(one, two);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn single_variant_run() {
        let tmp = temp_dir();
        let out = tmp.join("out");
        let result = merge_manuals(&make_config(&out, false), &SilentProgress).unwrap();
        assert_eq!(result.variants.len(), 1);
        assert_eq!(result.shared_sections, 0);

        let manifest = read_manifest(&out);
        assert_eq!(manifest.variants, vec![VariantCode::new("EU")]);
        assert!(
            manifest
                .tree
                .nodes
                .values()
                .all(|n| n.variants_available == vec![VariantCode::new("EU")])
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_variant_b_writes_nothing() {
        let tmp = temp_dir();
        let out = tmp.join("out");
        let mut config = make_config(&out, false);
        config.variant_b_dir = Some(tmp.join("does-not-exist"));

        let err = merge_manuals(&config, &SilentProgress).unwrap_err();
        assert!(matches!(err, ManualMergeError::Io { .. }));
        assert!(!out.join(MANIFEST_FILE_NAME).exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn explicit_codes_override_manifest() {
        let tmp = temp_dir();
        let out = tmp.join("out");
        let mut config = make_config(&out, true);
        config.code_a = Some("LHD".into());
        config.code_b = Some("RHD".into());

        merge_manuals(&config, &SilentProgress).unwrap();
        let manifest = read_manifest(&out);
        assert_eq!(
            manifest.variants,
            vec![VariantCode::new("LHD"), VariantCode::new("RHD")]
        );
        assert!(out.join("LHD/content/oil-filter.html").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn resolve_code_precedence_and_checks() {
        assert_eq!(resolve_code(Some("X"), Some("Y"), "Z").unwrap(), VariantCode::new("X"));
        assert_eq!(resolve_code(None, Some("Y"), "Z").unwrap(), VariantCode::new("Y"));
        assert_eq!(resolve_code(None, None, "Z").unwrap(), VariantCode::new("Z"));
        assert!(resolve_code(Some("  "), None, "Z").is_err());
        assert!(resolve_code(Some("a/b"), None, "Z").is_err());
        assert!(resolve_code(Some(".."), None, "Z").is_err());
    }

    #[test]
    fn manifest_variant_hint_names_the_variant() {
        let manifest = crate::test_support::TreeBuilder::new("a")
            .variant("LHD")
            .leaf(&["Engine", "Oil Filter"], Some("oil-filter"))
            .build();
        let code = resolve_code(None, manifest.variant.as_deref(), "A").unwrap();
        assert_eq!(code, VariantCode::new("LHD"));
    }

    #[test]
    fn inspect_reports_unresolved_leaves() {
        let tmp = temp_dir();
        let manifest = r#"{
            "tree": {
                "roots": ["r"],
                "nodes": {
                    "r": { "title": "Engine", "children": ["x", "y"] },
                    "x": { "title": "Oil Filter", "parentId": "r", "isLeaf": true },
                    "y": { "title": "Spark  Plugs", "parentId": "r", "isLeaf": true }
                }
            },
            "sections": [ { "id": "x", "slug": "oil-filter" } ]
        }"#;
        std::fs::write(tmp.join(MANIFEST_FILE_NAME), manifest).unwrap();

        let report = inspect_variant(&tmp, None, "A").unwrap();
        assert_eq!(report.code, VariantCode::new("A"));
        assert_eq!((report.roots, report.nodes, report.leaves, report.sections), (1, 3, 2, 1));
        assert_eq!(report.unresolved, vec!["Engine > Spark Plugs".to_string()]);

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
