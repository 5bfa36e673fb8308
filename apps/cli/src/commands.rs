//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use manualmerge_core::assembler::validate_output;
use manualmerge_core::pipeline::{
    MergeRunConfig, MergeRunResult, ProgressReporter, inspect_variant, merge_manuals,
};
use manualmerge_shared::{
    AppConfig, LeafConflictPolicy, MANIFEST_FILE_NAME, MergeOptions, init_config, load_config,
    load_config_from,
};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// manualmerge: unify two variants of a service manual into one hierarchy.
#[derive(Parser)]
#[command(
    name = "manualmerge",
    version,
    about = "Merge two variant manifests of a service manual into one tagged hierarchy.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.manualmerge/manualmerge.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Merge variant A (and optionally variant B) into one manual.
    Merge {
        /// Directory containing variant A's manifest.json.
        variant_a: PathBuf,

        /// Directory containing variant B's manifest.json.
        #[arg(short = 'b', long)]
        variant_b: Option<PathBuf>,

        /// Output directory (defaults to the configured output_dir).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Variant code for A (defaults to the manifest's `variant`).
        #[arg(long)]
        code_a: Option<String>,

        /// Variant code for B (defaults to the manifest's `variant`).
        #[arg(long)]
        code_b: Option<String>,

        /// Leaf/internal conflict policy: prefer-leaf or prefer-internal.
        #[arg(long)]
        leaf_conflict: Option<LeafConflictPolicy>,

        /// Copy both variants' assets into one shared tree (last writer wins).
        #[arg(long)]
        no_namespace_assets: bool,
    },

    /// Validate one variant directory and summarize it.
    Inspect {
        /// Directory containing a manifest.json.
        dir: PathBuf,

        /// Variant code to report (defaults to the manifest's `variant`).
        #[arg(long)]
        code: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        format!("manualmerge={level},manualmerge_core={level},manualmerge_shared={level}");

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Merge {
            variant_a,
            variant_b,
            out,
            code_a,
            code_b,
            leaf_conflict,
            no_namespace_assets,
        } => {
            let mut options = MergeOptions::from(&config);
            if let Some(policy) = leaf_conflict {
                options.leaf_conflict = policy;
            }
            if no_namespace_assets {
                options.namespace_assets = false;
            }

            let run_config = MergeRunConfig {
                variant_a_dir: variant_a,
                variant_b_dir: variant_b,
                output_dir: out.unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir)),
                code_a,
                code_b,
                options,
            };
            cmd_merge(&run_config)
        }
        Command::Inspect { dir, code } => cmd_inspect(&dir, code.as_deref(), &config),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

fn require_manifest(dir: &Path) -> Result<()> {
    if !dir.join(MANIFEST_FILE_NAME).is_file() {
        return Err(eyre!(
            "no {MANIFEST_FILE_NAME} found at '{}'. Is this a variant directory?",
            dir.display()
        ));
    }
    Ok(())
}

fn cmd_merge(config: &MergeRunConfig) -> Result<()> {
    require_manifest(&config.variant_a_dir)?;
    if let Some(dir) = &config.variant_b_dir {
        require_manifest(dir)?;
    }

    info!(
        variant_a = %config.variant_a_dir.display(),
        variant_b = ?config.variant_b_dir,
        out = %config.output_dir.display(),
        "merging manuals"
    );

    let reporter = CliProgress::new();
    let result = merge_manuals(config, &reporter)?;
    let report = validate_output(&config.output_dir)?;
    for file in &report.missing_files {
        warn!(file = %file, "section file not found in output");
    }

    println!();
    println!("  Manual merged successfully!");
    for variant in &result.variants {
        println!(
            "  {:<8} {} nodes, {} leaves, {} sections",
            variant.code.as_str(),
            variant.nodes,
            variant.leaves,
            variant.sections
        );
    }
    println!("  Roots:    {}", result.root_count);
    println!("  Nodes:    {}", result.node_count);
    println!(
        "  Sections: {} ({} shared)",
        result.section_count, result.shared_sections
    );
    println!(
        "  Assets:   {} copied, {} overwritten",
        result.files_copied, result.files_overwritten
    );
    if !report.missing_files.is_empty() {
        println!("  Missing:  {} referenced files", report.missing_files.len());
    }
    println!("  Manifest: {}", result.manifest_path.display());
    println!("  Time:     {:.2}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_inspect(dir: &Path, code: Option<&str>, config: &AppConfig) -> Result<()> {
    require_manifest(dir)?;
    let report = inspect_variant(dir, code, &config.variants.a)?;

    println!();
    println!("  Variant:  {}", report.code);
    println!("  Roots:    {}", report.roots);
    println!("  Nodes:    {}", report.nodes);
    println!("  Leaves:   {}", report.leaves);
    println!("  Sections: {}", report.sections);
    if !report.unresolved.is_empty() {
        println!("  Leaves without content ({}):", report.unresolved.len());
        for path in &report.unresolved {
            println!("    - {path}");
        }
    }
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _result: &MergeRunResult) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn merge_requires_variant_a() {
        let err = Cli::try_parse_from(["manualmerge", "merge"]).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn merge_parses_all_flags() {
        let cli = Cli::try_parse_from([
            "manualmerge",
            "-v",
            "merge",
            "manuals/eu",
            "--variant-b",
            "manuals/us",
            "--out",
            "dist",
            "--leaf-conflict",
            "prefer-internal",
            "--no-namespace-assets",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Merge {
                variant_a,
                variant_b,
                out,
                leaf_conflict,
                no_namespace_assets,
                ..
            } => {
                assert_eq!(variant_a, PathBuf::from("manuals/eu"));
                assert_eq!(variant_b, Some(PathBuf::from("manuals/us")));
                assert_eq!(out, Some(PathBuf::from("dist")));
                assert_eq!(leaf_conflict, Some(LeafConflictPolicy::PreferInternal));
                assert!(no_namespace_assets);
            }
            _ => panic!("expected merge command"),
        }
    }

    #[test]
    fn bad_leaf_conflict_rejected() {
        let result =
            Cli::try_parse_from(["manualmerge", "merge", "a", "--leaf-conflict", "both"]);
        assert!(result.is_err());
    }

    #[test]
    fn missing_manifest_is_fatal() {
        let dir = std::env::temp_dir().join("manualmerge-cli-no-manifest");
        let err = require_manifest(&dir).unwrap_err();
        assert!(err.to_string().contains("no manifest.json found"));
    }
}
