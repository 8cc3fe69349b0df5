//! apitestgen CLI entrypoint
//! Parses command-line arguments and dispatches to the core generator.

// Internal imports (std, crate)
use std::path::{Path, PathBuf};
use std::sync::Arc;

// External imports (alphabetized)
use anyhow::Context;
use apitestgen_core::{
    config::DEFAULT_CONFIG_FILE,
    diagnostics::{CollectingDiagnostics, LogDiagnostics, Severity},
    synthesis::{DuplicateNamePolicy, OrderGate},
    Config,
};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apitestgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Scan tagged sources and write the generated test files
    Generate {
        #[command(flatten)]
        sources: SourceArgs,
        /// Output directory for generated tests
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Directory holding a custom test_file.rs.tera
        #[arg(long)]
        template_dir: Option<PathBuf>,
        /// Base URL the generated client talks to
        #[arg(long)]
        base_url: Option<String>,
        /// Crate name used to import the handlers' body types
        #[arg(long)]
        source_crate: Option<String>,
        /// Emit the order attribute only for cases with a timeout
        #[arg(long)]
        legacy_order_gate: bool,
        /// Fail a source file when two of its tests would share a name
        #[arg(long)]
        strict_names: bool,
    },
    /// Print the extracted test model without writing anything
    Scan {
        #[command(flatten)]
        sources: SourceArgs,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Write a default configuration file
    Init {
        /// Where to write the configuration
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args, Debug)]
pub struct SourceArgs {
    /// Configuration file (YAML, TOML or JSON); defaults to ./apitestgen.yaml when present
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory to scan; may be repeated and replaces the configured ones
    #[arg(long = "source-dir")]
    source_dirs: Vec<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Generate {
            sources,
            output_dir,
            template_dir,
            base_url,
            source_crate,
            legacy_order_gate,
            strict_names,
        } => {
            let mut config = load_config(&sources).await?;
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(dir) = template_dir {
                config.template_dir = Some(dir);
            }
            if let Some(url) = base_url {
                config.base_url = url
                    .parse()
                    .with_context(|| format!("Invalid base URL: {url}"))?;
            }
            if source_crate.is_some() {
                config.source_crate = source_crate;
            }
            if legacy_order_gate {
                config.order_gate = OrderGate::TimeoutCompat;
            }
            if strict_names {
                config.duplicate_names = DuplicateNamePolicy::Error;
            }

            tracing::debug!(
                "Generating from {:?} into {}",
                config.source_dirs,
                config.output_dir.display()
            );

            let diagnostics = Arc::new(CollectingDiagnostics::forwarding_to(LogDiagnostics));
            let report = apitestgen_core::generate(&config, diagnostics.clone())
                .await
                .context("Failed to generate tests")?;

            for path in &report.written {
                println!("Wrote {}", path.display());
            }
            println!(
                "Generated {} test(s) for {} type(s); {} warning(s), {} error(s)",
                report.tests,
                report.types,
                diagnostics.count(Severity::Warning),
                diagnostics.count(Severity::Error)
            );

            if !report.is_success() {
                anyhow::bail!(
                    "{} source file(s) could not be processed",
                    report.failed_units.len()
                );
            }
        }
        Commands::Scan { sources, format } => {
            let config = load_config(&sources).await?;
            let diagnostics = Arc::new(LogDiagnostics);
            let report = apitestgen_core::scan(&config, diagnostics)
                .await
                .context("Failed to scan sources")?;

            let output = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&report)?,
                OutputFormat::Yaml => serde_yaml::to_string(&report)?,
            };
            println!("{output}");
        }
        Commands::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists; pass --force to overwrite it",
                    path.display()
                );
            }
            Config::default()
                .save(&path)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

/// Load the configuration named on the command line, the default file when it
/// exists, or the built-in defaults.
///
/// Relative paths in an explicit config file resolve against its directory.
/// `--source-dir` replaces the configured directories.
async fn load_config(args: &SourceArgs) -> anyhow::Result<Config> {
    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?
            .rooted_at(path.parent().unwrap_or(Path::new(""))),
        None if default_path.exists() => Config::from_file(default_path)
            .await
            .with_context(|| format!("Failed to load {DEFAULT_CONFIG_FILE}"))?,
        None => Config::default(),
    };

    if !args.source_dirs.is_empty() {
        config.source_dirs = args.source_dirs.clone();
    }
    Ok(config)
}
