//! Configuration management for apitestgen.
//!
//! This module defines the `Config` struct that drives a generation run: where
//! to look for tagged sources, where generated tests go, and the knobs that
//! shape the generated code. The configuration can be created
//! programmatically, or loaded from a YAML (default), TOML or JSON file.
//!
//! # Examples
//!
//! ```no_run
//! use apitestgen_core::config::Config;
//!
//! # async fn run() -> apitestgen_core::Result<()> {
//! // Create a new config programmatically
//! let mut config = Config::new(["src"], "tests/generated");
//! config.client_crate = "my_test_client".to_string();
//!
//! // Or load it from a config file
//! let config = Config::from_file("apitestgen.yaml").await?;
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::synthesis::{DuplicateNamePolicy, OrderGate, SynthesisOptions, DEFAULT_CLIENT_CRATE};

// External imports (alphabetized)
use serde::{Deserialize, Serialize};
use tokio::fs;
use url::Url;

/// File name `init` writes and `generate` looks for by default
pub const DEFAULT_CONFIG_FILE: &str = "apitestgen.yaml";

/// Configuration for a test generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Name used in the header of generated files
    #[serde(default = "default_project_name")]
    pub project_name: String,

    /// Directories scanned for tagged declarations
    #[serde(default = "default_source_dirs")]
    pub source_dirs: Vec<PathBuf>,

    /// Directory the generated test files are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory holding a custom `test_file.rs.tera`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,

    /// Base URL the generated client talks to
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// Crate providing the fluent test client and its attributes
    #[serde(default = "default_client_crate")]
    pub client_crate: String,

    /// Name generated tests use to import from the crate under test; read
    /// from the `Cargo.toml` next to the source directories when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_crate: Option<String>,

    /// Path of the function returning the test crate's data provider registry
    #[serde(default = "default_data_registry")]
    pub data_registry: String,

    /// Lines copied verbatim to the top of every generated file
    #[serde(default = "default_preamble")]
    pub preamble: Vec<String>,

    #[serde(default)]
    pub order_gate: OrderGate,

    #[serde(default)]
    pub duplicate_names: DuplicateNamePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            source_dirs: default_source_dirs(),
            output_dir: default_output_dir(),
            template_dir: None,
            base_url: default_base_url(),
            client_crate: default_client_crate(),
            source_crate: None,
            data_registry: default_data_registry(),
            preamble: default_preamble(),
            order_gate: OrderGate::default(),
            duplicate_names: DuplicateNamePolicy::default(),
        }
    }
}

/// On-disk format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => ConfigFormat::Toml,
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }
}

impl Config {
    /// Create a new Config with default values
    pub fn new<I, P>(source_dirs: I, output_dir: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            source_dirs: source_dirs.into_iter().map(Into::into).collect(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let config = match ConfigFormat::for_path(path) {
            ConfigFormat::Yaml => serde_yaml::from_str(&content)?,
            ConfigFormat::Json => serde_json::from_str(&content)?,
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| {
                Error::config(format!("Invalid TOML in {}: {e}", path.display()))
            })?,
        };
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a file
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match ConfigFormat::for_path(path) {
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| Error::config(format!("Failed to encode TOML: {e}")))?,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await?;
        Ok(())
    }

    /// Resolve relative source and output directories against `root`
    pub fn rooted_at(mut self, root: &Path) -> Self {
        let resolve = |p: &PathBuf| if p.is_absolute() { p.clone() } else { root.join(p) };
        self.source_dirs = self.source_dirs.iter().map(resolve).collect();
        self.output_dir = resolve(&self.output_dir);
        self.template_dir = self.template_dir.as_ref().map(resolve);
        self
    }

    /// Settings for the synthesis engine
    pub fn synthesis_options(&self) -> SynthesisOptions {
        SynthesisOptions {
            client_crate: self.client_crate.clone(),
            source_crate: self.source_crate.clone(),
            order_gate: self.order_gate,
            duplicate_names: self.duplicate_names,
        }
    }

    /// The configured source crate, or the library name from the first
    /// `Cargo.toml` found in a source directory or its parent
    pub async fn resolve_source_crate(&self) -> Option<String> {
        if let Some(name) = &self.source_crate {
            return Some(name.clone());
        }
        for dir in &self.source_dirs {
            let candidates = [Some(dir.as_path()), dir.parent()];
            for manifest in candidates.into_iter().flatten().map(|d| d.join("Cargo.toml")) {
                let Ok(content) = fs::read_to_string(&manifest).await else {
                    continue;
                };
                match library_name(&content) {
                    Some(name) => {
                        log::debug!("Using crate `{name}` from {}", manifest.display());
                        return Some(name);
                    }
                    None => log::debug!("{} names no package", manifest.display()),
                }
            }
        }
        None
    }

    /// Reject settings that would produce uncompilable output
    pub fn validate(&self) -> Result<()> {
        if self.source_dirs.is_empty() {
            return Err(Error::config("At least one source directory is required"));
        }
        if syn::parse_str::<syn::Path>(&self.client_crate).is_err() {
            return Err(Error::config(format!(
                "client_crate `{}` is not a valid Rust path",
                self.client_crate
            )));
        }
        if let Some(name) = &self.source_crate {
            if syn::parse_str::<syn::Ident>(name).is_err() {
                return Err(Error::config(format!(
                    "source_crate `{name}` is not a valid crate name"
                )));
            }
        }
        if syn::parse_str::<syn::Path>(&self.data_registry).is_err() {
            return Err(Error::config(format!(
                "data_registry `{}` is not a valid Rust path",
                self.data_registry
            )));
        }
        Ok(())
    }
}

/// `[lib] name`, else `[package] name`, as it is written in Rust code
fn library_name(manifest: &str) -> Option<String> {
    let table: toml::Table = manifest.parse().ok()?;
    let name_in = |section: &str| {
        table
            .get(section)
            .and_then(|s| s.get("name"))
            .and_then(toml::Value::as_str)
            .map(str::to_string)
    };
    name_in("lib")
        .or_else(|| name_in("package"))
        .map(|name| name.replace('-', "_"))
}

fn default_project_name() -> String {
    "api-tests".to_string()
}

fn default_source_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("src")]
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("tests/generated")
}

fn default_base_url() -> Url {
    Url::parse("http://localhost:8080").expect("default base URL is valid")
}

fn default_client_crate() -> String {
    DEFAULT_CLIENT_CRATE.to_string()
}

fn default_data_registry() -> String {
    "support::data_providers".to_string()
}

fn default_preamble() -> Vec<String> {
    vec!["mod support;".to_string()]
}
