//! Rendering and writing of generated test files

// Internal imports (std, crate)
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{TemplateDir, TEST_FILE_TEMPLATE};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::synthesis::{GeneratedMethod, TestFile};
use crate::utils::rust_string_literal;

// External imports (alphabetized)
use serde::Serialize;
use tera::{Context, Tera};

const EMBEDDED_TEST_FILE: &str = include_str!("test_file.rs.tera");

/// Settings shared by every rendered file of a run
#[derive(Debug, Clone, Serialize)]
pub struct TemplateOptions {
    pub project_name: String,
    pub base_url: String,
    pub client_crate: String,
    pub data_registry: String,
    pub preamble: Vec<String>,
}

impl TemplateOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            project_name: config.project_name.clone(),
            base_url: config.base_url.to_string(),
            client_crate: config.client_crate.clone(),
            data_registry: config.data_registry.clone(),
            preamble: config.preamble.clone(),
        }
    }
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Auth values already rendered as Rust string literals
#[derive(Debug, Serialize)]
struct AuthLiterals {
    url: String,
    username: String,
    password: String,
    token_path: String,
}

/// Everything the test file template sees
#[derive(Debug, Serialize)]
struct FileContext<'a> {
    generator_version: &'static str,
    project_name: &'a str,
    base_url: String,
    client_crate: &'a str,
    data_registry: &'a str,
    preamble: &'a [String],
    generated_name: &'a str,
    source_name: &'a str,
    package: &'a str,
    source_file: String,
    auth: Option<AuthLiterals>,
    imports: &'a [String],
    methods: &'a [GeneratedMethod],
    needs_multipart: bool,
    needs_logging: bool,
    needs_auth: bool,
}

impl<'a> FileContext<'a> {
    fn new(file: &'a TestFile, options: &'a TemplateOptions) -> Self {
        Self {
            generator_version: env!("CARGO_PKG_VERSION"),
            project_name: &options.project_name,
            base_url: rust_string_literal(&options.base_url),
            client_crate: &options.client_crate,
            data_registry: &options.data_registry,
            preamble: &options.preamble,
            generated_name: &file.generated_name,
            source_name: &file.source_name,
            package: &file.package,
            source_file: file.source_file.display().to_string(),
            auth: file.auth.as_ref().map(|auth| AuthLiterals {
                url: rust_string_literal(&auth.auth_url),
                username: rust_string_literal(&auth.username),
                password: rust_string_literal(&auth.password),
                token_path: rust_string_literal(&format!("$.{}", auth.token_field)),
            }),
            imports: &file.imports,
            methods: &file.methods,
            needs_multipart: file.needs_multipart,
            needs_logging: file.needs_logging,
            needs_auth: file.needs_auth,
        }
    }
}

/// Manages loading and rendering of the test file template
#[derive(Debug, Clone)]
pub struct TemplateManager {
    tera: Arc<Tera>,
    /// Directory the template came from; `None` for the embedded one
    template_dir: Option<PathBuf>,
}

impl TemplateManager {
    /// Manager using the template shipped with the library
    pub fn embedded() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_template(TEST_FILE_TEMPLATE, EMBEDDED_TEST_FILE)?;
        Ok(Self {
            tera: Arc::new(tera),
            template_dir: None,
        })
    }

    /// Manager for `template_dir`, or the embedded template when `None`.
    ///
    /// Every `*.tera` file of the directory is loaded so the test file
    /// template can include or extend the others.
    pub async fn new(template_dir: Option<TemplateDir>) -> Result<Self> {
        let Some(dir) = template_dir else {
            log::debug!("Using the embedded test file template");
            return Self::embedded();
        };

        let path = tokio::fs::canonicalize(dir.path()).await?;
        let pattern = format!("{}/**/*.tera", path.display());
        let mut tera = Tera::new(&pattern)
            .map_err(|e| Error::template(format!("Failed to load templates from {}: {e}", path.display())))?;
        tera.autoescape_on(vec![]);

        if tera.get_template(TEST_FILE_TEMPLATE).is_err() {
            return Err(Error::template(format!(
                "{} has no {TEST_FILE_TEMPLATE}",
                path.display()
            )));
        }
        log::debug!("Using templates from {}", path.display());

        Ok(Self {
            tera: Arc::new(tera),
            template_dir: Some(path),
        })
    }

    pub fn template_dir(&self) -> Option<&Path> {
        self.template_dir.as_deref()
    }

    /// List all available templates
    pub fn list_templates(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tera.get_template_names().map(str::to_string).collect();
        names.sort();
        names
    }

    /// Render the source of one test file
    pub fn render(&self, file: &TestFile, options: &TemplateOptions) -> Result<String> {
        let context = Context::from_serialize(FileContext::new(file, options))?;
        self.tera.render(TEST_FILE_TEMPLATE, &context).map_err(|e| {
            Error::template(format!(
                "Failed to render {} for {}: {e}",
                TEST_FILE_TEMPLATE, file.generated_name
            ))
        })
    }

    /// Render `file` and write it below `output_dir`, returning the written path
    pub async fn write(
        &self,
        file: &TestFile,
        options: &TemplateOptions,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let content = self.render(file, options)?;
        let output_path = output_dir.join(&file.file_name);

        tokio::fs::create_dir_all(output_dir).await?;
        log::debug!(
            "Writing {} ({} bytes, {} tests)",
            output_path.display(),
            content.len(),
            file.methods.len()
        );
        tokio::fs::write(&output_path, content).await?;
        Ok(output_path)
    }
}
