//! Top-level driver: discover, scan, synthesize and write.
//!
//! A failure inside one source unit (a parse error, a malformed matcher
//! reference, an unrenderable matcher) drops every file of that unit and is
//! reported at error severity; the other units are still written.

// Internal imports (std, crate)
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::model::TestedType;
use crate::scan::{discover_units, scan_units};
use crate::synthesis::{SynthesisEngine, TestFile};
use crate::templates::{TemplateDir, TemplateManager, TemplateOptions};
use crate::utils::to_snake_case;

// External imports (alphabetized)
use serde::Serialize;

/// Tested types extracted from the configured sources
#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    pub types: Vec<TestedType>,
    /// Units that could not be scanned, with the reason
    pub failures: Vec<(PathBuf, String)>,
}

/// Outcome of a generation run
#[derive(Debug, Default, Serialize)]
pub struct GenerationReport {
    pub written: Vec<PathBuf>,
    pub failed_units: Vec<PathBuf>,
    pub types: usize,
    pub tests: usize,
}

impl GenerationReport {
    pub fn is_success(&self) -> bool {
        self.failed_units.is_empty()
    }
}

/// Scan every configured source directory.
///
/// Types come back ordered by source file, then by declaration order.
pub async fn scan(config: &Config, diagnostics: Arc<dyn Diagnostics>) -> Result<ScanReport> {
    config.validate()?;
    let units = discover_units(&config.source_dirs).await?;
    log::info!("Scanning {} source file(s)", units.len());

    let outcome = scan_units(units, diagnostics).await;
    let mut types = outcome.registry.snapshot();
    // The registry sees units in completion order.
    types.sort_by(|a, b| a.source_file.cmp(&b.source_file));

    Ok(ScanReport {
        types,
        failures: outcome
            .failures
            .into_iter()
            .map(|(path, e)| (path, e.to_string()))
            .collect(),
    })
}

/// Main entry point for test generation
pub async fn generate(config: &Config, diagnostics: Arc<dyn Diagnostics>) -> Result<GenerationReport> {
    // 1. Scan sources into tested types
    let scanned = scan(config, diagnostics.clone()).await?;
    let mut report = GenerationReport {
        failed_units: scanned.failures.iter().map(|(path, _)| path.clone()).collect(),
        ..GenerationReport::default()
    };

    // 2. Initialize the template manager
    let template_dir = TemplateDir::discover(config.template_dir.as_deref())?;
    let templates = TemplateManager::new(template_dir).await?;
    let options = TemplateOptions::from_config(config);

    // 3. Synthesize per unit so one failure drops the whole unit
    let mut synthesis = config.synthesis_options();
    synthesis.source_crate = config.resolve_source_crate().await;
    if synthesis.source_crate.is_none() {
        log::debug!("No crate name found for the sources; crate-local types are not imported");
    }
    let engine = SynthesisEngine::new(synthesis, diagnostics.clone());
    let mut by_unit: BTreeMap<PathBuf, Vec<TestedType>> = BTreeMap::new();
    for tested in scanned.types {
        by_unit.entry(tested.source_file.clone()).or_default().push(tested);
    }

    let mut file_names = HashSet::new();
    for (unit, types) in by_unit {
        let files = match synthesize_unit(&engine, &types) {
            Ok(files) => files,
            Err(e) => {
                diagnostics.error(format!("{}: {e}", unit.display()), None);
                report.failed_units.push(unit);
                continue;
            }
        };

        // 4. Render and write
        for mut file in files {
            if !file_names.insert(file.file_name.clone()) {
                let renamed = unique_file_name(&file, &mut file_names);
                diagnostics.warning(
                    format!(
                        "{} is generated by more than one type; writing {} for `{}::{}`",
                        file.file_name,
                        renamed,
                        file.package,
                        file.source_name
                    ),
                    None,
                );
                file.file_name = renamed;
            }
            let path = templates.write(&file, &options, &config.output_dir).await?;
            report.types += 1;
            report.tests += file.methods.len();
            report.written.push(path);
        }
    }

    log::info!(
        "Generated {} test(s) in {} file(s); {} unit(s) failed",
        report.tests,
        report.written.len(),
        report.failed_units.len()
    );
    Ok(report)
}

/// First free name among `<package>_<name>.rs`, then `<stem>_2.rs`, `<stem>_3.rs`, ...
fn unique_file_name(file: &TestFile, used: &mut HashSet<String>) -> String {
    let prefix = to_snake_case(&file.package.replace("::", "_"));
    let base = if prefix.is_empty() {
        file.file_name.clone()
    } else {
        format!("{prefix}_{}", file.file_name)
    };
    if used.insert(base.clone()) {
        return base;
    }

    let stem = base.strip_suffix(".rs").unwrap_or(&base);
    let mut n = 2;
    loop {
        let candidate = format!("{stem}_{n}.rs");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn synthesize_unit(engine: &SynthesisEngine, types: &[TestedType]) -> Result<Vec<TestFile>> {
    let mut files = Vec::with_capacity(types.len());
    for tested in types {
        if tested.case_count() == 0 {
            log::info!("{} declares no test cases, skipping", tested.source_name);
            continue;
        }
        files.push(engine.synthesize_type(tested)?);
    }
    Ok(files)
}
