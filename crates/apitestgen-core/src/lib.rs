//! apitestgen Core Library
//!
//! This library scans Rust sources for handler types tagged with test
//! scenario attributes and generates fluent HTTP client tests for every
//! declared case. It also ships the small runtime those generated tests call
//! to load their data.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod generate;
pub mod imports;
pub mod matcher;
pub mod model;
pub mod runtime;
pub mod scan;
pub mod synthesis;
pub mod tags;
pub mod templates;
pub mod uri;
pub mod utils;

pub use crate::{
    config::Config,
    diagnostics::{CollectingDiagnostics, Diagnostics, LogDiagnostics},
    error::{Error, Result},
    generate::{generate, scan, GenerationReport, ScanReport},
    scan::{DeclarationScanner, SourceUnit, TestedTypeRegistry},
    synthesis::{SynthesisEngine, SynthesisOptions},
    templates::{TemplateDir, TemplateManager, TemplateOptions},
};
