//! Diagnostic channel used while extracting metadata and synthesizing tests.
//!
//! The extractor and the synthesis engine receive an `Arc<dyn Diagnostics>`
//! at construction instead of reaching for a process-wide logger. Production
//! code uses [`LogDiagnostics`], which forwards to the `log` facade; tests and
//! the CLI summary use [`CollectingDiagnostics`].
//!
//! # Examples
//!
//! ```
//! use apitestgen_core::diagnostics::{CollectingDiagnostics, Diagnostics, Severity};
//!
//! let sink = CollectingDiagnostics::default();
//! sink.warning("Unknown case field: colour".to_string(), None);
//! assert_eq!(sink.count(Severity::Warning), 1);
//! ```

// Internal imports (std, crate)
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

// External imports (alphabetized)
use serde::Serialize;

/// How serious a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Where a diagnostic points to in the scanned sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// A single reported diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<Location>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {}: {}", location, self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Sink for diagnostics raised during a generation run
pub trait Diagnostics: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);

    fn note(&self, message: String, location: Option<Location>) {
        self.report(Diagnostic {
            severity: Severity::Note,
            message,
            location,
        });
    }

    fn warning(&self, message: String, location: Option<Location>) {
        self.report(Diagnostic {
            severity: Severity::Warning,
            message,
            location,
        });
    }

    fn error(&self, message: String, location: Option<Location>) {
        self.report(Diagnostic {
            severity: Severity::Error,
            message,
            location,
        });
    }
}

/// Forwards every diagnostic to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        let level = match diagnostic.severity {
            Severity::Note => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error => log::Level::Error,
        };
        match &diagnostic.location {
            Some(location) => log::log!(level, "{}: {}", location, diagnostic.message),
            None => log::log!(level, "{}", diagnostic.message),
        }
    }
}

/// Buffers diagnostics in memory, optionally forwarding them to another sink
#[derive(Default)]
pub struct CollectingDiagnostics {
    entries: Mutex<Vec<Diagnostic>>,
    forward: Option<Box<dyn Diagnostics>>,
}

impl CollectingDiagnostics {
    /// Collect and also forward everything to `inner`
    pub fn forwarding_to(inner: impl Diagnostics + 'static) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            forward: Some(Box::new(inner)),
        }
    }

    /// Snapshot of everything reported so far
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of diagnostics reported at `severity`
    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Messages reported at `severity`, in order
    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|d| d.severity == severity)
            .map(|d| d.message.clone())
            .collect()
    }
}

impl fmt::Debug for CollectingDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectingDiagnostics")
            .field("entries", &self.entries())
            .field("forwarding", &self.forward.is_some())
            .finish()
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        if let Some(inner) = &self.forward {
            inner.report(diagnostic.clone());
        }
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(diagnostic);
    }
}
