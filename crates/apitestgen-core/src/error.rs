//! Error handling for the apitestgen library.
//!
//! This module defines the main error type `Error` used throughout the library,
//! along with a convenient `Result` type alias. Errors raised while scanning or
//! synthesizing a single source unit abort the output for that unit only; the
//! driver in [`crate::generate`] keeps going with the remaining units.
//!
//! # Examples
//!
//! ```
//! use apitestgen_core::error::{Error, Result};
//!
//! fn parse_threshold(raw: &str) -> Result<i64> {
//!     raw.parse()
//!         .map_err(|_| Error::matcher(format!("not a number: {raw}")))
//! }
//!
//! assert!(parse_threshold("10").is_ok());
//! assert!(parse_threshold("abc").is_err());
//! ```

// Internal imports (std, crate)
use std::path::PathBuf;

// External imports (alphabetized)
use thiserror::Error;

/// Result type for apitestgen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for apitestgen operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A source unit could not be parsed
    #[error("failed to parse {}: {source}", file.display())]
    Parse {
        file: PathBuf,
        #[source]
        source: syn::Error,
    },

    /// A recognized tag had a shape that cannot be read
    #[error("Malformed tag: {0}")]
    Tag(String),

    /// Metadata extraction failed for a declaration
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// A body-path matcher could not be rendered
    #[error("Matcher error: {0}")]
    Matcher(String),

    /// Test source synthesis failed
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// Template error
    #[error("Template error: {0}")]
    Template(String),

    /// Template engine error
    #[error("Template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new malformed-tag error
    pub fn tag<S: Into<String>>(msg: S) -> Self {
        Self::Tag(msg.into())
    }

    /// Create a new extraction error
    pub fn extraction<S: Into<String>>(msg: S) -> Self {
        Self::Extraction(msg.into())
    }

    /// Create a new matcher error
    pub fn matcher<S: Into<String>>(msg: S) -> Self {
        Self::Matcher(msg.into())
    }

    /// Create a new synthesis error
    pub fn synthesis<S: Into<String>>(msg: S) -> Self {
        Self::Synthesis(msg.into())
    }

    /// Create a new template error
    pub fn template<S: Into<String>>(msg: S) -> Self {
        Self::Template(msg.into())
    }

    /// Wrap a `syn` parse failure with the file it came from
    pub fn parse(file: impl Into<PathBuf>, source: syn::Error) -> Self {
        Self::Parse {
            file: file.into(),
            source,
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Config(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Config(s)
    }
}
