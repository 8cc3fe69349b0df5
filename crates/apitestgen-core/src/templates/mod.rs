//! Template system for generated test files.
//!
//! One Tera template, `test_file.rs.tera`, renders a whole test file from a
//! [`TestFile`](crate::synthesis::TestFile). The embedded copy is used unless
//! a template directory is configured or discovered through
//! [`TemplateDir::discover`].

mod dir;
mod manager;

pub use dir::{TemplateDir, TEMPLATE_DIR_ENV};
pub use manager::{TemplateManager, TemplateOptions};

/// Name of the test file template, embedded or in a template directory
pub const TEST_FILE_TEMPLATE: &str = "test_file.rs.tera";
