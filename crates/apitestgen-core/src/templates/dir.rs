//! Resolution of a user template directory

// Internal imports (std, crate)
use std::io;
use std::path::{Path, PathBuf};

use super::TEST_FILE_TEMPLATE;

/// Environment variable naming a template directory
pub const TEMPLATE_DIR_ENV: &str = "APITESTGEN_TEMPLATE_DIR";

/// A directory holding a custom `test_file.rs.tera`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDir {
    path: PathBuf,
}

impl TemplateDir {
    /// Use `path` as is. It must contain the test file template.
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if !path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Template directory not found: {}", path.display()),
            ));
        }
        if !path.join(TEST_FILE_TEMPLATE).is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "Template directory {} has no {TEST_FILE_TEMPLATE}",
                    path.display()
                ),
            ));
        }
        Ok(Self { path })
    }

    /// Find the template directory to use.
    ///
    /// An explicit directory must be valid. Otherwise `APITESTGEN_TEMPLATE_DIR`
    /// and then `~/.apitestgen/templates` are tried. `None` means the
    /// embedded template is used.
    pub fn discover(explicit: Option<&Path>) -> io::Result<Option<Self>> {
        if let Some(dir) = explicit {
            return Self::new(dir).map(Some);
        }
        Ok(Self::find_template_dir().and_then(|dir| Self::new(dir).ok()))
    }

    fn find_template_dir() -> Option<PathBuf> {
        // 1. Check environment variable
        if let Ok(dir) = std::env::var(TEMPLATE_DIR_ENV) {
            let path = PathBuf::from(dir);
            if path.exists() {
                return Some(path);
            }
            log::warn!(
                "{TEMPLATE_DIR_ENV} points to {}, which does not exist",
                path.display()
            );
        }

        // 2. Check in the user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            let templates_dir = home_dir.join(".apitestgen").join("templates");
            if templates_dir.exists() {
                return Some(templates_dir);
            }
        }

        None
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a displayable version of the template path
    pub fn display(&self) -> std::path::Display<'_> {
        self.path.display()
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_template_dir_validation() {
        let temp_dir = tempdir().unwrap();

        let result = TemplateDir::discover(Some(temp_dir.path()));
        assert!(result.is_err());

        fs::write(temp_dir.path().join(TEST_FILE_TEMPLATE), "// custom").unwrap();
        let template = TemplateDir::discover(Some(temp_dir.path())).unwrap().unwrap();
        assert_eq!(template.path(), temp_dir.path());

        let result = TemplateDir::discover(Some(Path::new("/nonexistent")));
        assert!(result.is_err());
    }
}
