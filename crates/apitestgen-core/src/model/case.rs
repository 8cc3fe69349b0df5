//! One test variant of an endpoint, plus the assertions it carries

// Internal imports (std, crate)
use std::fmt;
use std::sync::Arc;

use super::ParameterMetadata;
use crate::matcher::MatcherKind;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};

/// Expected response header: all listed values must be present
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderAssertion {
    pub name: String,
    pub values: Vec<String>,
}

/// Expected response cookie value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CookieAssertion {
    pub name: String,
    pub value: String,
}

/// Assertion on the value found at a JSON path of the response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathAssertion {
    pub path: String,
    pub kind: Option<MatcherKind>,
    pub value: String,
    /// Path of a user matcher type, used with [`MatcherKind::CustomClass`]
    pub custom_matcher: Option<String>,
}

/// Severity attached to a scenario's descriptor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeverityLevel {
    Blocker,
    Critical,
    Major,
    #[default]
    Medium,
    Minor,
    Trivial,
}

impl SeverityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Blocker => "BLOCKER",
            SeverityLevel::Critical => "CRITICAL",
            SeverityLevel::Major => "MAJOR",
            SeverityLevel::Medium => "MEDIUM",
            SeverityLevel::Minor => "MINOR",
            SeverityLevel::Trivial => "TRIVIAL",
        }
    }

    pub fn parse_name(name: &str) -> Option<SeverityLevel> {
        match name.trim().to_ascii_uppercase().as_str() {
            "BLOCKER" => Some(SeverityLevel::Blocker),
            "CRITICAL" => Some(SeverityLevel::Critical),
            "MAJOR" => Some(SeverityLevel::Major),
            "MEDIUM" => Some(SeverityLevel::Medium),
            "MINOR" => Some(SeverityLevel::Minor),
            "TRIVIAL" => Some(SeverityLevel::Trivial),
            _ => None,
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reporting metadata for a scenario, rendered as doc lines on the test
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpecDescriptor {
    pub epic: String,
    pub feature: String,
    pub story: String,
    pub severity: SeverityLevel,
    pub tags: Vec<String>,
}

impl SpecDescriptor {
    /// `key: value` lines for every non-empty attribute
    pub fn doc_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (key, value) in [
            ("Epic", &self.epic),
            ("Feature", &self.feature),
            ("Story", &self.story),
        ] {
            if !value.is_empty() {
                lines.push(format!("{key}: {value}"));
            }
        }
        lines.push(format!("Severity: {}", self.severity));
        if !self.tags.is_empty() {
            lines.push(format!("Tags: {}", self.tags.join(", ")));
        }
        lines
    }
}

/// A single test variant of a scenario group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Case {
    pub display_name: String,
    pub order: i64,
    pub timeout: i64,
    pub expected_status_code: u16,
    pub requires_auth: bool,
    pub data_provider: String,
    pub repeat: u32,
    pub enable_logging: bool,
    pub response_timeout: Option<u64>,
    expected_headers: Vec<HeaderAssertion>,
    expected_cookies: Vec<CookieAssertion>,
    path_assertions: Vec<PathAssertion>,
    pub descriptor: Option<SpecDescriptor>,
    pub parameters: Option<Arc<ParameterMetadata>>,
}

impl Default for Case {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            order: 0,
            timeout: 0,
            expected_status_code: 0,
            requires_auth: false,
            data_provider: String::new(),
            repeat: 1,
            enable_logging: false,
            response_timeout: None,
            expected_headers: Vec::new(),
            expected_cookies: Vec::new(),
            path_assertions: Vec::new(),
            descriptor: None,
            parameters: None,
        }
    }
}

impl Case {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header assertion; exact duplicates are ignored
    pub fn add_header(&mut self, header: HeaderAssertion) {
        if !self.expected_headers.contains(&header) {
            self.expected_headers.push(header);
        }
    }

    /// Add a cookie assertion; exact duplicates are ignored
    pub fn add_cookie(&mut self, cookie: CookieAssertion) {
        if !self.expected_cookies.contains(&cookie) {
            self.expected_cookies.push(cookie);
        }
    }

    /// Add a body-path assertion; exact duplicates are ignored
    pub fn add_path_assertion(&mut self, assertion: PathAssertion) {
        if !self.path_assertions.contains(&assertion) {
            self.path_assertions.push(assertion);
        }
    }

    pub fn expected_headers(&self) -> &[HeaderAssertion] {
        &self.expected_headers
    }

    pub fn expected_cookies(&self) -> &[CookieAssertion] {
        &self.expected_cookies
    }

    pub fn path_assertions(&self) -> &[PathAssertion] {
        &self.path_assertions
    }

    /// Parameters of the owning method, or an empty classification
    pub fn parameters(&self) -> &ParameterMetadata {
        static EMPTY: ParameterMetadata = ParameterMetadata::EMPTY;
        self.parameters.as_deref().unwrap_or(&EMPTY)
    }

    /// Whether the generated test builds its own configured client
    pub fn needs_custom_client(&self) -> bool {
        self.enable_logging || self.response_timeout.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_declared_field_defaults() {
        let case = Case::new();
        assert_eq!(case.repeat, 1);
        assert_eq!(case.response_timeout, None);
        assert_eq!(case.expected_status_code, 0);
        assert!(case.data_provider.is_empty());
        assert!(!case.needs_custom_client());
        assert!(case.parameters().path.is_empty());
    }

    #[test]
    fn assertion_sets_drop_exact_duplicates() {
        let mut case = Case::new();
        let header = HeaderAssertion {
            name: "Content-Type".into(),
            values: vec!["application/json".into()],
        };
        case.add_header(header.clone());
        case.add_header(header);
        case.add_header(HeaderAssertion {
            name: "Content-Type".into(),
            values: vec!["text/plain".into()],
        });
        assert_eq!(case.expected_headers().len(), 2);

        let cookie = CookieAssertion {
            name: "session".into(),
            value: "abc".into(),
        };
        case.add_cookie(cookie.clone());
        case.add_cookie(cookie);
        assert_eq!(case.expected_cookies().len(), 1);

        let assertion = PathAssertion {
            path: "$.name".into(),
            kind: Some(MatcherKind::EqualTo),
            value: "John".into(),
            custom_matcher: None,
        };
        case.add_path_assertion(assertion.clone());
        case.add_path_assertion(assertion);
        assert_eq!(case.path_assertions().len(), 1);
    }

    #[test]
    fn custom_client_when_logging_or_timeout() {
        let mut case = Case::new();
        case.enable_logging = true;
        assert!(case.needs_custom_client());

        let mut case = Case::new();
        case.response_timeout = Some(5);
        assert!(case.needs_custom_client());
    }

    #[test]
    fn descriptor_doc_lines_skip_empty_fields() {
        let descriptor = SpecDescriptor {
            epic: "Clients".into(),
            story: "Lookup by id".into(),
            severity: SeverityLevel::Critical,
            tags: vec!["smoke".into(), "read".into()],
            ..SpecDescriptor::default()
        };
        assert_eq!(
            descriptor.doc_lines(),
            vec![
                "Epic: Clients",
                "Story: Lookup by id",
                "Severity: CRITICAL",
                "Tags: smoke, read",
            ]
        );
    }

    #[test]
    fn severity_names_are_case_insensitive() {
        assert_eq!(SeverityLevel::parse_name("minor"), Some(SeverityLevel::Minor));
        assert_eq!(SeverityLevel::parse_name("Blocker"), Some(SeverityLevel::Blocker));
        assert_eq!(SeverityLevel::parse_name("urgent"), None);
        assert_eq!(SeverityLevel::default(), SeverityLevel::Medium);
    }
}
