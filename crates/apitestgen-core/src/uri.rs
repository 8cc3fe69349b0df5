//! URI expression builder.
//!
//! Turns a path template such as `/clients/{id}` plus the classified path,
//! query and matrix parameters into a Rust expression that builds the request
//! URI from the test's data set at run time.
//!
//! Matrix parameters are expanded first, then path placeholders are replaced,
//! then the query string is appended. The result is a list of
//! [`UriSegment`]s, rendered either as a plain string literal or as a
//! `format!` call.
//!
//! # Examples
//!
//! ```
//! use apitestgen_core::model::{MatrixParams, RoleMap};
//! use apitestgen_core::uri::prepare_uri_expression;
//!
//! let mut path = RoleMap::new();
//! path.insert("id", "i64");
//! let expr = prepare_uri_expression("/clients/{id}", &path, &RoleMap::new(), &MatrixParams::default());
//! assert_eq!(
//!     expr.render(),
//!     r#"format!("/clients/{}", safe_string(data.get("id")))"#
//! );
//! ```

// Internal imports (std, crate)
use crate::model::{MatrixParams, RoleMap};
use crate::utils::rust_string_literal;

// External imports (alphabetized)
use once_cell::sync::Lazy;
use regex::Regex;

/// `{name}` or `{name:pattern}`
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\s*([^{}:\s]+)\s*(?::[^{}]*)?\}").expect("placeholder pattern is valid")
});

/// One piece of a URI expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriSegment {
    Literal(String),
    /// Value looked up in the test data by key
    Lookup(String),
}

/// A URI built from literal text and data lookups
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriExpression {
    segments: Vec<UriSegment>,
}

impl UriExpression {
    pub fn segments(&self) -> &[UriSegment] {
        &self.segments
    }

    /// Whether any part of the URI comes from test data
    pub fn has_lookups(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, UriSegment::Lookup(_)))
    }

    /// Render as a Rust expression.
    ///
    /// A URI without lookups is a string literal; otherwise a `format!` call
    /// whose arguments read the test data through `safe_string`.
    pub fn render(&self) -> String {
        if !self.has_lookups() {
            let text: String = self
                .segments
                .iter()
                .map(|s| match s {
                    UriSegment::Literal(text) => text.as_str(),
                    UriSegment::Lookup(_) => "",
                })
                .collect();
            return rust_string_literal(&text);
        }

        let mut template = String::new();
        let mut args = Vec::new();
        for segment in &self.segments {
            match segment {
                UriSegment::Literal(text) => {
                    template.push_str(&text.replace('{', "{{").replace('}', "}}"))
                }
                UriSegment::Lookup(key) => {
                    template.push_str("{}");
                    args.push(format!("safe_string(data.get({}))", rust_string_literal(key)));
                }
            }
        }
        format!("format!({}, {})", rust_string_literal(&template), args.join(", "))
    }

    fn push_literal(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.segments.last_mut() {
            Some(UriSegment::Literal(previous)) => previous.push_str(text),
            _ => self.segments.push(UriSegment::Literal(text.to_string())),
        }
    }

    fn push_lookup(&mut self, key: &str) {
        self.segments.push(UriSegment::Lookup(key.to_string()));
    }
}

/// Build the URI expression for `template`.
///
/// A placeholder naming a matrix path variable expands to
/// `var;key1=<lookup>;key2=<lookup>`. A placeholder naming a path parameter
/// becomes a lookup. Any other placeholder stays literal text.
pub fn prepare_uri_expression(
    template: &str,
    path_params: &RoleMap,
    query_params: &RoleMap,
    matrix_params: &MatrixParams,
) -> UriExpression {
    let mut expr = UriExpression::default();
    let mut cursor = 0;

    for captures in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        expr.push_literal(&template[cursor..whole.start()]);
        cursor = whole.end();

        let name = name.as_str();
        match matrix_params.get(name).filter(|keys| !keys.is_empty() && !name.is_empty()) {
            Some(keys) => {
                expr.push_literal(name);
                for key in keys.names() {
                    expr.push_literal(&format!(";{key}="));
                    expr.push_lookup(key);
                }
            }
            None if path_params.contains(name) => expr.push_lookup(name),
            None => expr.push_literal(whole.as_str()),
        }
    }
    expr.push_literal(&template[cursor..]);

    for (index, key) in query_params.names().enumerate() {
        let separator = if index == 0 { '?' } else { '&' };
        expr.push_literal(&format!("{separator}{key}="));
        expr.push_lookup(key);
    }

    expr
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[&str]) -> RoleMap {
        let mut map = RoleMap::new();
        for name in names {
            map.insert(*name, "String");
        }
        map
    }

    #[test]
    fn test_path_placeholder_becomes_lookup() {
        let expr = prepare_uri_expression(
            "/clients/{id}",
            &roles(&["id"]),
            &RoleMap::new(),
            &MatrixParams::default(),
        );
        assert_eq!(
            expr.segments(),
            &[
                UriSegment::Literal("/clients/".into()),
                UriSegment::Lookup("id".into())
            ]
        );
        assert!(!expr.render().contains("{id}"));
    }

    #[test]
    fn test_matrix_expands_before_path_params() {
        let mut matrix = MatrixParams::default();
        matrix.insert("filters", "color", "String");
        matrix.insert("filters", "size", "u32");

        let expr = prepare_uri_expression(
            "/products/{filters}",
            &roles(&["filters"]),
            &RoleMap::new(),
            &matrix,
        );
        assert_eq!(
            expr.segments(),
            &[
                UriSegment::Literal("/products/filters;color=".into()),
                UriSegment::Lookup("color".into()),
                UriSegment::Literal(";size=".into()),
                UriSegment::Lookup("size".into()),
            ]
        );
        assert_eq!(
            expr.render(),
            r#"format!("/products/filters;color={};size={}", safe_string(data.get("color")), safe_string(data.get("size")))"#
        );
    }

    #[test]
    fn test_query_string_is_appended() {
        let expr = prepare_uri_expression(
            "/clients",
            &RoleMap::new(),
            &roles(&["page", "size"]),
            &MatrixParams::default(),
        );
        assert_eq!(
            expr.render(),
            r#"format!("/clients?page={}&size={}", safe_string(data.get("page")), safe_string(data.get("size")))"#
        );
    }

    #[test]
    fn test_plain_literal_without_lookups() {
        let expr = prepare_uri_expression(
            "/health",
            &RoleMap::new(),
            &RoleMap::new(),
            &MatrixParams::default(),
        );
        assert_eq!(expr.render(), r#""/health""#);
        assert!(!expr.has_lookups());

        let empty = prepare_uri_expression("", &RoleMap::new(), &RoleMap::new(), &MatrixParams::default());
        assert!(empty.segments().is_empty());
        assert_eq!(empty.render(), r#""""#);
    }

    #[test]
    fn test_unknown_placeholders_stay_literal_and_are_escaped() {
        let expr = prepare_uri_expression(
            "/orgs/{org}/users/{id}",
            &roles(&["id"]),
            &RoleMap::new(),
            &MatrixParams::default(),
        );
        assert_eq!(
            expr.render(),
            r#"format!("/orgs/{{org}}/users/{}", safe_string(data.get("id")))"#
        );

        let literal_only = prepare_uri_expression(
            "/orgs/{org}",
            &RoleMap::new(),
            &RoleMap::new(),
            &MatrixParams::default(),
        );
        assert_eq!(literal_only.render(), r#""/orgs/{org}""#);
    }

    #[test]
    fn test_placeholder_with_pattern() {
        let expr = prepare_uri_expression(
            "/files/{id:[0-9]+}/raw",
            &roles(&["id"]),
            &RoleMap::new(),
            &MatrixParams::default(),
        );
        assert_eq!(
            expr.segments(),
            &[
                UriSegment::Literal("/files/".into()),
                UriSegment::Lookup("id".into()),
                UriSegment::Literal("/raw".into()),
            ]
        );
    }

    #[test]
    fn test_lookup_at_start_has_no_empty_literal() {
        let expr = prepare_uri_expression(
            "{tenant}",
            &roles(&["tenant"]),
            &roles(&["q"]),
            &MatrixParams::default(),
        );
        assert_eq!(
            expr.segments(),
            &[
                UriSegment::Lookup("tenant".into()),
                UriSegment::Literal("?q=".into()),
                UriSegment::Lookup("q".into()),
            ]
        );
    }
}
