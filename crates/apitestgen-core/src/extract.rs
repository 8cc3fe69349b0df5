//! Metadata extraction from tagged declarations.
//!
//! [`MetadataExtractor`] reads the tags found by the scanner and fills in the
//! model: the tested type and its auth descriptor, each method's route, the
//! classification of its parameters, and the cases declared in its
//! `api_test_spec` tag.
//!
//! Case fields are read from a declared table. A field that is absent takes its
//! default, a field with the wrong shape is reported and defaulted, and any key
//! not in the table is reported as unknown and skipped.

// Internal imports (std, crate)
use std::path::PathBuf;
use std::sync::Arc;

use crate::diagnostics::{Diagnostics, Location};
use crate::error::{Error, Result};
use crate::matcher::MatcherKind;
use crate::model::{
    AuthDescriptor, Case, CookieAssertion, HeaderAssertion, HttpVerb, ParameterMetadata,
    PathAssertion, SeverityLevel, SpecDescriptor, TestedType,
};
use crate::tags::{attribute_name, Tag, TagValue};
use crate::utils::{normalize_type_text, sanitize_module_path};

// External imports (alphabetized)
use quote::ToTokens;
use syn::{Attribute, FnArg, Pat, Signature};

/// Marker that opts a type into test generation
pub const MARKER_TAG: &str = "generate_api_test";
/// Base path of every route of a type
pub const ROUTE_TAG: &str = "route";
/// Scenario declarations on a method
pub const SCENARIO_TAG: &str = "api_test_spec";
/// Tags recognized on a type declaration or impl block
pub const TYPE_TAGS: &[&str] = &[MARKER_TAG, ROUTE_TAG];
/// Routing tags, in the order they are checked
pub const ROUTING_TAGS: &[&str] = &["get", "post", "put", "delete", "patch", "head"];
/// Role tags recognized on method parameters
pub const ROLE_TAGS: &[&str] = &[
    "path",
    "query",
    "header",
    "cookie",
    "body",
    "matrix",
    "form",
    "file",
    "request_part",
];

const DEFAULT_TOKEN_FIELD: &str = "token";

/// A case field with the names it may be written under
struct CaseField {
    name: &'static str,
    aliases: &'static [&'static str],
}

impl CaseField {
    fn matches(&self, key: &str) -> bool {
        self.name == key || self.aliases.contains(&key)
    }

    fn keys(&self) -> Vec<&'static str> {
        std::iter::once(self.name)
            .chain(self.aliases.iter().copied())
            .collect()
    }
}

/// Fields a `case(..)` tag may carry; absent fields keep [`Case::default`]
const CASE_FIELDS: &[CaseField] = &[
    CaseField { name: "display_name", aliases: &[] },
    CaseField { name: "order", aliases: &[] },
    CaseField { name: "timeout", aliases: &[] },
    CaseField { name: "expected_status_code", aliases: &["status"] },
    CaseField { name: "data_provider", aliases: &["data_provider_class_name"] },
    CaseField { name: "requires_auth", aliases: &[] },
    CaseField { name: "json_paths", aliases: &["body_path_assertions"] },
    CaseField { name: "enable_logging", aliases: &[] },
    CaseField { name: "expected_headers", aliases: &[] },
    CaseField { name: "expected_cookies", aliases: &[] },
    CaseField { name: "repeat", aliases: &[] },
    CaseField { name: "response_timeout_seconds", aliases: &[] },
    CaseField { name: "spec_descriptor", aliases: &[] },
];

/// Reads tags into model entities, reporting problems to its diagnostics sink
#[derive(Clone)]
pub struct MetadataExtractor {
    diagnostics: Arc<dyn Diagnostics>,
    file: Option<PathBuf>,
}

impl MetadataExtractor {
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            diagnostics,
            file: None,
        }
    }

    /// Attach the file being read so diagnostics carry a location
    pub fn in_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Parse the attributes whose name is one of `names`.
    ///
    /// Other attributes are never parsed. A recognized attribute that cannot be
    /// read is reported and skipped.
    pub fn read_tags(&self, attrs: &[Attribute], names: &[&str]) -> Vec<Tag> {
        attrs
            .iter()
            .filter(|attr| {
                attribute_name(attr).is_some_and(|name| names.contains(&name.as_str()))
            })
            .filter_map(|attr| match Tag::from_attribute(attr) {
                Ok(tag) => Some(tag),
                Err(e) => {
                    let line = e.span().start().line;
                    self.warn(format!("Ignoring malformed tag: {e}"), line);
                    None
                }
            })
            .collect()
    }

    /// Build the tested type for `name` from its type-level tags
    pub fn create_tested_type(&self, name: &str, package: &str, tags: &[Tag]) -> TestedType {
        let mut tested = TestedType::new(name, sanitize_module_path(package));
        if let Some(file) = &self.file {
            tested.source_file = file.clone();
        }

        if let Some(route) = tags.iter().find(|t| t.name == ROUTE_TAG) {
            match path_value(route) {
                Some(path) => tested.base_path = path,
                None if !route.args.is_empty() => self.warn(
                    format!("Unreadable base path on `{name}`, using an empty one"),
                    route.line,
                ),
                None => {}
            }
        }

        if let Some(marker) = tags.iter().find(|t| t.name == MARKER_TAG) {
            tested.auth = self.auth_descriptor(marker);
        }

        log::debug!(
            "Created tested type {} (package `{}`, base path `{}`)",
            tested.generated_name,
            tested.package,
            tested.base_path
        );
        tested
    }

    fn auth_descriptor(&self, marker: &Tag) -> Option<AuthDescriptor> {
        let text = |key: &str| {
            marker
                .get(key)
                .and_then(TagValue::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let auth_url = text("auth_url")?;
        let username = text("username")?;
        let password = text("password")?;
        Some(AuthDescriptor {
            auth_url,
            username,
            password,
            token_field: text("token_field").unwrap_or_else(|| DEFAULT_TOKEN_FIELD.to_string()),
        })
    }

    /// Verb and path of the first routing tag; `(None, "")` when there is none
    pub fn extract_route(&self, tags: &[Tag]) -> (Option<HttpVerb>, String) {
        for tag in tags {
            let Some(verb) = HttpVerb::from_tag(&tag.name) else {
                continue;
            };
            let path = match path_value(tag) {
                Some(path) => path,
                None => {
                    if !tag.args.is_empty() {
                        self.warn(
                            format!("Unreadable path on `#[{}]`, using an empty one", tag.name),
                            tag.line,
                        );
                    }
                    String::new()
                }
            };
            return (Some(verb), path);
        }
        (None, String::new())
    }

    /// Classify every typed parameter of `sig` by its role tag.
    ///
    /// The receiver is skipped and untagged parameters are body parameters.
    pub fn process_parameters(&self, sig: &Signature, verb: Option<HttpVerb>) -> ParameterMetadata {
        let mut params = ParameterMetadata::new(verb);

        for (index, input) in sig.inputs.iter().enumerate() {
            let FnArg::Typed(pat_type) = input else {
                continue;
            };
            let name = parameter_name(&pat_type.pat).unwrap_or_else(|| format!("arg{index}"));
            let type_name = normalize_type_text(&pat_type.ty.to_token_stream().to_string());
            let role = self.read_tags(&pat_type.attrs, ROLE_TAGS).into_iter().next();

            let Some(role) = role else {
                params.body.insert(name, type_name);
                continue;
            };

            match role.name.as_str() {
                "path" => params.path.insert(name, type_name),
                "query" => params.query.insert(name, type_name),
                "header" => {
                    let header = role
                        .name_or_positional(&["name", "value"])
                        .map(str::to_string)
                        .unwrap_or(name);
                    params.header.insert(header, type_name);
                }
                "cookie" => params.cookie.insert(name, type_name),
                "matrix" => {
                    let key = role
                        .name_or_positional(&["name", "value"])
                        .map(str::to_string)
                        .unwrap_or(name);
                    let path_var = role
                        .get("path_var")
                        .and_then(TagValue::as_name)
                        .map(str::to_string)
                        .unwrap_or_else(|| {
                            self.warn(
                                format!(
                                    "Matrix parameter `{key}` in `{}` has no path_var",
                                    sig.ident
                                ),
                                role.line,
                            );
                            String::new()
                        });
                    params.matrix.insert(&path_var, key, type_name);
                }
                "form" => params.form.insert(name, type_name),
                "file" => {
                    params.file.insert(name, type_name);
                    params.multipart = true;
                }
                "request_part" => {
                    params.body.insert(name, type_name);
                    params.multipart = true;
                }
                _ => params.body.insert(name, type_name),
            }
        }

        params
    }

    /// Read every `case(..)` declared by a scenario tag.
    ///
    /// Cases may appear directly, inside `scenarios(..)`, or in a
    /// `scenarios = [..]` list.
    pub fn extract_cases(&self, method: &str, spec: &Tag) -> Result<Vec<Case>> {
        let mut case_tags: Vec<&Tag> = Vec::new();

        for arg in &spec.args {
            match (arg.key.as_deref(), &arg.value) {
                (None, TagValue::Nested(tag)) if tag.name == "case" => case_tags.push(tag),
                (Some("scenarios"), value) | (None, value @ TagValue::Nested(_))
                    if value.as_tag().map_or(true, |t| t.name == "scenarios") =>
                {
                    match value.items() {
                        Some(items) => {
                            for item in items {
                                match item.as_tag() {
                                    Some(tag) if tag.name == "case" => case_tags.push(tag),
                                    _ => self.warn(
                                        format!("Ignoring non-case entry {item} in scenarios of `{method}`"),
                                        spec.line,
                                    ),
                                }
                            }
                        }
                        None => self.warn(
                            format!(
                                "`scenarios` of `{method}` expects a list, found {}",
                                value.shape()
                            ),
                            spec.line,
                        ),
                    }
                }
                (Some(key), _) => self.warn(
                    format!("Unknown scenario field `{key}` on `{method}`"),
                    spec.line,
                ),
                (None, value) => self.warn(
                    format!("Ignoring positional {} in scenarios of `{method}`", value.shape()),
                    spec.line,
                ),
            }
        }

        case_tags
            .into_iter()
            .enumerate()
            .map(|(index, tag)| self.extract_case(method, index, tag))
            .collect()
    }

    /// Read a single `case(..)` tag
    pub fn extract_case(&self, method: &str, index: usize, tag: &Tag) -> Result<Case> {
        let mut case = Case::new();

        for field in CASE_FIELDS {
            if let Some(value) = tag.get_any(&field.keys()) {
                self.apply_field(&mut case, method, index, field.name, value, tag.line)?;
            }
        }

        for key in tag.keys() {
            if !CASE_FIELDS.iter().any(|field| field.matches(key)) {
                self.warn(
                    format!("Unknown case field `{key}` in case #{index} of `{method}`"),
                    tag.line,
                );
            }
        }

        Ok(case)
    }

    fn apply_field(
        &self,
        case: &mut Case,
        method: &str,
        index: usize,
        field: &str,
        value: &TagValue,
        line: usize,
    ) -> Result<()> {
        let mismatch = |expected: &str| {
            self.warn(
                format!(
                    "Field `{field}` in case #{index} of `{method}` expects {expected}, found {}; using the default",
                    value.shape()
                ),
                line,
            )
        };

        match field {
            "display_name" => match value.as_str() {
                Some(s) => case.display_name = s.to_string(),
                None => mismatch("a string"),
            },
            "order" => match value.as_i64() {
                Some(n) => case.order = n,
                None => mismatch("an integer"),
            },
            "timeout" => match value.as_i64() {
                Some(n) => case.timeout = n,
                None => mismatch("an integer"),
            },
            "expected_status_code" => match value.as_i64().map(u16::try_from) {
                Some(Ok(code)) => case.expected_status_code = code,
                _ => mismatch("a status code"),
            },
            "requires_auth" => match value.as_bool() {
                Some(b) => case.requires_auth = b,
                None => mismatch("a boolean"),
            },
            "enable_logging" => match value.as_bool() {
                Some(b) => case.enable_logging = b,
                None => mismatch("a boolean"),
            },
            "data_provider" => {
                let provider = match value {
                    TagValue::Path(p) => Some(p.clone()),
                    other => other
                        .as_string_list()
                        .map(|list| list.into_iter().next().unwrap_or_default()),
                };
                match provider {
                    Some(p) => case.data_provider = p,
                    None => mismatch("a string or list of strings"),
                }
            }
            "repeat" => match value.as_i64().map(u32::try_from) {
                Some(Ok(n)) => case.repeat = n,
                _ => mismatch("a non-negative integer"),
            },
            "response_timeout_seconds" => match value.as_i64() {
                Some(n) if n > 0 => case.response_timeout = Some(n as u64),
                Some(_) => case.response_timeout = None,
                None => mismatch("an integer"),
            },
            "expected_headers" => match value.items() {
                Some(items) => {
                    for item in items {
                        if let Some(header) = self.header_assertion(method, item, line) {
                            case.add_header(header);
                        }
                    }
                }
                None => mismatch("a list"),
            },
            "expected_cookies" => match value.items() {
                Some(items) => {
                    for item in items {
                        if let Some(cookie) = self.cookie_assertion(method, item, line) {
                            case.add_cookie(cookie);
                        }
                    }
                }
                None => mismatch("a list"),
            },
            "json_paths" => match value.items() {
                Some(items) => {
                    for item in items {
                        if let Some(assertion) = self.path_assertion(method, index, item, line)? {
                            case.add_path_assertion(assertion);
                        }
                    }
                }
                None => mismatch("a list"),
            },
            "spec_descriptor" => match value.as_tag() {
                Some(tag) => case.descriptor = Some(self.spec_descriptor(method, tag)),
                None => mismatch("a nested spec_descriptor(..)"),
            },
            _ => {}
        }
        Ok(())
    }

    fn header_assertion(&self, method: &str, item: &TagValue, line: usize) -> Option<HeaderAssertion> {
        let Some(tag) = item.as_tag() else {
            self.warn(format!("Skipping expected header {item} on `{method}`"), line);
            return None;
        };
        let name = tag.get("name").and_then(TagValue::as_str).unwrap_or("");
        let values = tag
            .get_any(&["value", "values"])
            .and_then(TagValue::as_string_list)
            .unwrap_or_default();
        if name.is_empty() || values.is_empty() {
            self.warn(
                format!("Skipping expected header without name or value on `{method}`"),
                line,
            );
            return None;
        }
        Some(HeaderAssertion {
            name: name.to_string(),
            values,
        })
    }

    fn cookie_assertion(&self, method: &str, item: &TagValue, line: usize) -> Option<CookieAssertion> {
        let Some(tag) = item.as_tag() else {
            self.warn(format!("Skipping expected cookie {item} on `{method}`"), line);
            return None;
        };
        let name = tag.get("name").and_then(TagValue::as_str);
        let value = tag.get("value").and_then(TagValue::as_str);
        match (name, value) {
            (Some(name), Some(value)) if !name.is_empty() => Some(CookieAssertion {
                name: name.to_string(),
                value: value.to_string(),
            }),
            _ => {
                self.warn(
                    format!("Skipping expected cookie without name or value on `{method}`"),
                    line,
                );
                None
            }
        }
    }

    /// A malformed custom matcher reference fails the whole case
    fn path_assertion(
        &self,
        method: &str,
        index: usize,
        item: &TagValue,
        line: usize,
    ) -> Result<Option<PathAssertion>> {
        let Some(tag) = item.as_tag() else {
            self.warn(
                format!("Skipping body path assertion {item} on `{method}`: expected json_path(..)"),
                line,
            );
            return Ok(None);
        };

        let kind = match tag.get_any(&["matcher", "kind", "type", "matcher_kind"]) {
            Some(value) => match value.as_name() {
                Some(name) => Some(MatcherKind::parse_name(last_segment(name)).unwrap_or_else(|| {
                    self.warn(
                        format!("Unknown matcher `{name}` on `{method}`, matching anything"),
                        line,
                    );
                    MatcherKind::Anything
                })),
                None => {
                    self.warn(
                        format!("Matcher kind on `{method}` must be a name, found {}", value.shape()),
                        line,
                    );
                    None
                }
            },
            None => None,
        };

        let custom_matcher = match tag
            .get_any(&["matcher_ref", "custom_matcher", "matcher_class"])
            .map(|value| value.as_name().map(str::trim))
        {
            Some(Some(reference)) if !reference.is_empty() => {
                syn::parse_str::<syn::Path>(reference).map_err(|e| {
                    Error::extraction(format!(
                        "case #{index} of `{method}`: invalid matcher reference `{reference}`: {e}"
                    ))
                })?;
                Some(reference.to_string())
            }
            Some(Some(_)) | None => None,
            Some(None) => {
                return Err(Error::extraction(format!(
                    "case #{index} of `{method}`: matcher reference must be a path or string"
                )));
            }
        };

        Ok(Some(PathAssertion {
            path: tag.get("path").and_then(TagValue::as_str).unwrap_or("").to_string(),
            kind,
            value: tag.get("value").map(scalar_text).unwrap_or_default(),
            custom_matcher,
        }))
    }

    fn spec_descriptor(&self, method: &str, tag: &Tag) -> SpecDescriptor {
        let text = |key: &str| {
            tag.get(key)
                .and_then(TagValue::as_str)
                .unwrap_or("")
                .to_string()
        };
        let severity = match tag.get("severity").and_then(TagValue::as_name) {
            Some(name) => SeverityLevel::parse_name(last_segment(name)).unwrap_or_else(|| {
                self.warn(
                    format!("Unknown severity `{name}` on `{method}`, using MEDIUM"),
                    tag.line,
                );
                SeverityLevel::default()
            }),
            None => SeverityLevel::default(),
        };
        SpecDescriptor {
            epic: text("epic"),
            feature: text("feature"),
            story: text("story"),
            severity,
            tags: tag
                .get("tags")
                .and_then(TagValue::as_string_list)
                .unwrap_or_default(),
        }
    }

    pub(crate) fn warn(&self, message: String, line: usize) {
        self.diagnostics.warning(message, self.location(line));
    }

    pub(crate) fn diagnostics(&self) -> &Arc<dyn Diagnostics> {
        &self.diagnostics
    }

    pub(crate) fn location(&self, line: usize) -> Option<Location> {
        self.file.as_ref().map(|file| Location {
            file: file.clone(),
            line,
        })
    }
}

/// Path string of a routing or base-path tag, quotes stripped
fn path_value(tag: &Tag) -> Option<String> {
    let value = tag.get_any(&["path", "value"]).or_else(|| tag.first_positional())?;
    let raw = match value {
        TagValue::Str(s) => s.clone(),
        TagValue::List(items) => items.first()?.as_str()?.to_string(),
        _ => return None,
    };
    Some(raw.trim().trim_matches('"').to_string())
}

/// Identifier bound by a parameter pattern.
///
/// Single-field tuple-struct patterns such as `Path(id)` or `Json(client)`
/// yield the inner binding.
fn parameter_name(pat: &Pat) -> Option<String> {
    match pat {
        Pat::Ident(ident) => Some(ident.ident.to_string()),
        Pat::Reference(reference) => parameter_name(&reference.pat),
        Pat::Type(typed) => parameter_name(&typed.pat),
        Pat::TupleStruct(tuple) if tuple.elems.len() == 1 => {
            tuple.elems.first().and_then(parameter_name)
        }
        _ => None,
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

fn scalar_text(value: &TagValue) -> String {
    match value {
        TagValue::Str(s) => s.clone(),
        other => other.to_string(),
    }
}
