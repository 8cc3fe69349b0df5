//! Matcher catalog: turns a body-path assertion into a matcher expression.
//!
//! Each [`MatcherKind`] maps to one expression of the fluent client's matcher
//! library. The value attached to an assertion is always a string; comparison
//! kinds parse it as a number and `InstanceOf` parses it as a Rust type.
//!
//! # Examples
//!
//! ```
//! use apitestgen_core::matcher::{matcher_expression, MatcherKind};
//!
//! let expr = matcher_expression(MatcherKind::EqualTo, "John Doe", None).unwrap();
//! assert_eq!(expr, r#"equal_to("John Doe")"#);
//!
//! let expr = matcher_expression(MatcherKind::GreaterThan, "10", None).unwrap();
//! assert_eq!(expr, "greater_than(10)");
//! ```

// Internal imports (std, crate)
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::{rust_string_literal, to_snake_case};

// External imports (alphabetized)
use quote::ToTokens;
use serde::{Deserialize, Serialize};

/// Assertion strategy applied to the value found at a body path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatcherKind {
    EqualTo,
    HasItem,
    NullValue,
    NotNullValue,
    Not,
    InstanceOf,
    GreaterThan,
    LessThan,
    ContainsString,
    StartsWith,
    EndsWith,
    AnyOf,
    Contains,
    CustomClass,
    /// Fallback for kinds the catalog does not know
    Anything,
}

impl MatcherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatcherKind::EqualTo => "equal_to",
            MatcherKind::HasItem => "has_item",
            MatcherKind::NullValue => "null_value",
            MatcherKind::NotNullValue => "not_null_value",
            MatcherKind::Not => "not",
            MatcherKind::InstanceOf => "instance_of",
            MatcherKind::GreaterThan => "greater_than",
            MatcherKind::LessThan => "less_than",
            MatcherKind::ContainsString => "contains_string",
            MatcherKind::StartsWith => "starts_with",
            MatcherKind::EndsWith => "ends_with",
            MatcherKind::AnyOf => "any_of",
            MatcherKind::Contains => "contains",
            MatcherKind::CustomClass => "custom_class",
            MatcherKind::Anything => "anything",
        }
    }

    pub fn all() -> &'static [MatcherKind] {
        &[
            MatcherKind::EqualTo,
            MatcherKind::HasItem,
            MatcherKind::NullValue,
            MatcherKind::NotNullValue,
            MatcherKind::Not,
            MatcherKind::InstanceOf,
            MatcherKind::GreaterThan,
            MatcherKind::LessThan,
            MatcherKind::ContainsString,
            MatcherKind::StartsWith,
            MatcherKind::EndsWith,
            MatcherKind::AnyOf,
            MatcherKind::Contains,
            MatcherKind::CustomClass,
            MatcherKind::Anything,
        ]
    }

    /// Parse a kind name written as `EQUAL_TO`, `EqualTo` or `equal_to`.
    ///
    /// Returns `None` for names the catalog does not know; callers decide
    /// whether to fall back to [`MatcherKind::Anything`].
    pub fn parse_name(name: &str) -> Option<MatcherKind> {
        let normalized = to_snake_case(name);
        let normalized = match normalized.as_str() {
            "custom" => "custom_class",
            other => other,
        };
        MatcherKind::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatcherKind {
    type Err = std::convert::Infallible;

    /// Unknown names become [`MatcherKind::Anything`]
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(MatcherKind::parse_name(s).unwrap_or(MatcherKind::Anything))
    }
}

/// Render the matcher expression for `kind` applied to `value`.
///
/// `custom_ref` is the path of a user matcher type and is only consulted for
/// [`MatcherKind::CustomClass`].
pub fn matcher_expression(kind: MatcherKind, value: &str, custom_ref: Option<&str>) -> Result<String> {
    let literal = rust_string_literal(value);
    let expr = match kind {
        MatcherKind::EqualTo => format!("equal_to({literal})"),
        MatcherKind::NotNullValue => "not_null_value()".to_string(),
        MatcherKind::NullValue => "null_value()".to_string(),
        MatcherKind::ContainsString => format!("contains_string({literal})"),
        MatcherKind::StartsWith => format!("starts_with({literal})"),
        MatcherKind::EndsWith => format!("ends_with({literal})"),
        MatcherKind::GreaterThan => format!("greater_than({})", numeric_literal(value)?),
        MatcherKind::LessThan => format!("less_than({})", numeric_literal(value)?),
        MatcherKind::Not => format!("not(equal_to({literal}))"),
        MatcherKind::InstanceOf => format!("instance_of::<{}>()", type_literal(value)?),
        MatcherKind::AnyOf => format!("any_of({})", equal_to_list(value)),
        MatcherKind::Contains => format!("contains({})", equal_to_list(value)),
        MatcherKind::HasItem => format!("has_item({literal})"),
        MatcherKind::CustomClass => {
            let reference = custom_ref
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| Error::matcher("custom matcher requires a matcher reference"))?;
            format!("{}::default()", path_literal(reference)?)
        }
        MatcherKind::Anything => "anything()".to_string(),
    };
    Ok(expr)
}

/// A finite float when the value has a decimal point, an integer otherwise
fn numeric_literal(value: &str) -> Result<String> {
    let trimmed = value.trim();
    let literal = if trimmed.contains('.') {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|float| float.is_finite())
            .map(|float| format!("{float:?}"))
    } else {
        trimmed.parse::<i64>().ok().map(|int| int.to_string())
    };
    literal.ok_or_else(|| Error::matcher(format!("comparison value is not a number: {value:?}")))
}

fn type_literal(value: &str) -> Result<String> {
    let ty: syn::Type = syn::parse_str(value.trim())
        .map_err(|e| Error::matcher(format!("invalid type for instance_of {value:?}: {e}")))?;
    Ok(crate::utils::normalize_type_text(
        &ty.to_token_stream().to_string(),
    ))
}

fn path_literal(value: &str) -> Result<String> {
    let path: syn::Path = syn::parse_str(value)
        .map_err(|e| Error::matcher(format!("invalid matcher reference {value:?}: {e}")))?;
    Ok(crate::utils::normalize_type_text(
        &path.to_token_stream().to_string(),
    ))
}

fn equal_to_list(value: &str) -> String {
    let items: Vec<String> = value
        .split(',')
        .map(|item| format!("equal_to({})", rust_string_literal(item.trim())))
        .collect();
    format!("vec![{}]", items.join(", "))
}
