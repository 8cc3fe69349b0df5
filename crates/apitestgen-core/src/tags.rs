//! Generic reader for the attribute tags that drive test generation.
//!
//! Every recognized attribute is turned into a [`Tag`]: a name plus a list of
//! positional or `key = value` arguments. Values may be literals, paths, lists
//! in brackets, or nested tags such as `case(display_name = "ok")`.
//!
//! Keys and nested tag names are normalized to snake_case, so
//! `expectedStatusCode = 200` and `expected_status_code = 200` read the same.
//!
//! # Examples
//!
//! ```
//! use apitestgen_core::tags::Tag;
//!
//! let attr: syn::Attribute = syn::parse_quote!(#[get("/clients/{id}")]);
//! let tag = Tag::from_attribute(&attr).unwrap();
//! assert_eq!(tag.name, "get");
//! assert_eq!(tag.first_positional().and_then(|v| v.as_str()), Some("/clients/{id}"));
//! ```

// Internal imports (std, crate)
use std::fmt;

use crate::utils::{normalize_type_text, to_snake_case};

// External imports (alphabetized)
use proc_macro2::Span;
use quote::ToTokens;
use syn::ext::IdentExt;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{bracketed, parenthesized, Attribute, Expr, Ident, Lit, Meta, Token};

/// A parsed attribute tag
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
    pub args: Vec<TagArg>,
    /// 1-based source line, or 0 when unknown
    pub line: usize,
}

/// One argument of a tag; `key` is `None` for positional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct TagArg {
    pub key: Option<String>,
    pub value: TagValue,
}

/// Value of a tag argument
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// A bare path such as `EQUAL_TO` or `crate::matchers::IsUuid`
    Path(String),
    List(Vec<TagValue>),
    Nested(Tag),
}

impl TagValue {
    /// String literal content
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// String literal or bare path, for values that name something
    pub fn as_name(&self) -> Option<&str> {
        match self {
            TagValue::Str(s) | TagValue::Path(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TagValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            TagValue::Nested(tag) => Some(tag),
            _ => None,
        }
    }

    /// A single string or a list made only of strings
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            TagValue::Str(s) => Some(vec![s.clone()]),
            TagValue::List(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }

    /// Elements of a list value, or the positional arguments of a nested tag
    /// used as a container (`json_paths(json_path(..), json_path(..))`).
    pub fn items(&self) -> Option<Vec<&TagValue>> {
        match self {
            TagValue::List(items) => Some(items.iter().collect()),
            TagValue::Nested(tag) => Some(tag.positional().collect()),
            _ => None,
        }
    }

    /// Short description of the value's shape, for diagnostics
    pub fn shape(&self) -> &'static str {
        match self {
            TagValue::Str(_) => "string",
            TagValue::Int(_) => "integer",
            TagValue::Float(_) => "float",
            TagValue::Bool(_) => "boolean",
            TagValue::Path(_) => "path",
            TagValue::List(_) => "list",
            TagValue::Nested(_) => "nested tag",
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Str(s) => write!(f, "{s:?}"),
            TagValue::Int(i) => write!(f, "{i}"),
            TagValue::Float(x) => write!(f, "{x}"),
            TagValue::Bool(b) => write!(f, "{b}"),
            TagValue::Path(p) => f.write_str(p),
            TagValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            TagValue::Nested(tag) => write!(f, "{}(..)", tag.name),
        }
    }
}

impl Tag {
    /// Read a tag from an outer attribute, matching on its last path segment
    pub fn from_attribute(attr: &Attribute) -> syn::Result<Tag> {
        let name = attribute_name(attr)
            .ok_or_else(|| syn::Error::new(attr.span(), "attribute has no name"))?;
        let line = line_of(attr.span());
        let args = match &attr.meta {
            Meta::Path(_) => Vec::new(),
            Meta::List(list) => list
                .parse_args_with(Punctuated::<TagArg, Token![,]>::parse_terminated)?
                .into_iter()
                .collect(),
            Meta::NameValue(name_value) => vec![TagArg {
                key: None,
                value: value_from_expr(&name_value.value)?,
            }],
        };
        Ok(Tag { name, args, line })
    }

    /// First value stored under `key`.
    ///
    /// A positional nested tag whose name is `key` also matches, so
    /// `spec_descriptor(epic = "x")` and `spec_descriptor = spec_descriptor(..)`
    /// read alike.
    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.args.iter().find_map(|arg| match (&arg.key, &arg.value) {
            (Some(k), value) if k == key => Some(value),
            (None, value @ TagValue::Nested(tag)) if tag.name == key => Some(value),
            _ => None,
        })
    }

    /// First value stored under any of `keys`
    pub fn get_any(&self, keys: &[&str]) -> Option<&TagValue> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// Arguments given without a key
    pub fn positional(&self) -> impl Iterator<Item = &TagValue> {
        self.args
            .iter()
            .filter(|arg| arg.key.is_none())
            .map(|arg| &arg.value)
    }

    pub fn first_positional(&self) -> Option<&TagValue> {
        self.positional().next()
    }

    /// Keys used by this tag: explicit keys plus names of positional nested tags
    pub fn keys(&self) -> Vec<&str> {
        self.args
            .iter()
            .filter_map(|arg| match (&arg.key, &arg.value) {
                (Some(k), _) => Some(k.as_str()),
                (None, TagValue::Nested(tag)) => Some(tag.name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// String under `key`, or the first positional string when `key` is absent
    pub fn name_or_positional(&self, keys: &[&str]) -> Option<&str> {
        self.get_any(keys)
            .and_then(TagValue::as_name)
            .or_else(|| self.first_positional().and_then(TagValue::as_str))
    }
}

impl Parse for Tag {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let ident = Ident::parse_any(input)?;
        let line = line_of(ident.span());
        let args = if input.peek(syn::token::Paren) {
            let content;
            parenthesized!(content in input);
            Punctuated::<TagArg, Token![,]>::parse_terminated(&content)?
                .into_iter()
                .collect()
        } else {
            Vec::new()
        };
        Ok(Tag {
            name: to_snake_case(&ident.to_string()),
            args,
            line,
        })
    }
}

impl Parse for TagArg {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.peek(Ident::peek_any) && input.peek2(Token![=]) && !input.peek2(Token![==]) {
            let key = Ident::parse_any(input)?;
            input.parse::<Token![=]>()?;
            let value = input.parse::<TagValue>()?;
            return Ok(TagArg {
                key: Some(to_snake_case(&key.to_string())),
                value,
            });
        }
        Ok(TagArg {
            key: None,
            value: input.parse()?,
        })
    }
}

impl Parse for TagValue {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.peek(syn::token::Bracket) {
            let content;
            bracketed!(content in input);
            let items = Punctuated::<TagValue, Token![,]>::parse_terminated(&content)?;
            return Ok(TagValue::List(items.into_iter().collect()));
        }

        if input.peek(Token![-]) {
            input.parse::<Token![-]>()?;
            return match input.parse::<Lit>()? {
                Lit::Int(int) => Ok(TagValue::Int(-int.base10_parse::<i64>()?)),
                Lit::Float(float) => Ok(TagValue::Float(-float.base10_parse::<f64>()?)),
                other => Err(syn::Error::new(other.span(), "expected a number after `-`")),
            };
        }

        if input.peek(Lit) {
            return value_from_lit(&input.parse::<Lit>()?);
        }

        if input.peek(Ident::peek_any) && input.peek2(syn::token::Paren) {
            return Ok(TagValue::Nested(input.parse()?));
        }

        let path = input.call(syn::Path::parse_mod_style)?;
        Ok(TagValue::Path(normalize_type_text(
            &path.to_token_stream().to_string(),
        )))
    }
}

/// Last path segment of an attribute, e.g. `get` for `#[apitest::get(..)]`
pub fn attribute_name(attr: &Attribute) -> Option<String> {
    attr.path()
        .segments
        .last()
        .map(|segment| segment.ident.to_string())
}

fn value_from_lit(lit: &Lit) -> syn::Result<TagValue> {
    match lit {
        Lit::Str(s) => Ok(TagValue::Str(s.value())),
        Lit::Char(c) => Ok(TagValue::Str(c.value().to_string())),
        Lit::Int(int) => Ok(TagValue::Int(int.base10_parse()?)),
        Lit::Float(float) => Ok(TagValue::Float(float.base10_parse()?)),
        Lit::Bool(b) => Ok(TagValue::Bool(b.value)),
        other => Err(syn::Error::new(other.span(), "unsupported literal in tag")),
    }
}

fn value_from_expr(expr: &Expr) -> syn::Result<TagValue> {
    match expr {
        Expr::Lit(lit) => value_from_lit(&lit.lit),
        Expr::Path(path) => Ok(TagValue::Path(normalize_type_text(
            &path.path.to_token_stream().to_string(),
        ))),
        other => syn::parse2::<TagValue>(other.to_token_stream()),
    }
}

fn line_of(span: Span) -> usize {
    span.start().line
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn tag(attr: Attribute) -> Tag {
        Tag::from_attribute(&attr).unwrap()
    }

    #[test]
    fn test_bare_and_namespaced_names() {
        assert_eq!(tag(parse_quote!(#[body])).name, "body");
        assert_eq!(tag(parse_quote!(#[apitest::post("/x")])).name, "post");
        assert!(tag(parse_quote!(#[body])).args.is_empty());
    }

    #[test]
    fn test_positional_and_named_values() {
        let t = tag(parse_quote!(#[header("X-Trace", required = true)]));
        assert_eq!(t.first_positional(), Some(&TagValue::Str("X-Trace".into())));
        assert_eq!(t.get("required").and_then(TagValue::as_bool), Some(true));
    }

    #[test]
    fn test_keys_are_normalized_to_snake_case() {
        let t = tag(parse_quote!(#[case(expectedStatusCode = 201, displayName = "made")]));
        assert_eq!(t.get("expected_status_code").and_then(TagValue::as_i64), Some(201));
        assert_eq!(t.get("display_name").and_then(TagValue::as_str), Some("made"));
    }

    #[test]
    fn test_numbers_and_negative_numbers() {
        let t = tag(parse_quote!(#[case(repeat = 3, response_timeout_seconds = -1, ratio = 0.5)]));
        assert_eq!(t.get("repeat"), Some(&TagValue::Int(3)));
        assert_eq!(t.get("response_timeout_seconds"), Some(&TagValue::Int(-1)));
        assert_eq!(t.get("ratio"), Some(&TagValue::Float(0.5)));
    }

    #[test]
    fn test_paths_and_keyword_keys() {
        let t = tag(parse_quote!(#[json_path(path = "$.id", type = NOT_NULL_VALUE, matcher_ref = crate::m::IsUuid)]));
        assert_eq!(t.get("type"), Some(&TagValue::Path("NOT_NULL_VALUE".into())));
        assert_eq!(
            t.get("matcher_ref").and_then(TagValue::as_name),
            Some("crate::m::IsUuid")
        );
    }

    #[test]
    fn test_lists_and_nested_tags() {
        let t = tag(parse_quote!(#[api_test_spec(
            case(
                display_name = "found",
                expected_headers(header(name = "X-A", value = ["1", "2"])),
                json_paths = [json_path(path = "$.name", matcher = EQUAL_TO, value = "John")]
            ),
            case(display_name = "missing")
        )]));

        let cases: Vec<_> = t.positional().filter_map(TagValue::as_tag).collect();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].keys(), vec!["display_name", "expected_headers", "json_paths"]);

        let headers = cases[0].get("expected_headers").unwrap().items().unwrap();
        let header = headers[0].as_tag().unwrap();
        assert_eq!(header.name, "header");
        assert_eq!(
            header.get("value").and_then(TagValue::as_string_list),
            Some(vec!["1".to_string(), "2".to_string()])
        );

        let paths = cases[0].get("json_paths").unwrap().items().unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].as_tag().unwrap().name, "json_path");
    }

    #[test]
    fn test_string_list_rejects_mixed_lists() {
        let value = TagValue::List(vec![TagValue::Str("a".into()), TagValue::Int(1)]);
        assert_eq!(value.as_string_list(), None);
        assert_eq!(
            TagValue::Str("solo".into()).as_string_list(),
            Some(vec!["solo".to_string()])
        );
    }

    #[test]
    fn test_name_value_attribute() {
        let t = tag(parse_quote!(#[route = "/clients"]));
        assert_eq!(t.name_or_positional(&["path"]), Some("/clients"));
    }

    #[test]
    fn test_malformed_arguments_are_errors() {
        let attr: Attribute = parse_quote!(#[case(display_name = )]);
        assert!(Tag::from_attribute(&attr).is_err());
        let attr: Attribute = parse_quote!(#[case(timeout = -"x")]);
        assert!(Tag::from_attribute(&attr).is_err());
    }

    #[test]
    fn test_display_of_values() {
        let value = TagValue::List(vec![TagValue::Str("a".into()), TagValue::Int(2)]);
        assert_eq!(value.to_string(), r#"["a", 2]"#);
        assert_eq!(value.shape(), "list");
    }
}
