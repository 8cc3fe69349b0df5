//! String transformation utilities for code generation

/// Convert a string to snake_case
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    let mut prev_is_lowercase = false;

    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            // Underscore before an uppercase letter that follows a lowercase one
            if i > 0 && prev_is_lowercase {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
            prev_is_lowercase = false;
        } else if ch.is_alphanumeric() {
            result.push(ch);
            prev_is_lowercase = ch.is_lowercase() || ch.is_ascii_digit();
        } else if ch == '-' || ch == '_' || ch == ' ' || ch == '.' {
            if !result.is_empty() && !result.ends_with('_') {
                result.push('_');
            }
            prev_is_lowercase = false;
        }
    }

    result.trim_matches('_').to_string()
}

/// Render `s` as a Rust string literal, escapes included
pub fn rust_string_literal(s: &str) -> String {
    format!("{s:?}")
}

/// Collapse repeated segments of a `::`-separated module path, keeping the
/// first occurrence of each.
pub fn sanitize_module_path(raw: &str) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for segment in raw.split("::").map(str::trim).filter(|s| !s.is_empty()) {
        if !seen.contains(&segment) {
            seen.push(segment);
        }
    }
    seen.join("::")
}

/// Join two module paths, skipping empty sides
pub fn join_module_path(parent: &str, child: &str) -> String {
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (_, true) => parent.to_string(),
        _ => format!("{parent}::{child}"),
    }
}

/// Normalize the token text of a type so it reads like hand-written Rust.
///
/// `proc_macro2` prints tokens separated by spaces (`Vec < u8 >`); this
/// removes the spaces that rustfmt would never emit.
pub fn normalize_type_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let chars: Vec<char> = raw.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        if ch == ' ' {
            let prev = out.chars().last();
            let next = chars.get(i + 1).copied();
            let glue_prev = matches!(prev, Some('<' | '&' | ':' | '(' | '[' | '\''));
            let glue_next = matches!(next, Some('<' | '>' | ',' | ':' | ')' | ']' | ';'));
            if glue_prev || glue_next || prev.is_none() {
                continue;
            }
        }
        out.push(ch);
    }
    out.replace(",", ", ").replace(",  ", ", ").replace(";", "; ").replace(";  ", "; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("findClientById"), "find_client_by_id");
        assert_eq!(to_snake_case("ClientControllerGeneratedTest"), "client_controller_generated_test");
        assert_eq!(to_snake_case("expected-status-code"), "expected_status_code");
        assert_eq!(to_snake_case("display_name"), "display_name");
        assert_eq!(to_snake_case("EQUAL_TO"), "equal_to");
        assert_eq!(to_snake_case("NotNullValue"), "not_null_value");
        assert_eq!(to_snake_case("Api2Controller"), "api2_controller");
    }

    #[test]
    fn test_rust_string_literal_escapes() {
        assert_eq!(rust_string_literal("John Doe"), "\"John Doe\"");
        assert_eq!(rust_string_literal("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(rust_string_literal("a\\b"), "\"a\\\\b\"");
    }

    #[test]
    fn test_sanitize_module_path() {
        assert_eq!(
            sanitize_module_path("api::clients::clients::handlers"),
            "api::clients::handlers"
        );
        assert_eq!(sanitize_module_path(""), "");
        assert_eq!(sanitize_module_path("api"), "api");
    }

    #[test]
    fn test_join_module_path() {
        assert_eq!(join_module_path("", "api"), "api");
        assert_eq!(join_module_path("api", ""), "api");
        assert_eq!(join_module_path("api", "v1"), "api::v1");
    }

    #[test]
    fn test_normalize_type_text() {
        assert_eq!(normalize_type_text("Vec < u8 >"), "Vec<u8>");
        assert_eq!(normalize_type_text("Json < ClientDto >"), "Json<ClientDto>");
        assert_eq!(
            normalize_type_text("HashMap < String , i64 >"),
            "HashMap<String, i64>"
        );
        assert_eq!(normalize_type_text("& [u8]"), "&[u8]");
        assert_eq!(normalize_type_text("std :: string :: String"), "std::string::String");
        assert_eq!(normalize_type_text("Option < & 'static str >"), "Option<&'static str>");
    }
}
