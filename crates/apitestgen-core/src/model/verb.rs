//! HTTP verbs understood by the routing tags

// Internal imports (std, crate)
use std::fmt;
use std::str::FromStr;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};

/// HTTP method of a tested endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
}

impl HttpVerb {
    /// Lowercase name, which is both the routing tag name and the name of the
    /// fluent client call that issues the request.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "get",
            HttpVerb::Post => "post",
            HttpVerb::Put => "put",
            HttpVerb::Delete => "delete",
            HttpVerb::Patch => "patch",
            HttpVerb::Head => "head",
        }
    }

    pub fn all() -> &'static [HttpVerb] {
        &[
            HttpVerb::Get,
            HttpVerb::Post,
            HttpVerb::Put,
            HttpVerb::Delete,
            HttpVerb::Patch,
            HttpVerb::Head,
        ]
    }

    /// Map a routing tag name (`get`, `post`, ...) to its verb
    pub fn from_tag(name: &str) -> Option<HttpVerb> {
        HttpVerb::all().iter().copied().find(|v| v.as_str() == name)
    }

    /// POST, PUT and PATCH carry a request body
    pub fn requires_body(&self) -> bool {
        matches!(self, HttpVerb::Post | HttpVerb::Put | HttpVerb::Patch)
    }

    /// Only POST and PUT are sent as multipart uploads
    pub fn allows_multipart(&self) -> bool {
        matches!(self, HttpVerb::Post | HttpVerb::Put)
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for HttpVerb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpVerb::from_tag(&s.to_ascii_lowercase()).ok_or_else(|| format!("Unknown HTTP verb: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!("GET".parse::<HttpVerb>().unwrap(), HttpVerb::Get);
        assert_eq!("patch".parse::<HttpVerb>().unwrap(), HttpVerb::Patch);
        assert!("TRACE".parse::<HttpVerb>().is_err());
    }

    #[test]
    fn test_from_tag_only_accepts_lowercase_tags() {
        assert_eq!(HttpVerb::from_tag("delete"), Some(HttpVerb::Delete));
        assert_eq!(HttpVerb::from_tag("route"), None);
    }

    #[test]
    fn test_body_and_multipart_rules() {
        let with_body: Vec<_> = HttpVerb::all()
            .iter()
            .filter(|v| v.requires_body())
            .collect();
        assert_eq!(with_body, vec![&HttpVerb::Post, &HttpVerb::Put, &HttpVerb::Patch]);

        assert!(HttpVerb::Post.allows_multipart());
        assert!(HttpVerb::Put.allows_multipart());
        assert!(!HttpVerb::Patch.allows_multipart());
        assert!(!HttpVerb::Get.allows_multipart());
    }

    #[test]
    fn test_display() {
        assert_eq!(HttpVerb::Head.to_string(), "HEAD");
    }
}
