//! Classification of a method's parameters by the role they play in a request

// Internal imports (std, crate)
use super::HttpVerb;

// External imports (alphabetized)
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Name → type-name map that keeps declaration order.
///
/// Inserting an existing name replaces its type in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMap {
    entries: Vec<(String, String)>,
}

impl RoleMap {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, type_name: impl Into<String>) {
        let name = name.into();
        let type_name = type_name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = type_name,
            None => self.entries.push((name, type_name)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, t)| t.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for RoleMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, type_name) in &self.entries {
            map.serialize_entry(name, type_name)?;
        }
        map.end()
    }
}

/// Matrix parameters grouped by the path variable they decorate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixParams {
    groups: Vec<(String, RoleMap)>,
}

impl MatrixParams {
    pub fn insert(&mut self, path_var: &str, key: impl Into<String>, type_name: impl Into<String>) {
        match self.groups.iter_mut().find(|(v, _)| v == path_var) {
            Some((_, keys)) => keys.insert(key, type_name),
            None => {
                let mut keys = RoleMap::new();
                keys.insert(key, type_name);
                self.groups.push((path_var.to_string(), keys));
            }
        }
    }

    pub fn get(&self, path_var: &str) -> Option<&RoleMap> {
        self.groups
            .iter()
            .find(|(v, _)| v == path_var)
            .map(|(_, keys)| keys)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RoleMap)> {
        self.groups.iter().map(|(v, keys)| (v.as_str(), keys))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Serialize for MatrixParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (path_var, keys) in &self.groups {
            map.serialize_entry(path_var, keys)?;
        }
        map.end()
    }
}

/// Parameters of one endpoint method, bucketed by transport role.
///
/// Computed once per method and shared by every case of that method.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ParameterMetadata {
    pub http_verb: Option<HttpVerb>,
    pub path: RoleMap,
    pub query: RoleMap,
    pub header: RoleMap,
    pub cookie: RoleMap,
    pub body: RoleMap,
    pub form: RoleMap,
    pub file: RoleMap,
    pub matrix: MatrixParams,
    pub multipart: bool,
}

/// Type names that mark a body parameter as an upload
const FILE_LIKE_TYPES: &[&str] = &[
    "MultipartFile",
    "File",
    "Resource",
    "Bytes",
    "Vec<u8>",
    "[u8]",
    // axum and actix-multipart extractors
    "Multipart",
    "MultipartForm",
    "TempFile",
];

impl ParameterMetadata {
    /// Classification with no parameters and no verb
    pub const EMPTY: ParameterMetadata = ParameterMetadata {
        http_verb: None,
        path: RoleMap::new(),
        query: RoleMap::new(),
        header: RoleMap::new(),
        cookie: RoleMap::new(),
        body: RoleMap::new(),
        form: RoleMap::new(),
        file: RoleMap::new(),
        matrix: MatrixParams { groups: Vec::new() },
        multipart: false,
    };

    pub fn new(http_verb: Option<HttpVerb>) -> Self {
        Self {
            http_verb,
            ..Self::default()
        }
    }

    /// Whether the request needs a body at all
    pub fn requires_body(&self) -> bool {
        self.http_verb.is_some_and(|v| v.requires_body())
    }

    /// Whether the request is sent as a multipart upload.
    ///
    /// Only POST and PUT qualify. The flag set by `request_part`/`file` tags,
    /// any file parameter, or a file-like body type each trigger it.
    pub fn requires_multipart(&self) -> bool {
        if !self.http_verb.is_some_and(|v| v.allows_multipart()) {
            return false;
        }
        self.multipart
            || !self.file.is_empty()
            || self.body.types().any(is_file_like_type)
    }
}

fn is_file_like_type(type_name: &str) -> bool {
    FILE_LIKE_TYPES.iter().any(|marker| {
        let bytes_like = marker.contains('<') || marker.contains('[');
        if bytes_like {
            type_name.contains(marker)
        } else {
            type_name
                .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                .any(|segment| segment == *marker)
        }
    })
}
