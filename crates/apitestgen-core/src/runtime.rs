//! Helpers called by the generated tests at run time.
//!
//! Generated files load their test data through a [`DataProviderRegistry`]
//! owned by the test crate (the `data_registry` config entry names the
//! function returning it), and read values out of the resulting [`DataSet`]
//! with [`safe_string`] and [`from_data`].
//!
//! # Examples
//!
//! ```
//! use apitestgen_core::runtime::{safe_string, DataProviderRegistry, DataSet};
//! use serde_json::json;
//!
//! let mut registry = DataProviderRegistry::new();
//! registry.register("client_data", || {
//!     DataSet::from([("id".to_string(), json!(42))])
//! });
//!
//! let data = registry.get_data("client_data");
//! assert_eq!(safe_string(data.get("id")), "42");
//! assert!(registry.get_data("missing").is_empty());
//! ```

// Internal imports (std, crate)
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};

// External imports (alphabetized)
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Test data of one case, keyed by parameter name
pub type DataSet = HashMap<String, Value>;

/// A source of test data
pub trait DataLoad: Send + Sync {
    fn load(&self) -> DataSet;
}

impl<F> DataLoad for F
where
    F: Fn() -> DataSet + Send + Sync,
{
    fn load(&self) -> DataSet {
        self()
    }
}

/// A fixed data set, e.g. read once from a fixture file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticData(pub DataSet);

impl StaticData {
    /// Build from a JSON object; any other value yields an empty set
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map.into_iter().collect()),
            other => {
                log::warn!("Test data must be a JSON object, found {other}");
                Self::default()
            }
        }
    }

    /// Read a JSON fixture file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_value(serde_json::from_str(&content)?))
    }
}

impl DataLoad for StaticData {
    fn load(&self) -> DataSet {
        self.0.clone()
    }
}

/// Maps data-provider identifiers to their loaders
#[derive(Clone, Default)]
pub struct DataProviderRegistry {
    providers: HashMap<String, Arc<dyn DataLoad>>,
}

impl fmt::Debug for DataProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.providers.keys().collect();
        names.sort();
        f.debug_struct("DataProviderRegistry")
            .field("providers", &names)
            .finish()
    }
}

impl DataProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous one with the same id
    pub fn register(&mut self, id: impl Into<String>, provider: impl DataLoad + 'static) -> &mut Self {
        self.providers.insert(id.into(), Arc::new(provider));
        self
    }

    pub fn with_provider(mut self, id: impl Into<String>, provider: impl DataLoad + 'static) -> Self {
        self.register(id, provider);
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    /// Load the data set for `id`.
    ///
    /// An empty id means the case declared no provider. An unknown id is
    /// logged; both yield an empty data set.
    pub fn get_data(&self, id: &str) -> DataSet {
        if id.is_empty() {
            return DataSet::new();
        }
        match self.providers.get(id) {
            Some(provider) => provider.load(),
            None => {
                log::warn!("No data provider registered as `{id}`; using an empty data set");
                DataSet::new()
            }
        }
    }
}

/// Text form of a data value: empty for a missing value or null, the raw
/// contents for a string, JSON otherwise
pub fn safe_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Serialize a request body to JSON text
pub fn format_body<T: Serialize + ?Sized>(body: &T) -> String {
    serde_json::to_string(body).unwrap_or_else(|e| {
        log::warn!("Failed to serialize request body: {e}");
        String::from("null")
    })
}

/// Deserialize the entry `key` of a data set into `T`
pub fn from_data<T: DeserializeOwned>(data: &DataSet, key: &str) -> Result<T> {
    let value = data
        .get(key)
        .cloned()
        .ok_or_else(|| Error::config(format!("Test data has no entry `{key}`")))?;
    Ok(serde_json::from_value(value)?)
}

/// One part of a multipart request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartValue {
    /// Sent as `multipart/form-data` content
    Binary(Vec<u8>),
    /// Sent as `text/plain`
    Text(String),
}

/// Split a data set into multipart parts, ordered by key.
///
/// Arrays of byte values become binary parts; everything else is sent as
/// text through [`safe_string`].
pub fn multipart_parts(data: &DataSet) -> Vec<(String, MultipartValue)> {
    let mut keys: Vec<&String> = data.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|key| {
            let value = &data[key];
            let part = match as_bytes(value) {
                Some(bytes) => MultipartValue::Binary(bytes),
                None => MultipartValue::Text(safe_string(Some(value))),
            };
            (key.clone(), part)
        })
        .collect()
}

fn as_bytes(value: &Value) -> Option<Vec<u8>> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}
