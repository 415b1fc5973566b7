//! Search-engine indices.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named search-engine index and its settings.
///
/// Indices are identified by name: two values with the same name are equal
/// regardless of their settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    name: String,
    #[serde(default)]
    settings: Map<String, Value>,
}

impl Index {
    /// Creates an index with no explicit settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: Map::new(),
        }
    }

    /// Sets an index setting (`number_of_shards`, ...).
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Returns the index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the explicit settings.
    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    /// Returns a copy with `defaults` merged under the explicit settings.
    pub fn with_defaults(&self, defaults: &Map<String, Value>) -> Index {
        let mut settings = defaults.clone();
        for (key, value) in &self.settings {
            settings.insert(key.clone(), value.clone());
        }
        Index {
            name: self.name.clone(),
            settings,
        }
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Index {}

impl Hash for Index {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Index {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Index {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}
