//! A record built at runtime from named values.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{FieldValue, PrimaryKey, Record, RecordRef, RecordType};

/// A record whose attributes and items are held in maps.
///
/// Useful for ad-hoc payloads, for adapting rows that already arrive as
/// key/value data, and in tests. The `pk` attribute always resolves to the
/// primary key unless an attribute of that name is set explicitly.
#[derive(Clone)]
pub struct DynamicRecord {
    record_type: RecordType,
    key: PrimaryKey,
    attributes: BTreeMap<String, FieldValue>,
    items: BTreeMap<String, FieldValue>,
}

impl DynamicRecord {
    /// Creates an empty record.
    pub fn new(record_type: impl Into<RecordType>, key: impl Into<PrimaryKey>) -> Self {
        Self {
            record_type: record_type.into(),
            key: key.into(),
            attributes: BTreeMap::new(),
            items: BTreeMap::new(),
        }
    }

    /// Sets an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Sets an item (mapping-style lookup).
    pub fn with_item(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.items.insert(key.into(), value.into());
        self
    }

    /// Sets an attribute in place.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Wraps the record in a shared handle.
    pub fn into_ref(self) -> RecordRef {
        Arc::new(self)
    }
}

impl Record for DynamicRecord {
    fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    fn primary_key(&self) -> PrimaryKey {
        self.key.clone()
    }

    fn attribute(&self, name: &str) -> Option<FieldValue> {
        match self.attributes.get(name) {
            Some(value) => Some(value.clone()),
            None if name == "pk" => Some(FieldValue::Scalar(self.key.to_json())),
            None => None,
        }
    }

    fn item(&self, key: &str) -> Option<FieldValue> {
        self.items.get(key).cloned()
    }
}

impl fmt::Debug for DynamicRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}: {}>", self.record_type, self.key)
    }
}
