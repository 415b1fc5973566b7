//! Records: the relational side of the synchronization.
//!
//! A record is one row of a relational entity. This crate never writes records;
//! it only reads their attributes to build search documents. Record types are
//! opaque identity handles used as registry keys.
//!
//! # Lookups
//!
//! Each record exposes two lookup channels:
//!
//! - [`Record::item`] for mapping-like records (`record["key"]`)
//! - [`Record::attribute`] for plain attributes and relations
//!
//! Field extraction tries them in that order, followed by integer indexing for
//! sequences. See [`crate::fields`].

mod dynamic;
mod schema;
mod source;
mod value;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use dynamic::DynamicRecord;
pub use schema::{AttributeKind, PathResolution, RecordSchema, SchemaCatalog};
pub use source::{Filter, RecordQuery, RecordSource};
pub use value::{FieldValue, RelatedManager, ValueShape};

/// Identity handle of a relational entity class (a table or model).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordType(String);

impl RecordType {
    /// Creates a record type handle.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the record type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for RecordType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Primary key of a record; becomes the search document id.
///
/// Keys order integers before strings, and each variant by its natural order.
/// Pagination cursors rely on this order being total and stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    /// Integer key (auto-increment columns).
    Int(i64),
    /// String key (UUIDs, slugs, natural keys).
    Str(String),
}

impl PrimaryKey {
    /// Returns the key as a JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            PrimaryKey::Int(i) => Value::from(*i),
            PrimaryKey::Str(s) => Value::String(s.clone()),
        }
    }

    /// Parses a key from a JSON scalar.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(PrimaryKey::Int),
            Value::String(s) => Some(PrimaryKey::Str(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Int(i) => write!(f, "{}", i),
            PrimaryKey::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(key: i64) -> Self {
        PrimaryKey::Int(key)
    }
}

impl From<i32> for PrimaryKey {
    fn from(key: i32) -> Self {
        PrimaryKey::Int(key as i64)
    }
}

impl From<&str> for PrimaryKey {
    fn from(key: &str) -> Self {
        PrimaryKey::Str(key.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(key: String) -> Self {
        PrimaryKey::Str(key)
    }
}

/// Fully qualified identity of one record: its type plus its primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    /// The record type.
    pub record_type: RecordType,
    /// The primary key.
    pub key: PrimaryKey,
}

impl RecordKey {
    /// Creates a record key.
    pub fn new(record_type: impl Into<RecordType>, key: impl Into<PrimaryKey>) -> Self {
        Self {
            record_type: record_type.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.record_type, self.key)
    }
}

/// One row of a relational entity, as seen by the synchronization core.
///
/// Implementations must be cheap to query: attribute lookups run once per
/// field per document preparation, possibly inside parallel bulk workers.
pub trait Record: Send + Sync + fmt::Debug {
    /// The record type this record belongs to.
    fn record_type(&self) -> &RecordType;

    /// The primary key; used as the search document id.
    fn primary_key(&self) -> PrimaryKey;

    /// Attribute lookup (`record.name`).
    ///
    /// Returns `None` when the record has no such attribute. A relation that
    /// does not exist (a missing reverse one-to-one, an unset foreign key)
    /// should be reported as `Some(FieldValue::Null)`.
    fn attribute(&self, name: &str) -> Option<FieldValue>;

    /// Item lookup (`record["name"]`) for mapping-like records.
    fn item(&self, _key: &str) -> Option<FieldValue> {
        None
    }

    /// Returns the fully qualified key of this record.
    fn record_key(&self) -> RecordKey {
        RecordKey {
            record_type: self.record_type().clone(),
            key: self.primary_key(),
        }
    }
}

/// Shared handle to a record.
pub type RecordRef = Arc<dyn Record>;
