//! Attribute values as seen during field extraction.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use super::{RecordKey, RecordRef};

/// A lazy to-many relation (a reverse foreign key or many-to-many manager).
///
/// Extraction materializes it into the full collection of related records.
pub trait RelatedManager: Send + Sync {
    /// Returns every related record.
    fn all(&self) -> Vec<RecordRef>;
}

impl<F> RelatedManager for F
where
    F: Fn() -> Vec<RecordRef> + Send + Sync,
{
    fn all(&self) -> Vec<RecordRef> {
        self()
    }
}

/// Value of a record attribute, item or element.
#[derive(Clone, Default)]
pub enum FieldValue {
    /// No value.
    #[default]
    Null,
    /// A JSON value (strings, numbers, booleans, or opaque JSON documents).
    Scalar(Value),
    /// A mapping supporting item lookup.
    Mapping(BTreeMap<String, FieldValue>),
    /// A sequence supporting integer indexing.
    Sequence(Vec<FieldValue>),
    /// A related record (foreign key, one-to-one).
    Record(RecordRef),
    /// A lazy to-many relation.
    Relation(Arc<dyn RelatedManager>),
    /// A zero-argument method whose result is the value.
    Callable(Arc<dyn Fn() -> FieldValue + Send + Sync>),
    /// Deferred text (translations and similar), forced to a string at the end.
    Lazy(Arc<dyn Fn() -> String + Send + Sync>),
}

/// Closed classification of a value, in lookup priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// Null or JSON null.
    Empty,
    /// Supports item lookup by key.
    Mapping,
    /// Supports iteration and integer indexing.
    Sequence,
    /// A record.
    Record,
    /// Anything else.
    Scalar,
}

impl FieldValue {
    /// Wraps a zero-argument method.
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn() -> FieldValue + Send + Sync + 'static,
    {
        FieldValue::Callable(Arc::new(f))
    }

    /// Wraps deferred text.
    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        FieldValue::Lazy(Arc::new(f))
    }

    /// Wraps a to-many relation.
    pub fn relation<M>(manager: M) -> Self
    where
        M: RelatedManager + 'static,
    {
        FieldValue::Relation(Arc::new(manager))
    }

    /// Builds a mapping from key/value pairs.
    pub fn mapping<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        FieldValue::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns true for `Null` and JSON null.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null | FieldValue::Scalar(Value::Null))
    }

    /// Returns true if this value is the record identified by `key`.
    pub fn is_record(&self, key: &RecordKey) -> bool {
        match self {
            FieldValue::Record(record) => &record.record_key() == key,
            _ => false,
        }
    }

    /// Classifies the value.
    pub fn shape(&self) -> ValueShape {
        match self {
            FieldValue::Null | FieldValue::Scalar(Value::Null) => ValueShape::Empty,
            FieldValue::Mapping(_) | FieldValue::Scalar(Value::Object(_)) => ValueShape::Mapping,
            FieldValue::Sequence(_) | FieldValue::Relation(_) | FieldValue::Scalar(Value::Array(_)) => {
                ValueShape::Sequence
            }
            FieldValue::Record(_) => ValueShape::Record,
            FieldValue::Scalar(_) | FieldValue::Callable(_) | FieldValue::Lazy(_) => {
                ValueShape::Scalar
            }
        }
    }

    /// Resolves relation managers and callables one level.
    pub fn materialize(self) -> FieldValue {
        match self {
            FieldValue::Relation(manager) => {
                FieldValue::Sequence(manager.all().into_iter().map(FieldValue::Record).collect())
            }
            FieldValue::Callable(f) => match f() {
                FieldValue::Relation(manager) => FieldValue::Sequence(
                    manager.all().into_iter().map(FieldValue::Record).collect(),
                ),
                other => other,
            },
            other => other,
        }
    }

    /// Forces deferred text to its string form.
    pub fn force_lazy(self) -> FieldValue {
        match self {
            FieldValue::Lazy(f) => FieldValue::Scalar(Value::String(f())),
            other => other,
        }
    }

    /// Returns the elements of a sequence-shaped value.
    pub fn into_items(self) -> Vec<FieldValue> {
        match self {
            FieldValue::Sequence(items) => items,
            FieldValue::Scalar(Value::Array(items)) => {
                items.into_iter().map(FieldValue::Scalar).collect()
            }
            FieldValue::Relation(manager) => {
                manager.all().into_iter().map(FieldValue::Record).collect()
            }
            FieldValue::Null | FieldValue::Scalar(Value::Null) => Vec::new(),
            other => vec![other],
        }
    }

    /// Serializes the value to JSON.
    ///
    /// Records serialize as their primary key.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Scalar(v) => v.clone(),
            FieldValue::Mapping(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
            FieldValue::Sequence(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            FieldValue::Record(record) => record.primary_key().to_json(),
            FieldValue::Relation(manager) => Value::Array(
                manager
                    .all()
                    .iter()
                    .map(|r| r.primary_key().to_json())
                    .collect(),
            ),
            FieldValue::Callable(f) => f().to_json(),
            FieldValue::Lazy(f) => Value::String(f()),
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("Null"),
            FieldValue::Scalar(v) => write!(f, "{}", v),
            FieldValue::Mapping(map) => f.debug_map().entries(map.iter()).finish(),
            FieldValue::Sequence(items) => f.debug_list().entries(items.iter()).finish(),
            FieldValue::Record(record) => write!(f, "{}", record.record_key()),
            FieldValue::Relation(_) => f.write_str("<relation>"),
            FieldValue::Callable(_) => f.write_str("<callable>"),
            FieldValue::Lazy(_) => f.write_str("<lazy>"),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Scalar(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Scalar(Value::String(value.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Scalar(Value::String(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Scalar(Value::from(value))
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Scalar(Value::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Scalar(Value::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Scalar(Value::Bool(value))
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Scalar(Value::String(value.format("%Y-%m-%d").to_string()))
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::Scalar(Value::String(
            value.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        ))
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Scalar(Value::String(value.to_rfc3339()))
    }
}

impl From<RecordRef> for FieldValue {
    fn from(value: RecordRef) -> Self {
        FieldValue::Record(value)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(value: Vec<FieldValue>) -> Self {
        FieldValue::Sequence(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}
