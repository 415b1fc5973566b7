//! Field descriptors and value preparation.
//!
//! A [`Field`] declares the search-engine type of one document field and how
//! its value is obtained from a record: a dotted attribute path (defaulting to
//! the field name), a required flag, and for object fields an inner schema.
//!
//! # Extraction
//!
//! Values are resolved by walking the path with [`resolve`]. Each segment tries
//! item lookup, then attribute lookup, then integer indexing. Relations are
//! materialized and callables invoked after each step.
//!
//! # Composite values
//!
//! Object and nested fields build one inner object per related record, or a
//! list of them for to-many relations. See [`Field::object`].

mod extract;
mod infer;
mod object;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncResult;
use crate::record::{FieldValue, RecordKey, RecordRef};

pub use extract::resolve;
pub use infer::{field_for_attribute, infer_field};

/// Override used to prepare one property of an object field from the inner value.
pub type InnerPreparer = Arc<dyn Fn(&FieldValue) -> SyncResult<Value> + Send + Sync>;

/// Search-engine field type.
// Variants are named after their mapping type.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Keyword,
    Integer,
    Long,
    Short,
    Byte,
    Double,
    Float,
    ScaledFloat,
    Boolean,
    Date,
    Ip,
    GeoPoint,
    GeoShape,
    Completion,
    SearchAsYouType,
    /// A stored file, indexed as text holding its URL or name.
    File,
    Object,
    Nested,
}

impl FieldKind {
    /// Returns the mapping type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::File => "text",
            FieldKind::Keyword => "keyword",
            FieldKind::Integer => "integer",
            FieldKind::Long => "long",
            FieldKind::Short => "short",
            FieldKind::Byte => "byte",
            FieldKind::Double => "double",
            FieldKind::Float => "float",
            FieldKind::ScaledFloat => "scaled_float",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::Ip => "ip",
            FieldKind::GeoPoint => "geo_point",
            FieldKind::GeoShape => "geo_shape",
            FieldKind::Completion => "completion",
            FieldKind::SearchAsYouType => "search_as_you_type",
            FieldKind::Object => "object",
            FieldKind::Nested => "nested",
        }
    }

    /// Returns true for object and nested fields.
    pub fn is_composite(&self) -> bool {
        matches!(self, FieldKind::Object | FieldKind::Nested)
    }
}

/// A declared document field.
#[derive(Clone)]
pub struct Field {
    kind: FieldKind,
    path: Option<Vec<String>>,
    required: bool,
    multi: bool,
    options: Map<String, Value>,
    properties: Vec<(String, Field)>,
    inner_preparers: HashMap<String, InnerPreparer>,
}

impl Field {
    /// Creates a field of the given kind.
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            path: None,
            required: false,
            multi: false,
            options: Map::new(),
            properties: Vec::new(),
            inner_preparers: HashMap::new(),
        }
    }

    /// A full-text field.
    pub fn text() -> Self {
        Self::new(FieldKind::Text)
    }

    /// An exact-value field.
    pub fn keyword() -> Self {
        Self::new(FieldKind::Keyword)
    }

    /// A 32-bit integer field.
    pub fn integer() -> Self {
        Self::new(FieldKind::Integer)
    }

    /// A 64-bit integer field.
    pub fn long() -> Self {
        Self::new(FieldKind::Long)
    }

    /// A 16-bit integer field.
    pub fn short() -> Self {
        Self::new(FieldKind::Short)
    }

    /// An 8-bit integer field.
    pub fn byte() -> Self {
        Self::new(FieldKind::Byte)
    }

    /// A double-precision float field.
    pub fn double() -> Self {
        Self::new(FieldKind::Double)
    }

    /// A single-precision float field.
    pub fn float() -> Self {
        Self::new(FieldKind::Float)
    }

    /// A scaled float with the given scaling factor.
    pub fn scaled_float(scaling_factor: f64) -> Self {
        Self::new(FieldKind::ScaledFloat).option("scaling_factor", scaling_factor)
    }

    /// A boolean field.
    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    /// A date field.
    pub fn date() -> Self {
        Self::new(FieldKind::Date)
    }

    /// An IPv4/IPv6 address field.
    pub fn ip() -> Self {
        Self::new(FieldKind::Ip)
    }

    /// A latitude/longitude point field.
    pub fn geo_point() -> Self {
        Self::new(FieldKind::GeoPoint)
    }

    /// A geo shape field.
    pub fn geo_shape() -> Self {
        Self::new(FieldKind::GeoShape)
    }

    /// A completion-suggester field.
    pub fn completion() -> Self {
        Self::new(FieldKind::Completion)
    }

    /// A search-as-you-type field.
    pub fn search_as_you_type() -> Self {
        Self::new(FieldKind::SearchAsYouType)
    }

    /// A file field; empty files are indexed as `""`.
    pub fn file() -> Self {
        Self::new(FieldKind::File)
    }

    /// An object field with an inner schema.
    ///
    /// Inner fields resolve their paths against the related value, defaulting
    /// to their own property name.
    pub fn object<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = (S, Field)>,
        S: Into<String>,
    {
        Self::composite(FieldKind::Object, properties)
    }

    /// A nested field with an inner schema. See [`Field::object`].
    pub fn nested<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = (S, Field)>,
        S: Into<String>,
    {
        Self::composite(FieldKind::Nested, properties)
    }

    fn composite<I, S>(kind: FieldKind, properties: I) -> Self
    where
        I: IntoIterator<Item = (S, Field)>,
        S: Into<String>,
    {
        let mut field = Self::new(kind);
        field.properties = properties
            .into_iter()
            .map(|(name, f)| (name.into(), f))
            .collect();
        field
    }

    /// Sets the dotted attribute path (`manufacturer.country_code`).
    pub fn attr(mut self, path: &str) -> Self {
        self.path = Some(path.split('.').map(String::from).collect());
        self
    }

    /// Makes unresolvable paths an error instead of an empty value.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Turns the field into a list field.
    pub fn list(mut self) -> Self {
        self.multi = true;
        self
    }

    /// Adds an extra mapping option (`analyzer`, `format`, ...).
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Adds a property to an object field's inner schema.
    pub fn with_property(mut self, name: impl Into<String>, field: Field) -> Self {
        self.properties.push((name.into(), field));
        self
    }

    /// Overrides how one inner property is prepared from the inner value.
    pub fn with_inner_preparer<F>(mut self, name: impl Into<String>, preparer: F) -> Self
    where
        F: Fn(&FieldValue) -> SyncResult<Value> + Send + Sync + 'static,
    {
        self.inner_preparers.insert(name.into(), Arc::new(preparer));
        self
    }

    /// The field kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// The explicit path, if one was set.
    pub fn path(&self) -> Option<&[String]> {
        self.path.as_deref()
    }

    /// Whether unresolvable paths are an error.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether this is a list field.
    pub fn is_list(&self) -> bool {
        self.multi
    }

    /// The inner schema of an object field.
    pub fn properties(&self) -> &[(String, Field)] {
        &self.properties
    }

    /// Returns the path, falling back to `name`.
    pub fn resolved_path(&self, name: &str) -> Vec<String> {
        self.path
            .clone()
            .unwrap_or_else(|| vec![name.to_string()])
    }

    pub(crate) fn inner_preparer(&self, name: &str) -> Option<&InnerPreparer> {
        self.inner_preparers.get(name)
    }

    /// Extracts this field's value from a record.
    pub fn extract(
        &self,
        record: &RecordRef,
        name: &str,
        ignore: Option<&RecordKey>,
    ) -> SyncResult<Value> {
        self.extract_from(&FieldValue::Record(record.clone()), name, ignore)
    }

    /// Extracts this field's value from any instance value.
    pub fn extract_from(
        &self,
        instance: &FieldValue,
        name: &str,
        ignore: Option<&RecordKey>,
    ) -> SyncResult<Value> {
        let raw = resolve(instance, &self.resolved_path(name), self.required, ignore)?;
        self.value_from(raw, ignore)
    }

    /// Converts an already resolved value to its indexed form.
    pub fn value_from(&self, raw: FieldValue, ignore: Option<&RecordKey>) -> SyncResult<Value> {
        let value = match self.kind {
            FieldKind::Object | FieldKind::Nested => object::prepare(self, raw, ignore)?,
            FieldKind::File => match raw.to_json() {
                Value::Null => Value::String(String::new()),
                other => other,
            },
            _ => raw.to_json(),
        };

        if !self.multi {
            return Ok(value);
        }

        Ok(match value {
            Value::Array(items) => Value::Array(items),
            v if is_falsy(&v) => Value::Array(Vec::new()),
            v => Value::Array(vec![v]),
        })
    }

    /// Renders the search-engine mapping of this field.
    pub fn mapping(&self) -> Value {
        let mut mapping = Map::new();
        mapping.insert("type".to_string(), Value::from(self.kind.type_name()));
        for (key, value) in &self.options {
            mapping.insert(key.clone(), value.clone());
        }
        if self.kind.is_composite() {
            let properties: Map<String, Value> = self
                .properties
                .iter()
                .map(|(name, field)| (name.clone(), field.mapping()))
                .collect();
            mapping.insert("properties".to_string(), Value::Object(properties));
        }
        Value::Object(mapping)
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(m) => m.is_empty(),
        _ => false,
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("required", &self.required)
            .field("multi", &self.multi)
            .field("options", &self.options)
            .field("properties", &self.properties)
            .field("inner_preparers", &self.inner_preparers.keys().collect::<Vec<_>>())
            .finish()
    }
}
