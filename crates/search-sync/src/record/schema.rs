//! Record schemas: the attribute graph of each record type.
//!
//! Documents are validated against these schemas when they are built, so a
//! field path that cannot resolve fails at startup instead of on the first
//! indexed record.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::RecordType;

/// Kind of a record attribute.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Auto,
    BigAuto,
    BigInteger,
    Boolean,
    NullBoolean,
    Char,
    Date,
    DateTime,
    Decimal,
    Email,
    File,
    FilePath,
    Float,
    Image,
    Integer,
    PositiveInteger,
    PositiveSmallInteger,
    Slug,
    SmallInteger,
    Text,
    Time,
    Url,
    Uuid,
    /// Schema-less JSON document; nested segments are not validated.
    Json,
    /// Zero-argument method; nested segments are not validated.
    Method,
    /// Foreign key to another record type.
    ForeignKey(RecordType),
    /// One-to-one relation to another record type.
    OneToOne(RecordType),
    /// Many-to-many relation to another record type.
    ManyToMany(RecordType),
    /// Reverse side of a foreign key (`manufacturer.car_set`).
    Reverse(RecordType),
}

impl AttributeKind {
    /// Returns the target type if this attribute is a relation.
    pub fn related_type(&self) -> Option<&RecordType> {
        match self {
            AttributeKind::ForeignKey(t)
            | AttributeKind::OneToOne(t)
            | AttributeKind::ManyToMany(t)
            | AttributeKind::Reverse(t) => Some(t),
            _ => None,
        }
    }
}

/// Attributes of one record type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSchema {
    record_type: RecordType,
    attributes: BTreeMap<String, AttributeKind>,
}

impl RecordSchema {
    /// Creates a schema with only the implicit `pk` attribute.
    pub fn new(record_type: impl Into<RecordType>) -> Self {
        Self {
            record_type: record_type.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.insert(name.into(), kind);
        self
    }

    /// Returns the record type.
    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    /// Looks up an attribute. `pk` always resolves.
    pub fn attribute(&self, name: &str) -> Option<&AttributeKind> {
        match self.attributes.get(name) {
            Some(kind) => Some(kind),
            None if name == "pk" => Some(&AttributeKind::Auto),
            None => None,
        }
    }

    /// Iterates over the declared attributes.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeKind)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Outcome of resolving a dotted path against the schema graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathResolution {
    /// The path ends on a relation to a record type with a known schema.
    Related(RecordType),
    /// The path ends on a value whose structure is not described by a schema.
    Opaque,
}

/// Directory of record schemas, keyed by record type.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: HashMap<RecordType, RecordSchema>,
}

impl SchemaCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a schema, replacing any previous schema for the same type.
    pub fn with_schema(mut self, schema: RecordSchema) -> Self {
        self.register(schema);
        self
    }

    /// Adds a schema, replacing any previous schema for the same type.
    pub fn register(&mut self, schema: RecordSchema) {
        self.schemas.insert(schema.record_type.clone(), schema);
    }

    /// Returns the schema for a record type.
    pub fn get(&self, record_type: &RecordType) -> Option<&RecordSchema> {
        self.schemas.get(record_type)
    }

    /// Resolves `path` starting at `record_type`.
    ///
    /// Validation follows relations into their target schemas and stops at the
    /// first attribute whose inner structure is unknown (scalars, JSON, methods,
    /// or relations to types without a schema). On failure, returns the
    /// offending segment and the record type it was looked up on.
    pub fn resolve_path(
        &self,
        record_type: &RecordType,
        path: &[String],
    ) -> Result<PathResolution, (String, RecordType)> {
        let mut current = self.get(record_type);

        for segment in path {
            let Some(schema) = current else {
                return Ok(PathResolution::Opaque);
            };

            let kind = schema
                .attribute(segment)
                .ok_or_else(|| (segment.clone(), schema.record_type.clone()))?;

            current = kind.related_type().and_then(|t| self.get(t));
        }

        Ok(match current {
            Some(schema) => PathResolution::Related(schema.record_type.clone()),
            None => PathResolution::Opaque,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new()
            .with_schema(
                RecordSchema::new("Car")
                    .with_attribute("name", AttributeKind::Char)
                    .with_attribute("manufacturer", AttributeKind::ForeignKey("Manufacturer".into()))
                    .with_attribute("extra", AttributeKind::Json),
            )
            .with_schema(
                RecordSchema::new("Manufacturer")
                    .with_attribute("name", AttributeKind::Char)
                    .with_attribute("country_code", AttributeKind::Char),
            )
    }

    fn path(s: &str) -> Vec<String> {
        s.split('.').map(String::from).collect()
    }

    #[test]
    fn test_resolve_through_relation() {
        let catalog = catalog();
        let car = RecordType::new("Car");

        assert_eq!(
            catalog.resolve_path(&car, &path("manufacturer.country_code")),
            Ok(PathResolution::Opaque)
        );
        assert_eq!(
            catalog.resolve_path(&car, &path("manufacturer")),
            Ok(PathResolution::Related(RecordType::new("Manufacturer")))
        );
        assert_eq!(
            catalog.resolve_path(&car, &path("extra.anything.goes")),
            Ok(PathResolution::Opaque)
        );
    }

    #[test]
    fn test_resolve_failure_names_segment() {
        let catalog = catalog();
        let err = catalog
            .resolve_path(&RecordType::new("Car"), &path("manufacturer.founded"))
            .unwrap_err();
        assert_eq!(err, ("founded".to_string(), RecordType::new("Manufacturer")));
    }

    #[test]
    fn test_pk_always_resolves() {
        let catalog = catalog();
        assert!(catalog.resolve_path(&RecordType::new("Car"), &path("pk")).is_ok());
    }
}
