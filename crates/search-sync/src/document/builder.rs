//! Declaration phase of a document.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::Value;

use crate::config::Refresh;
use crate::error::{DeclarationError, SyncResult};
use crate::fields::{Field, infer_field};
use crate::record::{PathResolution, RecordQuery, RecordRef, RecordType, SchemaCatalog};

use super::{
    Document, Index, PrepareStep, PreparedField, QuerysetHook, RecordPreparer, RelatedPreparer,
    RelatedResolver, ShouldIndex,
};

/// Collects the declaration of a document and compiles it.
///
/// # Example
///
/// ```rust
/// use helios_search_sync::document::{DocumentBuilder, Index};
/// use helios_search_sync::fields::Field;
/// use helios_search_sync::record::{AttributeKind, RecordSchema, SchemaCatalog};
///
/// let catalog = SchemaCatalog::new().with_schema(
///     RecordSchema::new("Car")
///         .with_attribute("name", AttributeKind::Char)
///         .with_attribute("launched", AttributeKind::Date),
/// );
///
/// let document = DocumentBuilder::new("CarDocument", Index::new("cars"), "Car")
///     .field("title", Field::text().attr("name"))
///     .model_fields(["launched"])
///     .build(&catalog)
///     .unwrap();
///
/// assert_eq!(document.fields().len(), 2);
/// ```
pub struct DocumentBuilder {
    name: String,
    index: Index,
    record_type: RecordType,
    fields: Vec<(String, Field)>,
    model_fields: Vec<String>,
    related: BTreeSet<RecordType>,
    ignore_signals: bool,
    auto_refresh: Option<Refresh>,
    pagination: Option<usize>,
    queryset: Option<QuerysetHook>,
    resolver: Option<Arc<dyn RelatedResolver>>,
    should_index: Option<ShouldIndex>,
    preparers: HashMap<String, RecordPreparer>,
    related_preparers: HashMap<String, RelatedPreparer>,
}

impl DocumentBuilder {
    /// Starts a document rooted at `record_type`, stored in `index`.
    pub fn new(name: impl Into<String>, index: Index, record_type: impl Into<RecordType>) -> Self {
        Self {
            name: name.into(),
            index,
            record_type: record_type.into(),
            fields: Vec::new(),
            model_fields: Vec::new(),
            related: BTreeSet::new(),
            ignore_signals: false,
            auto_refresh: None,
            pagination: None,
            queryset: None,
            resolver: None,
            should_index: None,
            preparers: HashMap::new(),
            related_preparers: HashMap::new(),
        }
    }

    /// Declares a field.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.push((name.into(), field));
        self
    }

    /// Declares fields inferred from record attributes of the same name.
    pub fn model_fields<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.model_fields
            .extend(attributes.into_iter().map(Into::into));
        self
    }

    /// Declares a related record type.
    ///
    /// Mutations of related records recompute this document through the
    /// resolver set with [`DocumentBuilder::related_resolver`].
    pub fn related(mut self, record_type: impl Into<RecordType>) -> Self {
        self.related.insert(record_type.into());
        self
    }

    /// Disables automatic propagation for this document.
    pub fn ignore_signals(mut self, ignore: bool) -> Self {
        self.ignore_signals = ignore;
        self
    }

    /// Sets the document's refresh policy.
    pub fn auto_refresh(mut self, refresh: Refresh) -> Self {
        self.auto_refresh = Some(refresh);
        self
    }

    /// Sets the chunk size for bulk iteration.
    pub fn pagination(mut self, size: usize) -> Self {
        self.pagination = Some(size);
        self
    }

    /// Customizes the base query of the document's records.
    pub fn queryset<F>(mut self, hook: F) -> Self
    where
        F: Fn(RecordQuery) -> RecordQuery + Send + Sync + 'static,
    {
        self.queryset = Some(Arc::new(hook));
        self
    }

    /// Sets how root records are found from related records.
    pub fn related_resolver<R>(mut self, resolver: R) -> Self
    where
        R: RelatedResolver + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Skips records for which `predicate` returns false (deletes are never skipped).
    pub fn should_index<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RecordRef) -> bool + Send + Sync + 'static,
    {
        self.should_index = Some(Arc::new(predicate));
        self
    }

    /// Overrides how a field is prepared.
    pub fn prepare_field<F>(mut self, name: impl Into<String>, preparer: F) -> Self
    where
        F: Fn(&RecordRef) -> SyncResult<Value> + Send + Sync + 'static,
    {
        self.preparers.insert(name.into(), Arc::new(preparer));
        self
    }

    /// Overrides how a field is prepared, receiving the related record being
    /// removed, if any. Takes precedence over [`DocumentBuilder::prepare_field`].
    pub fn prepare_field_with_related<F>(mut self, name: impl Into<String>, preparer: F) -> Self
    where
        F: Fn(&RecordRef, Option<&RecordRef>) -> SyncResult<Value> + Send + Sync + 'static,
    {
        self.related_preparers.insert(name.into(), Arc::new(preparer));
        self
    }

    /// Validates the declaration against the schema catalog and compiles it.
    pub fn build(self, catalog: &SchemaCatalog) -> SyncResult<Document> {
        let schema = catalog.get(&self.record_type).ok_or_else(|| {
            DeclarationError::UnknownRecordType {
                record_type: self.record_type.clone(),
            }
        })?;

        let mut fields = self.fields;
        for attribute in &self.model_fields {
            if fields.iter().any(|(name, _)| name == attribute) {
                return Err(DeclarationError::RedeclaredField {
                    document: self.name.clone(),
                    field: attribute.clone(),
                }
                .into());
            }
            fields.push((attribute.clone(), infer_field(schema, attribute)?));
        }

        let declared = |name: &String| fields.iter().any(|(n, _)| n == name);
        if let Some(name) = self
            .preparers
            .keys()
            .chain(self.related_preparers.keys())
            .find(|name| !declared(name))
        {
            return Err(DeclarationError::UnknownPreparer {
                document: self.name.clone(),
                field: name.clone(),
            }
            .into());
        }

        let mut compiled = Vec::with_capacity(fields.len());
        for (name, field) in fields {
            let step = if let Some(preparer) = self.related_preparers.get(&name) {
                PrepareStep::WithRelated(preparer.clone())
            } else if let Some(preparer) = self.preparers.get(&name) {
                PrepareStep::Record(preparer.clone())
            } else {
                validate_field(catalog, &self.name, &self.record_type, &name, &name, &field)?;
                PrepareStep::Extract
            };
            compiled.push(PreparedField { name, field, step });
        }

        Ok(Document {
            name: self.name,
            index: Arc::new(self.index),
            record_type: self.record_type,
            fields: compiled,
            related: self.related,
            ignore_signals: self.ignore_signals,
            auto_refresh: self.auto_refresh,
            pagination: self.pagination,
            queryset: self.queryset,
            resolver: self.resolver,
            should_index: self.should_index,
        })
    }
}

/// Checks that a field's path resolves, recursing into object properties.
fn validate_field(
    catalog: &SchemaCatalog,
    document: &str,
    record_type: &RecordType,
    label: &str,
    name: &str,
    field: &Field,
) -> Result<(), DeclarationError> {
    let path = field.resolved_path(name);
    let resolution = catalog.resolve_path(record_type, &path).map_err(|(segment, on)| {
        DeclarationError::UnresolvablePath {
            document: document.to_string(),
            field: label.to_string(),
            segment,
            record_type: on,
        }
    })?;

    if let PathResolution::Related(inner_type) = resolution
        && field.kind().is_composite()
    {
        for (property, inner) in field.properties() {
            if field.inner_preparer(property).is_some() {
                continue;
            }
            let inner_label = format!("{}.{}", label, property);
            validate_field(catalog, document, &inner_type, &inner_label, property, inner)?;
        }
    }

    Ok(())
}
