//! Resolution of root records from related records.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::fields::resolve;
use crate::record::{FieldValue, RecordRef, RecordType};

/// Finds the root records whose documents embed a related record.
///
/// Given an instance of one of a document's related types, returns the
/// document's root records that must be recomputed. `Ok(None)` means nothing
/// to do. A [`SourceError::DoesNotExist`](crate::error::SourceError) error is
/// also treated as nothing to do by the registry.
#[async_trait]
pub trait RelatedResolver: Send + Sync {
    /// Returns the root records to recompute for `related`.
    async fn instances_from_related(
        &self,
        related: &RecordRef,
    ) -> SyncResult<Option<Vec<RecordRef>>>;
}

#[async_trait]
impl<F> RelatedResolver for F
where
    F: Fn(&RecordRef) -> SyncResult<Option<Vec<RecordRef>>> + Send + Sync,
{
    async fn instances_from_related(
        &self,
        related: &RecordRef,
    ) -> SyncResult<Option<Vec<RecordRef>>> {
        self(related)
    }
}

/// Resolves root records by following an attribute path on the related record.
///
/// ```rust
/// use helios_search_sync::document::PathResolver;
///
/// // manufacturer.car_set -> cars, ad.car -> car
/// let resolver = PathResolver::new()
///     .route("Manufacturer", "car_set")
///     .route("Ad", "car");
/// ```
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    routes: HashMap<RecordType, Vec<String>>,
}

impl PathResolver {
    /// Creates a resolver with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Follows `path` when the related record is of `record_type`.
    pub fn route(mut self, record_type: impl Into<RecordType>, path: &str) -> Self {
        self.routes.insert(
            record_type.into(),
            path.split('.').map(String::from).collect(),
        );
        self
    }
}

#[async_trait]
impl RelatedResolver for PathResolver {
    async fn instances_from_related(
        &self,
        related: &RecordRef,
    ) -> SyncResult<Option<Vec<RecordRef>>> {
        let Some(path) = self.routes.get(related.record_type()) else {
            return Ok(None);
        };

        let value = resolve(&FieldValue::Record(related.clone()), path, false, None)?;
        let records = value
            .into_items()
            .into_iter()
            .filter_map(|item| match item {
                FieldValue::Record(record) => Some(record),
                _ => None,
            })
            .collect();

        Ok(Some(records))
    }
}
