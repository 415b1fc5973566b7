//! The record datastore collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SourceError, SyncResult};

use super::{PrimaryKey, RecordRef, RecordType};

/// A field-lookup/value predicate.
///
/// Lookups are attribute paths joined with `__` (`manufacturer__name`). A
/// trailing `__in` matches when the value is one of the elements of a JSON
/// array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// The lookup path.
    pub lookup: String,
    /// The value to compare against.
    pub value: Value,
}

impl Filter {
    /// Creates an equality (or `__in`) predicate.
    pub fn new(lookup: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            lookup: lookup.into(),
            value: value.into(),
        }
    }

    /// Splits the lookup into an attribute path and whether it is an `__in` lookup.
    pub fn path(&self) -> (Vec<String>, bool) {
        let mut segments: Vec<String> = self.lookup.split("__").map(String::from).collect();
        let is_in = segments.len() > 1 && segments.last().map(String::as_str) == Some("in");
        if is_in {
            segments.pop();
        }
        (segments, is_in)
    }
}

/// A query against one record type.
///
/// Results are always ordered by ascending primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordQuery {
    /// The record type to query.
    pub record_type: RecordType,
    /// Predicates that must all match.
    #[serde(default)]
    pub filters: Vec<Filter>,
    /// Predicates none of which may match.
    #[serde(default)]
    pub excludes: Vec<Filter>,
    /// Restricts the result to these primary keys.
    #[serde(default)]
    pub keys: Option<Vec<PrimaryKey>>,
    /// Cursor: only keys strictly greater than this one.
    #[serde(default)]
    pub after: Option<PrimaryKey>,
    /// Maximum number of records to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl RecordQuery {
    /// Creates a query for every record of a type.
    pub fn all(record_type: impl Into<RecordType>) -> Self {
        Self {
            record_type: record_type.into(),
            filters: Vec::new(),
            excludes: Vec::new(),
            keys: None,
            after: None,
            limit: None,
        }
    }

    /// Adds a filter predicate.
    pub fn filter(mut self, lookup: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::new(lookup, value));
        self
    }

    /// Adds an exclude predicate.
    pub fn exclude(mut self, lookup: impl Into<String>, value: impl Into<Value>) -> Self {
        self.excludes.push(Filter::new(lookup, value));
        self
    }

    /// Restricts the query to the given keys.
    pub fn keys(mut self, keys: impl IntoIterator<Item = PrimaryKey>) -> Self {
        self.keys = Some(keys.into_iter().collect());
        self
    }

    /// Sets the pagination cursor.
    pub fn after(mut self, key: PrimaryKey) -> Self {
        self.after = Some(key);
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Source of records: an ordered, filterable collection per record type.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Returns the records matching `query`, ordered by ascending primary key.
    async fn fetch(&self, query: &RecordQuery) -> SyncResult<Vec<RecordRef>>;

    /// Counts the records matching `query`.
    async fn count(&self, query: &RecordQuery) -> SyncResult<usize> {
        Ok(self.fetch(query).await?.len())
    }

    /// Loads a single record.
    ///
    /// Returns [`SourceError::DoesNotExist`] if the record is gone.
    async fn get(&self, record_type: &RecordType, key: &PrimaryKey) -> SyncResult<RecordRef> {
        let query = RecordQuery::all(record_type.clone())
            .keys([key.clone()])
            .limit(1);
        self.fetch(&query).await?.into_iter().next().ok_or_else(|| {
            SourceError::DoesNotExist {
                record_type: record_type.clone(),
                key: key.clone(),
            }
            .into()
        })
    }
}
