//! In-memory collaborators.
//!
//! [`MemoryRecordSource`] holds records per type, ordered by primary key, and
//! answers [`RecordQuery`]s against them. [`MemorySearchClient`] applies bulk
//! actions to in-memory indices and records every call, which makes it the
//! client of choice in tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::bulk::{ActionKind, BulkAction, BulkItemError, BulkResponse, SearchClient};
use crate::config::Refresh;
use crate::error::{BulkError, SyncResult};
use crate::fields::resolve;
use crate::record::{
    FieldValue, Filter, PrimaryKey, RecordQuery, RecordRef, RecordSource, RecordType,
};

/// Record source backed by in-process maps.
#[derive(Debug, Default)]
pub struct MemoryRecordSource {
    records: RwLock<HashMap<RecordType, BTreeMap<PrimaryKey, RecordRef>>>,
}

impl MemoryRecordSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record.
    pub fn insert(&self, record: RecordRef) {
        self.records
            .write()
            .entry(record.record_type().clone())
            .or_default()
            .insert(record.primary_key(), record);
    }

    /// Removes a record, returning it if it was present.
    pub fn remove(&self, record_type: &RecordType, key: &PrimaryKey) -> Option<RecordRef> {
        self.records
            .write()
            .get_mut(record_type)
            .and_then(|records| records.remove(key))
    }

    /// Returns every record of a type, ordered by primary key.
    pub fn all_of(&self, record_type: &RecordType) -> Vec<RecordRef> {
        self.records
            .read()
            .get(record_type)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Evaluates a query synchronously.
    ///
    /// Filters run after the lock is released: relation values may query this
    /// source again.
    pub fn select(&self, query: &RecordQuery) -> Vec<RecordRef> {
        let candidates: Vec<RecordRef> = {
            let records = self.records.read();
            let Some(table) = records.get(&query.record_type) else {
                return Vec::new();
            };
            table
                .iter()
                .filter(|(key, _)| query.after.as_ref().is_none_or(|after| *key > after))
                .filter(|(key, _)| query.keys.as_ref().is_none_or(|keys| keys.contains(key)))
                .map(|(_, record)| record.clone())
                .collect()
        };

        let candidates = candidates
            .into_iter()
            .filter(|record| query.filters.iter().all(|f| matches_filter(record, f)))
            .filter(|record| !query.excludes.iter().any(|f| matches_filter(record, f)));

        match query.limit {
            Some(limit) => candidates.take(limit).collect(),
            None => candidates.collect(),
        }
    }
}

#[async_trait]
impl RecordSource for MemoryRecordSource {
    async fn fetch(&self, query: &RecordQuery) -> SyncResult<Vec<RecordRef>> {
        Ok(self.select(query))
    }
}

fn matches_filter(record: &RecordRef, filter: &Filter) -> bool {
    let (path, is_in) = filter.path();
    if path.len() == 1 && path[0] == "pk" {
        return compare(&record.primary_key().to_json(), &filter.value, is_in);
    }
    matches_path(FieldValue::Record(record.clone()), &path, &filter.value, is_in)
}

/// Follows `path`, fanning out over sequences.
fn matches_path(value: FieldValue, path: &[String], expected: &Value, is_in: bool) -> bool {
    let value = value.materialize();
    if let FieldValue::Sequence(items) = value {
        return items
            .into_iter()
            .any(|item| matches_path(item, path, expected, is_in));
    }

    let Some((segment, rest)) = path.split_first() else {
        return compare(&value.to_json(), expected, is_in);
    };
    match resolve(&value, std::slice::from_ref(segment), false, None) {
        Ok(next) => matches_path(next, rest, expected, is_in),
        Err(_) => false,
    }
}

fn compare(actual: &Value, expected: &Value, is_in: bool) -> bool {
    match expected {
        Value::Array(options) if is_in => options.contains(actual),
        _ => actual == expected,
    }
}

/// One recorded bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkCall {
    /// The submitted actions.
    pub actions: Vec<BulkAction>,
    /// The requested refresh policy.
    pub refresh: Refresh,
}

/// Search client that applies actions to in-memory indices.
///
/// Deleting a missing document counts as a success; updating one fails with
/// status 404, as a search engine would report it.
#[derive(Debug, Default)]
pub struct MemorySearchClient {
    calls: RwLock<Vec<BulkCall>>,
    indices: RwLock<HashMap<String, BTreeMap<PrimaryKey, Map<String, Value>>>>,
    failing: RwLock<HashSet<(String, PrimaryKey)>>,
    unavailable: AtomicBool,
}

impl MemorySearchClient {
    /// Creates a client with empty indices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every action on `index`/`id` fail with status 400.
    pub fn fail_on(&self, index: impl Into<String>, id: PrimaryKey) {
        self.failing.write().insert((index.into(), id));
    }

    /// Makes every request fail as if the engine were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the recorded requests, oldest first.
    pub fn calls(&self) -> Vec<BulkCall> {
        self.calls.read().clone()
    }

    /// Returns every recorded action, in submission order.
    pub fn actions(&self) -> Vec<BulkAction> {
        self.calls
            .read()
            .iter()
            .flat_map(|call| call.actions.iter().cloned())
            .collect()
    }

    /// Returns a stored document.
    pub fn document(&self, index: &str, id: &PrimaryKey) -> Option<Map<String, Value>> {
        self.indices
            .read()
            .get(index)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Counts the documents stored in an index.
    pub fn document_count(&self, index: &str) -> usize {
        self.indices.read().get(index).map_or(0, BTreeMap::len)
    }

    /// Forgets recorded calls and stored documents.
    pub fn clear(&self) {
        self.calls.write().clear();
        self.indices.write().clear();
    }

    fn apply(&self, action: &BulkAction) -> Result<(), BulkItemError> {
        let failure = |status: u16, reason: &str| BulkItemError {
            op_type: action.op_type,
            index: action.index.clone(),
            id: action.id.clone(),
            status,
            reason: reason.to_string(),
        };

        if self
            .failing
            .read()
            .contains(&(action.index.clone(), action.id.clone()))
        {
            return Err(failure(400, "mapper_parsing_exception"));
        }

        let mut indices = self.indices.write();
        let docs = indices.entry(action.index.clone()).or_default();
        match action.op_type {
            ActionKind::Index => {
                docs.insert(action.id.clone(), action.source.clone().unwrap_or_default());
            }
            ActionKind::Update => {
                let Some(existing) = docs.get_mut(&action.id) else {
                    return Err(failure(404, "document_missing_exception"));
                };
                if let Some(source) = &action.source {
                    existing.extend(source.clone());
                }
            }
            ActionKind::Delete => {
                docs.remove(&action.id);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SearchClient for MemorySearchClient {
    fn client_name(&self) -> &'static str {
        "memory"
    }

    async fn bulk(&self, actions: Vec<BulkAction>, refresh: Refresh) -> SyncResult<BulkResponse> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BulkError::Client {
                message: "connection refused".to_string(),
            }
            .into());
        }

        let mut response = BulkResponse::default();
        for action in &actions {
            match self.apply(action) {
                Ok(()) => response.success += 1,
                Err(e) => response.errors.push(e),
            }
        }

        self.calls.write().push(BulkCall { actions, refresh });
        Ok(response)
    }
}
