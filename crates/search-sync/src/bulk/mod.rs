//! Bulk actions and the search client collaborator.
//!
//! A [`BulkAction`] is one wire-level instruction for the search engine's batch
//! write endpoint. Actions are submitted through a [`SearchClient`] either in a
//! single call ([`bulk`]) or fanned out to concurrent workers
//! ([`parallel_bulk`]).

mod submit;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Refresh;
use crate::error::SyncResult;
use crate::record::PrimaryKey;

pub use submit::{BulkOptions, bulk, parallel_bulk};

/// Kind of a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Create or replace the document.
    Index,
    /// Partially update the document.
    Update,
    /// Remove the document.
    Delete,
}

impl ActionKind {
    /// Returns the operation name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Index => "index",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One bulk write instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkAction {
    /// The operation.
    #[serde(rename = "_op_type")]
    pub op_type: ActionKind,
    /// Target index name.
    #[serde(rename = "_index")]
    pub index: String,
    /// Document id (the record's primary key).
    #[serde(rename = "_id")]
    pub id: PrimaryKey,
    /// Prepared payload; `None` for deletes.
    #[serde(rename = "_source")]
    pub source: Option<Map<String, Value>>,
}

impl BulkAction {
    /// Creates an index action.
    pub fn index(index: impl Into<String>, id: PrimaryKey, source: Map<String, Value>) -> Self {
        Self {
            op_type: ActionKind::Index,
            index: index.into(),
            id,
            source: Some(source),
        }
    }

    /// Creates an update action carrying a partial document.
    pub fn update(index: impl Into<String>, id: PrimaryKey, source: Map<String, Value>) -> Self {
        Self {
            op_type: ActionKind::Update,
            index: index.into(),
            id,
            source: Some(source),
        }
    }

    /// Creates a delete action.
    pub fn delete(index: impl Into<String>, id: PrimaryKey) -> Self {
        Self {
            op_type: ActionKind::Delete,
            index: index.into(),
            id,
            source: None,
        }
    }
}

/// A failed bulk item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemError {
    /// The operation that failed.
    pub op_type: ActionKind,
    /// Target index name.
    pub index: String,
    /// Document id.
    pub id: PrimaryKey,
    /// HTTP-like status reported for the item.
    pub status: u16,
    /// Error reason reported by the engine.
    pub reason: String,
}

impl fmt::Display for BulkItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{} failed ({}): {}",
            self.op_type, self.index, self.id, self.status, self.reason
        )
    }
}

/// Outcome of a bulk submission: the success count and the failed items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResponse {
    /// Number of actions that succeeded.
    pub success: usize,
    /// Actions that failed.
    pub errors: Vec<BulkItemError>,
}

impl BulkResponse {
    /// Folds another response into this one.
    pub fn merge(&mut self, other: BulkResponse) {
        self.success += other.success;
        self.errors.extend(other.errors);
    }

    /// Number of failed actions.
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if no action failed.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Client capable of executing bulk write requests.
///
/// Implementations report per-item failures in the returned [`BulkResponse`]
/// and reserve `Err` for requests that could not be executed at all.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Short name used in logs.
    fn client_name(&self) -> &'static str;

    /// Executes one bulk request.
    async fn bulk(&self, actions: Vec<BulkAction>, refresh: Refresh) -> SyncResult<BulkResponse>;
}
