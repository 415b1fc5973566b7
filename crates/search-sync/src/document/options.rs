//! Options for document writes.

use crate::bulk::ActionKind;
use crate::config::{Refresh, SyncSettings};
use crate::record::{Filter, RecordRef};

/// Options for [`Document::update`](super::Document::update).
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// The bulk operation to perform.
    pub action: ActionKind,
    /// Explicit refresh policy; overrides the document's `auto_refresh`.
    pub refresh: Option<Refresh>,
    /// Refresh policy used when neither the call nor the document sets one.
    pub default_refresh: Refresh,
    /// Submit from concurrent workers instead of a single request.
    pub parallel: bool,
    /// Fail if any action failed.
    pub raise_on_error: bool,
    /// Actions per parallel request; defaults to the document's pagination.
    pub chunk_size: Option<usize>,
    /// Fallback actions per parallel request.
    pub bulk_chunk_size: usize,
    /// Concurrent parallel requests.
    pub thread_count: usize,
    /// Related record to leave out of prepared payloads.
    pub ignore: Option<RecordRef>,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            action: ActionKind::Index,
            refresh: None,
            default_refresh: Refresh::True,
            parallel: false,
            raise_on_error: true,
            chunk_size: None,
            bulk_chunk_size: 500,
            thread_count: 4,
            ignore: None,
        }
    }
}

impl UpdateOptions {
    /// Creates options with defaults taken from the settings.
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            default_refresh: settings.auto_refresh,
            bulk_chunk_size: settings.bulk_chunk_size,
            thread_count: settings.bulk_threads,
            ..Default::default()
        }
    }

    /// Sets the bulk operation.
    pub fn with_action(mut self, action: ActionKind) -> Self {
        self.action = action;
        self
    }

    /// Sets an explicit refresh policy.
    pub fn with_refresh(mut self, refresh: Refresh) -> Self {
        self.refresh = Some(refresh);
        self
    }

    /// Enables parallel submission.
    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// Leaves `record` out of prepared payloads.
    pub fn ignoring(mut self, record: RecordRef) -> Self {
        self.ignore = Some(record);
        self
    }
}

/// Restricts a full reindex to part of a document's records.
#[derive(Debug, Clone, Default)]
pub struct IndexingScope {
    /// Predicates that must all match.
    pub filters: Vec<Filter>,
    /// Predicates none of which may match.
    pub excludes: Vec<Filter>,
    /// Maximum number of records to index.
    pub max_records: Option<usize>,
}
