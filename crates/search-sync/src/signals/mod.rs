//! Mutation notifications.
//!
//! Record mutations arrive as [`MutationEvent`]s and are translated into
//! registry calls by a [`SignalProcessor`]:
//!
//! | Event | Registry calls |
//! |-------|----------------|
//! | saved | `update`, then `update_related` |
//! | pre-delete | `delete_related` (while relations are still reachable) |
//! | post-delete | `delete` |
//! | relation `post_add` / `post_remove` / `post_clear` | same as saved |
//! | relation `pre_remove` / `pre_clear` | same as pre-delete |
//!
//! # Delivery Modes
//!
//! | Mode | Processor | Failure surface |
//! |------|-----------|-----------------|
//! | Synchronous | [`RealTimeProcessor`] | the mutation's caller |
//! | Deferred | [`DeferredProcessor`] + [`TaskWorker`] | the background task |

mod deferred;
mod realtime;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::DeliveryMode;
use crate::error::SyncResult;
use crate::record::{RecordRef, RecordSource, RecordType};
use crate::registry::DocumentRegistry;

pub use deferred::{
    ChannelTaskQueue, DeferredProcessor, SyncTask, TaskQueue, TaskWorker, WorkerStats,
};
pub use realtime::RealTimeProcessor;

/// Kind of a many-to-many relation change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationAction {
    /// Links are about to be added.
    PreAdd,
    /// Links were added.
    PostAdd,
    /// Links are about to be removed.
    PreRemove,
    /// Links were removed.
    PostRemove,
    /// All links are about to be cleared.
    PreClear,
    /// All links were cleared.
    PostClear,
}

impl RelationAction {
    /// Returns the action name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationAction::PreAdd => "pre_add",
            RelationAction::PostAdd => "post_add",
            RelationAction::PreRemove => "pre_remove",
            RelationAction::PostRemove => "post_remove",
            RelationAction::PreClear => "pre_clear",
            RelationAction::PostClear => "post_clear",
        }
    }
}

impl fmt::Display for RelationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_add" => Ok(RelationAction::PreAdd),
            "post_add" => Ok(RelationAction::PostAdd),
            "pre_remove" => Ok(RelationAction::PreRemove),
            "post_remove" => Ok(RelationAction::PostRemove),
            "pre_clear" => Ok(RelationAction::PreClear),
            "post_clear" => Ok(RelationAction::PostClear),
            other => Err(format!("unknown relation action '{}'", other)),
        }
    }
}

/// A record mutation notification.
#[derive(Debug, Clone)]
pub enum MutationEvent {
    /// The record was created or updated.
    Saved(RecordRef),
    /// The record is about to be deleted.
    PreDelete(RecordRef),
    /// The record was deleted.
    PostDelete(RecordRef),
    /// A many-to-many relation of the record changed.
    RelationChanged {
        /// The record whose relation changed.
        record: RecordRef,
        /// The change kind.
        action: RelationAction,
        /// The record type on the other side of the relation.
        related_type: RecordType,
    },
}

impl MutationEvent {
    /// Returns the record the event is about.
    pub fn record(&self) -> &RecordRef {
        match self {
            MutationEvent::Saved(record)
            | MutationEvent::PreDelete(record)
            | MutationEvent::PostDelete(record) => record,
            MutationEvent::RelationChanged { record, .. } => record,
        }
    }
}

/// Translates mutation events into registry calls.
#[async_trait]
pub trait SignalProcessor: Send + Sync {
    /// Handles a created or updated record.
    async fn handle_save(&self, record: &RecordRef) -> SyncResult<()>;

    /// Handles a record about to be deleted.
    async fn handle_pre_delete(&self, record: &RecordRef) -> SyncResult<()>;

    /// Handles a deleted record.
    async fn handle_delete(&self, record: &RecordRef) -> SyncResult<()>;

    /// Handles a many-to-many relation change.
    async fn handle_relation_changed(
        &self,
        record: &RecordRef,
        action: RelationAction,
    ) -> SyncResult<()> {
        match action {
            RelationAction::PostAdd | RelationAction::PostRemove | RelationAction::PostClear => {
                self.handle_save(record).await
            }
            RelationAction::PreRemove | RelationAction::PreClear => {
                self.handle_pre_delete(record).await
            }
            RelationAction::PreAdd => Ok(()),
        }
    }

    /// Routes an event to its handler.
    async fn dispatch(&self, event: &MutationEvent) -> SyncResult<()> {
        match event {
            MutationEvent::Saved(record) => self.handle_save(record).await,
            MutationEvent::PreDelete(record) => self.handle_pre_delete(record).await,
            MutationEvent::PostDelete(record) => self.handle_delete(record).await,
            MutationEvent::RelationChanged { record, action, .. } => {
                self.handle_relation_changed(record, *action).await
            }
        }
    }
}

/// Builds the processor for the registry's delivery mode.
///
/// In deferred mode a worker is spawned on the current tokio runtime; it runs
/// until every handle to the returned processor is dropped.
pub fn build_processor(
    registry: Arc<DocumentRegistry>,
    source: Arc<dyn RecordSource>,
) -> (Arc<dyn SignalProcessor>, Option<JoinHandle<()>>) {
    match registry.settings().delivery {
        DeliveryMode::Synchronous => (Arc::new(RealTimeProcessor::new(registry)), None),
        DeliveryMode::Deferred => {
            let (queue, receiver) = ChannelTaskQueue::new(1000);
            let worker = Arc::new(TaskWorker::new(registry.clone(), source));
            let handle = worker.spawn(receiver);
            let processor = DeferredProcessor::new(registry, Arc::new(queue));
            (Arc::new(processor), Some(handle))
        }
    }
}
