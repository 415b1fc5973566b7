//! Deferred delivery.
//!
//! Mutation handlers enqueue serializable [`SyncTask`]s instead of writing to
//! the search engine. A [`TaskWorker`] reloads the records by key and performs
//! the registry calls later, so failures surface in the worker rather than in
//! the mutation's caller.
//!
//! Related records are resolved eagerly on pre-delete, while the record being
//! removed is still reachable; only their keys are queued.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{SyncResult, TaskError};
use crate::record::{PrimaryKey, RecordRef, RecordSource, RecordType};
use crate::registry::DocumentRegistry;

use super::SignalProcessor;

/// A unit of deferred work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum SyncTask {
    /// Index the documents rooted on a record.
    Update {
        /// Record type.
        record_type: RecordType,
        /// Primary key.
        key: PrimaryKey,
    },
    /// Re-index the documents referencing a record.
    UpdateRelated {
        /// Record type.
        record_type: RecordType,
        /// Primary key.
        key: PrimaryKey,
    },
    /// Re-index the given root records of one document.
    ReindexDocuments {
        /// Document name.
        document: String,
        /// Keys of the document's root records.
        keys: Vec<PrimaryKey>,
    },
    /// Delete the documents of a removed record.
    Delete {
        /// Record type.
        record_type: RecordType,
        /// Primary key.
        key: PrimaryKey,
    },
}

/// Destination of deferred tasks.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Queues a task.
    async fn enqueue(&self, task: SyncTask) -> SyncResult<()>;
}

/// In-process queue backed by a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelTaskQueue {
    sender: mpsc::Sender<SyncTask>,
}

impl ChannelTaskQueue {
    /// Creates a queue and the receiver its worker reads from.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SyncTask>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl TaskQueue for ChannelTaskQueue {
    async fn enqueue(&self, task: SyncTask) -> SyncResult<()> {
        self.sender.send(task).await.map_err(|e| {
            TaskError::QueueClosed {
                message: e.to_string(),
            }
            .into()
        })
    }
}

/// Signal processor that queues tasks instead of writing.
pub struct DeferredProcessor {
    registry: Arc<DocumentRegistry>,
    queue: Arc<dyn TaskQueue>,
}

impl DeferredProcessor {
    /// Creates a processor queueing onto `queue`.
    pub fn new(registry: Arc<DocumentRegistry>, queue: Arc<dyn TaskQueue>) -> Self {
        Self { registry, queue }
    }

    fn autosync(&self) -> bool {
        self.registry.settings().autosync
    }
}

impl std::fmt::Debug for DeferredProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredProcessor")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SignalProcessor for DeferredProcessor {
    async fn handle_save(&self, record: &RecordRef) -> SyncResult<()> {
        if !self.autosync() {
            return Ok(());
        }

        let record_type = record.record_type().clone();
        let key = record.primary_key();
        self.queue
            .enqueue(SyncTask::Update {
                record_type: record_type.clone(),
                key: key.clone(),
            })
            .await?;
        self.queue
            .enqueue(SyncTask::UpdateRelated { record_type, key })
            .await
    }

    async fn handle_pre_delete(&self, record: &RecordRef) -> SyncResult<()> {
        if !self.autosync() {
            return Ok(());
        }

        for document in self.registry.related_documents(record.record_type()) {
            if document.ignore_signals() {
                continue;
            }
            let Some(related) = self.registry.instances_from_related(&document, record).await?
            else {
                continue;
            };

            let keys: Vec<PrimaryKey> = related
                .iter()
                .filter(|r| r.record_key() != record.record_key())
                .map(|r| r.primary_key())
                .collect();
            if keys.is_empty() {
                continue;
            }

            self.queue
                .enqueue(SyncTask::ReindexDocuments {
                    document: document.name().to_string(),
                    keys,
                })
                .await?;
        }

        Ok(())
    }

    async fn handle_delete(&self, record: &RecordRef) -> SyncResult<()> {
        if !self.autosync() {
            return Ok(());
        }

        let task = SyncTask::Delete {
            record_type: record.record_type().clone(),
            key: record.primary_key(),
        };
        if let Err(e) = self.queue.enqueue(task).await {
            warn!(
                record = %record.record_key(),
                error = %e,
                "Failed to queue search index delete"
            );
        }
        Ok(())
    }
}

/// Counters kept by a running worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Tasks completed without error.
    pub processed: u64,
    /// Tasks that failed.
    pub failed: u64,
}

/// Executes deferred tasks.
pub struct TaskWorker {
    registry: Arc<DocumentRegistry>,
    source: Arc<dyn RecordSource>,
    stats: RwLock<WorkerStats>,
}

impl TaskWorker {
    /// Creates a worker loading records from `source`.
    pub fn new(registry: Arc<DocumentRegistry>, source: Arc<dyn RecordSource>) -> Self {
        Self {
            registry,
            source,
            stats: RwLock::new(WorkerStats::default()),
        }
    }

    /// Returns the worker's counters.
    pub fn stats(&self) -> WorkerStats {
        *self.stats.read()
    }

    /// Executes one task.
    ///
    /// Records that vanished between queueing and execution are logged and
    /// skipped.
    pub async fn run(&self, task: &SyncTask) -> SyncResult<()> {
        let options = self.registry.default_options();

        match task {
            SyncTask::Update { record_type, key } => {
                if let Some(record) = self.load(record_type, key).await? {
                    self.registry.update(&record, &options).await?;
                }
            }
            SyncTask::UpdateRelated { record_type, key } => {
                if let Some(record) = self.load(record_type, key).await? {
                    self.registry.update_related(&record, &options).await?;
                }
            }
            SyncTask::ReindexDocuments { document, keys } => {
                let target =
                    self.registry
                        .document(document)
                        .ok_or_else(|| TaskError::UnknownDocument {
                            document: document.clone(),
                        })?;

                let query = target.get_queryset().keys(keys.clone());
                let records = self.source.fetch(&query).await?;
                if records.is_empty() {
                    debug!(document = %document, "No records left to re-index");
                    return Ok(());
                }

                self.registry
                    .update_document(document, records, &options.parallel())
                    .await?;
            }
            SyncTask::Delete { record_type, key } => {
                let mut options = options;
                options.raise_on_error = false;
                self.registry
                    .delete_by_key(record_type, key, &options)
                    .await?;
            }
        }

        Ok(())
    }

    async fn load(
        &self,
        record_type: &RecordType,
        key: &PrimaryKey,
    ) -> SyncResult<Option<RecordRef>> {
        match self.source.get(record_type, key).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_does_not_exist() => {
                warn!(
                    record_type = %record_type,
                    key = %key,
                    "Record vanished before its sync task ran"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Starts consuming tasks from `receiver`.
    ///
    /// The loop ends once every sender is dropped and the queue is drained.
    pub fn spawn(self: Arc<Self>, mut receiver: mpsc::Receiver<SyncTask>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(task) = receiver.recv().await {
                let result = self.run(&task).await;

                let mut stats = self.stats.write();
                match result {
                    Ok(()) => stats.processed += 1,
                    Err(e) => {
                        stats.failed += 1;
                        error!(task = ?task, error = %e, "Sync task failed");
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for TaskWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskWorker")
            .field("registry", &self.registry)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_serialization() {
        let task = SyncTask::Update {
            record_type: RecordType::new("Car"),
            key: PrimaryKey::Int(7),
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"task": "update", "record_type": "Car", "key": 7})
        );

        let back: SyncTask = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (queue, receiver) = ChannelTaskQueue::new(1);
        drop(receiver);

        let err = queue
            .enqueue(SyncTask::Delete {
                record_type: RecordType::new("Car"),
                key: PrimaryKey::Int(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::SyncError::Task(TaskError::QueueClosed { .. })
        ));
    }
}
