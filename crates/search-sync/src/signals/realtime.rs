//! Synchronous delivery.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::bulk::BulkResponse;
use crate::error::SyncResult;
use crate::record::RecordRef;
use crate::registry::DocumentRegistry;

use super::SignalProcessor;

/// Runs registry calls inline with the mutation.
///
/// With `log_errors` set, search-engine delivery errors are logged and the
/// mutation proceeds; otherwise they propagate to the caller. Failures while
/// removing a deleted record's documents are always logged and dropped, since
/// the record is already gone.
#[derive(Debug, Clone)]
pub struct RealTimeProcessor {
    registry: Arc<DocumentRegistry>,
}

impl RealTimeProcessor {
    /// Creates a processor driving `registry`.
    pub fn new(registry: Arc<DocumentRegistry>) -> Self {
        Self { registry }
    }

    fn deliver(
        &self,
        operation: &str,
        record: &RecordRef,
        result: SyncResult<BulkResponse>,
    ) -> SyncResult<()> {
        match result {
            Ok(_) => Ok(()),
            Err(e) if self.registry.settings().log_errors && e.is_delivery() => {
                warn!(
                    operation,
                    record = %record.record_key(),
                    error = %e,
                    "Search index update failed"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl SignalProcessor for RealTimeProcessor {
    async fn handle_save(&self, record: &RecordRef) -> SyncResult<()> {
        let options = self.registry.default_options();

        let result = self.registry.update(record, &options).await;
        self.deliver("update", record, result)?;

        let result = self.registry.update_related(record, &options).await;
        self.deliver("update_related", record, result)
    }

    async fn handle_pre_delete(&self, record: &RecordRef) -> SyncResult<()> {
        let options = self.registry.default_options();
        let result = self.registry.delete_related(record, &options).await;
        self.deliver("delete_related", record, result)
    }

    async fn handle_delete(&self, record: &RecordRef) -> SyncResult<()> {
        let mut options = self.registry.default_options();
        options.raise_on_error = false;

        if let Err(e) = self.registry.delete(record, &options).await {
            warn!(
                record = %record.record_key(),
                error = %e,
                "Search index delete failed"
            );
        }
        Ok(())
    }
}
