//! Sequential and parallel bulk submission.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::Refresh;
use crate::error::{BulkError, SyncError, SyncResult};

use super::{BulkAction, BulkResponse, SearchClient};

/// Options for one bulk submission.
#[derive(Debug, Clone)]
pub struct BulkOptions {
    /// Refresh policy sent with every request.
    pub refresh: Refresh,
    /// Fail with [`BulkError::PartialFailure`] if any action failed.
    pub raise_on_error: bool,
    /// Actions per request in parallel mode.
    pub chunk_size: usize,
    /// Concurrent requests in parallel mode.
    pub thread_count: usize,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            refresh: Refresh::True,
            raise_on_error: true,
            chunk_size: 500,
            thread_count: 4,
        }
    }
}

/// Submits all actions in one client call.
pub async fn bulk(
    client: &dyn SearchClient,
    actions: Vec<BulkAction>,
    options: &BulkOptions,
) -> SyncResult<BulkResponse> {
    if actions.is_empty() {
        return Ok(BulkResponse::default());
    }

    debug!(
        client = client.client_name(),
        actions = actions.len(),
        refresh = %options.refresh,
        "Submitting bulk request"
    );

    let response = client.bulk(actions, options.refresh).await?;
    check(response, options)
}

/// Submits actions in chunks from concurrent workers.
///
/// Every chunk is awaited before returning; the first request error is
/// reported after all workers have finished.
pub async fn parallel_bulk(
    client: Arc<dyn SearchClient>,
    actions: Vec<BulkAction>,
    options: &BulkOptions,
) -> SyncResult<BulkResponse> {
    if actions.is_empty() {
        return Ok(BulkResponse::default());
    }

    let chunk_size = options.chunk_size.max(1);
    let semaphore = Arc::new(Semaphore::new(options.thread_count.max(1)));
    let mut tasks: JoinSet<SyncResult<BulkResponse>> = JoinSet::new();

    debug!(
        client = client.client_name(),
        actions = actions.len(),
        chunk_size,
        threads = options.thread_count,
        "Submitting parallel bulk request"
    );

    let mut remaining = actions;
    while !remaining.is_empty() {
        let rest = remaining.split_off(chunk_size.min(remaining.len()));
        let chunk = std::mem::replace(&mut remaining, rest);
        let client = client.clone();
        let semaphore = semaphore.clone();
        let refresh = options.refresh;

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| BulkError::WorkerPanicked {
                    message: e.to_string(),
                })?;
            client.bulk(chunk, refresh).await
        });
    }

    let mut response = BulkResponse::default();
    let mut first_error: Option<SyncError> = None;

    while let Some(joined) = tasks.join_next().await {
        let result = joined.map_err(|e| {
            SyncError::from(BulkError::WorkerPanicked {
                message: e.to_string(),
            })
        });

        match result.and_then(|r| r) {
            Ok(chunk_response) => response.merge(chunk_response),
            Err(e) => {
                warn!(error = %e, "Bulk worker failed");
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    check(response, options)
}

fn check(response: BulkResponse, options: &BulkOptions) -> SyncResult<BulkResponse> {
    if options.raise_on_error
        && let Some(first) = response.errors.first()
    {
        return Err(BulkError::PartialFailure {
            failed: response.failed(),
            first: first.to_string(),
        }
        .into());
    }
    Ok(response)
}
