//! Cursor pagination over a record source.

use std::sync::Arc;

use tracing::debug;

use crate::error::SyncResult;
use crate::record::{PrimaryKey, RecordQuery, RecordRef, RecordSource};

/// Streams the records of a query in primary-key order.
///
/// With a chunk size, each chunk re-queries with `pk > last seen key` instead
/// of an offset, so chunks never overlap and concurrent inserts below the
/// cursor are never picked up twice. Without one, the query is fetched in a
/// single chunk.
pub struct RecordPager {
    source: Arc<dyn RecordSource>,
    query: RecordQuery,
    chunk_size: Option<usize>,
    cursor: Option<PrimaryKey>,
    remaining: Option<usize>,
    exhausted: bool,
}

impl RecordPager {
    /// Creates a pager. `max_records` caps the total number of records.
    pub fn new(
        source: Arc<dyn RecordSource>,
        query: RecordQuery,
        chunk_size: Option<usize>,
        max_records: Option<usize>,
    ) -> Self {
        let remaining = match (query.limit, max_records) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let cursor = query.after.clone();

        Self {
            source,
            query,
            chunk_size: chunk_size.filter(|size| *size > 0),
            cursor,
            remaining,
            exhausted: false,
        }
    }

    /// Returns the chunk size, if paginating.
    pub fn chunk_size(&self) -> Option<usize> {
        self.chunk_size
    }

    /// Fetches the next chunk, or `None` once the query is exhausted.
    pub async fn next_chunk(&mut self) -> SyncResult<Option<Vec<RecordRef>>> {
        if self.exhausted || self.remaining == Some(0) {
            return Ok(None);
        }

        let limit = match (self.chunk_size, self.remaining) {
            (Some(size), Some(remaining)) => Some(size.min(remaining)),
            (size, remaining) => size.or(remaining),
        };

        let mut query = self.query.clone();
        query.after = self.cursor.clone();
        query.limit = limit;

        let chunk = self.source.fetch(&query).await?;

        debug!(
            record_type = %query.record_type,
            after = ?query.after,
            fetched = chunk.len(),
            "Fetched record chunk"
        );

        if self.chunk_size.is_none() || limit.is_some_and(|l| chunk.len() < l) {
            self.exhausted = true;
        }

        if chunk.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        self.cursor = chunk.last().map(|record| record.primary_key());
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(chunk.len());
        }

        Ok(Some(chunk))
    }

    /// Drains the pager into a single list.
    pub async fn collect_all(mut self) -> SyncResult<Vec<RecordRef>> {
        let mut records = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            records.extend(chunk);
        }
        Ok(records)
    }
}
