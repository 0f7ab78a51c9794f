//! Concurrent chunked writes.

use crate::error::{Result, SyncError};
use bridge_traits::records::{CancellationToken, RecordStore, RemoteRecord, MAX_RECORDS_PER_REQUEST};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// What a write call does with its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Upsert the records.
    Save,
    /// Delete the records by opaque id.
    Delete,
}

/// Writes record lists in chunks no larger than the per-call ceiling.
///
/// All chunks are issued at once. The first failing chunk cancels the rest
/// through a child token; chunks that already succeeded stay written.
#[derive(Clone)]
pub struct BatchWriter {
    store: Arc<dyn RecordStore>,
    batch_limit: usize,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_limit(store, MAX_RECORDS_PER_REQUEST)
    }

    /// Writer with a lower chunk size. Values are clamped to `1..=400`.
    pub fn with_limit(store: Arc<dyn RecordStore>, batch_limit: usize) -> Self {
        Self {
            store,
            batch_limit: batch_limit.clamp(1, MAX_RECORDS_PER_REQUEST),
        }
    }

    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    #[instrument(skip(self, records, cancel), fields(count = records.len(), mode = ?mode))]
    pub async fn write(
        &self,
        records: Vec<RemoteRecord>,
        mode: WriteMode,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let batch_cancel = cancel.child_token();
        // Dropping this future (or returning early) cancels every outstanding chunk.
        let _guard = batch_cancel.clone().drop_guard();

        let mut outstanding = FuturesUnordered::new();
        let mut records = records.into_iter().peekable();
        let mut index = 0usize;
        while records.peek().is_some() {
            let chunk: Vec<RemoteRecord> = records.by_ref().take(self.batch_limit).collect();
            let store = Arc::clone(&self.store);
            let token = batch_cancel.clone();
            let chunk_index = index;
            index += 1;

            outstanding.push(async move {
                let len = chunk.len();
                let result = match mode {
                    WriteMode::Save => store.save(chunk, &token).await.map(|_| ()),
                    WriteMode::Delete => {
                        let ids = chunk.into_iter().map(|r| r.id).collect();
                        store.delete(ids, &token).await
                    }
                };
                (chunk_index, len, result)
            });
        }
        debug!(chunks = index, limit = self.batch_limit, "Issued write chunks");

        while let Some((chunk, len, result)) = outstanding.next().await {
            match result {
                Ok(()) => debug!(chunk, records = len, "Chunk written"),
                Err(err) => {
                    batch_cancel.cancel();
                    let err = SyncError::from(err);
                    if !matches!(err, SyncError::Cancelled) {
                        warn!(chunk, error = %err, "Chunk failed, cancelling outstanding chunks");
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}
