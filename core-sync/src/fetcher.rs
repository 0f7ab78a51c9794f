//! Paginated fetcher.

use crate::category::AttributeCategory;
use crate::error::{Result, SyncError};
use bridge_traits::records::{
    CancellationToken, RecordPage, RecordPredicate, RecordQuery, RecordStore, RemoteRecord,
    SortOrder,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Reads a whole remote collection by following continuation cursors.
///
/// Pages are requested one at a time and buffered in memory. Any failed page
/// aborts the fetch; callers never see a partial list.
#[derive(Clone)]
pub struct RecordFetcher {
    store: Arc<dyn RecordStore>,
}

impl RecordFetcher {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Fetch every record of `category` matching `predicate`, in `sort` order.
    pub async fn fetch(
        &self,
        category: AttributeCategory,
        predicate: RecordPredicate,
        sort: SortOrder,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteRecord>> {
        let query = RecordQuery::new(category.record_type())
            .with_predicate(predicate)
            .sorted(sort);
        self.fetch_query(&query, cancel).await
    }

    /// Fetch every page of `query`.
    #[instrument(skip(self, cancel), fields(record_type = %query.record_type))]
    pub async fn fetch_query(
        &self,
        query: &RecordQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteRecord>> {
        let mut records = Vec::new();
        let mut page_number = 1usize;

        let mut page = self.page(self.store.query(query, cancel), cancel).await?;
        loop {
            let RecordPage { records: batch, cursor } = page;
            records.extend(batch);
            debug!(page = page_number, total = records.len(), "Fetched page");

            let Some(cursor) = cursor else {
                return Ok(records);
            };
            page_number += 1;
            page = self
                .page(self.store.continue_query(&cursor, cancel), cancel)
                .await?;
        }
    }

    async fn page<F>(&self, call: F, cancel: &CancellationToken) -> Result<RecordPage>
    where
        F: std::future::Future<Output = bridge_traits::error::Result<RecordPage>>,
    {
        core_async::select! {
            biased;
            _ = cancel.cancelled() => Err(SyncError::Cancelled),
            page = call => page.map_err(SyncError::from),
        }
    }
}
