//! In-memory record store

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, RecordStoreErrorCode, Result},
    records::{
        CancellationToken, Cursor, RecordId, RecordPage, RecordQuery, RecordStore, RemoteRecord,
        SortOrder, MAX_RECORDS_PER_REQUEST,
    },
    time::{Clock, SystemClock},
};
use core_async::time::{sleep, Duration};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: usize = 100;

/// Open cursors kept before the oldest is evicted.
pub const MAX_OPEN_CURSORS: usize = 64;

/// In-process [`RecordStore`] for desktop development and tests.
///
/// Behaves like a hosted record database:
/// - queries are paged, with the remainder held behind an opaque cursor
/// - saves are upserts keyed by [`RecordId`] and stamp the modification date
///   from the injected [`Clock`]
/// - save and delete reject more than [`MAX_RECORDS_PER_REQUEST`] items with
///   `LimitExceeded`
/// - at most [`MAX_OPEN_CURSORS`] cursors stay open; the oldest is dropped
///   first, and a cursor whose continuation is cancelled is dropped at once
///
/// Faults can be scripted per operation, and every call is counted so tests
/// can assert on batch sizes.
pub struct MemoryRecordStore {
    container: String,
    clock: Arc<dyn Clock>,
    page_size: usize,
    latency: Option<Duration>,
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    records: HashMap<RecordId, StoredRecord>,
    next_seq: u64,
    open_cursors: HashMap<String, OpenCursor>,
    next_cursor_seq: u64,
    faults: Faults,
    calls: CallLog,
}

struct StoredRecord {
    seq: u64,
    record: RemoteRecord,
}

/// Rest of a paged query, served with the page size it started with.
struct OpenCursor {
    seq: u64,
    page_size: usize,
    remaining: VecDeque<RemoteRecord>,
}

#[derive(Default)]
struct Faults {
    query: Option<ScriptedFault>,
    save: Option<ScriptedFault>,
    delete: Option<ScriptedFault>,
}

/// Fail the call after `remaining` successful ones.
struct ScriptedFault {
    remaining: usize,
    code: RecordStoreErrorCode,
}

#[derive(Default, Clone)]
struct CallLog {
    queries: usize,
    save_batches: Vec<usize>,
    delete_batches: Vec<usize>,
}

impl Faults {
    fn take(slot: &mut Option<ScriptedFault>) -> Option<BridgeError> {
        let fault = slot.as_mut()?;
        if fault.remaining > 0 {
            fault.remaining -= 1;
            return None;
        }
        let code = fault.code;
        *slot = None;
        Some(BridgeError::record_store(code, "injected failure"))
    }
}

impl MemoryRecordStore {
    pub fn new(container: impl Into<String>) -> Self {
        Self::with_clock(container, Arc::new(SystemClock))
    }

    pub fn with_clock(container: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            container: container.into(),
            clock,
            page_size: DEFAULT_PAGE_SIZE,
            latency: None,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Default page size for queries that don't request one.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Delay every call, which makes cancellation observable in tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert records as-is, bypassing limits and fault scripts.
    ///
    /// Records without a modification date are stamped with the clock.
    pub fn seed(&self, records: impl IntoIterator<Item = RemoteRecord>) {
        let now = self.clock.now();
        let mut state = self.lock();
        for mut record in records {
            record.modification_date.get_or_insert(now);
            state.upsert(record);
        }
    }

    /// Every stored record of `record_type`, in insertion order.
    pub fn records_of_type(&self, record_type: &str) -> Vec<RemoteRecord> {
        let state = self.lock();
        let mut stored: Vec<&StoredRecord> = state
            .records
            .values()
            .filter(|s| s.record.record_type == record_type)
            .collect();
        stored.sort_by_key(|s| s.seq);
        stored.into_iter().map(|s| s.record.clone()).collect()
    }

    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }

    pub fn fail_next_query(&self, code: RecordStoreErrorCode) {
        self.fail_query_after(0, code);
    }

    /// Let `successes` query/continue calls through, then fail the next one.
    pub fn fail_query_after(&self, successes: usize, code: RecordStoreErrorCode) {
        self.lock().faults.query = Some(ScriptedFault {
            remaining: successes,
            code,
        });
    }

    pub fn fail_next_save(&self, code: RecordStoreErrorCode) {
        self.fail_save_after(0, code);
    }

    /// Let `successes` save calls through, then fail the next one.
    pub fn fail_save_after(&self, successes: usize, code: RecordStoreErrorCode) {
        self.lock().faults.save = Some(ScriptedFault {
            remaining: successes,
            code,
        });
    }

    pub fn fail_next_delete(&self, code: RecordStoreErrorCode) {
        self.lock().faults.delete = Some(ScriptedFault { remaining: 0, code });
    }

    /// Number of `query` plus `continue_query` calls.
    pub fn query_calls(&self) -> usize {
        self.lock().calls.queries
    }

    /// Size of each accepted or rejected save call, in call order.
    pub fn save_batches(&self) -> Vec<usize> {
        self.lock().calls.save_batches.clone()
    }

    /// Cursors handed out and not yet drained, cancelled, or evicted.
    pub fn open_cursor_count(&self) -> usize {
        self.lock().open_cursors.len()
    }

    /// Size of each delete call, in call order.
    pub fn delete_batches(&self) -> Vec<usize> {
        self.lock().calls.delete_batches.clone()
    }

    async fn simulate_latency(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        if let Some(latency) = self.latency {
            core_async::select! {
                _ = cancel.cancelled() => return Err(BridgeError::Cancelled),
                _ = sleep(latency) => {}
            }
        }
        Ok(())
    }

    fn check_limit(count: usize) -> Result<()> {
        if count > MAX_RECORDS_PER_REQUEST {
            return Err(BridgeError::record_store(
                RecordStoreErrorCode::LimitExceeded,
                format!(
                    "{} items exceeds the limit of {} per request",
                    count, MAX_RECORDS_PER_REQUEST
                ),
            ));
        }
        Ok(())
    }
}

impl StoreState {
    fn upsert(&mut self, record: RemoteRecord) {
        let seq = match self.records.get(&record.id) {
            Some(existing) => existing.seq,
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };
        self.records
            .insert(record.id.clone(), StoredRecord { seq, record });
    }

    fn page_from(
        &mut self,
        mut remaining: VecDeque<RemoteRecord>,
        page_size: usize,
    ) -> RecordPage {
        let take = page_size.min(remaining.len());
        let records: Vec<RemoteRecord> = remaining.drain(..take).collect();
        let cursor = if remaining.is_empty() {
            None
        } else {
            if self.open_cursors.len() >= MAX_OPEN_CURSORS {
                self.evict_oldest_cursor();
            }
            self.next_cursor_seq += 1;
            let token = Uuid::new_v4().to_string();
            self.open_cursors.insert(
                token.clone(),
                OpenCursor {
                    seq: self.next_cursor_seq,
                    page_size,
                    remaining,
                },
            );
            Some(Cursor::new(token))
        };
        RecordPage { records, cursor }
    }

    fn evict_oldest_cursor(&mut self) {
        let oldest = self
            .open_cursors
            .iter()
            .min_by_key(|(_, open)| open.seq)
            .map(|(token, _)| token.clone());
        if let Some(token) = oldest {
            self.open_cursors.remove(&token);
            debug!(cursor = %token, "Evicted abandoned cursor");
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn query(&self, query: &RecordQuery, cancel: &CancellationToken) -> Result<RecordPage> {
        self.simulate_latency(cancel).await?;

        let mut state = self.lock();
        state.calls.queries += 1;
        if let Some(err) = Faults::take(&mut state.faults.query) {
            return Err(err);
        }

        let mut matches: Vec<&StoredRecord> = state
            .records
            .values()
            .filter(|s| s.record.record_type == query.record_type)
            .filter(|s| query.predicate.matches(&s.record))
            .collect();

        match query.sort {
            SortOrder::None => matches.sort_by_key(|s| s.seq),
            SortOrder::ModificationDateAscending => {
                matches.sort_by_key(|s| (s.record.modification_date, s.seq))
            }
            SortOrder::ModificationDateDescending => matches.sort_by(|a, b| {
                (b.record.modification_date, b.seq).cmp(&(a.record.modification_date, a.seq))
            }),
        }

        let remaining: VecDeque<RemoteRecord> =
            matches.into_iter().map(|s| s.record.clone()).collect();
        let page_size = query.page_size.unwrap_or(self.page_size).max(1);
        let page = state.page_from(remaining, page_size);

        debug!(
            record_type = %query.record_type,
            returned = page.records.len(),
            has_more = page.cursor.is_some(),
            "Served query page"
        );
        Ok(page)
    }

    async fn continue_query(
        &self,
        cursor: &Cursor,
        cancel: &CancellationToken,
    ) -> Result<RecordPage> {
        if let Err(err) = self.simulate_latency(cancel).await {
            // The caller has given up on this fetch.
            self.lock().open_cursors.remove(cursor.as_str());
            return Err(err);
        }

        let mut state = self.lock();
        state.calls.queries += 1;
        if let Some(err) = Faults::take(&mut state.faults.query) {
            return Err(err);
        }

        let open = state.open_cursors.remove(cursor.as_str()).ok_or_else(|| {
            BridgeError::record_store(
                RecordStoreErrorCode::Other,
                format!("Unknown cursor: {}", cursor.as_str()),
            )
        })?;
        Ok(state.page_from(open.remaining, open.page_size))
    }

    async fn save(
        &self,
        records: Vec<RemoteRecord>,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteRecord>> {
        self.lock().calls.save_batches.push(records.len());
        Self::check_limit(records.len())?;
        self.simulate_latency(cancel).await?;

        let now = self.clock.now();
        let mut state = self.lock();
        if let Some(err) = Faults::take(&mut state.faults.save) {
            return Err(err);
        }

        let saved: Vec<RemoteRecord> = records
            .into_iter()
            .map(|mut record| {
                record.modification_date = Some(now);
                state.upsert(record.clone());
                record
            })
            .collect();

        debug!(count = saved.len(), "Saved records");
        Ok(saved)
    }

    async fn delete(&self, ids: Vec<RecordId>, cancel: &CancellationToken) -> Result<()> {
        self.lock().calls.delete_batches.push(ids.len());
        Self::check_limit(ids.len())?;
        self.simulate_latency(cancel).await?;

        let mut state = self.lock();
        if let Some(err) = Faults::take(&mut state.faults.delete) {
            return Err(err);
        }

        let removed = ids
            .iter()
            .filter(|id| state.records.remove(*id).is_some())
            .count();
        debug!(requested = ids.len(), removed, "Deleted records");
        Ok(())
    }

    fn container_identifier(&self) -> &str {
        &self.container
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::records::{fields, RecordPredicate};
    use bridge_traits::time::FixedClock;
    use chrono::{DateTime, Utc};

    fn fixed_clock() -> Arc<FixedClock> {
        let start = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        Arc::new(FixedClock::new(start))
    }

    fn favorite(entity: &str) -> RemoteRecord {
        RemoteRecord::new("Favorite")
            .with_field(fields::ENTITY_ID, entity)
            .with_field(fields::IS_FAVORITE, true)
    }

    async fn drain(store: &MemoryRecordStore, query: &RecordQuery) -> Vec<RemoteRecord> {
        let cancel = CancellationToken::new();
        let mut page = store.query(query, &cancel).await.unwrap();
        let mut all = std::mem::take(&mut page.records);
        while let Some(cursor) = page.cursor.take() {
            page = store.continue_query(&cursor, &cancel).await.unwrap();
            all.append(&mut page.records);
        }
        all
    }

    #[tokio::test]
    async fn test_save_stamps_modification_date() {
        let clock = fixed_clock();
        let store = MemoryRecordStore::with_clock("container", clock.clone());

        let saved = store
            .save(vec![favorite("a")], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(saved[0].modification_date, Some(clock.now()));
        assert_eq!(store.records_of_type("Favorite"), saved);
        assert_eq!(store.save_batches(), vec![1]);
    }

    #[tokio::test]
    async fn test_query_pages_through_cursor() {
        let store = MemoryRecordStore::new("container").with_page_size(2);
        store.seed((0..5).map(|i| favorite(&format!("e{i}"))));

        let cancel = CancellationToken::new();
        let first = store
            .query(&RecordQuery::new("Favorite"), &cancel)
            .await
            .unwrap();
        assert_eq!(first.records.len(), 2);
        assert!(first.cursor.is_some());

        let all = drain(&store, &RecordQuery::new("Favorite")).await;
        let ids: Vec<_> = all.iter().filter_map(|r| r.entity_id()).collect();
        assert_eq!(ids, vec!["e0", "e1", "e2", "e3", "e4"]);
    }

    #[tokio::test]
    async fn test_query_sorts_by_modification_date_descending() {
        let clock = fixed_clock();
        let store = MemoryRecordStore::with_clock("container", clock.clone());
        let cancel = CancellationToken::new();

        store.save(vec![favorite("old")], &cancel).await.unwrap();
        clock.advance(chrono::Duration::seconds(10));
        store.save(vec![favorite("new")], &cancel).await.unwrap();

        let query =
            RecordQuery::new("Favorite").sorted(SortOrder::ModificationDateDescending);
        let all = drain(&store, &query).await;
        let ids: Vec<_> = all.iter().filter_map(|r| r.entity_id()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_query_filters_by_type_and_predicate() {
        let store = MemoryRecordStore::new("container");
        store.seed(vec![
            favorite("a"),
            RemoteRecord::new("Favorite")
                .with_field(fields::ENTITY_ID, "b")
                .with_field(fields::IS_FAVORITE, false),
            RemoteRecord::new("PlayCount").with_field(fields::ENTITY_ID, "a"),
        ]);

        let query = RecordQuery::new("Favorite")
            .with_predicate(RecordPredicate::field_equals(fields::IS_FAVORITE, true));
        let all = drain(&store, &query).await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].entity_id(), Some("a"));
    }

    #[tokio::test]
    async fn test_save_over_limit_is_rejected() {
        let store = MemoryRecordStore::new("container");
        let records: Vec<_> = (0..=MAX_RECORDS_PER_REQUEST)
            .map(|i| favorite(&i.to_string()))
            .collect();

        let err = store
            .save(records, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.record_store_code(),
            Some(RecordStoreErrorCode::LimitExceeded)
        );
        assert_eq!(store.record_count(), 0);
    }

    #[tokio::test]
    async fn test_scripted_save_fault() {
        let store = MemoryRecordStore::new("container");
        let cancel = CancellationToken::new();
        store.fail_save_after(1, RecordStoreErrorCode::NetworkFailure);

        store.save(vec![favorite("a")], &cancel).await.unwrap();
        let err = store.save(vec![favorite("b")], &cancel).await.unwrap_err();
        assert_eq!(
            err.record_store_code(),
            Some(RecordStoreErrorCode::NetworkFailure)
        );
        store.save(vec![favorite("c")], &cancel).await.unwrap();
        assert_eq!(store.record_count(), 2);
    }

    #[tokio::test]
    async fn test_delete_removes_records() {
        let store = MemoryRecordStore::new("container");
        let record = favorite("a");
        let id = record.id.clone();
        store.seed(vec![record, favorite("b")]);

        store
            .delete(vec![id, RecordId::new("missing")], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(store.record_count(), 1);
        assert_eq!(store.delete_batches(), vec![2]);
    }

    #[tokio::test]
    async fn test_unknown_cursor_fails() {
        let store = MemoryRecordStore::new("container");
        let result = store
            .continue_query(&Cursor::new("nope"), &CancellationToken::new())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_latency() {
        let store = MemoryRecordStore::new("container").with_latency(Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        core_async::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = store
            .query(&RecordQuery::new("Favorite"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Cancelled));
    }

    #[tokio::test]
    async fn test_continuation_keeps_requested_page_size() {
        let store = MemoryRecordStore::new("container").with_page_size(2);
        store.seed((0..7).map(|i| favorite(&format!("e{i}"))));
        let cancel = CancellationToken::new();

        let query = RecordQuery::new("Favorite").with_page_size(3);
        let first = store.query(&query, &cancel).await.unwrap();
        let second = store
            .continue_query(first.cursor.as_ref().unwrap(), &cancel)
            .await
            .unwrap();
        let third = store
            .continue_query(second.cursor.as_ref().unwrap(), &cancel)
            .await
            .unwrap();

        assert_eq!(first.records.len(), 3);
        assert_eq!(second.records.len(), 3);
        assert_eq!(third.records.len(), 1);
        assert!(third.cursor.is_none());
        assert_eq!(store.open_cursor_count(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_cursors_are_capped() {
        let store = MemoryRecordStore::new("container").with_page_size(1);
        store.seed(vec![favorite("a"), favorite("b")]);
        let cancel = CancellationToken::new();
        let query = RecordQuery::new("Favorite");

        let oldest = store.query(&query, &cancel).await.unwrap().cursor.unwrap();
        for _ in 0..MAX_OPEN_CURSORS {
            store.query(&query, &cancel).await.unwrap();
        }

        assert_eq!(store.open_cursor_count(), MAX_OPEN_CURSORS);
        let err = store.continue_query(&oldest, &cancel).await.unwrap_err();
        assert_eq!(err.record_store_code(), Some(RecordStoreErrorCode::Other));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_continuation_drops_cursor() {
        let store = MemoryRecordStore::new("container")
            .with_page_size(1)
            .with_latency(Duration::from_secs(5));
        store.seed(vec![favorite("a"), favorite("b")]);
        let cancel = CancellationToken::new();

        let first = store
            .query(&RecordQuery::new("Favorite"), &cancel)
            .await
            .unwrap();
        assert_eq!(store.open_cursor_count(), 1);

        let trigger = cancel.clone();
        core_async::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let err = store
            .continue_query(first.cursor.as_ref().unwrap(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::Cancelled));
        assert_eq!(store.open_cursor_count(), 0);
    }

    #[test]
    fn test_container_identifier() {
        let store = MemoryRecordStore::new("iCloud.com.example");
        assert_eq!(store.container_identifier(), "iCloud.com.example");
    }
}
