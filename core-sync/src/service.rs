//! Sync service façade.
//!
//! [`SyncService`] is what hosts hold on to. Setters record changes offline;
//! getters read the remote collection; the remaining operations flush, reset,
//! or overwrite the remote private state.
//!
//! ```ignore
//! let service = SyncService::from_config(&config).await?;
//! service.set_favorite("episode-42", true);
//! service.synchronize_private_data().await?;
//! ```

use crate::accumulator::ChangeAccumulator;
use crate::batch_writer::{BatchWriter, WriteMode};
use crate::category::{AttributeCategory, AttributeValue};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::fetcher::RecordFetcher;
use crate::reconciler::Reconciler;
use crate::reporting::EventReporter;
use crate::scheduler::{SyncScheduler, TaskHandle};
use crate::snapshot;
use bridge_traits::records::{fields, CancellationToken, RecordPredicate, SortOrder};
use bridge_traits::{
    LibrarySnapshotSource, LifecycleChangeStream, LifecycleObserver, RecordStore, Subscription,
};
use chrono::{DateTime, Utc};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, FlushTrigger, SyncEvent};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, instrument, warn};

/// Offline-first user state sync engine.
///
/// Cloning is cheap and every clone drives the same engine. The background
/// watcher and lifecycle hook stop when the last clone is dropped.
#[derive(Clone)]
pub struct SyncService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    accumulator: Arc<ChangeAccumulator>,
    scheduler: Arc<SyncScheduler>,
    fetcher: RecordFetcher,
    reconciler: Reconciler,
    writer: BatchWriter,
    library: Arc<dyn LibrarySnapshotSource>,
    reporter: EventReporter,
    config: SyncConfig,
    lifecycle: Mutex<Option<TaskHandle>>,
}

impl SyncService {
    /// Build a service. Nothing runs in the background until
    /// [`start_watching`](Self::start_watching) is called.
    pub fn new(
        store: Arc<dyn RecordStore>,
        library: Arc<dyn LibrarySnapshotSource>,
        config: SyncConfig,
        event_bus: Option<EventBus>,
    ) -> Result<Self> {
        config.validate()?;

        let accumulator = Arc::new(ChangeAccumulator::new());
        let fetcher = RecordFetcher::new(Arc::clone(&store));
        let writer = BatchWriter::with_limit(store, config.write_batch_limit);
        let reporter = EventReporter::new(event_bus);
        let reconciler = Reconciler::new(fetcher.clone());
        let scheduler = Arc::new(SyncScheduler::new(
            Arc::clone(&accumulator),
            reconciler.clone(),
            writer.clone(),
            reporter.clone(),
            config.flush_interval,
        ));

        Ok(Self {
            inner: Arc::new(ServiceInner {
                accumulator,
                scheduler,
                fetcher,
                reconciler,
                writer,
                library,
                reporter,
                config,
                lifecycle: Mutex::new(None),
            }),
        })
    }

    /// Build a service from runtime configuration.
    ///
    /// Starts the change watcher when auto flush is enabled and hooks the
    /// lifecycle observer when flush-on-background is enabled.
    pub async fn from_config(config: &CoreConfig) -> Result<Self> {
        config.validate()?;
        let sync_config = SyncConfig::from(config);
        let service = Self::new(
            Arc::clone(&config.record_store),
            Arc::clone(&config.library),
            sync_config.clone(),
            config.event_bus.clone(),
        )?;

        if sync_config.auto_flush {
            service.start_watching()?;
        }
        if sync_config.flush_on_background {
            let observer = config.lifecycle_observer.clone().ok_or_else(|| {
                SyncError::Config("flush on background requires a lifecycle observer".to_string())
            })?;
            service.watch_lifecycle(observer).await?;
        }

        info!(
            container = %config.container_identifier,
            auto_flush = sync_config.auto_flush,
            flush_on_background = sync_config.flush_on_background,
            "Sync service ready"
        );
        Ok(service)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // Setters
    // ------------------------------------------------------------------

    pub fn set_favorite(&self, entity_id: impl Into<String>, is_favorite: bool) {
        self.record(entity_id, AttributeValue::Favorite(is_favorite));
    }

    pub fn set_last_played_date(&self, entity_id: impl Into<String>, played_at: DateTime<Utc>) {
        self.record(entity_id, AttributeValue::LastPlayedDate(played_at));
    }

    /// Position in seconds.
    pub fn set_last_position(&self, entity_id: impl Into<String>, position: i64) {
        self.record(entity_id, AttributeValue::LastPosition(position));
    }

    pub fn set_play_count(&self, entity_id: impl Into<String>, count: i64) {
        self.record(entity_id, AttributeValue::PlayCount(count));
    }

    pub fn set_subscription(&self, entity_id: impl Into<String>, subscription: Subscription) {
        self.record(entity_id, AttributeValue::Subscription(subscription));
    }

    fn record(&self, entity_id: impl Into<String>, value: AttributeValue) {
        self.inner.accumulator.record(entity_id, value);
    }

    /// Number of pending entries across all categories.
    pub fn pending_count(&self) -> usize {
        self.inner.accumulator.pending_count()
    }

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    /// Entity ids marked favorite remotely. Empty if the store can't be read.
    pub async fn favorites(&self) -> HashSet<String> {
        let result = self.try_favorites().await;
        self.or_empty("favorites", result)
    }

    pub async fn last_played_dates(&self) -> HashMap<String, DateTime<Utc>> {
        let result = self.try_last_played_dates().await;
        self.or_empty("last played dates", result)
    }

    pub async fn last_positions(&self) -> HashMap<String, i64> {
        let result = self.try_last_positions().await;
        self.or_empty("last positions", result)
    }

    pub async fn play_counts(&self) -> HashMap<String, i64> {
        let result = self.try_play_counts().await;
        self.or_empty("play counts", result)
    }

    pub async fn subscriptions(&self) -> HashMap<String, Subscription> {
        let result = self.try_subscriptions().await;
        self.or_empty("subscriptions", result)
    }

    pub async fn try_favorites(&self) -> Result<HashSet<String>> {
        let values = self
            .remote_values(
                AttributeCategory::Favorite,
                RecordPredicate::field_equals(fields::IS_FAVORITE, true),
            )
            .await?;
        Ok(values
            .into_iter()
            .filter(|(_, value)| matches!(value, AttributeValue::Favorite(true)))
            .map(|(entity, _)| entity)
            .collect())
    }

    pub async fn try_last_played_dates(&self) -> Result<HashMap<String, DateTime<Utc>>> {
        let values = self
            .remote_values(AttributeCategory::LastPlayedDate, RecordPredicate::All)
            .await?;
        Ok(values
            .into_iter()
            .filter_map(|(entity, value)| match value {
                AttributeValue::LastPlayedDate(date) => Some((entity, date)),
                _ => None,
            })
            .collect())
    }

    pub async fn try_last_positions(&self) -> Result<HashMap<String, i64>> {
        let values = self
            .remote_values(AttributeCategory::LastPosition, RecordPredicate::All)
            .await?;
        Ok(values
            .into_iter()
            .filter_map(|(entity, value)| match value {
                AttributeValue::LastPosition(position) => Some((entity, position)),
                _ => None,
            })
            .collect())
    }

    pub async fn try_play_counts(&self) -> Result<HashMap<String, i64>> {
        let values = self
            .remote_values(AttributeCategory::PlayCount, RecordPredicate::All)
            .await?;
        Ok(values
            .into_iter()
            .filter_map(|(entity, value)| match value {
                AttributeValue::PlayCount(count) => Some((entity, count)),
                _ => None,
            })
            .collect())
    }

    pub async fn try_subscriptions(&self) -> Result<HashMap<String, Subscription>> {
        let values = self
            .remote_values(AttributeCategory::SubscriptionState, RecordPredicate::All)
            .await?;
        Ok(values
            .into_iter()
            .filter_map(|(entity, value)| match value {
                AttributeValue::Subscription(sub) => Some((entity, sub)),
                _ => None,
            })
            .collect())
    }

    /// Remote values of `category` keyed by entity, newest record first wins.
    async fn remote_values(
        &self,
        category: AttributeCategory,
        predicate: RecordPredicate,
    ) -> Result<HashMap<String, AttributeValue>> {
        let cancel = self.inner.scheduler.operation_token();
        let records = self
            .inner
            .fetcher
            .fetch(category, predicate, SortOrder::ModificationDateDescending, &cancel)
            .await?;

        let mut values = HashMap::new();
        for record in &records {
            let Some(entity) = record.entity_id() else {
                continue;
            };
            if values.contains_key(entity) {
                continue;
            }
            match AttributeValue::from_record(category, record) {
                Some(value) => {
                    values.insert(entity.to_string(), value);
                }
                None => debug!(%category, entity, "Skipping record without a readable value"),
            }
        }
        Ok(values)
    }

    fn or_empty<T: Default>(&self, what: &str, result: Result<T>) -> T {
        result.unwrap_or_else(|err| {
            warn!(error = %err, "Failed to read remote {}, returning empty", what);
            self.inner.reporter.failure(&err);
            T::default()
        })
    }

    // ------------------------------------------------------------------
    // Sync operations
    // ------------------------------------------------------------------

    /// Flush pending changes now. Returns the number of records written.
    pub async fn synchronize_private_data(&self) -> Result<usize> {
        self.inner.scheduler.sync_private(FlushTrigger::Manual).await
    }

    /// Public data sync is not available.
    pub async fn synchronize_public_data(&self) -> Result<()> {
        Err(SyncError::Unsupported(
            "public data synchronization is not implemented".to_string(),
        ))
    }

    /// Delete every private record from the remote store.
    ///
    /// Pending changes are discarded only if the delete succeeds. Returns the
    /// number of records deleted.
    #[instrument(skip(self))]
    pub async fn reset_private_data(&self) -> Result<usize> {
        let _cycle = self.inner.scheduler.lock_cycle().await;
        let cancel = self.inner.scheduler.operation_token();
        self.reset_locked(&cancel)
            .await
            .inspect_err(|err| self.inner.reporter.failure(err))
    }

    /// Replace the remote private state with the local library snapshot.
    ///
    /// Resets first, then pushes one record per entity per private category
    /// holding a value. Subscriptions are upserted by entity id against the
    /// existing remote records, since a reset leaves them in place. Returns
    /// the number of records written.
    #[instrument(skip(self))]
    pub async fn update_from_local(&self) -> Result<usize> {
        let _cycle = self.inner.scheduler.lock_cycle().await;
        let cancel = self.inner.scheduler.operation_token();

        let result = async {
            self.reset_locked(&cancel).await?;

            let entities = self.inner.library.snapshot().await?;
            let mut records = snapshot::local_records(&entities);
            let subscriptions = snapshot::local_subscriptions(&entities);
            records.extend(
                self.inner
                    .reconciler
                    .prepare(AttributeCategory::SubscriptionState, &subscriptions, &cancel)
                    .await?,
            );
            let count = records.len();
            debug!(
                entities = entities.len(),
                subscriptions = subscriptions.len(),
                records = count,
                "Built local snapshot records"
            );

            self.inner
                .writer
                .write(records, WriteMode::Save, &cancel)
                .await?;
            Ok::<usize, SyncError>(count)
        }
        .await;

        match result {
            Ok(count) => {
                info!(records = count, "Local library pushed");
                self.inner.reporter.emit(SyncEvent::LocalPushCompleted {
                    records_written: count as u64,
                });
                Ok(count)
            }
            Err(err) => {
                self.inner.reporter.failure(&err);
                Err(err)
            }
        }
    }

    async fn reset_locked(&self, cancel: &CancellationToken) -> Result<usize> {
        let mut records = Vec::new();
        for category in AttributeCategory::PRIVATE {
            records.extend(
                self.inner
                    .fetcher
                    .fetch(category, RecordPredicate::All, SortOrder::None, cancel)
                    .await?,
            );
        }

        let count = records.len();
        self.inner
            .writer
            .write(records, WriteMode::Delete, cancel)
            .await?;
        self.inner.accumulator.clear_all();

        info!(records = count, "Private data reset");
        self.inner.reporter.emit(SyncEvent::ResetCompleted {
            records_deleted: count as u64,
        });
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Background work
    // ------------------------------------------------------------------

    /// Start the throttled change watcher.
    pub fn start_watching(&self) -> Result<()> {
        self.inner.scheduler.start_watching()
    }

    pub fn stop_watching(&self) {
        self.inner.scheduler.stop_watching();
    }

    pub fn is_watching(&self) -> bool {
        self.inner.scheduler.is_watching()
    }

    /// Flush whenever the app moves to the background or is suspended.
    ///
    /// Replaces any previously installed lifecycle hook.
    pub async fn watch_lifecycle(&self, observer: Arc<dyn LifecycleObserver>) -> Result<()> {
        let stream = observer.subscribe_changes().await?;
        let token = self.inner.scheduler.operation_token();
        let handle = core_async::task::spawn(flush_on_background(
            Arc::downgrade(&self.inner.scheduler),
            stream,
            token.clone(),
        ));

        if let Some(previous) = self.inner.lifecycle_slot().replace(TaskHandle { token, handle }) {
            previous.stop();
        }
        debug!("Lifecycle hook installed");
        Ok(())
    }
}

impl ServiceInner {
    fn lifecycle_slot(&self) -> MutexGuard<'_, Option<TaskHandle>> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        self.scheduler.stop_watching();
        if let Some(lifecycle) = self.lifecycle_slot().take() {
            lifecycle.stop();
        }
    }
}

async fn flush_on_background(
    scheduler: Weak<SyncScheduler>,
    mut stream: Box<dyn LifecycleChangeStream>,
    token: CancellationToken,
) {
    loop {
        let state = core_async::select! {
            biased;
            _ = token.cancelled() => break,
            state = stream.next() => match state {
                Some(state) => state,
                None => break,
            },
        };
        if !state.is_leaving_foreground() {
            continue;
        }

        let Some(scheduler) = scheduler.upgrade() else {
            break;
        };
        debug!(?state, "App left the foreground, flushing");
        if let Err(err) = scheduler.sync_private(FlushTrigger::Lifecycle).await {
            warn!(error = %err, "Background flush failed, keeping pending changes");
        }
    }
    debug!("Lifecycle hook exited");
}
