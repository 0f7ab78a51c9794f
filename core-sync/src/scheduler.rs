//! Throttled flush scheduling.
//!
//! The scheduler watches the accumulator's change signal and runs a flush
//! cycle at most once per interval. Triggers that arrive while a cycle is
//! throttled collapse into the next cycle, which always reads the latest
//! pending state.
//!
//! A flush cycle:
//! 1. snapshots the pending changes
//! 2. reconciles each private category that has entries
//! 3. saves the combined record list through the batch writer
//! 4. clears every category on success, or leaves them intact on failure

use crate::accumulator::ChangeAccumulator;
use crate::batch_writer::{BatchWriter, WriteMode};
use crate::category::AttributeCategory;
use crate::error::{Result, SyncError};
use crate::reconciler::Reconciler;
use crate::reporting::EventReporter;
use core_async::sync::{watch, CancellationToken, Mutex, MutexGuard};
use core_async::task::JoinHandle;
use core_async::time::{Duration, Instant, Throttle};
use core_runtime::events::{FlushTrigger, SyncEvent};
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, warn};

/// Handle to a background task stopped through its token.
pub(crate) struct TaskHandle {
    pub(crate) token: CancellationToken,
    pub(crate) handle: JoinHandle<()>,
}

impl TaskHandle {
    pub(crate) fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }

    pub(crate) fn stop(self) {
        self.token.cancel();
    }
}

pub struct SyncScheduler {
    accumulator: Arc<ChangeAccumulator>,
    reconciler: Reconciler,
    writer: BatchWriter,
    reporter: EventReporter,
    interval: Duration,
    /// Serializes flush, reset, and local push cycles.
    cycle_lock: Mutex<()>,
    watcher: std::sync::Mutex<Option<TaskHandle>>,
    shutdown: CancellationToken,
}

impl SyncScheduler {
    pub fn new(
        accumulator: Arc<ChangeAccumulator>,
        reconciler: Reconciler,
        writer: BatchWriter,
        reporter: EventReporter,
        interval: Duration,
    ) -> Self {
        Self {
            accumulator,
            reconciler,
            writer,
            reporter,
            interval,
            cycle_lock: Mutex::new(()),
            watcher: std::sync::Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the background watcher. Calling it while already watching is a no-op.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_watching(self: &Arc<Self>) -> Result<()> {
        if !core_async::runtime::in_runtime() {
            return Err(SyncError::Config(
                "start_watching must be called from within a Tokio runtime".to_string(),
            ));
        }

        let mut watcher = self.watcher_slot();
        if watcher.as_ref().is_some_and(TaskHandle::is_running) {
            debug!("Change watcher already running");
            return Ok(());
        }

        let mut changes = self.accumulator.subscribe();
        if self.accumulator.has_pending() {
            // Changes recorded before the watcher existed still need a flush.
            changes.mark_changed();
        }

        let token = self.shutdown.child_token();
        let handle = core_async::task::spawn(watch_changes(
            Arc::downgrade(self),
            changes,
            token.clone(),
            self.interval,
        ));
        *watcher = Some(TaskHandle { token, handle });
        info!(interval_secs = self.interval.as_secs(), "Change watcher started");
        Ok(())
    }

    /// Stop the background watcher. Pending changes are kept.
    pub fn stop_watching(&self) {
        if let Some(watcher) = self.watcher_slot().take() {
            watcher.stop();
            info!("Change watcher stopped");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher_slot()
            .as_ref()
            .is_some_and(TaskHandle::is_running)
    }

    /// Run one flush cycle now, bypassing the throttle.
    ///
    /// Returns the number of records written. Waits for any cycle already in
    /// progress to finish first.
    #[instrument(skip(self))]
    pub async fn sync_private(&self, trigger: FlushTrigger) -> Result<usize> {
        let _cycle = self.lock_cycle().await;
        self.flush_locked(trigger).await
    }

    pub(crate) async fn lock_cycle(&self) -> MutexGuard<'_, ()> {
        self.cycle_lock.lock().await
    }

    /// Token for one remote operation, cancelled when the scheduler shuts down.
    pub(crate) fn operation_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    async fn flush_locked(&self, trigger: FlushTrigger) -> Result<usize> {
        let pending = self.accumulator.snapshot();
        if pending.is_empty() {
            debug!("Nothing pending, skipping flush");
            return Ok(0);
        }

        let categories: Vec<AttributeCategory> = pending
            .non_empty_categories()
            .into_iter()
            .filter(|c| c.is_private())
            .collect();
        info!(?trigger, ?categories, pending = pending.len(), "Flush cycle started");
        self.reporter.emit(SyncEvent::FlushStarted {
            trigger,
            categories: categories.iter().map(ToString::to_string).collect(),
        });

        let started = Instant::now();
        let cancel = self.operation_token();
        let outcome = async {
            let mut records = Vec::new();
            for category in &categories {
                if let Some(entries) = pending.for_category(*category) {
                    records.extend(self.reconciler.prepare(*category, entries, &cancel).await?);
                }
            }
            let count = records.len();
            self.writer.write(records, WriteMode::Save, &cancel).await?;
            Ok::<usize, SyncError>(count)
        }
        .await;

        match outcome {
            Ok(count) => {
                self.accumulator.clear_all();
                let duration_ms = started.elapsed().as_millis() as u64;
                info!(records = count, duration_ms, "Flush cycle completed");
                self.reporter.emit(SyncEvent::FlushCompleted {
                    records_written: count as u64,
                    duration_ms,
                });
                Ok(count)
            }
            Err(err) => {
                self.reporter.emit(SyncEvent::FlushFailed {
                    message: err.to_string(),
                    account_unavailable: err.is_account_unavailable(),
                });
                self.reporter.failure(&err);
                Err(err)
            }
        }
    }

    fn watcher_slot(&self) -> std::sync::MutexGuard<'_, Option<TaskHandle>> {
        self.watcher.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Watcher loop: wait for a change, wait for the throttle, flush.
///
/// Holds only a weak reference so the scheduler can be dropped while the
/// task is parked.
async fn watch_changes(
    scheduler: Weak<SyncScheduler>,
    mut changes: watch::Receiver<Option<AttributeCategory>>,
    token: CancellationToken,
    interval: Duration,
) {
    let mut throttle = Throttle::new(interval);
    loop {
        core_async::select! {
            biased;
            _ = token.cancelled() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        core_async::select! {
            biased;
            _ = token.cancelled() => break,
            _ = throttle.ready() => {}
        }
        // Everything signalled while throttled is covered by this cycle.
        let latest = *changes.borrow_and_update();

        let Some(scheduler) = scheduler.upgrade() else {
            break;
        };
        debug!(?latest, "Throttled flush triggered");
        core_async::select! {
            biased;
            _ = token.cancelled() => break,
            result = scheduler.sync_private(FlushTrigger::Scheduled) => {
                if let Err(err) = result {
                    warn!(error = %err, "Scheduled flush failed, keeping pending changes");
                }
            }
        }
    }
    debug!("Change watcher exited");
}
