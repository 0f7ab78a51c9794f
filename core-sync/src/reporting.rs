//! Event bus reporting for sync outcomes.

use crate::error::SyncError;
use core_runtime::events::{AccountEvent, CoreEvent, EventBus, SyncEvent};
use tracing::trace;

/// Publishes sync and account events when an event bus is configured.
#[derive(Debug, Clone, Default)]
pub struct EventReporter {
    bus: Option<EventBus>,
}

impl EventReporter {
    pub fn new(bus: Option<EventBus>) -> Self {
        Self { bus }
    }

    pub fn emit(&self, event: SyncEvent) {
        self.publish(CoreEvent::Sync(event));
    }

    /// Report `err`, adding an account event when the account is the cause.
    pub fn failure(&self, err: &SyncError) {
        if err.is_account_unavailable() {
            self.publish(CoreEvent::Account(AccountEvent::Unavailable {
                message: err.to_string(),
            }));
        }
    }

    fn publish(&self, event: CoreEvent) {
        let Some(bus) = &self.bus else {
            return;
        };
        // No subscribers is not an error.
        if bus.emit(event).is_err() {
            trace!("No event subscribers");
        }
    }
}
