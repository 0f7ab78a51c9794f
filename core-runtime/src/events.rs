//! # Event Bus System
//!
//! Broadcasts sync engine activity to the host using `tokio::sync::broadcast`.
//! The UI layer subscribes to render sync status and to prompt the user when
//! their account needs attention.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for each domain
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ SyncService  ├──────────────>│           │     subscribe    ┌────────────┐
//! └──────────────┘               │ EventBus  ├─────────────────>│  Host UI   │
//! ┌──────────────┐     emit      │ (broadcast│                  └────────────┘
//! │ Error mapper ├──────────────>│  channel) │
//! └──────────────┘               └───────────┘
//! ```
//!
//! ## Usage
//!
//! ### Publishing Events
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, SyncEvent};
//!
//! let event_bus = EventBus::new(100);
//! let event = CoreEvent::Sync(SyncEvent::FlushCompleted {
//!     records_written: 3,
//!     duration_ms: 120,
//! });
//!
//! // No subscribers yet, so this returns Err; publishers ignore it.
//! event_bus.emit(event).ok();
//! ```
//!
//! ### Subscribing to Events
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, RecvError};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! tokio::spawn(async move {
//!     loop {
//!         match stream.recv().await {
//!             Ok(CoreEvent::Account(event)) => println!("Account: {:?}", event),
//!             Ok(_) => {}
//!             Err(RecvError::Lagged(n)) => eprintln!("Missed {} events", n),
//!             Err(RecvError::Closed) => break,
//!         }
//!     }
//! });
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Sync Events
//! - `FlushStarted`: A flush cycle began
//! - `FlushCompleted`: Pending changes were pushed and cleared
//! - `FlushFailed`: A flush cycle failed; pending changes are kept
//! - `ResetCompleted`: All private records were deleted
//! - `LocalPushCompleted`: The local library was pushed as authoritative
//!
//! ### Account Events
//! - `Unavailable`: The record store rejected the account (signed out or
//!   temporarily unavailable)
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Non-fatal; the subscriber keeps receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. Treat as shutdown.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Sync engine activity
    Sync(SyncEvent),
    /// Account state reported by the record store
    Account(AccountEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Account(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Account(AccountEvent::Unavailable { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::FlushFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::FlushCompleted { .. })
            | CoreEvent::Sync(SyncEvent::ResetCompleted { .. })
            | CoreEvent::Sync(SyncEvent::LocalPushCompleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// What started a flush cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Throttled trigger from the change watcher
    Scheduled,
    /// Explicit `synchronize_private_data` call
    Manual,
    /// App moved to the background
    Lifecycle,
}

/// Events emitted by the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A flush cycle began.
    FlushStarted {
        trigger: FlushTrigger,
        /// Record type names with pending changes.
        categories: Vec<String>,
    },
    /// Pending changes were written and the accumulators cleared.
    FlushCompleted {
        records_written: u64,
        duration_ms: u64,
    },
    /// A flush cycle failed. Pending changes are retained for the next cycle.
    FlushFailed {
        message: String,
        /// Whether the failure was classified as an account problem.
        account_unavailable: bool,
    },
    /// Every private record was deleted from the remote store.
    ResetCompleted { records_deleted: u64 },
    /// The local library snapshot was written as the new remote state.
    LocalPushCompleted { records_written: u64 },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::FlushStarted { .. } => "Flush started",
            SyncEvent::FlushCompleted { .. } => "Flush completed",
            SyncEvent::FlushFailed { .. } => "Flush failed",
            SyncEvent::ResetCompleted { .. } => "Private data reset",
            SyncEvent::LocalPushCompleted { .. } => "Local library pushed",
        }
    }
}

// ============================================================================
// Account Events
// ============================================================================

/// Events about the user's record store account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AccountEvent {
    /// The account is signed out or temporarily unavailable.
    ///
    /// Hosts should surface an actionable message (for example, "sign in to
    /// sync your library").
    Unavailable {
        /// Provider message from the failing call.
        message: String,
    },
}

impl AccountEvent {
    fn description(&self) -> &str {
        match self {
            AccountEvent::Unavailable { .. } => "Account unavailable",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for broadcasting events to multiple subscribers.
///
/// Cloning an `EventBus` shares the same underlying channel.
///
/// ```rust
/// use core_runtime::events::EventBus;
///
/// let bus = EventBus::new(16);
/// let _rx = bus.subscribe();
/// assert_eq!(bus.subscriber_count(), 1);
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with [`DEFAULT_EVENT_BUFFER_SIZE`].
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates an independent receiver for all future events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver wrapper that skips events rejected by a filter.
///
/// ```no_run
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// # #[tokio::main]
/// # async fn main() {
/// let bus = EventBus::new(100);
/// let mut account_events = EventStream::new(bus.subscribe())
///     .filter(|e| matches!(e, CoreEvent::Account(_)));
///
/// while let Ok(event) = account_events.recv().await {
///     println!("{}", event.description());
/// }
/// # }
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }

    /// Waits for the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns the next buffered event that passes the filter, if any.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn flush_completed(records_written: u64) -> CoreEvent {
        CoreEvent::Sync(SyncEvent::FlushCompleted {
            records_written,
            duration_ms: 5,
        })
    }

    fn account_unavailable() -> CoreEvent {
        CoreEvent::Account(AccountEvent::Unavailable {
            message: "not signed in".to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(flush_completed(1)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Sync(SyncEvent::FlushStarted {
            trigger: FlushTrigger::Manual,
            categories: vec!["Favorite".to_string()],
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Account(_)));

        bus.emit(flush_completed(2)).ok();
        bus.emit(account_unavailable()).ok();

        assert_eq!(stream.recv().await.unwrap(), account_unavailable());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(flush_completed(i)).ok();
        }

        let result = sub.recv().await;
        assert!(matches!(result, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(account_unavailable().severity(), EventSeverity::Error);
        assert_eq!(
            CoreEvent::Sync(SyncEvent::FlushFailed {
                message: "network".to_string(),
                account_unavailable: false,
            })
            .severity(),
            EventSeverity::Warning
        );
        assert_eq!(flush_completed(3).severity(), EventSeverity::Info);
        assert_eq!(
            CoreEvent::Sync(SyncEvent::FlushStarted {
                trigger: FlushTrigger::Scheduled,
                categories: vec![],
            })
            .severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_event_description() {
        assert_eq!(account_unavailable().description(), "Account unavailable");
        assert_eq!(
            CoreEvent::Sync(SyncEvent::ResetCompleted { records_deleted: 4 }).description(),
            "Private data reset"
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Sync(SyncEvent::LocalPushCompleted { records_written: 7 });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Sync");
        assert_eq!(json["payload"]["event"], "LocalPushCompleted");
        assert_eq!(json["payload"]["records_written"], 7);

        let deserialized: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[tokio::test]
    async fn test_try_recv_skips_filtered_events() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|e| matches!(e, CoreEvent::Sync(_)));

        assert!(stream.try_recv().is_none());

        bus.emit(account_unavailable()).ok();
        bus.emit(flush_completed(9)).ok();

        let received = stream.try_recv().unwrap().unwrap();
        assert_eq!(received, flush_completed(9));
        assert!(stream.try_recv().is_none());
    }
}
