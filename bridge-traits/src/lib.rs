//! # Host Bridge Traits
//!
//! Contracts that host platforms implement for the sync engine.
//!
//! ## Overview
//!
//! The engine never talks to a concrete cloud SDK or database. It talks to
//! the traits below, and each host (desktop, iOS, Android) ships adapters
//! that wrap its native record store and library database.
//!
//! ## Traits
//!
//! ### Remote State
//! - [`RecordStore`](records::RecordStore) - Paginated, account-scoped remote record collection
//!
//! ### Local State
//! - [`LibrarySnapshotSource`](library::LibrarySnapshotSource) - Full read of the on-device library attributes
//!
//! ### Platform Integration
//! - [`LifecycleObserver`](background::LifecycleObserver) - App foreground/background transitions
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ In Progress |
//! | iOS      | TBD                 | 📋 Planned |
//! | Android  | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Record store
//! adapters must map provider failures onto
//! [`BridgeError::RecordStore`](error::BridgeError::RecordStore) with the
//! matching [`RecordStoreErrorCode`](error::RecordStoreErrorCode) so the engine
//! can tell account-level failures apart from everything else.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks.
//!
//! ## Examples
//!
//! ### Implementing RecordStore
//!
//! ```ignore
//! use async_trait::async_trait;
//! use bridge_traits::error::Result;
//! use bridge_traits::records::*;
//!
//! pub struct CloudRecordStore { /* native handle */ }
//!
//! #[async_trait]
//! impl RecordStore for CloudRecordStore {
//!     async fn query(&self, query: &RecordQuery, cancel: &CancellationToken) -> Result<RecordPage> {
//!         todo!()
//!     }
//!     // ...
//! }
//! ```

pub mod background;
pub mod error;
pub mod library;
pub mod records;
pub mod time;

pub use error::{BridgeError, RecordStoreErrorCode};

// Re-export commonly used types
pub use background::{LifecycleChangeStream, LifecycleObserver, LifecycleState};
pub use library::{LibraryEntity, LibrarySnapshotSource, Subscription};
pub use records::{
    CancellationToken, Cursor, FieldValue, RecordId, RecordPage, RecordPredicate, RecordQuery,
    RecordStore, RemoteRecord, SortOrder, MAX_RECORDS_PER_REQUEST,
};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
