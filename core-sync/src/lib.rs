//! # Sync Engine
//!
//! Offline-first synchronization of user state (favorites, last played
//! dates, playback positions, play counts, and feed subscriptions) with an
//! account-scoped remote record store.
//!
//! ## Overview
//!
//! Local mutations are accumulated without touching the network and pushed
//! in throttled flush cycles. Each cycle merges pending values into the
//! existing remote records by `entityID`, so concurrent updates from other
//! devices are not clobbered, and writes in chunks under the store's
//! per-call ceiling.
//!
//! ## Components
//!
//! - **Categories** (`category`): attribute kinds and their record mapping
//! - **Change Accumulator** (`accumulator`): mutex-guarded pending changes
//! - **Fetcher** (`fetcher`): cursor-following paginated reads
//! - **Batch Writer** (`batch_writer`): concurrent chunked saves and deletes
//! - **Reconciler** (`reconciler`): merge pending values into fetched records
//! - **Scheduler** (`scheduler`): throttled flush cycles
//! - **Sync Service** (`service`): the façade hosts use

pub mod accumulator;
pub mod batch_writer;
pub mod category;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod reconciler;
pub mod reporting;
pub mod scheduler;
pub mod service;
pub mod snapshot;

#[cfg(test)]
mod test_support;

pub use accumulator::{ChangeAccumulator, PendingChanges};
pub use batch_writer::{BatchWriter, WriteMode};
pub use category::{AttributeCategory, AttributeValue};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use fetcher::RecordFetcher;
pub use reconciler::Reconciler;
pub use reporting::EventReporter;
pub use scheduler::SyncScheduler;
pub use service::SyncService;
