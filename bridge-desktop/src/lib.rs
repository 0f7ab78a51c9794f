//! # Desktop Bridge Implementations
//!
//! Default implementations of the bridge traits for desktop hosts and tests
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `RecordStore` as [`MemoryRecordStore`]: in-process record collection that
//!   honours paging, sorting, and the per-request record ceiling
//! - `LibrarySnapshotSource` as [`SqliteLibrarySnapshot`]: SQLite-backed
//!   library attribute table read through `sqlx`
//! - `LifecycleObserver` as [`DesktopLifecycleObserver`] (desktop always
//!   foreground) or [`ChannelLifecycleObserver`] (host-driven transitions)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{MemoryRecordStore, SqliteLibrarySnapshot};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryRecordStore::new("iCloud.com.example.player");
//!     let library = SqliteLibrarySnapshot::new("library.db".into()).await.unwrap();
//!
//!     // Use in core configuration
//! }
//! ```

mod background;
mod library;
mod record_store;

pub use background::{ChannelLifecycleObserver, DesktopLifecycleObserver};
pub use library::SqliteLibrarySnapshot;
pub use record_store::MemoryRecordStore;
