//! Synchronization primitives.
//!
//! Async-aware locks and channels from `tokio::sync`, plus the
//! [`CancellationToken`] used to cancel in-flight remote calls.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{watch, CancellationToken};
//!
//! # async fn example() {
//! let (tx, mut rx) = watch::channel(0u64);
//! tx.send_replace(1);
//! rx.changed().await.unwrap();
//! assert_eq!(*rx.borrow_and_update(), 1);
//!
//! let parent = CancellationToken::new();
//! let child = parent.child_token();
//! parent.cancel();
//! assert!(child.is_cancelled());
//! # }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore,
};

pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
