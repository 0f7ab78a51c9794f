//! Async runtime layer for the Playstate sync core.
//!
//! Every core-* and bridge-* crate reaches the executor through this crate
//! instead of depending on Tokio directly, so the runtime choice lives in one
//! place.
//!
//! # Modules
//!
//! - `runtime`: blocking entry points for synchronous callers
//! - `sync`: locks, channels and cooperative cancellation
//! - `task`: task spawning and task groups
//! - `time`: sleeps, timeouts and the trigger [`Throttle`](time::Throttle)
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example(token: CancellationToken) {
//!     core_async::task::spawn(async move {
//!         core_async::select! {
//!             _ = token.cancelled() => {}
//!             _ = sleep(Duration::from_secs(1)) => {}
//!         }
//!     });
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use tokio::{join, select};
pub use time::{sleep, Duration, Instant};
