//! Runtime utilities that abstract over the underlying async executor.
//!
//! Downstream crates use these instead of building Tokio runtimes by hand,
//! e.g. when a synchronous `tracing` layer needs to drive an async sink.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a throwaway current-thread runtime.
///
/// Panics if the runtime cannot be built, which only happens when the process
/// is out of OS resources.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}

/// Returns `true` when called from inside a Tokio runtime context.
pub fn in_runtime() -> bool {
    Handle::try_current().is_ok()
}
