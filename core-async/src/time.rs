//! Time-related abstractions.
//!
//! Re-exports `tokio::time` so timers respect a paused test clock, and adds
//! [`Throttle`], the rate limiter used to coalesce bursts of sync triggers.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! # async fn example() {
//! let start = Instant::now();
//! sleep(Duration::from_millis(10)).await;
//! assert!(start.elapsed() >= Duration::from_millis(10));
//! # }
//! ```

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};
pub use tokio::time::{
    interval, sleep, sleep_until, timeout, Instant, Interval, Sleep, Timeout,
};

/// Rate limiter that lets at most one action through per `period`.
///
/// The first call to [`ready`](Throttle::ready) passes immediately. Later
/// calls wait until a full period has elapsed since the previous pass. The
/// throttle keeps no queue: callers that read their input *after* `ready`
/// returns always act on the latest value, so bursts collapse into one pass.
///
/// ```rust
/// use core_async::time::{Duration, Throttle};
///
/// # async fn example() {
/// let mut throttle = Throttle::new(Duration::from_secs(60));
/// throttle.ready().await; // immediate
/// // a second call here would wait ~60s
/// # }
/// ```
#[derive(Debug)]
pub struct Throttle {
    period: Duration,
    last_pass: Option<Instant>,
}

impl Throttle {
    /// Create a throttle that allows one pass per `period`.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_pass: None,
        }
    }

    /// Instant at which the next pass is allowed, or `None` if it is allowed now.
    pub fn next_allowed(&self) -> Option<Instant> {
        let last = self.last_pass?;
        let next = last + self.period;
        (next > Instant::now()).then_some(next)
    }

    /// Wait until a pass is allowed, then record the pass.
    pub async fn ready(&mut self) {
        if let Some(deadline) = self.next_allowed() {
            sleep_until(deadline).await;
        }
        self.last_pass = Some(Instant::now());
    }
}

/// Returns the current time as milliseconds since UNIX_EPOCH.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
