//! App Lifecycle Observation
//!
//! Lets the core react to foreground/background transitions, which is when
//! pending local changes should be pushed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Application is in the foreground and active
    Foreground,
    /// Application is in the background
    Background,
    /// Application is being suspended
    Suspended,
}

impl LifecycleState {
    /// Whether the app is leaving the foreground.
    pub fn is_leaving_foreground(self) -> bool {
        matches!(self, Self::Background | Self::Suspended)
    }
}

/// Lifecycle observer trait
///
/// Notifies the core about app lifecycle transitions so it can:
/// - Flush pending changes when backgrounded
/// - Stop timers before suspension
///
/// # Platform Support
///
/// - **iOS**: UIApplication lifecycle notifications
/// - **Android**: Activity/Application lifecycle callbacks
/// - **Desktop**: Window focus/minimize events (less critical)
///
/// # Example
///
/// ```ignore
/// use bridge_traits::background::{LifecycleObserver, LifecycleState};
///
/// async fn flush_on_background(observer: &dyn LifecycleObserver) -> Result<()> {
///     let mut stream = observer.subscribe_changes().await?;
///
///     while let Some(state) = stream.next().await {
///         if state.is_leaving_foreground() {
///             flush_pending_changes().await;
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait LifecycleObserver: Send + Sync {
    /// Get current lifecycle state
    async fn get_state(&self) -> Result<LifecycleState>;

    /// Subscribe to lifecycle state changes
    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>>;
}

/// Stream of lifecycle state changes
#[async_trait]
pub trait LifecycleChangeStream: Send {
    /// Get the next lifecycle state update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<LifecycleState>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        Observer {}

        #[async_trait]
        impl LifecycleObserver for Observer {
            async fn get_state(&self) -> Result<LifecycleState>;
            async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>>;
        }
    }

    struct VecStream(Vec<LifecycleState>);

    #[async_trait]
    impl LifecycleChangeStream for VecStream {
        async fn next(&mut self) -> Option<LifecycleState> {
            if self.0.is_empty() {
                None
            } else {
                Some(self.0.remove(0))
            }
        }
    }

    #[test]
    fn test_leaving_foreground() {
        assert!(!LifecycleState::Foreground.is_leaving_foreground());
        assert!(LifecycleState::Background.is_leaving_foreground());
        assert!(LifecycleState::Suspended.is_leaving_foreground());
    }

    #[tokio::test]
    async fn test_observer_stream_drains_in_order() {
        let mut observer = MockObserver::new();
        observer
            .expect_subscribe_changes()
            .times(1)
            .returning(|| {
                let stream = VecStream(vec![LifecycleState::Background, LifecycleState::Foreground]);
                Ok(Box::new(stream) as Box<dyn LifecycleChangeStream>)
            });

        let mut stream = observer.subscribe_changes().await.unwrap();
        assert_eq!(stream.next().await, Some(LifecycleState::Background));
        assert_eq!(stream.next().await, Some(LifecycleState::Foreground));
        assert_eq!(stream.next().await, None);
    }
}
