//! Lifecycle observers for desktop hosts.

use async_trait::async_trait;
use bridge_traits::{
    background::{LifecycleChangeStream, LifecycleObserver, LifecycleState},
    error::Result,
};
use core_async::sync::broadcast;
use std::sync::Mutex;
use tracing::debug;

/// Desktop lifecycle observer.
///
/// Desktop applications stay in the foreground, so the stream never emits.
#[derive(Debug, Default)]
pub struct DesktopLifecycleObserver;

impl DesktopLifecycleObserver {
    /// Create a new lifecycle observer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LifecycleObserver for DesktopLifecycleObserver {
    async fn get_state(&self) -> Result<LifecycleState> {
        Ok(LifecycleState::Foreground)
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>> {
        Ok(Box::new(DesktopLifecycleChangeStream))
    }
}

/// Desktop lifecycle change stream (never emits).
struct DesktopLifecycleChangeStream;

#[async_trait]
impl LifecycleChangeStream for DesktopLifecycleChangeStream {
    async fn next(&mut self) -> Option<LifecycleState> {
        std::future::pending::<()>().await;
        None
    }
}

/// Lifecycle observer driven by the host through [`set_state`](Self::set_state).
///
/// Used by shells that receive window or session events from their UI
/// toolkit, and by tests that simulate backgrounding.
#[derive(Debug)]
pub struct ChannelLifecycleObserver {
    state: Mutex<LifecycleState>,
    sender: broadcast::Sender<LifecycleState>,
}

impl ChannelLifecycleObserver {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(LifecycleState::Foreground),
            sender,
        }
    }

    /// Record a transition and notify subscribers.
    pub fn set_state(&self, state: LifecycleState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        let receivers = self.sender.send(state).unwrap_or(0);
        debug!(?state, receivers, "Lifecycle state changed");
    }
}

impl Default for ChannelLifecycleObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleObserver for ChannelLifecycleObserver {
    async fn get_state(&self) -> Result<LifecycleState> {
        Ok(*self.state.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>> {
        Ok(Box::new(ChannelLifecycleChangeStream {
            receiver: self.sender.subscribe(),
        }))
    }
}

struct ChannelLifecycleChangeStream {
    receiver: broadcast::Receiver<LifecycleState>,
}

#[async_trait]
impl LifecycleChangeStream for ChannelLifecycleChangeStream {
    async fn next(&mut self) -> Option<LifecycleState> {
        loop {
            match self.receiver.recv().await {
                Ok(state) => return Some(state),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Lifecycle stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_async::time::{timeout, Duration};

    #[tokio::test]
    async fn test_desktop_lifecycle_is_foreground() {
        let observer = DesktopLifecycleObserver::new();
        assert_eq!(
            observer.get_state().await.unwrap(),
            LifecycleState::Foreground
        );

        let mut stream = observer.subscribe_changes().await.unwrap();
        let next = timeout(Duration::from_millis(20), stream.next()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn test_channel_lifecycle_delivers_transitions() {
        let observer = ChannelLifecycleObserver::new();
        let mut stream = observer.subscribe_changes().await.unwrap();

        observer.set_state(LifecycleState::Background);
        observer.set_state(LifecycleState::Foreground);

        assert_eq!(stream.next().await, Some(LifecycleState::Background));
        assert_eq!(stream.next().await, Some(LifecycleState::Foreground));
        assert_eq!(
            observer.get_state().await.unwrap(),
            LifecycleState::Foreground
        );
    }

    #[tokio::test]
    async fn test_channel_lifecycle_without_subscribers() {
        let observer = ChannelLifecycleObserver::new();
        observer.set_state(LifecycleState::Suspended);
        assert_eq!(
            observer.get_state().await.unwrap(),
            LifecycleState::Suspended
        );
    }
}
