//! Local Library Snapshot
//!
//! Read-only view of the on-device library attributes the sync engine pushes
//! when the local store is declared authoritative.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Subscription state of a feed-like entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub feed_url: String,
    pub is_private: bool,
    pub is_subscribed: bool,
}

impl Subscription {
    pub fn new(feed_url: impl Into<String>, is_private: bool, is_subscribed: bool) -> Self {
        Self {
            feed_url: feed_url.into(),
            is_private,
            is_subscribed,
        }
    }
}

/// One entity of the local library with its user attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LibraryEntity {
    pub id: String,
    pub is_favorite: bool,
    pub last_played_at: Option<DateTime<Utc>>,
    /// Playback position in seconds.
    pub last_position: i64,
    pub play_count: i64,
    pub subscription: Option<Subscription>,
}

impl LibraryEntity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Local library snapshot source
///
/// Implemented by the host's library database. The engine only needs a full
/// read; it never queries or writes the local store.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::library::LibrarySnapshotSource;
///
/// async fn favorites(source: &dyn LibrarySnapshotSource) -> Result<usize> {
///     let entities = source.snapshot().await?;
///     Ok(entities.iter().filter(|e| e.is_favorite).count())
/// }
/// ```
#[async_trait]
pub trait LibrarySnapshotSource: Send + Sync {
    /// Read every entity in the local library.
    async fn snapshot(&self) -> Result<Vec<LibraryEntity>>;
}
