//! Offline change accumulator.
//!
//! Setters record the latest value per entity and category without touching
//! the network. A flush cycle snapshots the pending state, pushes it, and
//! clears every category on success.

use crate::category::{AttributeCategory, AttributeValue};
use core_async::sync::watch;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::trace;

type CategoryMap = HashMap<AttributeCategory, HashMap<String, AttributeValue>>;

/// Copy of the pending state taken at the start of a cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingChanges {
    entries: CategoryMap,
}

impl PendingChanges {
    /// Pending values of `category`, keyed by entity id.
    pub fn for_category(&self, category: AttributeCategory) -> Option<&HashMap<String, AttributeValue>> {
        self.entries.get(&category).filter(|m| !m.is_empty())
    }

    /// Categories with at least one pending entry, in declaration order.
    pub fn non_empty_categories(&self) -> Vec<AttributeCategory> {
        AttributeCategory::ALL
            .into_iter()
            .filter(|c| self.for_category(*c).is_some())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(HashMap::is_empty)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }
}

/// Mutex-guarded pending changes for all five categories.
///
/// Every write publishes the written category on a `watch` channel, which
/// the scheduler uses as its trigger.
#[derive(Debug)]
pub struct ChangeAccumulator {
    pending: Mutex<CategoryMap>,
    changed: watch::Sender<Option<AttributeCategory>>,
}

impl Default for ChangeAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeAccumulator {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(None);
        Self {
            pending: Mutex::new(HashMap::new()),
            changed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CategoryMap> {
        // Writers never leave the map half-updated, so a poisoned lock is still usable.
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record `value` for `entity_id`, replacing any earlier pending value.
    pub fn record(&self, entity_id: impl Into<String>, value: AttributeValue) {
        let category = value.category();
        let entity_id = entity_id.into();
        trace!(%category, entity_id = %entity_id, "Recording pending change");

        self.lock()
            .entry(category)
            .or_default()
            .insert(entity_id, value);
        self.changed.send_replace(Some(category));
    }

    /// Whether `category` has no pending entries.
    pub fn is_empty(&self, category: AttributeCategory) -> bool {
        self.lock().get(&category).map_or(true, HashMap::is_empty)
    }

    pub fn has_pending(&self) -> bool {
        self.lock().values().any(|m| !m.is_empty())
    }

    /// Total pending entries across all categories.
    pub fn pending_count(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    pub fn snapshot(&self) -> PendingChanges {
        PendingChanges {
            entries: self.lock().clone(),
        }
    }

    /// Empty every category.
    pub fn clear_all(&self) {
        self.lock().clear();
    }

    /// Receiver notified with the category of every write.
    pub fn subscribe(&self) -> watch::Receiver<Option<AttributeCategory>> {
        self.changed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_last_write_wins() {
        let acc = ChangeAccumulator::new();
        acc.record("a", AttributeValue::Favorite(true));
        acc.record("a", AttributeValue::Favorite(false));

        let snapshot = acc.snapshot();
        let favorites = snapshot.for_category(AttributeCategory::Favorite).unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites["a"], AttributeValue::Favorite(false));
    }

    #[test]
    fn test_categories_are_independent() {
        let acc = ChangeAccumulator::new();
        acc.record("a", AttributeValue::PlayCount(2));
        acc.record("a", AttributeValue::LastPlayedDate(Utc::now()));

        assert!(!acc.is_empty(AttributeCategory::PlayCount));
        assert!(!acc.is_empty(AttributeCategory::LastPlayedDate));
        assert!(acc.is_empty(AttributeCategory::Favorite));
        assert_eq!(acc.pending_count(), 2);
        assert_eq!(
            acc.snapshot().non_empty_categories(),
            vec![AttributeCategory::LastPlayedDate, AttributeCategory::PlayCount]
        );
    }

    #[test]
    fn test_clear_all_empties_every_category() {
        let acc = ChangeAccumulator::new();
        acc.record("a", AttributeValue::Favorite(true));
        acc.record("b", AttributeValue::LastPosition(30));

        acc.clear_all();

        assert!(!acc.has_pending());
        assert!(AttributeCategory::ALL.iter().all(|c| acc.is_empty(*c)));
        assert!(acc.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let acc = ChangeAccumulator::new();
        acc.record("a", AttributeValue::Favorite(true));
        let snapshot = acc.snapshot();

        acc.record("b", AttributeValue::Favorite(true));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(acc.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_writes_signal_watchers() {
        let acc = ChangeAccumulator::new();
        let mut rx = acc.subscribe();

        acc.record("a", AttributeValue::PlayCount(1));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(AttributeCategory::PlayCount));

        acc.record("a", AttributeValue::Favorite(true));
        acc.record("b", AttributeValue::LastPosition(5));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(AttributeCategory::LastPosition));
    }
}
