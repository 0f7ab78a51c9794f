//! Merges pending changes into the remote collection.

use crate::category::{AttributeCategory, AttributeValue};
use crate::error::Result;
use crate::fetcher::RecordFetcher;
use bridge_traits::records::{CancellationToken, RecordPredicate, RemoteRecord, SortOrder};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Turns one category's pending map into the records to save.
///
/// Existing remote records are matched by their `entityID` field and updated
/// in place so their opaque id is kept. The fetch is sorted newest first, so
/// when duplicates exist the most recently modified one is the merge target.
#[derive(Clone)]
pub struct Reconciler {
    fetcher: RecordFetcher,
}

impl Reconciler {
    pub fn new(fetcher: RecordFetcher) -> Self {
        Self { fetcher }
    }

    #[instrument(skip(self, pending, cancel), fields(%category, pending = pending.len()))]
    pub async fn prepare(
        &self,
        category: AttributeCategory,
        pending: &HashMap<String, AttributeValue>,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteRecord>> {
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let mut existing = self
            .fetcher
            .fetch(
                category,
                RecordPredicate::All,
                SortOrder::ModificationDateDescending,
                cancel,
            )
            .await?;

        let mut by_entity: HashMap<String, usize> = HashMap::new();
        for (index, record) in existing.iter().enumerate() {
            if let Some(entity) = record.entity_id() {
                by_entity.entry(entity.to_string()).or_insert(index);
            }
        }

        let mut entity_ids: Vec<&String> = pending.keys().collect();
        entity_ids.sort();

        let mut touched: Vec<usize> = Vec::new();
        let mut created = Vec::new();
        for entity in entity_ids {
            let value = &pending[entity];
            match by_entity.get(entity.as_str()) {
                Some(&index) => {
                    value.apply_to(&mut existing[index]);
                    if !touched.contains(&index) {
                        touched.push(index);
                    }
                }
                None => created.push(value.to_new_record(entity)),
            }
        }

        debug!(
            updated = touched.len(),
            created = created.len(),
            fetched = existing.len(),
            "Reconciled category"
        );

        let mut slots: Vec<Option<RemoteRecord>> = existing.into_iter().map(Some).collect();
        let mut prepared: Vec<RemoteRecord> = touched
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect();
        prepared.extend(created);
        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockStore;
    use bridge_traits::records::{fields, FieldValue, RecordId, RecordPage};
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    fn reconciler(existing: Vec<RemoteRecord>) -> Reconciler {
        let mut store = MockStore::new();
        store
            .expect_query()
            .withf(|q, _| q.sort == SortOrder::ModificationDateDescending)
            .returning(move |_, _| {
                Ok(RecordPage {
                    records: existing.clone(),
                    cursor: None,
                })
            });
        Reconciler::new(RecordFetcher::new(Arc::new(store)))
    }

    fn pending(entries: &[(&str, AttributeValue)]) -> HashMap<String, AttributeValue> {
        entries
            .iter()
            .map(|(id, v)| (id.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_pending_skips_fetch() {
        let mut store = MockStore::new();
        store.expect_query().never();
        let reconciler = Reconciler::new(RecordFetcher::new(Arc::new(store)));

        let prepared = reconciler
            .prepare(
                AttributeCategory::Favorite,
                &HashMap::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(prepared.is_empty());
    }

    #[tokio::test]
    async fn test_existing_record_is_reused_and_new_ones_created() {
        let existing = RemoteRecord::with_id("Favorite", RecordId::new("remote-a"))
            .with_field(fields::ENTITY_ID, "A")
            .with_field(fields::IS_FAVORITE, false);
        let reconciler = reconciler(vec![existing]);

        let prepared = reconciler
            .prepare(
                AttributeCategory::Favorite,
                &pending(&[
                    ("A", AttributeValue::Favorite(true)),
                    ("B", AttributeValue::Favorite(true)),
                    ("C", AttributeValue::Favorite(true)),
                ]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(prepared.len(), 3);
        assert_eq!(prepared[0].id, RecordId::new("remote-a"));
        assert_eq!(prepared[0].field(fields::IS_FAVORITE), Some(&FieldValue::Bool(true)));
        assert_eq!(prepared[1].entity_id(), Some("B"));
        assert_eq!(prepared[2].entity_id(), Some("C"));
        assert_ne!(prepared[1].id, prepared[2].id);
        assert!(prepared[1..].iter().all(|r| r.modification_date.is_none()));
    }

    #[tokio::test]
    async fn test_most_recent_duplicate_is_merge_target() {
        let newer = DateTime::<Utc>::from_timestamp(2_000, 0).unwrap();
        let older = DateTime::<Utc>::from_timestamp(1_000, 0).unwrap();
        let mut newest = RemoteRecord::with_id("PlayCount", RecordId::new("new"))
            .with_field(fields::ENTITY_ID, "A")
            .with_field(fields::PLAY_COUNT, 4i64);
        newest.modification_date = Some(newer);
        let mut stale = RemoteRecord::with_id("PlayCount", RecordId::new("old"))
            .with_field(fields::ENTITY_ID, "A")
            .with_field(fields::PLAY_COUNT, 2i64);
        stale.modification_date = Some(older);

        let reconciler = reconciler(vec![newest, stale]);
        let prepared = reconciler
            .prepare(
                AttributeCategory::PlayCount,
                &pending(&[("A", AttributeValue::PlayCount(5))]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].id, RecordId::new("new"));
        assert_eq!(prepared[0].field(fields::PLAY_COUNT), Some(&FieldValue::Int(5)));
    }

    #[tokio::test]
    async fn test_unrelated_fields_are_preserved() {
        let existing = RemoteRecord::with_id("LastPosition", RecordId::new("r1"))
            .with_field(fields::ENTITY_ID, "ep")
            .with_field(fields::LAST_POSITION, 10i64)
            .with_field("deviceName", "tablet");
        let reconciler = reconciler(vec![existing]);

        let prepared = reconciler
            .prepare(
                AttributeCategory::LastPosition,
                &pending(&[("ep", AttributeValue::LastPosition(95))]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(prepared[0].field(fields::LAST_POSITION), Some(&FieldValue::Int(95)));
        assert_eq!(
            prepared[0].field("deviceName"),
            Some(&FieldValue::Text("tablet".into()))
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        use bridge_traits::error::{BridgeError, RecordStoreErrorCode};

        let mut store = MockStore::new();
        store.expect_query().returning(|_, _| {
            Err(BridgeError::record_store(
                RecordStoreErrorCode::ServiceUnavailable,
                "maintenance",
            ))
        });
        let reconciler = Reconciler::new(RecordFetcher::new(Arc::new(store)));

        let result = reconciler
            .prepare(
                AttributeCategory::Favorite,
                &pending(&[("A", AttributeValue::Favorite(true))]),
                &CancellationToken::new(),
            )
            .await;
        assert!(result.is_err());
    }
}
