//! Records built from the local library snapshot.
//!
//! Used by `update_from_local`, which replaces the remote private state with
//! what the device currently holds. Subscriptions are public and survive a
//! reset, so they are returned as a pending map for the reconciler instead
//! of as new records.

use crate::category::{AttributeCategory, AttributeValue};
use bridge_traits::{LibraryEntity, RemoteRecord};
use std::collections::HashMap;

/// The value `entity` contributes to `category`, if any.
///
/// Only meaningful values are pushed: favorites that are set, a last-played
/// date that exists, positive positions and play counts, and any subscription.
pub fn local_value(entity: &LibraryEntity, category: AttributeCategory) -> Option<AttributeValue> {
    match category {
        AttributeCategory::Favorite => entity.is_favorite.then_some(AttributeValue::Favorite(true)),
        AttributeCategory::LastPlayedDate => {
            entity.last_played_at.map(AttributeValue::LastPlayedDate)
        }
        AttributeCategory::LastPosition => {
            (entity.last_position > 0).then_some(AttributeValue::LastPosition(entity.last_position))
        }
        AttributeCategory::PlayCount => {
            (entity.play_count > 0).then_some(AttributeValue::PlayCount(entity.play_count))
        }
        AttributeCategory::SubscriptionState => {
            entity.subscription.clone().map(AttributeValue::Subscription)
        }
    }
}

/// One new record per entity per private category where the entity has a value.
pub fn local_records(entities: &[LibraryEntity]) -> Vec<RemoteRecord> {
    AttributeCategory::PRIVATE
        .into_iter()
        .flat_map(|category| {
            entities.iter().filter_map(move |entity| {
                local_value(entity, category).map(|value| value.to_new_record(&entity.id))
            })
        })
        .collect()
}

/// Subscription values keyed by entity id, ready for entityID matching.
pub fn local_subscriptions(entities: &[LibraryEntity]) -> HashMap<String, AttributeValue> {
    entities
        .iter()
        .filter_map(|entity| {
            local_value(entity, AttributeCategory::SubscriptionState)
                .map(|value| (entity.id.clone(), value))
        })
        .collect()
}
