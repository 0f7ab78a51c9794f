//! Synced attribute categories and their record mapping.

use bridge_traits::records::{fields, FieldValue, RemoteRecord};
use bridge_traits::Subscription;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A kind of user attribute, stored remotely as its own record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeCategory {
    Favorite,
    LastPlayedDate,
    LastPosition,
    PlayCount,
    SubscriptionState,
}

impl AttributeCategory {
    pub const ALL: [AttributeCategory; 5] = [
        Self::Favorite,
        Self::LastPlayedDate,
        Self::LastPosition,
        Self::PlayCount,
        Self::SubscriptionState,
    ];

    /// Categories stored in the user's private database.
    pub const PRIVATE: [AttributeCategory; 4] = [
        Self::Favorite,
        Self::LastPlayedDate,
        Self::LastPosition,
        Self::PlayCount,
    ];

    /// Remote record type name.
    pub fn record_type(self) -> &'static str {
        match self {
            Self::Favorite => "Favorite",
            Self::LastPlayedDate => "LastPlayedDate",
            Self::LastPosition => "LastPosition",
            Self::PlayCount => "PlayCount",
            Self::SubscriptionState => "SubscriptionState",
        }
    }

    pub fn is_private(self) -> bool {
        !matches!(self, Self::SubscriptionState)
    }
}

impl fmt::Display for AttributeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.record_type())
    }
}

/// Pending value for one entity in one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Favorite(bool),
    LastPlayedDate(DateTime<Utc>),
    /// Seconds into the item.
    LastPosition(i64),
    PlayCount(i64),
    Subscription(Subscription),
}

impl AttributeValue {
    pub fn category(&self) -> AttributeCategory {
        match self {
            Self::Favorite(_) => AttributeCategory::Favorite,
            Self::LastPlayedDate(_) => AttributeCategory::LastPlayedDate,
            Self::LastPosition(_) => AttributeCategory::LastPosition,
            Self::PlayCount(_) => AttributeCategory::PlayCount,
            Self::Subscription(_) => AttributeCategory::SubscriptionState,
        }
    }

    /// Write this value's field(s) onto `record`, leaving other fields alone.
    pub fn apply_to(&self, record: &mut RemoteRecord) {
        match self {
            Self::Favorite(v) => record.set_field(fields::IS_FAVORITE, *v),
            Self::LastPlayedDate(v) => record.set_field(fields::LAST_PLAYED_DATE, *v),
            Self::LastPosition(v) => record.set_field(fields::LAST_POSITION, *v),
            Self::PlayCount(v) => record.set_field(fields::PLAY_COUNT, *v),
            Self::Subscription(sub) => {
                record.set_field(fields::FEED_URL, sub.feed_url.as_str());
                record.set_field(fields::IS_PRIVATE, sub.is_private);
                record.set_field(fields::IS_SUBSCRIBED, sub.is_subscribed);
            }
        }
    }

    /// New unsaved record carrying `entity_id` and this value.
    pub fn to_new_record(&self, entity_id: &str) -> RemoteRecord {
        let mut record = RemoteRecord::new(self.category().record_type())
            .with_field(fields::ENTITY_ID, entity_id);
        self.apply_to(&mut record);
        record
    }

    /// Read the value of `category` back from a fetched record.
    ///
    /// Returns `None` when the record lacks the field or it has the wrong type.
    pub fn from_record(category: AttributeCategory, record: &RemoteRecord) -> Option<Self> {
        let get = |name: &str| record.field(name);
        match category {
            AttributeCategory::Favorite => get(fields::IS_FAVORITE)
                .and_then(FieldValue::as_bool)
                .map(Self::Favorite),
            AttributeCategory::LastPlayedDate => get(fields::LAST_PLAYED_DATE)
                .and_then(FieldValue::as_date)
                .map(Self::LastPlayedDate),
            AttributeCategory::LastPosition => get(fields::LAST_POSITION)
                .and_then(FieldValue::as_int)
                .map(Self::LastPosition),
            AttributeCategory::PlayCount => get(fields::PLAY_COUNT)
                .and_then(FieldValue::as_int)
                .map(Self::PlayCount),
            AttributeCategory::SubscriptionState => {
                let feed_url = get(fields::FEED_URL).and_then(FieldValue::as_text)?;
                Some(Self::Subscription(Subscription {
                    feed_url: feed_url.to_string(),
                    is_private: get(fields::IS_PRIVATE)
                        .and_then(FieldValue::as_bool)
                        .unwrap_or(false),
                    is_subscribed: get(fields::IS_SUBSCRIBED)
                        .and_then(FieldValue::as_bool)
                        .unwrap_or(false),
                }))
            }
        }
    }
}
