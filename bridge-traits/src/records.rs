//! Remote Record Store Abstractions
//!
//! Types and the async trait for an account-scoped, paginated key-record
//! collection (the platform cloud database).

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use core_async::sync::CancellationToken;

use crate::error::Result;

/// Hard ceiling on the number of records a single save or delete call may carry.
pub const MAX_RECORDS_PER_REQUEST: usize = 400;

/// Well-known field names shared by every synced record type.
pub mod fields {
    pub const ENTITY_ID: &str = "entityID";
    pub const IS_FAVORITE: &str = "isFavorite";
    pub const LAST_PLAYED_DATE: &str = "lastPlayedDate";
    pub const LAST_POSITION: &str = "lastPosition";
    pub const PLAY_COUNT: &str = "playCount";
    pub const FEED_URL: &str = "feedURL";
    pub const IS_PRIVATE: &str = "isPrivate";
    pub const IS_SUBSCRIBED: &str = "isSubscribed";
}

/// Opaque store-assigned record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh identifier for a record that has not been saved yet.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed field value stored on a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Date(DateTime<Utc>),
    Text(String),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A record in the remote store.
///
/// Records are matched to local entities by their `entityID` field, never by
/// [`RecordId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub record_type: String,
    pub id: RecordId,
    pub fields: HashMap<String, FieldValue>,
    /// Set by the store on save; `None` for records not yet saved.
    pub modification_date: Option<DateTime<Utc>>,
}

impl RemoteRecord {
    /// New unsaved record with a generated id.
    pub fn new(record_type: impl Into<String>) -> Self {
        Self::with_id(record_type, RecordId::generate())
    }

    pub fn with_id(record_type: impl Into<String>, id: RecordId) -> Self {
        Self {
            record_type: record_type.into(),
            id,
            fields: HashMap::new(),
            modification_date: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set_field(name, value);
        self
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.field(fields::ENTITY_ID).and_then(FieldValue::as_text)
    }
}

/// Opaque continuation token for the next page of a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Filter applied to a query.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RecordPredicate {
    #[default]
    All,
    FieldEquals { field: String, value: FieldValue },
}

impl RecordPredicate {
    pub fn field_equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &RemoteRecord) -> bool {
        match self {
            Self::All => true,
            Self::FieldEquals { field, value } => record.field(field) == Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    None,
    ModificationDateAscending,
    ModificationDateDescending,
}

/// Query over a single record type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub record_type: String,
    pub predicate: RecordPredicate,
    pub sort: SortOrder,
    /// Preferred page size; the store may use its own default when `None`.
    pub page_size: Option<usize>,
}

impl RecordQuery {
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            predicate: RecordPredicate::All,
            sort: SortOrder::None,
            page_size: None,
        }
    }

    pub fn with_predicate(mut self, predicate: RecordPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn sorted(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// One page of query results. `cursor == None` marks the final page.
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    pub records: Vec<RemoteRecord>,
    pub cursor: Option<Cursor>,
}

impl RecordPage {
    pub fn is_last(&self) -> bool {
        self.cursor.is_none()
    }
}

/// Remote record store trait
///
/// Abstracts the account-scoped cloud database of each platform:
/// - **iOS/macOS**: CloudKit private/public databases
/// - **Android**: Backend record service behind the account SDK
/// - **Desktop/tests**: In-memory store (`bridge-desktop`)
///
/// # Contract
///
/// - `save` and `delete` accept at most [`MAX_RECORDS_PER_REQUEST`] items and
///   fail with `LimitExceeded` above that.
/// - `save` is an upsert keyed by [`RecordId`] and returns the stored records.
/// - Every call observes `cancel`; a cancelled call returns
///   [`BridgeError::Cancelled`](crate::error::BridgeError::Cancelled).
/// - Account problems surface as `NotAuthenticated` or
///   `AccountTemporarilyUnavailable` record store codes.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::records::{RecordQuery, RecordStore, CancellationToken};
///
/// async fn first_page(store: &dyn RecordStore) -> Result<()> {
///     let page = store
///         .query(&RecordQuery::new("Favorite"), &CancellationToken::new())
///         .await?;
///     println!("{} records, more: {}", page.records.len(), !page.is_last());
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Run a query and return its first page.
    async fn query(&self, query: &RecordQuery, cancel: &CancellationToken) -> Result<RecordPage>;

    /// Fetch the page following `cursor`.
    async fn continue_query(&self, cursor: &Cursor, cancel: &CancellationToken)
        -> Result<RecordPage>;

    /// Upsert records.
    async fn save(
        &self,
        records: Vec<RemoteRecord>,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteRecord>>;

    /// Delete records by id. Unknown ids are ignored.
    async fn delete(&self, ids: Vec<RecordId>, cancel: &CancellationToken) -> Result<()>;

    /// Identifier of the container this store is bound to.
    fn container_identifier(&self) -> &str;
}
