//! Shared mocks for unit tests.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    records::{CancellationToken, Cursor, RecordId, RecordPage, RecordQuery, RecordStore, RemoteRecord},
};
use mockall::mock;

mock! {
    pub Store {}

    #[async_trait]
    impl RecordStore for Store {
        async fn query(&self, query: &RecordQuery, cancel: &CancellationToken) -> Result<RecordPage>;
        async fn continue_query(&self, cursor: &Cursor, cancel: &CancellationToken) -> Result<RecordPage>;
        async fn save(&self, records: Vec<RemoteRecord>, cancel: &CancellationToken) -> Result<Vec<RemoteRecord>>;
        async fn delete(&self, ids: Vec<RecordId>, cancel: &CancellationToken) -> Result<()>;
        fn container_identifier(&self) -> &str;
    }
}

/// `count` favorite records for entities `e0..e{count}`.
pub fn favorites(count: usize) -> Vec<RemoteRecord> {
    use bridge_traits::records::fields;
    (0..count)
        .map(|i| {
            RemoteRecord::new("Favorite")
                .with_field(fields::ENTITY_ID, format!("e{i}"))
                .with_field(fields::IS_FAVORITE, true)
        })
        .collect()
}
