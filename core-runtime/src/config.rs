//! # Core Configuration Module
//!
//! Provides configuration management for the sync engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding every bridge and tunable the engine needs. It validates eagerly so
//! a host finds out about a missing capability at startup, not on the first
//! flush.
//!
//! ## Required Dependencies
//!
//! - `RecordStore` - Remote record collection the engine syncs with
//! - `LibrarySnapshotSource` - Local library read used by `update_from_local`
//! - Container identifier - Must match the record store's container
//!
//! ## Optional Dependencies
//!
//! - `LifecycleObserver` - App lifecycle (desktop default: always foreground)
//! - `EventBus` - Where sync and account events are published
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .container_identifier("iCloud.com.example.player")
//!     .record_store(Arc::new(MyRecordStore))
//!     .library(Arc::new(MyLibrary))
//!     .flush_interval(Duration::from_secs(30))
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Missing record store and library
//! let config = CoreConfig::builder()
//!     .container_identifier("iCloud.com.example.player")
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use crate::events::EventBus;
use bridge_traits::{LibrarySnapshotSource, LifecycleObserver, RecordStore, MAX_RECORDS_PER_REQUEST};
use std::sync::Arc;
use std::time::Duration;

/// Default spacing between throttled flush cycles.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

/// Default number of records per save/delete call.
pub const DEFAULT_WRITE_BATCH_LIMIT: usize = MAX_RECORDS_PER_REQUEST;

/// Core configuration for the sync engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Record store container this engine is bound to
    pub container_identifier: String,

    /// Remote record store (required)
    pub record_store: Arc<dyn RecordStore>,

    /// Local library snapshot reader (required)
    pub library: Arc<dyn LibrarySnapshotSource>,

    /// App lifecycle observer (optional)
    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,

    /// Event bus for sync and account events (optional)
    pub event_bus: Option<EventBus>,

    /// Minimum spacing between throttled flush cycles
    pub flush_interval: Duration,

    /// Maximum records per save/delete call
    pub write_batch_limit: usize,

    /// Feature flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("container_identifier", &self.container_identifier)
            .field("record_store", &"RecordStore { ... }")
            .field("library", &"LibrarySnapshotSource { ... }")
            .field(
                "lifecycle_observer",
                &self
                    .lifecycle_observer
                    .as_ref()
                    .map(|_| "LifecycleObserver { ... }"),
            )
            .field("event_bus", &self.event_bus)
            .field("flush_interval", &self.flush_interval)
            .field("write_batch_limit", &self.write_batch_limit)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional engine behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Start the change watcher as soon as the service is built
    pub enable_auto_flush: bool,

    /// Flush when the app leaves the foreground (requires LifecycleObserver)
    pub enable_flush_on_background: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_auto_flush: true,
            enable_flush_on_background: false,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The container identifier is not empty and matches the record store
    /// - The flush interval is non-zero
    /// - The write batch limit is within `1..=400`
    /// - Feature flags are consistent with available bridges
    pub fn validate(&self) -> Result<()> {
        if self.container_identifier.trim().is_empty() {
            return Err(Error::Config(
                "Container identifier cannot be empty".to_string(),
            ));
        }

        let store_container = self.record_store.container_identifier();
        if store_container != self.container_identifier {
            return Err(Error::Config(format!(
                "Record store is bound to container '{}' but configuration expects '{}'",
                store_container, self.container_identifier
            )));
        }

        if self.flush_interval.is_zero() {
            return Err(Error::Config(
                "Flush interval must be greater than 0".to_string(),
            ));
        }

        if self.write_batch_limit == 0 {
            return Err(Error::Config(
                "Write batch limit must be at least 1".to_string(),
            ));
        }

        if self.write_batch_limit > MAX_RECORDS_PER_REQUEST {
            return Err(Error::Config(format!(
                "Write batch limit {} exceeds the record store maximum of {}",
                self.write_batch_limit, MAX_RECORDS_PER_REQUEST
            )));
        }

        if self.features.enable_flush_on_background && self.lifecycle_observer.is_none() {
            return Err(Error::Config(
                "Flush on background enabled but no LifecycleObserver provided. \
                 Disable the feature or inject a LifecycleObserver implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn record_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "RecordStore".to_string(),
        message: "RecordStore implementation is required to sync user state. \
                 Apple platforms: inject the CloudKit-backed store. \
                 Android: inject the account record service adapter. \
                 Desktop/tests: use bridge_desktop::MemoryRecordStore."
            .to_string(),
    }
}

fn library_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "LibrarySnapshotSource".to_string(),
        message: "LibrarySnapshotSource implementation is required to push local state. \
                 Inject an adapter over the host library database \
                 (desktop: bridge_desktop::SqliteLibrarySnapshot)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_lifecycle_observer() -> Option<Arc<dyn LifecycleObserver>> {
    use bridge_desktop::DesktopLifecycleObserver;

    let observer: Arc<dyn LifecycleObserver> = Arc::new(DesktopLifecycleObserver::new());
    Some(observer)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_lifecycle_observer() -> Option<Arc<dyn LifecycleObserver>> {
    None
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) to validate and create the
/// final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    container_identifier: Option<String>,
    record_store: Option<Arc<dyn RecordStore>>,
    library: Option<Arc<dyn LibrarySnapshotSource>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    event_bus: Option<EventBus>,
    flush_interval: Option<Duration>,
    write_batch_limit: Option<usize>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the record store container identifier (required).
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .container_identifier("iCloud.com.example.player");
    /// ```
    pub fn container_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.container_identifier = Some(identifier.into());
        self
    }

    /// Sets the remote record store (required).
    pub fn record_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.record_store = Some(store);
        self
    }

    /// Sets the local library snapshot source (required).
    pub fn library(mut self, library: Arc<dyn LibrarySnapshotSource>) -> Self {
        self.library = Some(library);
        self
    }

    /// Sets the lifecycle observer (optional).
    ///
    /// With the `desktop-shims` feature an always-foreground observer is used
    /// when none is provided.
    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    /// Sets the event bus (optional).
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Sets the minimum spacing between throttled flush cycles.
    ///
    /// Default: 60 seconds
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    /// Sets the maximum records per save/delete call.
    ///
    /// Default: 400, which is also the maximum.
    pub fn write_batch_limit(mut self, limit: usize) -> Self {
        self.write_batch_limit = Some(limit);
        self
    }

    /// Enables or disables starting the change watcher on construction.
    ///
    /// Default: true
    pub fn enable_auto_flush(mut self, enabled: bool) -> Self {
        self.features.enable_auto_flush = enabled;
        self
    }

    /// Enables or disables flushing when the app is backgrounded.
    ///
    /// Requires a `LifecycleObserver`.
    ///
    /// Default: false
    pub fn enable_flush_on_background(mut self, enabled: bool) -> Self {
        self.features.enable_flush_on_background = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if:
    /// - The container identifier is missing or invalid
    /// - Required bridges are missing (RecordStore, LibrarySnapshotSource)
    /// - Tunables are out of range
    /// - Feature flags are inconsistent with available bridges
    pub fn build(self) -> Result<CoreConfig> {
        let container_identifier = self.container_identifier.ok_or_else(|| {
            Error::Config(
                "Container identifier is required. Use .container_identifier() to set it."
                    .to_string(),
            )
        })?;

        let record_store = self.record_store.ok_or_else(record_store_missing_error)?;
        let library = self.library.ok_or_else(library_missing_error)?;

        let config = CoreConfig {
            container_identifier,
            record_store,
            library,
            lifecycle_observer: self
                .lifecycle_observer
                .or_else(provide_default_lifecycle_observer),
            event_bus: self.event_bus,
            flush_interval: self.flush_interval.unwrap_or(DEFAULT_FLUSH_INTERVAL),
            write_batch_limit: self.write_batch_limit.unwrap_or(DEFAULT_WRITE_BATCH_LIMIT),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        CancellationToken, Cursor, LibraryEntity, LifecycleChangeStream, LifecycleState,
        RecordId, RecordPage, RecordQuery, RemoteRecord,
    };

    const CONTAINER: &str = "iCloud.com.example.player";

    struct StubRecordStore {
        container: String,
    }

    #[async_trait]
    impl RecordStore for StubRecordStore {
        async fn query(
            &self,
            _query: &RecordQuery,
            _cancel: &CancellationToken,
        ) -> BridgeResult<RecordPage> {
            Ok(RecordPage::default())
        }

        async fn continue_query(
            &self,
            _cursor: &Cursor,
            _cancel: &CancellationToken,
        ) -> BridgeResult<RecordPage> {
            Ok(RecordPage::default())
        }

        async fn save(
            &self,
            records: Vec<RemoteRecord>,
            _cancel: &CancellationToken,
        ) -> BridgeResult<Vec<RemoteRecord>> {
            Ok(records)
        }

        async fn delete(
            &self,
            _ids: Vec<RecordId>,
            _cancel: &CancellationToken,
        ) -> BridgeResult<()> {
            Ok(())
        }

        fn container_identifier(&self) -> &str {
            &self.container
        }
    }

    struct StubLibrary;

    #[async_trait]
    impl LibrarySnapshotSource for StubLibrary {
        async fn snapshot(&self) -> BridgeResult<Vec<LibraryEntity>> {
            Ok(Vec::new())
        }
    }

    struct StubObserver;

    #[async_trait]
    impl LifecycleObserver for StubObserver {
        async fn get_state(&self) -> BridgeResult<LifecycleState> {
            Ok(LifecycleState::Foreground)
        }

        async fn subscribe_changes(&self) -> BridgeResult<Box<dyn LifecycleChangeStream>> {
            Err(bridge_traits::BridgeError::NotAvailable("stub".into()))
        }
    }

    fn store(container: &str) -> Arc<dyn RecordStore> {
        Arc::new(StubRecordStore {
            container: container.to_string(),
        })
    }

    fn base_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .container_identifier(CONTAINER)
            .record_store(store(CONTAINER))
            .library(Arc::new(StubLibrary))
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let config = base_builder().build().unwrap();

        assert_eq!(config.container_identifier, CONTAINER);
        assert_eq!(config.flush_interval, Duration::from_secs(60));
        assert_eq!(config.write_batch_limit, 400);
        assert!(config.event_bus.is_none());
        assert!(config.features.enable_auto_flush);
        assert!(!config.features.enable_flush_on_background);
    }

    #[test]
    fn test_builder_requires_container_identifier() {
        let result = CoreConfig::builder()
            .record_store(store(CONTAINER))
            .library(Arc::new(StubLibrary))
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_requires_record_store() {
        let result = CoreConfig::builder()
            .container_identifier(CONTAINER)
            .library(Arc::new(StubLibrary))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "RecordStore")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_requires_library() {
        let result = CoreConfig::builder()
            .container_identifier(CONTAINER)
            .record_store(store(CONTAINER))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "LibrarySnapshotSource")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_empty_container() {
        let result = CoreConfig::builder()
            .container_identifier("  ")
            .record_store(store("  "))
            .library(Arc::new(StubLibrary))
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_mismatched_container() {
        let result = CoreConfig::builder()
            .container_identifier(CONTAINER)
            .record_store(store("iCloud.com.other"))
            .library(Arc::new(StubLibrary))
            .build();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("iCloud.com.other"));
    }

    #[test]
    fn test_validate_rejects_zero_flush_interval() {
        let result = base_builder().flush_interval(Duration::ZERO).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_write_batch_limit_bounds() {
        assert!(matches!(
            base_builder().write_batch_limit(0).build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            base_builder().write_batch_limit(401).build(),
            Err(Error::Config(_))
        ));

        let config = base_builder().write_batch_limit(1).build().unwrap();
        assert_eq!(config.write_batch_limit, 1);
        let config = base_builder().write_batch_limit(400).build().unwrap();
        assert_eq!(config.write_batch_limit, 400);
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_flush_on_background_requires_observer() {
        let result = base_builder().enable_flush_on_background(true).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_default_lifecycle_observer() {
        let config = base_builder().enable_flush_on_background(true).build().unwrap();
        assert!(config.lifecycle_observer.is_some());
    }

    #[test]
    fn test_flush_on_background_with_observer() {
        let config = base_builder()
            .lifecycle_observer(Arc::new(StubObserver))
            .enable_flush_on_background(true)
            .build()
            .unwrap();

        assert!(config.features.enable_flush_on_background);
        assert!(config.lifecycle_observer.is_some());
    }

    #[test]
    fn test_builder_with_event_bus_and_flags() {
        let bus = EventBus::new(8);
        let _rx = bus.subscribe();
        let config = base_builder()
            .event_bus(bus)
            .features(FeatureFlags {
                enable_auto_flush: false,
                enable_flush_on_background: false,
            })
            .flush_interval(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(config.event_bus.as_ref().unwrap().subscriber_count(), 1);
        assert!(!config.features.enable_auto_flush);
        assert_eq!(config.flush_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_config_is_cloneable_and_debuggable() {
        let config = base_builder().build().unwrap();
        let cloned = config.clone();
        assert_eq!(cloned.container_identifier, config.container_identifier);

        let debug = format!("{:?}", config);
        assert!(debug.contains("RecordStore { ... }"));
    }
}
