//! Sync engine walkthrough against the desktop bridges.
//!
//! Run with:
//! ```bash
//! # Pretty format (default)
//! cargo run -p core-sync --example sync_demo
//!
//! # JSON format with a custom filter
//! cargo run -p core-sync --example sync_demo -- json "core_sync=trace"
//! ```

use bridge_desktop::{MemoryRecordStore, SqliteLibrarySnapshot};
use bridge_traits::records::{fields, RemoteRecord};
use bridge_traits::time::LogLevel;
use bridge_traits::LibraryEntity;
use chrono::Utc;
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_sync::SyncService;
use std::env;
use std::sync::Arc;
use tracing::{info, warn};

const CONTAINER: &str = "iCloud.com.example.player";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        _ => LogFormat::Pretty,
    };

    let mut logging = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Debug)
        .with_pii_redaction(true);
    if let Some(filter) = args.get(2) {
        logging = logging.with_filter(filter.clone());
    }
    init_logging(logging)?;

    // Another device already favorited episode-1.
    let store = Arc::new(MemoryRecordStore::new(CONTAINER).with_page_size(2));
    store.seed([RemoteRecord::new("Favorite")
        .with_field(fields::ENTITY_ID, "episode-1")
        .with_field(fields::IS_FAVORITE, true)]);

    let library = SqliteLibrarySnapshot::in_memory().await?;
    let mut entity = LibraryEntity::new("episode-2");
    entity.play_count = 3;
    entity.last_played_at = Some(Utc::now());
    library.upsert(&entity).await?;

    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let events_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(severity = ?event.severity(), "{}: {:?}", event.description(), event);
        }
    });

    let config = CoreConfig::builder()
        .container_identifier(CONTAINER)
        .record_store(store.clone())
        .library(Arc::new(library))
        .event_bus(bus)
        .enable_auto_flush(false)
        .build()?;
    let service = SyncService::from_config(&config).await?;

    service.set_favorite("episode-2", true);
    service.set_last_position("episode-2", 1_250);
    service.set_play_count("episode-2", 4);
    let written = service.synchronize_private_data().await?;
    info!(written, remote_records = store.record_count(), "Manual flush done");

    let favorites = service.favorites().await;
    info!(?favorites, "Remote favorites");

    let pushed = service.update_from_local().await?;
    info!(pushed, remote_records = store.record_count(), "Local library pushed");

    if let Err(err) = service.synchronize_public_data().await {
        warn!(error = %err, "Public sync is not available");
    }

    drop(service);
    drop(config);
    events_task.abort();
    Ok(())
}
