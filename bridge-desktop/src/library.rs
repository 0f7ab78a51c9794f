//! Library snapshot reader using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    library::{LibraryEntity, LibrarySnapshotSource, Subscription},
};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow},
    Row,
};
use std::path::PathBuf;
use tracing::{debug, warn};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS library_entities (
        id TEXT PRIMARY KEY,
        is_favorite INTEGER NOT NULL DEFAULT 0,
        last_played_at INTEGER,
        last_position INTEGER NOT NULL DEFAULT 0,
        play_count INTEGER NOT NULL DEFAULT 0,
        feed_url TEXT,
        is_private INTEGER NOT NULL DEFAULT 0,
        is_subscribed INTEGER NOT NULL DEFAULT 0
    )
"#;

/// SQLite-backed library snapshot source
///
/// Reads the `library_entities` table, one row per entity. `last_played_at`
/// is stored as Unix milliseconds; a row carries a subscription when
/// `feed_url` is not null.
pub struct SqliteLibrarySnapshot {
    pool: SqlitePool,
}

impl SqliteLibrarySnapshot {
    /// Open (or create) the library database at `db_path`
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        // SQLite URLs want forward slashes
        let path_str = db_path.to_string_lossy().replace('\\', "/");
        let db_url = format!("sqlite://{}?mode=rwc", path_str);

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))?;

        let source = Self::from_pool(pool).await?;
        debug!(path = ?db_path, "Opened library snapshot database");
        Ok(source)
    }

    /// Create an in-memory library (for testing)
    pub async fn in_memory() -> Result<Self> {
        // A single connection keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the table if needed
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to create table: {}", e)))?;

        Ok(Self { pool })
    }

    /// Insert or replace an entity row
    pub async fn upsert(&self, entity: &LibraryEntity) -> Result<()> {
        let (feed_url, is_private, is_subscribed) = match &entity.subscription {
            Some(sub) => (Some(sub.feed_url.as_str()), sub.is_private, sub.is_subscribed),
            None => (None, false, false),
        };

        sqlx::query(
            r#"
            INSERT INTO library_entities
                (id, is_favorite, last_played_at, last_position, play_count,
                 feed_url, is_private, is_subscribed)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                is_favorite = excluded.is_favorite,
                last_played_at = excluded.last_played_at,
                last_position = excluded.last_position,
                play_count = excluded.play_count,
                feed_url = excluded.feed_url,
                is_private = excluded.is_private,
                is_subscribed = excluded.is_subscribed
            "#,
        )
        .bind(&entity.id)
        .bind(entity.is_favorite)
        .bind(entity.last_played_at.map(|d| d.timestamp_millis()))
        .bind(entity.last_position)
        .bind(entity.play_count)
        .bind(feed_url)
        .bind(is_private)
        .bind(is_subscribed)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to upsert entity: {}", e)))?;

        debug!(entity_id = %entity.id, "Stored library entity");
        Ok(())
    }

    fn entity_from_row(row: &SqliteRow) -> Result<LibraryEntity> {
        let map_err = |e: sqlx::Error| BridgeError::DatabaseError(format!("Bad row: {}", e));

        let id: String = row.try_get("id").map_err(map_err)?;
        let last_played_ms: Option<i64> = row.try_get("last_played_at").map_err(map_err)?;
        let last_played_at = match last_played_ms {
            Some(ms) => {
                let parsed = DateTime::<Utc>::from_timestamp_millis(ms);
                if parsed.is_none() {
                    warn!(entity_id = %id, ms, "Dropping out-of-range last_played_at");
                }
                parsed
            }
            None => None,
        };
        let feed_url: Option<String> = row.try_get("feed_url").map_err(map_err)?;
        let subscription = match feed_url {
            Some(feed_url) => Some(Subscription {
                feed_url,
                is_private: row.try_get("is_private").map_err(map_err)?,
                is_subscribed: row.try_get("is_subscribed").map_err(map_err)?,
            }),
            None => None,
        };

        Ok(LibraryEntity {
            id,
            is_favorite: row.try_get("is_favorite").map_err(map_err)?,
            last_played_at,
            last_position: row.try_get("last_position").map_err(map_err)?,
            play_count: row.try_get("play_count").map_err(map_err)?,
            subscription,
        })
    }
}

#[async_trait]
impl LibrarySnapshotSource for SqliteLibrarySnapshot {
    async fn snapshot(&self) -> Result<Vec<LibraryEntity>> {
        let rows = sqlx::query(
            r#"
            SELECT id, is_favorite, last_played_at, last_position, play_count,
                   feed_url, is_private, is_subscribed
            FROM library_entities
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to read library: {}", e)))?;

        let entities = rows
            .iter()
            .map(Self::entity_from_row)
            .collect::<Result<Vec<_>>>()?;

        debug!(count = entities.len(), "Read library snapshot");
        Ok(entities)
    }
}
