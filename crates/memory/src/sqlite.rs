//! SQLite event log.
//!
//! A single `events` table. The integer `iid` column preserves insertion
//! order; `id` is the public event identifier.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use storyforge_core::{EventLog, MemoryError, MemoryEvent, Metadata};
use tracing::{debug, info, warn};

/// A SQLite-backed event log.
pub struct SqliteLog {
    pool: SqlitePool,
}

impl SqliteLog {
    /// Open (or create) the database at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful
    /// for tests).
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let ephemeral = path.contains(":memory:");
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to `:memory:` is its own database.
        let mut pool_options =
            SqlitePoolOptions::new().max_connections(if ephemeral { 1 } else { 4 });
        if ephemeral {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let log = Self { pool };
        log.run_migrations().await?;
        info!("SQLite event log initialized at {path}");
        Ok(log)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, MemoryError> {
        let log = Self { pool };
        log.run_migrations().await?;
        Ok(log)
    }

    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                id         TEXT UNIQUE NOT NULL,
                text       TEXT NOT NULL,
                metadata   TEXT NOT NULL DEFAULT '{}',
                timestamp  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("events table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)")
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::MigrationFailed(format!("timestamp index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<MemoryEvent, MemoryError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| MemoryError::QueryFailed(format!("id column: {e}")))?;
        let text: String = row
            .try_get("text")
            .map_err(|e| MemoryError::QueryFailed(format!("text column: {e}")))?;
        let metadata_json: String = row
            .try_get("metadata")
            .map_err(|e| MemoryError::QueryFailed(format!("metadata column: {e}")))?;
        let timestamp_str: String = row
            .try_get("timestamp")
            .map_err(|e| MemoryError::QueryFailed(format!("timestamp column: {e}")))?;

        let metadata: Metadata = serde_json::from_str(&metadata_json).unwrap_or_else(|e| {
            warn!(id = %id, error = %e, "Unreadable event metadata, dropping it");
            Metadata::new()
        });

        let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| MemoryError::QueryFailed(format!("timestamp '{timestamp_str}': {e}")))?;

        Ok(MemoryEvent {
            id,
            text,
            metadata,
            timestamp,
        })
    }
}

#[async_trait]
impl EventLog for SqliteLog {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, event: MemoryEvent) -> Result<(), MemoryError> {
        let metadata = serde_json::to_string(&event.metadata)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize metadata: {e}")))?;

        sqlx::query("INSERT INTO events (id, text, metadata, timestamp) VALUES (?, ?, ?, ?)")
            .bind(&event.id)
            .bind(&event.text)
            .bind(metadata)
            .bind(event.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("Insert failed: {e}")))?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<MemoryEvent>, MemoryError> {
        let rows = sqlx::query("SELECT id, text, metadata, timestamp FROM events ORDER BY iid ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("List failed: {e}")))?;

        rows.iter().map(Self::row_to_event).collect()
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, MemoryError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MemoryError::Storage(format!("Begin failed: {e}")))?;

        let mut removed = 0;
        for id in ids {
            let result = sqlx::query("DELETE FROM events WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| MemoryError::Storage(format!("Delete failed: {e}")))?;
            removed += result.rows_affected() as usize;
        }

        tx.commit()
            .await
            .map_err(|e| MemoryError::Storage(format!("Commit failed: {e}")))?;

        Ok(removed)
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM events")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("Count failed: {e}")))?;

        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| MemoryError::QueryFailed(format!("Count column: {e}")))?;

        Ok(count as usize)
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        sqlx::query("DELETE FROM events")
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("Clear failed: {e}")))?;
        Ok(())
    }
}
