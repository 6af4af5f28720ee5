//! `MemoryStore`: the bounded continuity store.
//!
//! Wraps an [`EventLog`] with retention, similarity retrieval and the
//! character profile table. After every successful `add_event` the log holds
//! at most `retention` events, the most recent by timestamp.

use std::sync::Arc;
use storyforge_config::MemoryConfig;
use storyforge_core::{
    CharacterProfile, Clock, EventLog, MemoryError, MemoryEvent, Metadata, SystemClock,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::file_backend::FileLog;
use crate::in_memory::InMemoryLog;
use crate::profiles::ProfileStore;
use crate::similarity;

pub const DEFAULT_RETENTION: usize = 10;
pub const DEFAULT_SNIPPET_CHARS: usize = 1000;

const ELLIPSIS: &str = "...";

pub struct MemoryStore {
    log: Arc<dyn EventLog>,
    profiles: ProfileStore,
    clock: Arc<dyn Clock>,
    retention: usize,
    snippet_chars: usize,
    /// Serializes the append-and-evict path.
    write_lock: Mutex<()>,
}

impl MemoryStore {
    /// A store over `log` with default retention, system time and an
    /// ephemeral profile table.
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self {
            log,
            profiles: ProfileStore::ephemeral(),
            clock: Arc::new(SystemClock),
            retention: DEFAULT_RETENTION,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
            write_lock: Mutex::new(()),
        }
    }

    /// A fully in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryLog::new()))
    }

    /// Open the store described by `config`.
    pub async fn from_config(config: &MemoryConfig) -> Result<Self, MemoryError> {
        let data_dir = config.data_dir();
        let (log, profiles): (Arc<dyn EventLog>, ProfileStore) = match config.backend.as_str() {
            "in_memory" => (Arc::new(InMemoryLog::new()), ProfileStore::ephemeral()),
            "file" => (
                Arc::new(FileLog::in_dir(&data_dir)),
                ProfileStore::in_dir(&data_dir),
            ),
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                std::fs::create_dir_all(&data_dir).map_err(|e| {
                    MemoryError::Storage(format!("Failed to create data directory: {e}"))
                })?;
                let url = format!("sqlite://{}", data_dir.join("events.db").display());
                (
                    Arc::new(crate::sqlite::SqliteLog::new(&url).await?),
                    ProfileStore::in_dir(&data_dir),
                )
            }
            other => {
                return Err(MemoryError::Storage(format!(
                    "Memory backend '{other}' is not available in this build"
                )));
            }
        };

        info!(backend = log.name(), retention = config.retention, "Memory store opened");

        Ok(Self::new(log)
            .with_profiles(profiles)
            .with_retention(config.retention)
            .with_snippet_chars(config.snippet_chars))
    }

    pub fn with_profiles(mut self, profiles: ProfileStore) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Retention bound; values below 1 are raised to 1.
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    /// Per-entry character budget for retrieved context, marker included.
    pub fn with_snippet_chars(mut self, snippet_chars: usize) -> Self {
        self.snippet_chars = snippet_chars.max(ELLIPSIS.len() + 1);
        self
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn snippet_chars(&self) -> usize {
        self.snippet_chars
    }

    pub fn backend_name(&self) -> &str {
        self.log.name()
    }

    /// Commit a new event and evict the oldest excess.
    ///
    /// Only the append can fail; eviction problems are logged and swallowed.
    pub async fn add_event(&self, text: &str, metadata: Metadata) -> Result<String, MemoryError> {
        let _guard = self.write_lock.lock().await;

        let timestamp = self.clock.now();
        let id = format!(
            "evt_{}_{}",
            timestamp.timestamp_micros(),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );

        self.log
            .append(MemoryEvent {
                id: id.clone(),
                text: text.to_string(),
                metadata,
                timestamp,
            })
            .await?;
        debug!(id = %id, "Memory event committed");

        if let Err(e) = self.evict_excess(&id).await {
            warn!(error = %e, "Memory eviction failed, keeping excess events");
        }

        Ok(id)
    }

    async fn evict_excess(&self, keep_id: &str) -> Result<(), MemoryError> {
        let mut events = self.log.list().await?;
        if events.len() <= self.retention {
            return Ok(());
        }

        let excess = events.len() - self.retention;
        // Stable: equal timestamps keep insertion order.
        events.sort_by_key(|e| e.timestamp);
        let doomed: Vec<String> = events
            .into_iter()
            .filter(|e| e.id != keep_id)
            .take(excess)
            .map(|e| e.id)
            .collect();

        let removed = self.log.delete(&doomed).await?;
        debug!(removed, retention = self.retention, "Evicted old memory events");
        Ok(())
    }

    /// Up to `n` past event texts most similar to `query`, each cut to the
    /// snippet budget. Storage errors yield an empty result.
    pub async fn relevant_context(&self, query: &str, n: usize) -> Vec<String> {
        if n == 0 {
            return Vec::new();
        }

        let events = match self.log.list().await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Memory query failed, continuing without context");
                return Vec::new();
            }
        };

        similarity::rank(&events, query, n)
            .into_iter()
            .map(|e| truncate_snippet(&e.text, self.snippet_chars))
            .collect()
    }

    /// Rendered character profiles, optionally filtered by name.
    pub async fn profiles_summary(&self, filter: Option<&str>) -> String {
        self.profiles.summary(filter).await
    }

    pub async fn update_profile(
        &self,
        name: &str,
        traits: std::collections::BTreeMap<String, serde_json::Value>,
    ) -> CharacterProfile {
        self.profiles.update(name, traits).await
    }

    pub async fn get_profile(&self, name: &str) -> Option<CharacterProfile> {
        self.profiles.get(name).await
    }

    pub async fn profiles(&self) -> Vec<CharacterProfile> {
        self.profiles.all().await
    }

    /// Every retained event, most recent first.
    pub async fn history(&self) -> Result<Vec<MemoryEvent>, MemoryError> {
        let mut events = self.log.list().await?;
        events.reverse();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(events)
    }

    pub async fn count(&self) -> Result<usize, MemoryError> {
        self.log.count().await
    }

    /// Delete every event. Profiles are kept.
    pub async fn clear(&self) -> Result<(), MemoryError> {
        let _guard = self.write_lock.lock().await;
        self.log.clear().await?;
        info!("Memory history cleared");
        Ok(())
    }
}

/// Cut `text` to at most `max_chars` characters, `...` included.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str(ELLIPSIS);
    cut
}
