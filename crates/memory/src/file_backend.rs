//! File-based event log: persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `MemoryEvent`. Storage location defaults to
//! `~/.storyforge/data/events.jsonl`.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storyforge_core::{EventLog, MemoryError, MemoryEvent};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A file-backed event log using JSONL (one JSON object per line).
///
/// Events are loaded into memory on creation and flushed to disk on every
/// mutation (append, delete, clear). This gives fast reads with durable writes.
pub struct FileLog {
    path: PathBuf,
    events: Arc<RwLock<Vec<MemoryEvent>>>,
}

impl FileLog {
    /// Open the log at `path`.
    ///
    /// If the file exists, events are loaded from it.
    /// If the file does not exist, starts empty (file created on first write).
    pub fn new(path: PathBuf) -> Self {
        let events = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = events.len(), "File event log loaded");
        Self {
            path,
            events: Arc::new(RwLock::new(events)),
        }
    }

    /// Open `events.jsonl` inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("events.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<MemoryEvent> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // File doesn't exist yet: start empty
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<MemoryEvent>(line) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted memory event");
                    None
                }
            })
            .collect()
    }

    /// Write all events to disk as JSONL.
    fn flush(&self, events: &[MemoryEvent]) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for event in events {
            let line = serde_json::to_string(event).map_err(|e| {
                MemoryError::Storage(format!("Failed to serialize memory event: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, &content)
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))
    }
}

#[async_trait]
impl EventLog for FileLog {
    fn name(&self) -> &str {
        "file"
    }

    async fn append(&self, event: MemoryEvent) -> Result<(), MemoryError> {
        let mut events = self.events.write().await;
        events.push(event);
        if let Err(e) = self.flush(&events) {
            events.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<MemoryEvent>, MemoryError> {
        Ok(self.events.read().await.clone())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, MemoryError> {
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut events = self.events.write().await;
        let kept: Vec<MemoryEvent> = events
            .iter()
            .filter(|e| !doomed.contains(e.id.as_str()))
            .cloned()
            .collect();
        let removed = events.len() - kept.len();
        if removed > 0 {
            // Disk first: a failed write leaves both sides untouched.
            self.flush(&kept)?;
            *events = kept;
        }
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.events.read().await.len())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        let mut events = self.events.write().await;
        self.flush(&[])?;
        events.clear();
        Ok(())
    }
}
