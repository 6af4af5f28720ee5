//! In-memory event log: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use storyforge_core::{EventLog, MemoryError, MemoryEvent};
use tokio::sync::RwLock;

/// An event log that keeps events in a Vec.
/// Useful for testing and sessions where persistence isn't needed.
pub struct InMemoryLog {
    events: Arc<RwLock<Vec<MemoryEvent>>>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLog for InMemoryLog {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, event: MemoryEvent) -> Result<(), MemoryError> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<MemoryEvent>, MemoryError> {
        Ok(self.events.read().await.clone())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, MemoryError> {
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut events = self.events.write().await;
        let len_before = events.len();
        events.retain(|e| !doomed.contains(e.id.as_str()));
        Ok(len_before - events.len())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.events.read().await.len())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.events.write().await.clear();
        Ok(())
    }
}
