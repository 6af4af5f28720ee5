//! Memory trait: bounded continuity storage for narrative events.
//!
//! Every accepted narrative segment becomes a [`MemoryEvent`]. Events are
//! immutable; they leave the log only through retention eviction or an
//! explicit clear. Character profiles live beside the log and are never
//! evicted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::MemoryError;

/// Opaque key → value metadata attached to an event.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A single remembered narrative event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEvent {
    /// Unique ID, roughly ordered by creation time
    pub id: String,

    /// The narrative text
    pub text: String,

    /// Caller-supplied metadata (user id, event type, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,

    /// When the event was committed
    pub timestamp: DateTime<Utc>,
}

/// A named character and its accumulated traits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub name: String,
    #[serde(default)]
    pub traits: BTreeMap<String, serde_json::Value>,
}

impl CharacterProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            traits: BTreeMap::new(),
        }
    }

    /// Overlay `updates` onto the existing traits; untouched traits survive.
    pub fn merge(&mut self, updates: BTreeMap<String, serde_json::Value>) {
        self.traits.extend(updates);
    }
}

/// Storage for the raw event log.
///
/// Implementations: in-memory (testing), JSONL file, SQLite.
/// Retention and similarity are applied above this trait, by the store.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// The backend name (e.g., "file", "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Commit a new event.
    async fn append(&self, event: MemoryEvent) -> std::result::Result<(), MemoryError>;

    /// All events, in insertion order.
    async fn list(&self) -> std::result::Result<Vec<MemoryEvent>, MemoryError>;

    /// Delete the given IDs; returns how many were removed.
    async fn delete(&self, ids: &[String]) -> std::result::Result<usize, MemoryError>;

    /// Get total event count.
    async fn count(&self) -> std::result::Result<usize, MemoryError>;

    /// Delete every event.
    async fn clear(&self) -> std::result::Result<(), MemoryError>;
}
