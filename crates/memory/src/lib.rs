//! Continuity memory for StoryForge.
//!
//! Event logs (in-memory, JSONL file, SQLite) sit behind the core
//! `EventLog` trait; [`MemoryStore`] adds retention, similarity retrieval
//! and the character profile table on top.

pub mod file_backend;
pub mod in_memory;
pub mod profiles;
pub mod similarity;
pub mod store;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_backend::FileLog;
pub use in_memory::InMemoryLog;
pub use profiles::ProfileStore;
pub use store::{DEFAULT_RETENTION, DEFAULT_SNIPPET_CHARS, MemoryStore, truncate_snippet};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLog;
