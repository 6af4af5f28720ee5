//! Character profile table.
//!
//! A flat `name → traits` map, optionally mirrored to a JSON file on every
//! update. Profiles are never evicted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use storyforge_core::{CharacterProfile, MemoryError};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

type Traits = BTreeMap<String, serde_json::Value>;

pub struct ProfileStore {
    path: Option<PathBuf>,
    profiles: RwLock<BTreeMap<String, CharacterProfile>>,
    /// Serializes writers of the mirror file.
    persist_lock: Mutex<()>,
}

impl ProfileStore {
    /// A profile table that lives only as long as the process.
    pub fn ephemeral() -> Self {
        Self {
            path: None,
            profiles: RwLock::new(BTreeMap::new()),
            persist_lock: Mutex::new(()),
        }
    }

    /// Open the table mirrored at `path`; a missing or unreadable file starts
    /// empty.
    pub fn open(path: PathBuf) -> Self {
        let profiles = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = profiles.len(), "Profile table loaded");
        Self {
            path: Some(path),
            profiles: RwLock::new(profiles),
            persist_lock: Mutex::new(()),
        }
    }

    /// Open `profiles.json` inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::open(data_dir.join("profiles.json"))
    }

    fn load_from_disk(path: &Path) -> BTreeMap<String, CharacterProfile> {
        let Ok(content) = std::fs::read_to_string(path) else {
            return BTreeMap::new();
        };
        match serde_json::from_str::<BTreeMap<String, Traits>>(&content) {
            Ok(table) => table
                .into_iter()
                .map(|(name, traits)| {
                    let mut profile = CharacterProfile::new(name.clone());
                    profile.merge(traits);
                    (name, profile)
                })
                .collect(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupted profile file, starting empty");
                BTreeMap::new()
            }
        }
    }

    /// Write the current table to the mirror file.
    ///
    /// The snapshot is taken after acquiring the writer lock, so the last
    /// write to finish always reflects the latest table. No table lock is
    /// held across file I/O.
    async fn persist(&self) -> Result<(), MemoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _writer = self.persist_lock.lock().await;

        let json = {
            let profiles = self.profiles.read().await;
            let table: BTreeMap<&str, &Traits> = profiles
                .iter()
                .map(|(name, profile)| (name.as_str(), &profile.traits))
                .collect();
            serde_json::to_string_pretty(&table)
                .map_err(|e| MemoryError::Storage(format!("Failed to serialize profiles: {e}")))?
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MemoryError::Storage(format!("Failed to create profile directory: {e}"))
            })?;
        }
        tokio::fs::write(path, json)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write profile file: {e}")))
    }

    /// Merge `traits` into the profile called `name`, creating it if needed.
    ///
    /// The in-memory table is always updated; a failed write to disk is
    /// logged and otherwise ignored.
    pub async fn update(&self, name: &str, traits: Traits) -> CharacterProfile {
        let profile = {
            let mut profiles = self.profiles.write().await;
            let entry = profiles
                .entry(name.to_string())
                .or_insert_with(|| CharacterProfile::new(name));
            entry.merge(traits);
            entry.clone()
        };

        if let Err(e) = self.persist().await {
            warn!(profile = %name, error = %e, "Failed to persist character profiles");
        }
        profile
    }

    pub async fn get(&self, name: &str) -> Option<CharacterProfile> {
        self.profiles.read().await.get(name).cloned()
    }

    /// All profiles, ordered by name.
    pub async fn all(&self) -> Vec<CharacterProfile> {
        self.profiles.read().await.values().cloned().collect()
    }

    /// Render profiles as a prompt fragment.
    ///
    /// With a filter, only profiles whose name occurs in the filter text (or
    /// vice versa) are included, case-insensitively. No matches renders as
    /// an empty string.
    pub async fn summary(&self, filter: Option<&str>) -> String {
        let filter = filter
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty());

        let profiles = self.profiles.read().await;
        let mut lines = Vec::new();
        for (name, profile) in profiles.iter() {
            if let Some(filter) = &filter {
                let lower = name.to_lowercase();
                if !filter.contains(&lower) && !lower.contains(filter.as_str()) {
                    continue;
                }
            }
            lines.push(format!("- {name}: {}", render_traits(&profile.traits)));
        }

        if lines.is_empty() {
            String::new()
        } else {
            format!("Character Profiles:\n{}\n", lines.join("\n"))
        }
    }
}

/// `{"role": "smuggler"}` renders as `role: smuggler`.
pub fn render_traits(traits: &Traits) -> String {
    traits
        .iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => format!("{k}: {s}"),
            other => format!("{k}: {other}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn traits(pairs: &[(&str, serde_json::Value)]) -> Traits {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn update_merges_traits() {
        let store = ProfileStore::ephemeral();
        store
            .update("Mira", traits(&[("role", json!("smuggler")), ("mood", json!("wary"))]))
            .await;
        let merged = store.update("Mira", traits(&[("mood", json!("hopeful"))])).await;

        assert_eq!(merged.traits["role"], "smuggler");
        assert_eq!(merged.traits["mood"], "hopeful");
        assert_eq!(store.get("Mira").await.unwrap(), merged);
        assert!(store.get("Nobody").await.is_none());
    }

    #[tokio::test]
    async fn persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        {
            let store = ProfileStore::in_dir(dir.path());
            store.update("Orin", traits(&[("age", json!(42))])).await;
        }

        let reopened = ProfileStore::in_dir(dir.path());
        let profile = reopened.get("Orin").await.unwrap();
        assert_eq!(profile.traits["age"], 42);
    }

    #[tokio::test]
    async fn summary_all_and_filtered() {
        let store = ProfileStore::ephemeral();
        store.update("Mira", traits(&[("role", json!("smuggler"))])).await;
        store.update("Orin", traits(&[("role", json!("captain"))])).await;

        let all = store.summary(None).await;
        assert_eq!(
            all,
            "Character Profiles:\n- Mira: role: smuggler\n- Orin: role: captain\n"
        );

        let filtered = store.summary(Some("Mira meets a stranger at the docks")).await;
        assert!(filtered.contains("Mira"));
        assert!(!filtered.contains("Orin"));

        let partial = store.summary(Some("ORI")).await;
        assert!(partial.contains("Orin"));
    }

    #[tokio::test]
    async fn empty_summary_is_empty_string() {
        let store = ProfileStore::ephemeral();
        assert_eq!(store.summary(None).await, "");

        store.update("Mira", Traits::new()).await;
        assert_eq!(store.summary(Some("nobody here")).await, "");
    }

    #[tokio::test]
    async fn concurrent_updates_leave_latest_table_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(ProfileStore::in_dir(dir.path()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(&format!("extra-{i}"), traits(&[("seat", json!(i))]))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let reopened = ProfileStore::in_dir(dir.path());
        assert_eq!(reopened.all().await.len(), 8);
        assert_eq!(reopened.get("extra-3").await.unwrap().traits["seat"], 3);
    }

    #[tokio::test]
    async fn corrupted_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("profiles.json"), "{not json").unwrap();
        let store = ProfileStore::in_dir(dir.path());
        assert!(store.all().await.is_empty());
    }

    #[test]
    fn renders_non_string_traits() {
        let rendered = render_traits(&traits(&[("age", json!(42)), ("name", json!("Orin"))]));
        assert_eq!(rendered, "age: 42, name: Orin");
    }
}
