//! Key classification: turns raw credential blobs into typed key pools.
//!
//! A blob is the comma-separated value of one family's key setting. Every
//! entry is checked against the validity predicate of the family's declared
//! [`ProviderKind`]; entries that fail are dropped, never reassigned to
//! another family.

use std::collections::HashSet;
use storyforge_core::{ProviderKey, ProviderKind};
use tracing::warn;

/// The keys available to one provider family.
#[derive(Debug, Clone)]
pub struct KeyPool {
    kind: ProviderKind,
    keys: Vec<ProviderKey>,
}

impl KeyPool {
    /// Classify a comma-separated blob for a family of the given kind.
    ///
    /// Whitespace and surrounding quotes are trimmed, empty entries skipped,
    /// duplicates collapsed (first occurrence wins).
    pub fn parse(kind: ProviderKind, blob: &str) -> Self {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();

        for (index, raw) in blob.split(',').enumerate() {
            let secret = raw.trim().trim_matches(|c| c == '"' || c == '\'');
            if secret.is_empty() {
                continue;
            }
            if !kind.accepts(secret) {
                warn!(
                    kind = %kind,
                    position = index,
                    expected_prefix = kind.key_prefix(),
                    "Skipping malformed API key"
                );
                continue;
            }
            if seen.insert(secret.to_string()) {
                keys.push(ProviderKey::new(kind, secret));
            }
        }

        Self { kind, keys }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ProviderKey> {
        self.keys.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderKey> {
        self.keys.iter()
    }
}
