//! Client registry: one reusable HTTP client per credential.
//!
//! Owned by whoever builds the orchestrators and dropped with them. Purely a
//! connection-reuse optimisation; a miss only costs a new client.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use storyforge_core::ProviderKey;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Cache of `reqwest` clients keyed by credential identity.
pub struct ClientRegistry {
    clients: Mutex<HashMap<String, reqwest::Client>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// The client for `key`, created on first use.
    pub fn client_for(&self, key: &ProviderKey) -> reqwest::Client {
        let cache_key = format!("{}:{}", key.kind(), key.fingerprint());
        let mut clients = self.clients.lock().unwrap_or_else(|p| p.into_inner());

        clients
            .entry(cache_key)
            .or_insert_with(|| {
                debug!(kind = %key.kind(), key = key.fingerprint(), "Creating HTTP client");
                build_client()
            })
            .clone()
    }

    /// Number of cached clients.
    pub fn len(&self) -> usize {
        self.clients.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("storyforge/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}
