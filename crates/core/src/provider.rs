//! Provider abstractions: kinds, credentials, attempts, and the backend trait.
//!
//! A backend knows how to execute exactly one call against one external
//! generation API, given a key and a model. Fallback across backends, keys
//! and models is the orchestrator's job, not the backend's.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::ProviderError;

/// The vendor API a provider family speaks.
///
/// Assigned at configuration time; a key's kind is never inferred from the
/// shape of the secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Perplexity,
    HuggingFace,
    Stability,
}

impl ProviderKind {
    /// Prefix every well-formed key of this kind starts with.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Self::Gemini => "AIza",
            Self::OpenAi | Self::Stability => "sk-",
            Self::Perplexity => "pplx-",
            Self::HuggingFace => "hf_",
        }
    }

    /// Validity predicate for a raw secret of this kind.
    pub fn accepts(&self, secret: &str) -> bool {
        secret.len() >= 8
            && !secret.chars().any(char::is_whitespace)
            && secret.starts_with(self.key_prefix())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Perplexity => "perplexity",
            Self::HuggingFace => "huggingface",
            Self::Stability => "stability",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified credential. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderKey {
    kind: ProviderKind,
    secret: String,
    fingerprint: String,
}

impl ProviderKey {
    /// Wrap a secret that has already passed its kind's validity predicate.
    pub fn new(kind: ProviderKind, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        let digest = Sha256::digest(secret.as_bytes());
        let fingerprint = hex::encode(&digest[..4]);
        Self {
            kind,
            secret,
            fingerprint,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// The raw secret. Only transports should call this.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Short, stable, non-reversible identifier safe for logs and cache keys.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Debug for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderKey")
            .field("kind", &self.kind)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

/// Classification of one (family, key, model) attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Transient(String),
    Quota(String),
    NotFound,
    ContentBlocked(String),
    Refused,
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Record of a single attempt, kept for logging and for the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAttempt {
    /// Configured family name (e.g. "gemini", "openai-backup").
    pub family: String,
    pub kind: ProviderKind,
    /// Fingerprint of the key used; never the secret itself.
    pub key_fingerprint: String,
    pub model: String,
    pub outcome: AttemptOutcome,
}

/// Something a backend can hand back as a generation result.
pub trait Payload: Send + Sync + 'static {
    /// A payload with nothing extractable counts as a blocked response.
    fn is_blank(&self) -> bool;

    /// Text to screen for refusals. Binary payloads have none.
    fn screening_text(&self) -> Option<&str> {
        None
    }
}

impl Payload for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }

    fn screening_text(&self) -> Option<&str> {
        Some(self)
    }
}

/// A generated image, base64-encoded for transport to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub base64: String,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn png(base64: impl Into<String>) -> Self {
        Self {
            base64: base64.into(),
            mime_type: "image/png".into(),
        }
    }
}

impl Payload for ImagePayload {
    fn is_blank(&self) -> bool {
        self.base64.trim().is_empty()
    }
}

/// Per-call options for an orchestration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Preferred model; tried first by any family that lists it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_hint: Option<String>,
}

impl GenerateOptions {
    pub fn with_model_hint(model: impl Into<String>) -> Self {
        Self {
            model_hint: Some(model.into()),
        }
    }
}

/// A fully populated generation result.
#[derive(Debug, Clone)]
pub struct GenerationResult<P> {
    pub payload: P,
    /// Family that produced the payload.
    pub family: String,
    pub model: String,
    /// Every attempt of the call, the successful one last.
    pub attempts: Vec<ProviderAttempt>,
}

/// One vendor transport.
///
/// Implementations: OpenAI-compatible chat/images, Gemini, Stability.
#[async_trait]
pub trait Backend<P>: Send + Sync {
    /// A human-readable name for this backend (e.g. "gemini", "stability").
    fn name(&self) -> &str;

    /// Execute one call. No retries, no fallback, no timeout handling:
    /// the orchestrator owns all of that.
    async fn attempt(&self, key: &ProviderKey, model: &str, prompt: &str)
    -> std::result::Result<P, ProviderError>;
}

pub type TextBackend = dyn Backend<String>;
pub type ImageBackend = dyn Backend<ImagePayload>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_predicates_match_kind() {
        assert!(ProviderKind::Gemini.accepts("AIzaSyExample123"));
        assert!(!ProviderKind::Gemini.accepts("sk-example-123"));
        assert!(ProviderKind::OpenAi.accepts("sk-proj-abcdef"));
        assert!(ProviderKind::Perplexity.accepts("pplx-1234567"));
        assert!(ProviderKind::HuggingFace.accepts("hf_abcdefgh"));
        assert!(!ProviderKind::HuggingFace.accepts("hf_ab"));
        assert!(!ProviderKind::OpenAi.accepts("sk-with space"));
    }

    #[test]
    fn key_debug_hides_secret() {
        let key = ProviderKey::new(ProviderKind::OpenAi, "sk-super-secret-value");
        let debug = format!("{key:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains(key.fingerprint()));
        assert_eq!(key.fingerprint().len(), 8);
    }

    #[test]
    fn fingerprint_is_stable_per_secret() {
        let a = ProviderKey::new(ProviderKind::Gemini, "AIzaSameKey01");
        let b = ProviderKey::new(ProviderKind::Gemini, "AIzaSameKey01");
        let c = ProviderKey::new(ProviderKind::Gemini, "AIzaOtherKey2");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn blank_payloads() {
        assert!(String::from("  \n").is_blank());
        assert!(!String::from("Once upon a time").is_blank());
        assert!(ImagePayload::png("").is_blank());
        assert!(ImagePayload::png("iVBORw0KGgo=").screening_text().is_none());
    }

    #[test]
    fn outcome_serialization() {
        let json = serde_json::to_string(&AttemptOutcome::Quota("429".into())).unwrap();
        assert!(json.contains("quota"));
        assert!(json.contains("429"));
    }
}
