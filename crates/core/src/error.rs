//! Error types for the StoryForge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use crate::provider::{AttemptOutcome, ProviderAttempt};
use thiserror::Error;

/// The top-level error type for all StoryForge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Generation errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A failure of one provider call attempt.
///
/// Backends return these; the orchestrator folds them into an
/// [`AttemptOutcome`] and never lets them escape.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Content blocked by provider: {0}")]
    ContentBlocked(String),

    #[error("Provider returned no usable payload")]
    EmptyResponse,

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Classify this failure for fallback control flow.
    pub fn outcome(&self) -> AttemptOutcome {
        match self {
            Self::QuotaExceeded(reason) => AttemptOutcome::Quota(reason.clone()),
            Self::ModelNotFound(_) => AttemptOutcome::NotFound,
            Self::ContentBlocked(reason) => AttemptOutcome::ContentBlocked(reason.clone()),
            Self::EmptyResponse => AttemptOutcome::ContentBlocked("empty payload".into()),
            other => AttemptOutcome::Transient(other.to_string()),
        }
    }
}

/// Terminal failure of an orchestration call: every triple was tried.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Every failed attempt was quota-throttled (or a missing model on a
    /// throttled key). Callers should suggest retrying later.
    #[error("All providers exhausted: quota exceeded after {} attempts, try again later", .attempts.len())]
    QuotaExhausted { attempts: Vec<ProviderAttempt> },

    /// Providers failed for other reasons, or none were configured.
    #[error("All providers exhausted after {} attempts: service unavailable", .attempts.len())]
    AllProvidersExhausted { attempts: Vec<ProviderAttempt> },
}

impl GenerationError {
    /// Build the exhaustion error that best describes an attempt log.
    pub fn exhausted(attempts: Vec<ProviderAttempt>) -> Self {
        let quota_seen = attempts
            .iter()
            .any(|a| matches!(a.outcome, AttemptOutcome::Quota(_)));
        let only_quota = attempts
            .iter()
            .all(|a| matches!(a.outcome, AttemptOutcome::Quota(_) | AttemptOutcome::NotFound));

        if quota_seen && only_quota {
            Self::QuotaExhausted { attempts }
        } else {
            Self::AllProvidersExhausted { attempts }
        }
    }

    /// Whether the exhaustion was quota-type.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExhausted { .. })
    }

    /// The full attempt log of the failed call.
    pub fn attempts(&self) -> &[ProviderAttempt] {
        match self {
            Self::QuotaExhausted { attempts } | Self::AllProvidersExhausted { attempts } => {
                attempts
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;

    fn attempt(outcome: AttemptOutcome) -> ProviderAttempt {
        ProviderAttempt {
            family: "primary".into(),
            kind: ProviderKind::Gemini,
            key_fingerprint: "abcd1234".into(),
            model: "m1".into(),
            outcome,
        }
    }

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 503,
            message: "Service Unavailable".into(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("Service Unavailable"));
    }

    #[test]
    fn provider_errors_classify() {
        assert!(matches!(
            ProviderError::QuotaExceeded("429".into()).outcome(),
            AttemptOutcome::Quota(_)
        ));
        assert_eq!(
            ProviderError::ModelNotFound("gpt-9".into()).outcome(),
            AttemptOutcome::NotFound
        );
        assert!(matches!(
            ProviderError::EmptyResponse.outcome(),
            AttemptOutcome::ContentBlocked(_)
        ));
        assert!(matches!(
            ProviderError::AuthenticationFailed("bad key".into()).outcome(),
            AttemptOutcome::Transient(_)
        ));
        assert!(matches!(
            ProviderError::Timeout("15s".into()).outcome(),
            AttemptOutcome::Transient(_)
        ));
    }

    #[test]
    fn quota_only_log_is_quota_exhaustion() {
        let err = GenerationError::exhausted(vec![
            attempt(AttemptOutcome::NotFound),
            attempt(AttemptOutcome::Quota("429".into())),
        ]);
        assert!(err.is_quota());
        assert_eq!(err.attempts().len(), 2);
        assert!(err.to_string().contains("try again later"));
    }

    #[test]
    fn mixed_log_is_total_exhaustion() {
        let err = GenerationError::exhausted(vec![
            attempt(AttemptOutcome::Quota("429".into())),
            attempt(AttemptOutcome::Refused),
        ]);
        assert!(!err.is_quota());
        assert!(err.to_string().contains("service unavailable"));
    }

    #[test]
    fn empty_log_is_total_exhaustion() {
        let err = GenerationError::exhausted(vec![]);
        assert!(!err.is_quota());
        assert!(err.attempts().is_empty());
    }
}
