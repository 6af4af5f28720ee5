//! Provider fallback: ordered retry chain over families, keys and models.
//!
//! Families are tried in configured priority order. Within a family the key
//! pool is tried in a fresh per-call order, and within a key the family's
//! candidate models in configured order. Each (family, key, model) triple is
//! attempted at most once per call, under the family's timeout. The first
//! acceptable payload wins.

use std::sync::Arc;
use std::time::Duration;
use storyforge_core::{
    AttemptOutcome, Backend, GenerateOptions, GenerationError, GenerationResult, ImagePayload,
    Payload, ProviderAttempt, ProviderError, ProviderKey, ProviderKind,
};
use tracing::{debug, info, warn};

use crate::keys::KeyPool;
use crate::refusal::RefusalDetector;
use crate::shuffle::{KeyShuffle, RandomShuffle};

/// One provider family in the chain.
pub struct ProviderFamily<P> {
    pub name: String,
    pub keys: KeyPool,
    /// Candidate models, most preferred first.
    pub models: Vec<String>,
    pub timeout: Duration,
    pub backend: Arc<dyn Backend<P>>,
}

impl<P> ProviderFamily<P> {
    pub fn new(
        name: impl Into<String>,
        keys: KeyPool,
        models: Vec<String>,
        timeout: Duration,
        backend: Arc<dyn Backend<P>>,
    ) -> Self {
        Self {
            name: name.into(),
            keys,
            models,
            timeout,
            backend,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.keys.kind()
    }

    /// Candidate models for one call, with the hinted model moved first.
    fn candidate_models(&self, hint: Option<&str>) -> Vec<&str> {
        let mut models: Vec<&str> = self.models.iter().map(String::as_str).collect();
        if let Some(hint) = hint
            && let Some(pos) = models.iter().position(|m| *m == hint)
        {
            let hinted = models.remove(pos);
            models.insert(0, hinted);
        }
        models
    }
}

/// Orchestrates generation across an ordered chain of provider families.
pub struct FallbackOrchestrator<P> {
    name: String,
    families: Vec<ProviderFamily<P>>,
    shuffle: Arc<dyn KeyShuffle>,
    refusals: RefusalDetector,
}

pub type TextOrchestrator = FallbackOrchestrator<String>;
pub type ImageOrchestrator = FallbackOrchestrator<ImagePayload>;

impl<P: Payload> FallbackOrchestrator<P> {
    /// Create an orchestrator with no families, random key order and no
    /// refusal phrases.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            families: Vec::new(),
            shuffle: Arc::new(RandomShuffle),
            refusals: RefusalDetector::default(),
        }
    }

    /// Append a family at the lowest priority.
    pub fn add(mut self, family: ProviderFamily<P>) -> Self {
        self.families.push(family);
        self
    }

    pub fn with_shuffle(mut self, shuffle: Arc<dyn KeyShuffle>) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_refusal_detector(mut self, refusals: RefusalDetector) -> Self {
        self.refusals = refusals;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn families(&self) -> &[ProviderFamily<P>] {
        &self.families
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Whether any family has at least one usable key.
    pub fn is_available(&self) -> bool {
        self.families
            .iter()
            .any(|f| !f.keys.is_empty() && !f.models.is_empty())
    }

    /// Run one orchestration call.
    ///
    /// Per-attempt failures never escape; only total exhaustion does.
    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> std::result::Result<GenerationResult<P>, GenerationError> {
        let mut attempts: Vec<ProviderAttempt> = Vec::new();
        let hint = options.model_hint.as_deref();

        for family in &self.families {
            let order = self.shuffle.order(family.keys.len());
            let models = family.candidate_models(hint);

            for key in order.into_iter().filter_map(|i| family.keys.get(i)) {
                for model in &models {
                    let (outcome, payload) = self.attempt(family, key, model, prompt).await;

                    let record = ProviderAttempt {
                        family: family.name.clone(),
                        kind: family.kind(),
                        key_fingerprint: key.fingerprint().to_string(),
                        model: model.to_string(),
                        outcome: outcome.clone(),
                    };
                    log_attempt(&self.name, &record, attempts.len() + 1);
                    attempts.push(record);

                    match (outcome, payload) {
                        (AttemptOutcome::Success, Some(payload)) => {
                            return Ok(GenerationResult {
                                payload,
                                family: family.name.clone(),
                                model: model.to_string(),
                                attempts,
                            });
                        }
                        // The key is presumed throttled across all its models.
                        (AttemptOutcome::Quota(_), _) => break,
                        _ => continue,
                    }
                }
            }
        }

        let err = GenerationError::exhausted(attempts);
        warn!(
            orchestrator = %self.name,
            attempts = err.attempts().len(),
            quota = err.is_quota(),
            "Fallback: all providers exhausted"
        );
        Err(err)
    }

    /// One bounded attempt, classified.
    async fn attempt(
        &self,
        family: &ProviderFamily<P>,
        key: &ProviderKey,
        model: &str,
        prompt: &str,
    ) -> (AttemptOutcome, Option<P>) {
        debug!(
            orchestrator = %self.name,
            provider = %family.name,
            key = key.fingerprint(),
            model,
            "Fallback: trying provider"
        );

        let result = match tokio::time::timeout(
            family.timeout,
            family.backend.attempt(key, model, prompt),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "Provider '{}' timed out after {}ms",
                family.name,
                family.timeout.as_millis()
            ))),
        };

        match result {
            Ok(payload) => self.screen(payload),
            Err(e) => (e.outcome(), None),
        }
    }

    /// Reject blank payloads and refusals that came back as successes.
    fn screen(&self, payload: P) -> (AttemptOutcome, Option<P>) {
        if payload.is_blank() {
            return (ProviderError::EmptyResponse.outcome(), None);
        }
        if let Some(text) = payload.screening_text()
            && let Some(phrase) = self.refusals.matched(text)
        {
            debug!(orchestrator = %self.name, phrase, "Fallback: refusal detected");
            return (AttemptOutcome::Refused, None);
        }
        (AttemptOutcome::Success, Some(payload))
    }
}

fn log_attempt(orchestrator: &str, attempt: &ProviderAttempt, n: usize) {
    match &attempt.outcome {
        AttemptOutcome::Success => info!(
            orchestrator,
            provider = %attempt.family,
            key = %attempt.key_fingerprint,
            model = %attempt.model,
            attempt = n,
            "Fallback: provider succeeded"
        ),
        other => warn!(
            orchestrator,
            provider = %attempt.family,
            key = %attempt.key_fingerprint,
            model = %attempt.model,
            attempt = n,
            outcome = ?other,
            "Fallback: attempt failed, trying next"
        ),
    }
}
