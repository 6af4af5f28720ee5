//! End-to-end integration tests for the StoryForge pipeline.
//!
//! These tests drive the public crate APIs from orchestration through
//! extraction and memory, with scripted backends in place of the network.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use storyforge_config::GenerationConfig;
use storyforge_core::{
    AttemptOutcome, Backend, GenerateOptions, GenerationError, ImagePayload, ManualClock,
    Metadata, ProviderError, ProviderKey, ProviderKind, StoryToggles,
};
use storyforge_engine::{NarrativeEngine, extract};
use storyforge_memory::{FileLog, MemoryStore};
use storyforge_providers::{
    FallbackOrchestrator, FixedOrder, ImageOrchestrator, KeyPool, ProviderFamily,
    RefusalDetector, TextOrchestrator,
};

// ── Mock Backend ─────────────────────────────────────────────────────────

/// A mock backend that always gives the same answer and counts calls.
struct ScriptedBackend {
    reply: Result<String, ProviderError>,
    call_count: Mutex<usize>,
}

impl ScriptedBackend {
    fn new(reply: Result<String, ProviderError>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            call_count: Mutex::new(0),
        })
    }

    fn text(reply: &str) -> Arc<Self> {
        Self::new(Ok(reply.to_string()))
    }

    fn quota() -> Arc<Self> {
        Self::new(Err(ProviderError::QuotaExceeded("429 Too Many Requests".into())))
    }

    fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Backend<String> for ScriptedBackend {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn attempt(
        &self,
        _key: &ProviderKey,
        _model: &str,
        _prompt: &str,
    ) -> Result<String, ProviderError> {
        *self.call_count.lock().unwrap() += 1;
        self.reply.clone()
    }
}

struct StaticImage;

#[async_trait::async_trait]
impl Backend<ImagePayload> for StaticImage {
    fn name(&self) -> &str {
        "e2e_image"
    }

    async fn attempt(
        &self,
        _key: &ProviderKey,
        _model: &str,
        _prompt: &str,
    ) -> Result<ImagePayload, ProviderError> {
        Ok(ImagePayload::png("iVBORw0KGgo="))
    }
}

fn family(name: &str, secret: &str, backend: Arc<dyn Backend<String>>) -> ProviderFamily<String> {
    ProviderFamily::new(
        name,
        KeyPool::parse(ProviderKind::OpenAi, secret),
        vec!["model-a".into()],
        Duration::from_secs(5),
        backend,
    )
}

fn refusals() -> RefusalDetector {
    RefusalDetector::new(GenerationConfig::default().refusal_phrases)
}

fn image_chain() -> Arc<ImageOrchestrator> {
    Arc::new(
        FallbackOrchestrator::new("image")
            .with_shuffle(Arc::new(FixedOrder))
            .add(ProviderFamily::new(
                "painter",
                KeyPool::parse(ProviderKind::OpenAi, "sk-image-key-01"),
                vec!["model-a".into()],
                Duration::from_secs(5),
                Arc::new(StaticImage) as Arc<dyn Backend<ImagePayload>>,
            )),
    )
}

// ── Scenario A: quota on the first two providers ─────────────────────────

#[tokio::test]
async fn e2e_quota_falls_through_to_third_provider() {
    let first = ScriptedBackend::quota();
    let second = ScriptedBackend::quota();
    let third = ScriptedBackend::text("Once upon a time...");

    let orchestrator: TextOrchestrator = FallbackOrchestrator::new("text")
        .with_shuffle(Arc::new(FixedOrder))
        .with_refusal_detector(refusals())
        .add(family("first", "sk-first-key-01", first.clone()))
        .add(family("second", "sk-second-key-01", second.clone()))
        .add(family("third", "sk-third-key-01", third.clone()));

    let result = orchestrator
        .generate("Begin the tale", &GenerateOptions::default())
        .await
        .unwrap();

    assert_eq!(result.payload, "Once upon a time...");
    assert_eq!(result.family, "third");
    assert_eq!(result.attempts.len(), 3);
    assert!(matches!(result.attempts[0].outcome, AttemptOutcome::Quota(_)));
    assert!(matches!(result.attempts[1].outcome, AttemptOutcome::Quota(_)));
    assert_eq!(result.attempts[2].outcome, AttemptOutcome::Success);
    assert_eq!((first.calls(), second.calls(), third.calls()), (1, 1, 1));
}

// ── Scenario B: every provider breaks character ──────────────────────────

#[tokio::test]
async fn e2e_refusals_exhaust_every_provider() {
    let search = ScriptedBackend::text("I am a search assistant and cannot write fiction.");
    let assistant = ScriptedBackend::text("As an AI language model, I won't continue this story.");

    let orchestrator: TextOrchestrator = FallbackOrchestrator::new("text")
        .with_shuffle(Arc::new(FixedOrder))
        .with_refusal_detector(refusals())
        .add(family("search", "sk-search-key-01", search.clone()))
        .add(family("assistant", "sk-assistant-key-01", assistant.clone()));

    let err = orchestrator
        .generate("Continue", &GenerateOptions::default())
        .await
        .unwrap_err();

    match &err {
        GenerationError::AllProvidersExhausted { attempts } => {
            assert_eq!(attempts.len(), 2);
            assert!(attempts.iter().all(|a| a.outcome == AttemptOutcome::Refused));
        }
        other => panic!("expected AllProvidersExhausted, got {other:?}"),
    }
    assert!(!err.is_quota());
    assert!(!err.to_string().contains("search assistant"));
}

#[tokio::test]
async fn e2e_default_refusal_list_lets_dialogue_through() {
    let writer = ScriptedBackend::text(
        "\"I am an airship captain,\" she said. \"And I'm an aide to no one.\"",
    );

    let orchestrator: TextOrchestrator = FallbackOrchestrator::new("text")
        .with_shuffle(Arc::new(FixedOrder))
        .with_refusal_detector(refusals())
        .add(family("writer", "sk-writer-key-01", writer.clone()));

    let result = orchestrator
        .generate("Introduce the captain", &GenerateOptions::default())
        .await
        .unwrap();
    assert!(result.payload.starts_with("\"I am an airship captain"));
    assert_eq!(result.attempts.len(), 1);
    assert_eq!(result.attempts[0].outcome, AttemptOutcome::Success);
}

// ── Scenario C: fenced JSON with missing fields ──────────────────────────

#[test]
fn e2e_extractor_backfills_missing_fields() {
    let result = extract("```json\n{\"narrative\":\"Hi\"}\n```");
    assert_eq!(result.narrative, "Hi");
    assert_eq!(result.title, "");
    assert_eq!(result.image_directive, "");
    assert!(result.sentiment.is_empty());
    assert!(result.validation.is_clean());
}

// ── Scenario D: retention keeps the newest ten ───────────────────────────

#[tokio::test]
async fn e2e_retention_keeps_most_recent_events() {
    let dir = tempfile::TempDir::new().unwrap();
    let clock = ManualClock::new(
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        chrono::Duration::seconds(1),
    );
    let memory = MemoryStore::new(Arc::new(FileLog::in_dir(dir.path())))
        .with_clock(Arc::new(clock));

    for i in 0..12 {
        memory
            .add_event(&format!("scene {i}"), Metadata::new())
            .await
            .unwrap();
    }

    let texts: Vec<String> = memory
        .history()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.text)
        .collect();
    let expected: Vec<String> = (2..12).rev().map(|i| format!("scene {i}")).collect();
    assert_eq!(texts, expected);
}

// ── Full pipeline ────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_segment_pipeline_with_fallback_and_memory() {
    let throttled = ScriptedBackend::quota();
    let writer = ScriptedBackend::text(
        "Here you go!\n```json\n{\"narrative\": \"The lighthouse lamp flickered twice.\", \
         \"title\": \"Signal\", \"image_directive\": \"a lighthouse in a storm\", \
         \"sentiment\": {\"fear\": 0.4}}\n```",
    );

    let text: Arc<TextOrchestrator> = Arc::new(
        FallbackOrchestrator::new("text")
            .with_shuffle(Arc::new(FixedOrder))
            .with_refusal_detector(refusals())
            .add(family("throttled", "sk-throttled-key-01", throttled.clone()))
            .add(family("writer", "sk-writer-key-01", writer.clone())),
    );
    let memory = Arc::new(MemoryStore::in_memory().with_clock(Arc::new(ManualClock::ticking())));
    let engine = NarrativeEngine::new(text, image_chain(), memory.clone());

    let toggles = StoryToggles {
        enable_image_generation: true,
        ..StoryToggles::default()
    };
    let segment = engine
        .generate_narrative_segment("The keeper sees a signal", "reader-7", toggles)
        .await
        .unwrap();

    assert_eq!(segment.text, "The lighthouse lamp flickered twice.");
    assert_eq!(segment.title, "Signal");
    assert_eq!(segment.provider, "writer");
    assert_eq!(segment.sentiment_scores["fear"], 0.4);
    assert_eq!(segment.image.unwrap().mime_type, "image/png");

    let history = memory.history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].metadata["user_id"], "reader-7");

    let context = engine.assembler().assemble("lighthouse lamp", None).await;
    assert!(context.contains("- The lighthouse lamp flickered twice."));
}

#[tokio::test]
async fn e2e_empty_chain_is_unavailable() {
    let text: Arc<TextOrchestrator> = Arc::new(FallbackOrchestrator::new("text"));
    let memory = Arc::new(MemoryStore::in_memory());
    let engine = NarrativeEngine::new(text, image_chain(), memory.clone());

    let err = engine
        .generate_narrative_segment("Anything", "reader-7", StoryToggles::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GenerationError::AllProvidersExhausted { ref attempts } if attempts.is_empty()
    ));
    assert_eq!(memory.count().await.unwrap(), 0);

    let report = engine.check_consistency("Chapter one", "").await;
    assert_eq!(
        report.suggestions,
        vec!["Validation failed due to API error.".to_string()]
    );
}
