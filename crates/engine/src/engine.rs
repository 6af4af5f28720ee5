//! The narrative engine.
//!
//! One segment is one structured text call: assemble context, ask for a
//! JSON scene, extract it, apply the feature toggles, write the scene
//! back to memory and optionally illustrate it. Only text exhaustion
//! fails a segment; memory and image problems degrade it.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use storyforge_config::AppConfig;
use storyforge_core::{
    EmotionScore, GenerateOptions, GenerationError, ImagePayload, MemoryError, Metadata,
    NarrativeSegment, StoryToggles, ValidationReport, rank_emotions,
};
use storyforge_memory::MemoryStore;
use storyforge_providers::{
    ClientRegistry, ImageOrchestrator, TextOrchestrator, build_image_orchestrator,
    build_text_orchestrator,
};
use tracing::{debug, info, warn};

use crate::assembler::ContextAssembler;
use crate::extractor;
use crate::prompts::{self, DEFAULT_STYLE_KEYWORDS};

/// Minimum score the intended emotion must reach for a segment to stay on
/// its arc.
pub const DEFAULT_ARC_THRESHOLD: f64 = 0.5;

/// An illustration and the exact prompt that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualResult {
    pub image: ImagePayload,
    pub prompt_used: String,
    pub provider: String,
    pub model: String,
}

pub struct NarrativeEngine {
    text: Arc<TextOrchestrator>,
    image: Arc<ImageOrchestrator>,
    memory: Arc<MemoryStore>,
    assembler: ContextAssembler,
    style_keywords: Vec<String>,
}

impl NarrativeEngine {
    pub fn new(
        text: Arc<TextOrchestrator>,
        image: Arc<ImageOrchestrator>,
        memory: Arc<MemoryStore>,
    ) -> Self {
        Self {
            text,
            image,
            assembler: ContextAssembler::new(memory.clone()),
            memory,
            style_keywords: DEFAULT_STYLE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Wire orchestrators and memory from configuration.
    pub async fn from_config(config: &AppConfig) -> Result<Self, MemoryError> {
        let registry = Arc::new(ClientRegistry::new());
        let text = Arc::new(build_text_orchestrator(config, registry.clone()));
        let image = Arc::new(build_image_orchestrator(config, registry));
        let memory = Arc::new(MemoryStore::from_config(&config.memory).await?);

        info!(
            text_families = text.len(),
            image_families = image.len(),
            memory = memory.backend_name(),
            "Narrative engine ready"
        );

        Ok(Self::new(text, image, memory)
            .with_style_keywords(config.generation.style_keywords.clone())
            .with_context_results(config.memory.context_results))
    }

    pub fn with_style_keywords(mut self, keywords: Vec<String>) -> Self {
        self.style_keywords = keywords;
        self
    }

    pub fn with_context_results(mut self, n_results: usize) -> Self {
        self.assembler = ContextAssembler::new(self.memory.clone()).with_results(n_results);
        self
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn assembler(&self) -> &ContextAssembler {
        &self.assembler
    }

    pub fn text_orchestrator(&self) -> &TextOrchestrator {
        &self.text
    }

    pub fn image_orchestrator(&self) -> &ImageOrchestrator {
        &self.image
    }

    /// Generate the next scene for `user_id`.
    pub async fn generate_narrative_segment(
        &self,
        prompt: &str,
        user_id: &str,
        toggles: StoryToggles,
    ) -> Result<NarrativeSegment, GenerationError> {
        let context = self.assembler.assemble(prompt, None).await;
        let request = prompts::story_prompt(&context, prompt, &toggles);

        let result = self
            .text
            .generate(&request, &GenerateOptions::default())
            .await?;
        let mut structured = extractor::extract(&result.payload);
        debug!(
            provider = %result.family,
            model = %result.model,
            attempts = result.attempts.len(),
            "Story segment generated"
        );

        if !toggles.enable_sentiment {
            structured.sentiment.clear();
        }
        if !toggles.enable_plot_coherence {
            structured.validation = ValidationReport::default();
        }

        if structured.narrative.trim().is_empty() {
            warn!(user_id, provider = %result.family, "Response had no narrative, not storing it");
        } else {
            let mut metadata = Metadata::new();
            metadata.insert("user_id".into(), json!(user_id));
            metadata.insert("type".into(), json!("scene"));
            if !structured.title.is_empty() {
                metadata.insert("title".into(), json!(structured.title));
            }
            if let Err(e) = self.memory.add_event(&structured.narrative, metadata).await {
                warn!(user_id, error = %e, "Failed to store scene in memory");
            }
        }

        let image = if toggles.enable_image_generation {
            let directive = if structured.image_directive.trim().is_empty() {
                structured.narrative.as_str()
            } else {
                structured.image_directive.as_str()
            };
            let prompt = prompts::image_prompt(directive, None, &self.style_keywords);
            match self.render(prompt).await {
                Ok(visual) => Some(visual.image),
                Err(e) => {
                    warn!(
                        user_id,
                        error = %e,
                        "Scene illustration failed, continuing without image"
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok(NarrativeSegment {
            text: structured.narrative,
            title: structured.title,
            image,
            sentiment_scores: structured.sentiment,
            validation: structured.validation,
            provider: result.family,
            model: result.model,
        })
    }

    /// Free-form text with caller-supplied context.
    pub async fn generate_text(
        &self,
        prompt: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        let request = prompts::text_prompt(context, prompt);
        let result = self
            .text
            .generate(&request, &GenerateOptions::default())
            .await?;
        Ok(result.payload)
    }

    /// Continuity check of `chapter` against `context`.
    ///
    /// Never fails: exhaustion or an unparseable answer yields
    /// [`ValidationReport::unavailable`].
    pub async fn check_consistency(&self, chapter: &str, context: &str) -> ValidationReport {
        let request = prompts::consistency_prompt(chapter, context);
        match self.text.generate(&request, &GenerateOptions::default()).await {
            Ok(result) => extractor::extract_validation(&result.payload).unwrap_or_else(|| {
                warn!(provider = %result.family, "Continuity report was not valid JSON");
                ValidationReport::unavailable()
            }),
            Err(e) => {
                warn!(error = %e, "Continuity check failed");
                ValidationReport::unavailable()
            }
        }
    }

    /// Illustrate `description`, optionally refined by `user_prompt`.
    ///
    /// A text model first rewrites the description as an image prompt; if
    /// that fails the description and user prompt are used as they are.
    /// Style keywords are appended either way.
    pub async fn generate_visual(
        &self,
        description: &str,
        user_prompt: Option<&str>,
    ) -> Result<VisualResult, GenerationError> {
        let prompt_used = match self.enhance_image_prompt(description, user_prompt).await {
            Some(enhanced) => prompts::image_prompt(&enhanced, None, &self.style_keywords),
            None => prompts::image_prompt(description, user_prompt, &self.style_keywords),
        };
        self.render(prompt_used).await
    }

    async fn enhance_image_prompt(
        &self,
        description: &str,
        user_prompt: Option<&str>,
    ) -> Option<String> {
        if !self.text.is_available() {
            debug!("No text provider for image prompt enhancement");
            return None;
        }
        let request = prompts::image_enhancer_prompt(description, user_prompt);
        match self.text.generate(&request, &GenerateOptions::default()).await {
            Ok(result) => {
                let enhanced = prompts::clean_image_prompt(&result.payload);
                if enhanced.is_empty() {
                    warn!(provider = %result.family, "Image prompt enhancement came back empty");
                    None
                } else {
                    Some(enhanced)
                }
            }
            Err(e) => {
                warn!(error = %e, "Image prompt enhancement failed, using description");
                None
            }
        }
    }

    async fn render(&self, prompt_used: String) -> Result<VisualResult, GenerationError> {
        let result = self
            .image
            .generate(&prompt_used, &GenerateOptions::default())
            .await?;
        Ok(VisualResult {
            image: result.payload,
            prompt_used,
            provider: result.family,
            model: result.model,
        })
    }

    /// Emotion scores for `text`, strongest first.
    ///
    /// An answer with no parseable scores yields an empty list.
    pub async fn analyze_sentiment(
        &self,
        text: &str,
    ) -> Result<Vec<EmotionScore>, GenerationError> {
        let request = prompts::sentiment_prompt(text);
        let result = self
            .text
            .generate(&request, &GenerateOptions::default())
            .await?;
        match extractor::extract_sentiment(&result.payload) {
            Some(scores) => Ok(rank_emotions(&scores)),
            None => {
                warn!(provider = %result.family, "Sentiment answer was not valid JSON");
                Ok(Vec::new())
            }
        }
    }

    /// Indices of the segments whose intended emotion scores below
    /// `threshold`.
    ///
    /// Segments are paired with `intended_arc` by position; segments past the
    /// end of the arc are not checked. Labels compare case-insensitively.
    pub async fn validate_arc(
        &self,
        segments: &[String],
        intended_arc: &[String],
        threshold: f64,
    ) -> Result<Vec<usize>, GenerationError> {
        let mut deviations = Vec::new();
        for (index, (segment, intended)) in segments.iter().zip(intended_arc).enumerate() {
            let emotions = self.analyze_sentiment(segment).await?;
            let intended = intended.trim().to_lowercase();
            let score = emotions
                .iter()
                .find(|e| e.label.to_lowercase() == intended)
                .map_or(0.0, |e| e.score);
            debug!(
                segment = index,
                intended = %intended,
                score,
                dominant = emotions.first().map(|e| e.label.as_str()).unwrap_or("none"),
                "Arc check"
            );
            if score < threshold {
                deviations.push(index);
            }
        }
        Ok(deviations)
    }
}
