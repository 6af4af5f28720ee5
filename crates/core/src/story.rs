//! Story domain types: the structured result of a generation and the
//! segment handed back to the request layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::provider::ImagePayload;

/// Continuity problems found in a narrative segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(default)]
    pub plot_holes: Vec<String>,
    #[serde(default)]
    pub character_inconsistencies: Vec<String>,
    #[serde(default)]
    pub logic_errors: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ValidationReport {
    /// Report used when the check itself could not run.
    pub fn unavailable() -> Self {
        Self {
            suggestions: vec!["Validation failed due to API error.".into()],
            ..Self::default()
        }
    }

    /// True when no issue or suggestion was reported.
    pub fn is_clean(&self) -> bool {
        self.plot_holes.is_empty()
            && self.character_inconsistencies.is_empty()
            && self.logic_errors.is_empty()
            && self.suggestions.is_empty()
    }
}

/// Best-effort structured payload parsed out of one LLM response.
///
/// Every field defaults to empty; a missing field is never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredStoryResult {
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub image_directive: String,
    /// Emotion label → score in `[0, 1]`.
    #[serde(default)]
    pub sentiment: BTreeMap<String, f64>,
    #[serde(default)]
    pub validation: ValidationReport,
}

/// One emotion label and its score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub label: String,
    pub score: f64,
}

/// Scores ordered strongest first; ties keep label order.
pub fn rank_emotions(scores: &BTreeMap<String, f64>) -> Vec<EmotionScore> {
    let mut ranked: Vec<EmotionScore> = scores
        .iter()
        .map(|(label, score)| EmotionScore {
            label: label.clone(),
            score: *score,
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

/// Feature switches supplied by the request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryToggles {
    #[serde(default = "default_true")]
    pub enable_sentiment: bool,
    #[serde(default = "default_true")]
    pub enable_plot_coherence: bool,
    #[serde(default)]
    pub enable_image_generation: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StoryToggles {
    fn default() -> Self {
        Self {
            enable_sentiment: true,
            enable_plot_coherence: true,
            enable_image_generation: false,
        }
    }
}

/// A generated narrative segment, ready for the request layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeSegment {
    pub text: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImagePayload>,
    pub sentiment_scores: BTreeMap<String, f64>,
    pub validation: ValidationReport,
    /// Family and model that produced the text.
    pub provider: String,
    pub model: String,
}
