//! Prompt templates.

use storyforge_core::StoryToggles;

use crate::extractor::strip_fences;

/// Longest text, in characters, sent for emotion classification.
pub const SENTIMENT_MAX_CHARS: usize = 2000;

pub const DEFAULT_STYLE_KEYWORDS: &[&str] = &[
    "cinematic lighting",
    "concept art",
    "8k",
    "highly detailed",
    "dramatic atmosphere",
];

const STORY_SEGMENT_PROMPT: &str = r#"You are a best-selling novelist known for immersive, "Show, Don't Tell" storytelling.
Write the next scene of the story based on the instruction below. Focus on sensory details, subtext in dialogue, and psychological depth.

{context}Instruction: {prompt}

Respond with ONLY a JSON object, no commentary, in this shape:
{
  "narrative": "the full scene text",
  "title": "a short evocative title for the scene",
  "image_directive": "one sentence describing the most striking visual moment"{extras}
}"#;

const SENTIMENT_FIELD: &str = r#",
  "sentiment": {"joy": 0.0, "sadness": 0.0, "anger": 0.0, "fear": 0.0, "love": 0.0, "surprise": 0.0}"#;

const VALIDATION_FIELD: &str = r#",
  "validation": {"plot_holes": [], "character_inconsistencies": [], "logic_errors": [], "suggestions": []}"#;

const CONSISTENCY_CHECK_PROMPT: &str = r#"You are a continuity editor for a novel.
Analyze the following chapter against the provided context.

Context:
{context}

Chapter:
{chapter}

Identify any:
1. Plot Holes (Contradictions with context)
2. Character Inconsistencies (Voice, Motivation, Location)
3. Logic Errors

Output a JSON object:
{
    "plot_holes": [],
    "character_inconsistencies": [],
    "logic_errors": [],
    "suggestions": []
}
If no issues, arrays should be empty."#;

const IMAGE_PROMPT_ENHANCER: &str = r#"You are an expert digital artist and prompt engineer for Stable Diffusion.
Convert the following scene description into a high-quality image generation prompt.
Include specific style keywords (lighting, composition, art style).
Output ONLY the comma-separated prompt.

Description: {description}{direction}"#;

const SENTIMENT_ANALYSIS_PROMPT: &str = r#"Classify the emotions expressed in the text below.
Score each of joy, sadness, anger, fear, love and surprise between 0 and 1.

Text:
{text}

Respond with ONLY a JSON object:
{"joy": 0.0, "sadness": 0.0, "anger": 0.0, "fear": 0.0, "love": 0.0, "surprise": 0.0}"#;

/// Substitute `{name}` slots in one pass.
///
/// Substituted values are never rescanned, so slot names appearing in user
/// text or memory stay literal. Braces that do not form a known slot are
/// copied through.
fn fill(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let slot = tail.find('}').and_then(|close| {
            let name = &tail[..close];
            slots
                .iter()
                .find(|(slot, _)| *slot == name)
                .map(|(_, value)| (close, *value))
        });
        match slot {
            Some((close, value)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// The single structured-output prompt behind a narrative segment.
///
/// Sentiment scores (each in `[0, 1]`) and the continuity report are only
/// requested when their toggles are on.
pub fn story_prompt(context: &str, prompt: &str, toggles: &StoryToggles) -> String {
    let context = if context.trim().is_empty() {
        String::new()
    } else {
        format!("Story so far:\n{}\n\n", context.trim_end())
    };

    let mut extras = String::new();
    if toggles.enable_sentiment {
        extras.push_str(SENTIMENT_FIELD);
    }
    if toggles.enable_plot_coherence {
        extras.push_str(VALIDATION_FIELD);
    }

    fill(
        STORY_SEGMENT_PROMPT,
        &[("context", &context), ("prompt", prompt), ("extras", &extras)],
    )
}

/// Free-form generation with caller-supplied context.
pub fn text_prompt(context: &str, prompt: &str) -> String {
    format!("Context:\n{context}\n\nPrompt: {prompt}")
}

pub fn consistency_prompt(chapter: &str, context: &str) -> String {
    fill(
        CONSISTENCY_CHECK_PROMPT,
        &[("context", context), ("chapter", chapter)],
    )
}

/// Ask a text model to turn a scene description into an image prompt.
pub fn image_enhancer_prompt(description: &str, user_prompt: Option<&str>) -> String {
    let direction = match user_prompt.map(str::trim).filter(|s| !s.is_empty()) {
        Some(extra) => format!("\nAdditional direction: {extra}"),
        None => String::new(),
    };
    fill(
        IMAGE_PROMPT_ENHANCER,
        &[("description", description.trim()), ("direction", &direction)],
    )
}

/// Normalize an enhancer answer into a single comma-separated line.
///
/// Returns an empty string when nothing usable is left.
pub fn clean_image_prompt(raw: &str) -> String {
    let body = strip_fences(raw);
    let body = body
        .strip_prefix("Prompt:")
        .or_else(|| body.strip_prefix("prompt:"))
        .unwrap_or(body);
    body.lines()
        .map(|line| line.trim().trim_matches('"').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(',')
        .to_string()
}

/// Emotion classification of `text`, truncated to
/// [`SENTIMENT_MAX_CHARS`] characters.
pub fn sentiment_prompt(text: &str) -> String {
    let text: String = text.chars().take(SENTIMENT_MAX_CHARS).collect();
    fill(SENTIMENT_ANALYSIS_PROMPT, &[("text", text.trim())])
}

/// Image prompt: the description, the user's own additions, then the style
/// keywords, comma-separated.
pub fn image_prompt(
    description: &str,
    user_prompt: Option<&str>,
    style_keywords: &[String],
) -> String {
    let mut parts: Vec<&str> = vec![description.trim()];
    if let Some(extra) = user_prompt.map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(extra);
    }
    parts.extend(style_keywords.iter().map(String::as_str));
    parts.retain(|p| !p.is_empty());
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_prompt_includes_context_and_instruction() {
        let prompt = story_prompt("- The gate fell.\n", "Mira escapes", &StoryToggles::default());
        assert!(prompt.contains("Story so far:\n- The gate fell.\n\n"));
        assert!(prompt.contains("Instruction: Mira escapes"));
        assert!(prompt.contains("\"sentiment\""));
        assert!(prompt.contains("\"validation\""));
        assert!(!prompt.contains("{extras}"));
    }

    #[test]
    fn story_prompt_respects_toggles() {
        let toggles = StoryToggles {
            enable_sentiment: false,
            enable_plot_coherence: false,
            enable_image_generation: false,
        };
        let prompt = story_prompt("", "Begin", &toggles);
        assert!(!prompt.contains("Story so far"));
        assert!(!prompt.contains("\"sentiment\""));
        assert!(!prompt.contains("\"validation\""));
        assert!(prompt.contains("\"image_directive\""));
    }

    #[test]
    fn text_prompt_format() {
        assert_eq!(text_prompt("ctx", "go"), "Context:\nctx\n\nPrompt: go");
    }

    #[test]
    fn consistency_prompt_fills_both_slots() {
        let prompt = consistency_prompt("CHAPTER BODY", "CONTEXT BODY");
        assert!(prompt.contains("Context:\nCONTEXT BODY"));
        assert!(prompt.contains("Chapter:\nCHAPTER BODY"));
    }

    #[test]
    fn image_prompt_appends_keywords() {
        let keywords: Vec<String> = DEFAULT_STYLE_KEYWORDS.iter().map(|s| s.to_string()).collect();
        let prompt = image_prompt("A ruined tower at dusk", Some("  watercolor "), &keywords);
        assert_eq!(
            prompt,
            "A ruined tower at dusk, watercolor, cinematic lighting, concept art, 8k, \
             highly detailed, dramatic atmosphere"
        );
        assert_eq!(image_prompt("Tower", None, &[]), "Tower");
    }

    #[test]
    fn slot_names_in_input_stay_literal() {
        let prompt = story_prompt(
            "- the map read {prompt} and {extras}",
            "Open the vault",
            &StoryToggles::default(),
        );
        assert_eq!(prompt.matches("Open the vault").count(), 1);
        assert!(prompt.contains("- the map read {prompt} and {extras}"));
        assert_eq!(prompt.matches("\"sentiment\"").count(), 1);

        let prompt = consistency_prompt("She wrote {context} on the wall.", "{chapter}");
        assert!(prompt.contains("Context:\n{chapter}\n"));
        assert!(prompt.contains("Chapter:\nShe wrote {context} on the wall."));
    }

    #[test]
    fn fill_keeps_unknown_braces() {
        assert_eq!(
            fill("{\"a\": {x}} {y", &[("x", "1")]),
            "{\"a\": 1} {y"
        );
    }

    #[test]
    fn enhancer_prompt_carries_direction() {
        let prompt = image_enhancer_prompt("A tower", Some(" at dusk "));
        assert!(prompt.ends_with("Description: A tower\nAdditional direction: at dusk"));
        assert!(image_enhancer_prompt("A tower", None).ends_with("Description: A tower"));
    }

    #[test]
    fn enhancer_answers_are_cleaned() {
        assert_eq!(
            clean_image_prompt("```\n\"a tower, golden hour,\"\n```"),
            "a tower, golden hour"
        );
        assert_eq!(
            clean_image_prompt("Prompt: misty ruins,\nsoft light"),
            "misty ruins, soft light"
        );
        assert_eq!(clean_image_prompt("  \n "), "");
    }

    #[test]
    fn sentiment_prompt_truncates() {
        let long = "a".repeat(SENTIMENT_MAX_CHARS + 50);
        let prompt = sentiment_prompt(&long);
        assert!(prompt.contains(&"a".repeat(SENTIMENT_MAX_CHARS)));
        assert!(!prompt.contains(&"a".repeat(SENTIMENT_MAX_CHARS + 1)));
    }
}
