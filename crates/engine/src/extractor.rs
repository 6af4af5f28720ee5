//! Structured response extraction.
//!
//! Models asked for a JSON object routinely wrap it in markdown fences,
//! prepend chatter, nest the whole object inside the `narrative` field, or
//! get cut off mid-string. [`extract`] runs a cascade of increasingly
//! forgiving stages and never fails: the worst case is the raw text with
//! JSON noise stripped out.

use regex_lite::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use storyforge_core::{StructuredStoryResult, ValidationReport};
use tracing::debug;

const PLACEHOLDER_TITLE: &str = "Untitled Scene";
const DIRECTIVE_FALLBACK_CHARS: usize = 200;
const MAX_NESTING: usize = 3;

/// Parse a model response into a [`StructuredStoryResult`].
pub fn extract(raw: &str) -> StructuredStoryResult {
    extract_nested(raw, 0)
}

fn extract_nested(raw: &str, depth: usize) -> StructuredStoryResult {
    let candidate = brace_window(strip_fences(raw));

    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(candidate) {
        let mut result = from_object(&obj);
        promote_nested(&mut result, depth);
        return result;
    }

    if let Some(narrative) = scrape_field(raw, "narrative") {
        debug!("Structured parse failed, recovered narrative by pattern");
        let title = scrape_field(raw, "title").unwrap_or_else(|| PLACEHOLDER_TITLE.to_string());
        let image_directive = scrape_field(raw, "image_directive")
            .or_else(|| scrape_field(raw, "image_prompt"))
            .unwrap_or_else(|| snippet(&narrative, DIRECTIVE_FALLBACK_CHARS));
        return StructuredStoryResult {
            narrative,
            title,
            image_directive,
            ..Default::default()
        };
    }

    debug!("No structure found in response, using raw text");
    StructuredStoryResult {
        narrative: strip_noise(raw),
        ..Default::default()
    }
}

/// Drop a surrounding markdown code fence, with or without a language tag.
pub fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(open) = text.find("```") else {
        return text;
    };
    let after = &text[open + 3..];
    // Language tag runs to the end of the opening line.
    let body = match after.find('\n') {
        Some(nl) if after[..nl].chars().all(|c| c.is_ascii_alphanumeric()) => &after[nl + 1..],
        _ => after,
    };
    match body.rfind("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Slice from the first `{` to the last `}`; text without braces is
/// returned unchanged.
pub fn brace_window(text: &str) -> &str {
    let start = text.find('{').unwrap_or(0);
    let text = &text[start..];
    match text.rfind('}') {
        Some(end) => &text[..=end],
        None => text,
    }
}

fn from_object(obj: &Map<String, Value>) -> StructuredStoryResult {
    StructuredStoryResult {
        narrative: string_field(obj, &["narrative", "story", "text"]),
        title: string_field(obj, &["title"]),
        image_directive: string_field(obj, &["image_directive", "image_prompt"]),
        sentiment: obj.get("sentiment").map(sentiment_scores).unwrap_or_default(),
        validation: obj
            .get("validation")
            .and_then(Value::as_object)
            .map(validation_report)
            .unwrap_or_default(),
    }
}

fn string_field(obj: &Map<String, Value>, names: &[&str]) -> String {
    names
        .iter()
        .find_map(|name| obj.get(*name))
        .map(|value| match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

/// Numeric (or numeric-string) scores, clamped into `[0, 1]`.
fn sentiment_scores(value: &Value) -> BTreeMap<String, f64> {
    let Some(obj) = value.as_object() else {
        return BTreeMap::new();
    };
    obj.iter()
        .filter_map(|(label, score)| {
            let score = match score {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }?;
            score.is_finite().then(|| (label.clone(), score.clamp(0.0, 1.0)))
        })
        .collect()
}

fn validation_report(obj: &Map<String, Value>) -> ValidationReport {
    ValidationReport {
        plot_holes: string_list(obj.get("plot_holes")),
        character_inconsistencies: string_list(obj.get("character_inconsistencies")),
        logic_errors: string_list(obj.get("logic_errors")),
        suggestions: string_list(obj.get("suggestions")),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                Value::String(_) | Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// The model sometimes serializes the whole object into `narrative`.
fn promote_nested(result: &mut StructuredStoryResult, depth: usize) {
    if depth >= MAX_NESTING || !result.narrative.trim_start().starts_with('{') {
        return;
    }
    let inner = extract_nested(&result.narrative, depth + 1);
    if inner.narrative.trim().is_empty() || inner.narrative == result.narrative {
        return;
    }
    debug!("Promoting nested narrative object");
    result.narrative = inner.narrative;
    if result.title.is_empty() {
        result.title = inner.title;
    }
    if result.image_directive.is_empty() {
        result.image_directive = inner.image_directive;
    }
    if result.sentiment.is_empty() {
        result.sentiment = inner.sentiment;
    }
    if result.validation.is_clean() {
        result.validation = inner.validation;
    }
}

/// Pull a string field out of malformed JSON. An unterminated value (a
/// truncated response) runs to the end of the text.
fn scrape_field(raw: &str, field: &str) -> Option<String> {
    let re = field_pattern(field)?;
    let captured = re.captures(raw)?.get(1)?.as_str();
    let value = unescape(captured);
    (!value.trim().is_empty()).then_some(value)
}

fn field_pattern(field: &str) -> Option<&'static Regex> {
    static NARRATIVE: OnceLock<Option<Regex>> = OnceLock::new();
    static TITLE: OnceLock<Option<Regex>> = OnceLock::new();
    static DIRECTIVE: OnceLock<Option<Regex>> = OnceLock::new();
    static IMAGE_PROMPT: OnceLock<Option<Regex>> = OnceLock::new();

    let cell = match field {
        "narrative" => &NARRATIVE,
        "title" => &TITLE,
        "image_directive" => &DIRECTIVE,
        "image_prompt" => &IMAGE_PROMPT,
        _ => return None,
    };
    cell.get_or_init(|| Regex::new(&format!(r#""{field}"\s*:\s*"((?:[^"\\]|\\.)*)"#)).ok())
        .as_ref()
}

fn unescape(fragment: &str) -> String {
    // A dangling backslash from truncation would make the literal invalid.
    let fragment = fragment.strip_suffix('\\').unwrap_or(fragment);
    serde_json::from_str::<String>(&format!("\"{fragment}\"")).unwrap_or_else(|_| {
        fragment
            .replace("\\n", "\n")
            .replace("\\\"", "\"")
            .replace("\\\\", "\\")
    })
}

fn noise_pattern() -> Option<&'static Regex> {
    static NOISE: OnceLock<Option<Regex>> = OnceLock::new();
    NOISE
        .get_or_init(|| {
            Regex::new(r#"```[a-zA-Z]*|"?(narrative|title|image_directive|image_prompt|sentiment|validation)"?\s*:"#)
                .ok()
        })
        .as_ref()
}

/// Raw text with fences, field labels and bracket noise removed.
fn strip_noise(raw: &str) -> String {
    let text = match noise_pattern() {
        Some(re) => re.replace_all(raw, "").into_owned(),
        None => raw.to_string(),
    };
    let cleaned = text
        .lines()
        .map(|line| {
            line.trim()
                .trim_matches(|c: char| matches!(c, '{' | '}' | '[' | ']' | ',' | '"'))
                .trim()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if cleaned.is_empty() {
        raw.trim().to_string()
    } else {
        cleaned
    }
}

fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Parse a standalone continuity report. `None` when no JSON object can
/// be recovered.
pub fn extract_validation(raw: &str) -> Option<ValidationReport> {
    let candidate = brace_window(strip_fences(raw));
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(obj)) => {
            // Some models nest the report under a key of its own.
            let obj = obj
                .get("validation")
                .and_then(Value::as_object)
                .unwrap_or(&obj);
            Some(validation_report(obj))
        }
        _ => None,
    }
}

/// Parse an emotion-score object. Scores may sit at the top level or
/// under a `sentiment` or `scores` key.
pub fn extract_sentiment(raw: &str) -> Option<BTreeMap<String, f64>> {
    let candidate = brace_window(strip_fences(raw));
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(candidate) else {
        return None;
    };
    let nested = ["sentiment", "scores"]
        .iter()
        .find_map(|key| obj.get(*key).filter(|v| v.is_object()));
    let scores = match nested {
        Some(inner) => sentiment_scores(inner),
        None => sentiment_scores(&Value::Object(obj.clone())),
    };
    Some(scores)
}
