//! Lexical similarity for event retrieval.
//!
//! Pure-Rust term-frequency cosine similarity. Tokens are lower-cased runs
//! of alphanumeric characters.

use std::collections::HashMap;
use storyforge_core::MemoryEvent;

/// Term-frequency vector of `text`.
pub fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut tf = HashMap::new();
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        *tf.entry(token.to_lowercase()).or_insert(0.0) += 1.0;
    }
    tf
}

/// Cosine similarity of two sparse term vectors.
///
/// Returns a value in [0, 1]. Returns 0.0 if either vector is empty.
pub fn cosine_similarity(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(term, x)| large.get(term).map(|y| x * y))
        .sum();

    let norm_a: f64 = a.values().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|x| x * x).sum::<f64>().sqrt();

    let denom = norm_a * norm_b;
    if denom < 1e-10 {
        return 0.0;
    }

    dot / denom
}

/// Rank `events` (insertion order) by similarity to `query`, returning at
/// most `limit` of them, best first.
///
/// Ties go to the more recent event. Events with zero overlap still
/// qualify, so a non-empty log always yields `min(limit, len)` results.
pub fn rank<'a>(events: &'a [MemoryEvent], query: &str, limit: usize) -> Vec<&'a MemoryEvent> {
    let query_tf = term_frequencies(query);

    let mut scored: Vec<(f64, usize, &MemoryEvent)> = events
        .iter()
        .enumerate()
        .map(|(i, event)| {
            let score = cosine_similarity(&query_tf, &term_frequencies(&event.text));
            (score, i, event)
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.2.timestamp.cmp(&a.2.timestamp))
            .then_with(|| b.1.cmp(&a.1))
    });
    scored.truncate(limit);
    scored.into_iter().map(|(_, _, e)| e).collect()
}
