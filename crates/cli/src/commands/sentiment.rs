//! `storyforge sentiment | arc`: Emotion analysis.

use std::path::PathBuf;

use super::{build_engine, load_config};

pub async fn analyze(text: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let engine = build_engine(&config).await?;

    let scores = engine.analyze_sentiment(text).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&scores)?);
        return Ok(());
    }

    if scores.is_empty() {
        println!("⚠️  The model returned no usable emotion scores");
        return Ok(());
    }

    println!("🎭 Sentiment");
    for emotion in &scores {
        println!("  {:<10} {:.2}", emotion.label, emotion.score);
    }

    Ok(())
}

pub async fn arc(
    segments: &[PathBuf],
    intended: &[String],
    threshold: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    if segments.len() > intended.len() {
        eprintln!(
            "  Note: {} segment(s) have no intended emotion and will not be checked",
            segments.len() - intended.len()
        );
    }

    let texts = segments
        .iter()
        .map(|path| {
            std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {e}", path.display()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let config = load_config()?;
    let engine = build_engine(&config).await?;

    let deviations = engine.validate_arc(&texts, intended, threshold).await?;

    println!("📈 Emotional arc (threshold {threshold:.2})");
    for (index, (path, emotion)) in segments.iter().zip(intended).enumerate() {
        let mark = if deviations.contains(&index) { "❌" } else { "✅" };
        println!("  {mark} {:>2}. {:<10} {}", index + 1, emotion, path.display());
    }

    if deviations.is_empty() {
        println!("\n  Every checked segment hits its intended emotion.");
    } else {
        println!("\n  {} segment(s) deviate from the arc.", deviations.len());
    }

    Ok(())
}

/// Split `joy, fear,sadness` into labels, dropping blanks.
pub fn parse_arc(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|label| label.trim().to_lowercase())
        .filter(|label| !label.is_empty())
        .collect()
}
