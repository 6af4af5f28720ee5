//! `storyforge generate | text | validate`: Narrative generation.

use clap::Args;
use std::path::{Path, PathBuf};
use storyforge_core::{StoryToggles, ValidationReport};
use tracing::debug;

use super::{build_engine, load_config};

/// Per-run overrides of the `[generation]` feature switches. The last of a
/// `--x` / `--no-x` pair wins; with neither, the configured value stands.
#[derive(Debug, Default, Clone, Args)]
pub struct ToggleArgs {
    /// Score the scene's emotions
    #[arg(long, overrides_with = "no_sentiment")]
    sentiment: bool,

    /// Skip sentiment scoring
    #[arg(long, overrides_with = "sentiment")]
    no_sentiment: bool,

    /// Ask for a continuity report
    #[arg(long, overrides_with = "no_coherence")]
    coherence: bool,

    /// Skip the continuity report
    #[arg(long, overrides_with = "coherence")]
    no_coherence: bool,

    /// Illustrate the scene
    #[arg(long, overrides_with = "no_image")]
    image: bool,

    /// Do not illustrate the scene
    #[arg(long, overrides_with = "image")]
    no_image: bool,
}

impl ToggleArgs {
    pub fn apply(&self, mut toggles: StoryToggles) -> StoryToggles {
        if let Some(on) = switch(self.sentiment, self.no_sentiment) {
            toggles.enable_sentiment = on;
        }
        if let Some(on) = switch(self.coherence, self.no_coherence) {
            toggles.enable_plot_coherence = on;
        }
        if let Some(on) = switch(self.image, self.no_image) {
            toggles.enable_image_generation = on;
        }
        toggles
    }
}

fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

pub async fn generate(
    prompt: &str,
    user: &str,
    overrides: &ToggleArgs,
    image_out: Option<PathBuf>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let mut toggles = overrides.apply(config.generation.toggles());
    if image_out.is_some() {
        toggles.enable_image_generation = true;
    }
    debug!(?toggles, "Resolved story toggles");
    let engine = build_engine(&config).await?;

    let segment = engine
        .generate_narrative_segment(prompt, user, toggles)
        .await
        .map_err(|e| {
            if e.is_quota() {
                format!("{e}. All provider keys are rate-limited, please wait a minute.")
            } else {
                e.to_string()
            }
        })?;

    if let (Some(path), Some(image)) = (&image_out, &segment.image) {
        super::image::write_image(path, &image.base64)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&segment)?);
        return Ok(());
    }

    let title = if segment.title.is_empty() {
        "Untitled"
    } else {
        segment.title.as_str()
    };
    println!("📖 {title}");
    println!("{}\n", "=".repeat(title.chars().count() + 3));
    println!("{}\n", segment.text);

    if !segment.sentiment_scores.is_empty() {
        println!("🎭 Sentiment");
        for (label, score) in &segment.sentiment_scores {
            println!("  {label:<10} {score:.2}");
        }
        println!();
    }

    if toggles.enable_plot_coherence {
        print_report(&segment.validation);
    }

    if toggles.enable_image_generation {
        match (&segment.image, &image_out) {
            (Some(_), Some(path)) => println!("🖼️  Illustration saved to {}", path.display()),
            (Some(image), None) => println!(
                "🖼️  Illustration generated ({} bytes base64)",
                image.base64.len()
            ),
            (None, _) => println!("⚠️  Illustration unavailable"),
        }
    }

    println!("  (via {} / {})", segment.provider, segment.model);

    Ok(())
}

pub async fn text(prompt: &str, context: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let engine = build_engine(&config).await?;

    let output = engine.generate_text(prompt, context).await?;
    println!("{output}");

    Ok(())
}

pub async fn validate(
    chapter: &Path,
    context: &str,
    characters: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let chapter = std::fs::read_to_string(chapter)
        .map_err(|e| format!("Failed to read {}: {e}", chapter.display()))?;
    let engine = build_engine(&config).await?;

    let context = if characters.is_empty() {
        context.to_string()
    } else {
        let cast = engine
            .assembler()
            .assemble_for_characters(&chapter, characters)
            .await;
        format!("{cast}{context}")
    };

    let report = engine.check_consistency(&chapter, &context).await;
    print_report(&report);

    Ok(())
}

fn print_report(report: &ValidationReport) {
    if report.is_clean() {
        println!("✅ No continuity issues found\n");
        return;
    }

    println!("🔎 Continuity report");
    let sections = [
        ("Plot holes", &report.plot_holes),
        ("Character inconsistencies", &report.character_inconsistencies),
        ("Logic errors", &report.logic_errors),
        ("Suggestions", &report.suggestions),
    ];
    for (heading, items) in sections {
        if items.is_empty() {
            continue;
        }
        println!("  {heading}:");
        for item in items {
            println!("    - {item}");
        }
    }
    println!();
}
