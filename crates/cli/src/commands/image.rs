//! `storyforge image`: Illustrate a description.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;

use storyforge_engine::NarrativeEngine;

use super::load_config;

pub async fn run(
    description: &str,
    prompt: Option<&str>,
    out: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let engine = NarrativeEngine::from_config(&config)
        .await
        .map_err(|e| format!("Failed to open memory: {e}"))?;

    if !engine.image_orchestrator().is_available() {
        return Err("No image provider has a usable API key. Run `storyforge providers`.".into());
    }

    let visual = engine.generate_visual(description, prompt).await.map_err(|e| {
        if e.is_quota() {
            format!("{e}. Image providers are rate-limited, please wait a minute.")
        } else {
            e.to_string()
        }
    })?;

    write_image(out, &visual.image.base64)?;
    println!("🖼️  Saved {} ({} / {})", out.display(), visual.provider, visual.model);
    println!("   Prompt: {}", visual.prompt_used);

    Ok(())
}

pub(crate) fn write_image(path: &Path, base64: &str) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = STANDARD
        .decode(base64.trim())
        .map_err(|e| format!("Provider returned invalid image data: {e}"))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}
