//! CLI subcommands.

pub mod image;
pub mod memory;
pub mod onboard;
pub mod providers;
pub mod sentiment;
pub mod story;

use storyforge_config::AppConfig;
use storyforge_engine::NarrativeEngine;
use storyforge_memory::MemoryStore;
use tracing::debug;

pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    debug!(
        text_providers = config.text_providers.len(),
        image_providers = config.image_providers.len(),
        memory = %config.memory.backend,
        "Config loaded"
    );
    Ok(config)
}

pub(crate) async fn open_memory(
    config: &AppConfig,
) -> Result<MemoryStore, Box<dyn std::error::Error>> {
    Ok(MemoryStore::from_config(&config.memory)
        .await
        .map_err(|e| format!("Failed to open memory: {e}"))?)
}

/// Build the engine, failing early with setup hints when no text
/// provider has a usable key.
pub(crate) async fn build_engine(
    config: &AppConfig,
) -> Result<NarrativeEngine, Box<dyn std::error::Error>> {
    let engine = NarrativeEngine::from_config(config)
        .await
        .map_err(|e| format!("Failed to open memory: {e}"))?;

    if !engine.text_orchestrator().is_available() {
        eprintln!();
        eprintln!("  ERROR: No text provider has a usable API key!");
        eprintln!();
        eprintln!("  Set at least one of these environment variables:");
        for provider in &config.text_providers {
            if let Some(env) = &provider.api_key_env {
                eprintln!("    {env:<22} ({} / {})", provider.name, provider.kind);
            }
        }
        eprintln!();
        eprintln!("  Or add api_keys to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No text provider available. See above for setup instructions.".into());
    }

    Ok(engine)
}
