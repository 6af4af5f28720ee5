//! `storyforge providers`: Show configured provider families.

use std::sync::Arc;
use storyforge_core::Payload;
use storyforge_providers::{
    ClientRegistry, FallbackOrchestrator, build_image_orchestrator, build_text_orchestrator,
};

use super::load_config;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let registry = Arc::new(ClientRegistry::new());
    let text = build_text_orchestrator(&config, registry.clone());
    let image = build_image_orchestrator(&config, registry);

    println!("🤖 StoryForge Providers");
    println!("=======================");
    println!();
    print_chain("Text", &config.text_providers, &text);
    print_chain("Image", &config.image_providers, &image);

    println!("  Text generation:  {}", availability(text.is_available()));
    println!("  Image generation: {}", availability(image.is_available()));
    println!();
    println!("  Keys are read from api_keys in config.toml and from each family's");
    println!("  environment variable (comma-separated for several keys).");

    Ok(())
}

fn print_chain<P: Payload>(
    label: &str,
    configured: &[storyforge_config::ProviderConfig],
    orchestrator: &FallbackOrchestrator<P>,
) {
    println!("  {label} chain (in fallback order):");
    for provider in configured {
        let keys = orchestrator
            .families()
            .iter()
            .find(|f| f.name == provider.name)
            .map(|f| f.keys.len())
            .unwrap_or(0);
        let status = if keys > 0 { "✅" } else { "⚪" };
        println!(
            "    {status} {:<12} {:<12} keys: {keys:<3} models: {}",
            provider.name,
            provider.kind.as_str(),
            provider.models.join(", ")
        );
        if let Some(env) = &provider.api_key_env {
            println!("       env: {env}");
        }
    }
    println!();
}

fn availability(available: bool) -> &'static str {
    if available { "available" } else { "unavailable (no usable keys)" }
}
