//! `storyforge memory`: Continuity memory management.

use std::collections::BTreeMap;
use storyforge_core::Metadata;
use storyforge_memory::truncate_snippet;

use super::{load_config, open_memory};

pub async fn history(limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let memory = open_memory(&config).await?;

    let events = memory.history().await?;
    println!("🧠 Story Memory ({} backend)", memory.backend_name());
    println!("====================");
    println!("  Events:    {} (retention {})", events.len(), memory.retention());
    println!();

    if events.is_empty() {
        println!("   No events yet. Run `storyforge generate` to start a story.");
        return Ok(());
    }

    for event in events.iter().take(limit) {
        let kind = event
            .metadata
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("event");
        println!(
            "  [{}] {kind:<6} {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            truncate_snippet(&event.text, 80).replace('\n', " ")
        );
    }

    Ok(())
}

pub async fn search(query: &str, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let memory = open_memory(&config).await?;

    println!("🔍 Searching memory for: \"{query}\"");
    println!();

    let results = memory.relevant_context(query, limit).await;
    if results.is_empty() {
        println!("   No events found.");
    } else {
        for (i, text) in results.iter().enumerate() {
            println!("  {:>2}. {}", i + 1, truncate_snippet(text, 120).replace('\n', " "));
        }
    }

    Ok(())
}

pub async fn add(text: &str, user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let memory = open_memory(&config).await?;

    let mut metadata = Metadata::new();
    metadata.insert("user_id".into(), serde_json::json!(user));
    metadata.insert("type".into(), serde_json::json!("note"));

    let id = memory.add_event(text, metadata).await?;
    println!("✅ Stored {id}");

    Ok(())
}

pub async fn clear(confirm: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirm {
        println!("⚠️  This will delete ALL story events permanently.");
        println!("   Character profiles are kept.");
        println!("   Run with --confirm to proceed:");
        println!("   storyforge memory clear --confirm");
        return Ok(());
    }

    let config = load_config()?;
    let memory = open_memory(&config).await?;
    memory.clear().await?;
    println!("🗑️  All story events cleared.");

    Ok(())
}

pub async fn profiles() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let memory = open_memory(&config).await?;

    let profiles = memory.profiles().await;
    println!("👥 Character Profiles");
    println!("=====================");
    if profiles.is_empty() {
        println!("   No profiles yet. Add one with `storyforge memory set-profile NAME key=value`.");
        return Ok(());
    }

    for profile in profiles {
        println!("  {}", profile.name);
        for (key, value) in &profile.traits {
            match value {
                serde_json::Value::String(s) => println!("    {key}: {s}"),
                other => println!("    {key}: {other}"),
            }
        }
    }

    Ok(())
}

pub async fn set_profile(name: &str, pairs: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let traits = parse_traits(pairs)?;

    let config = load_config()?;
    let memory = open_memory(&config).await?;
    let profile = memory.update_profile(name, traits).await;
    println!("✅ Updated {} ({} traits)", profile.name, profile.traits.len());

    Ok(())
}

/// `key=value` pairs; values that parse as JSON keep their type.
fn parse_traits(pairs: &[String]) -> Result<BTreeMap<String, serde_json::Value>, String> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("Expected key=value, got '{pair}'"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("Empty trait name in '{pair}'"));
            }
            let value = serde_json::from_str(value.trim())
                .unwrap_or_else(|_| serde_json::Value::String(value.trim().to_string()));
            Ok((key.to_string(), value))
        })
        .collect()
}
