//! Configuration loading, validation, and management for StoryForge.
//!
//! Loads configuration from `~/.storyforge/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use storyforge_core::{ProviderKind, StoryToggles};

/// The root configuration structure.
///
/// Maps directly to `~/.storyforge/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text provider families, in priority order
    #[serde(default = "default_text_providers")]
    pub text_providers: Vec<ProviderConfig>,

    /// Image provider families, in priority order
    #[serde(default = "default_image_providers")]
    pub image_providers: Vec<ProviderConfig>,

    /// Continuity memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Generation behaviour and feature defaults
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// One provider family: a vendor API, its keys, and its candidate models.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique name within its list (used in logs and results)
    pub name: String,

    /// Which vendor API this family speaks; also types its keys
    pub kind: ProviderKind,

    /// Inline API keys
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_keys: Vec<String>,

    /// Environment variable holding a comma-separated key blob
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Override the vendor's default endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Candidate models, most preferred first
    pub models: Vec<String>,

    /// Per-attempt timeout
    #[serde(default = "default_text_timeout")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("api_keys", &format!("[{} REDACTED]", self.api_keys.len()))
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ProviderConfig {
    fn new(
        name: &str,
        kind: ProviderKind,
        env: &str,
        models: &[&str],
        timeout_secs: u64,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            api_keys: vec![],
            api_key_env: Some(env.into()),
            base_url: None,
            models: models.iter().map(|m| m.to_string()).collect(),
            timeout_secs,
        }
    }

    /// The raw comma-separated key blob: inline keys plus the env var's value.
    pub fn key_blob_with(&self, lookup: impl Fn(&str) -> Option<String>) -> String {
        let mut parts: Vec<String> = self.api_keys.clone();
        if let Some(value) = self.api_key_env.as_deref().and_then(lookup) {
            parts.push(value);
        }
        parts.join(",")
    }
}

fn default_text_timeout() -> u64 {
    15
}

fn default_text_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new(
            "gemini",
            ProviderKind::Gemini,
            "GEMINI_API_KEY",
            &["gemini-2.0-flash", "gemini-1.5-flash", "gemini-1.5-pro"],
            15,
        ),
        ProviderConfig::new(
            "openai",
            ProviderKind::OpenAi,
            "OPENAI_API_KEY",
            &["gpt-4o-mini", "gpt-4o"],
            15,
        ),
        ProviderConfig::new(
            "perplexity",
            ProviderKind::Perplexity,
            "PERPLEXITY_API_KEY",
            &["sonar", "sonar-pro"],
            12,
        ),
        ProviderConfig::new(
            "huggingface",
            ProviderKind::HuggingFace,
            "HUGGINGFACE_API_KEY",
            &[
                "meta-llama/Llama-3.1-8B-Instruct",
                "mistralai/Mistral-7B-Instruct-v0.3",
            ],
            12,
        ),
    ]
}

fn default_image_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new(
            "stability",
            ProviderKind::Stability,
            "STABILITY_API_KEY",
            &["stable-diffusion-xl-1024-v1-0"],
            30,
        ),
        ProviderConfig::new(
            "gemini-imagen",
            ProviderKind::Gemini,
            "GEMINI_API_KEY",
            &["imagen-3.0-generate-002"],
            30,
        ),
        ProviderConfig::new(
            "openai-images",
            ProviderKind::OpenAi,
            "OPENAI_API_KEY",
            &["dall-e-3"],
            30,
        ),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "file", "sqlite", or "in_memory"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Where events and profiles are persisted (defaults to ~/.storyforge/data)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Maximum number of retained events
    #[serde(default = "default_retention")]
    pub retention: usize,

    /// Per-event character budget when feeding context into prompts
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,

    /// How many past events to retrieve per generation
    #[serde(default = "default_context_results")]
    pub context_results: usize,
}

fn default_memory_backend() -> String {
    "file".into()
}
fn default_retention() -> usize {
    10
}
fn default_snippet_chars() -> usize {
    1000
}
fn default_context_results() -> usize {
    3
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            data_dir: None,
            retention: default_retention(),
            snippet_chars: default_snippet_chars(),
            context_results: default_context_results(),
        }
    }
}

impl MemoryConfig {
    /// Resolved data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("data"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Phrases that mark a response as the provider breaking character
    #[serde(default = "default_refusal_phrases")]
    pub refusal_phrases: Vec<String>,

    /// Style keywords appended to every image prompt
    #[serde(default = "default_style_keywords")]
    pub style_keywords: Vec<String>,

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

fn default_refusal_phrases() -> Vec<String> {
    [
        "i am a search assistant",
        "i'm a search assistant",
        "as a search engine",
        "i am perplexity",
        "i'm perplexity",
        "as an ai language model",
        "as an ai assistant",
        "i cannot fulfill this request",
        "i can't fulfill this request",
        "i'm unable to help with",
        "i cannot assist with",
        "i can't assist with",
        "i'm not able to write",
        "i cannot create content",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_style_keywords() -> Vec<String> {
    [
        "cinematic lighting",
        "concept art",
        "8k",
        "highly detailed",
        "dramatic atmosphere",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl GenerationConfig {
    /// Configured feature switches, before any per-request override.
    pub fn toggles(&self) -> StoryToggles {
        StoryToggles {
            enable_sentiment: self.enable_sentiment,
            enable_plot_coherence: self.enable_plot_coherence,
            enable_image_generation: self.enable_image_generation,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            refusal_phrases: default_refusal_phrases(),
            style_keywords: default_style_keywords(),
            enable_sentiment: true,
            enable_plot_coherence: true,
            enable_image_generation: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.storyforge/config.toml).
    ///
    /// Environment overrides:
    /// - `STORYFORGE_DATA_DIR`
    /// - `STORYFORGE_MEMORY_BACKEND`
    /// - `STORYFORGE_RETENTION`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`, then re-validate.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(dir) = lookup("STORYFORGE_DATA_DIR") {
            self.memory.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(backend) = lookup("STORYFORGE_MEMORY_BACKEND") {
            self.memory.backend = backend;
        }

        if let Some(retention) = lookup("STORYFORGE_RETENTION") {
            self.memory.retention = retention.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "STORYFORGE_RETENTION must be a positive integer, got '{retention}'"
                ))
            })?;
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".storyforge")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.memory.retention == 0 {
            return Err(ConfigError::ValidationError(
                "memory.retention must be at least 1".into(),
            ));
        }

        if self.memory.snippet_chars < 16 {
            return Err(ConfigError::ValidationError(
                "memory.snippet_chars must be at least 16".into(),
            ));
        }

        if !matches!(
            self.memory.backend.as_str(),
            "file" | "sqlite" | "in_memory"
        ) {
            return Err(ConfigError::ValidationError(format!(
                "unknown memory backend '{}'",
                self.memory.backend
            )));
        }

        for (list, providers) in [
            ("text_providers", &self.text_providers),
            ("image_providers", &self.image_providers),
        ] {
            let mut seen = HashSet::new();
            for provider in providers {
                if !seen.insert(provider.name.as_str()) {
                    return Err(ConfigError::ValidationError(format!(
                        "duplicate provider name '{}' in {list}",
                        provider.name
                    )));
                }
                if provider.models.is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "provider '{}' in {list} lists no models",
                        provider.name
                    )));
                }
                if provider.timeout_secs == 0 {
                    return Err(ConfigError::ValidationError(format!(
                        "provider '{}' in {list} needs a timeout above zero",
                        provider.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            text_providers: default_text_providers(),
            image_providers: default_image_providers(),
            memory: MemoryConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory.retention, 10);
        assert_eq!(config.memory.snippet_chars, 1000);
        assert_eq!(config.text_providers[0].kind, ProviderKind::Gemini);
        assert_eq!(config.image_providers[0].kind, ProviderKind::Stability);
        assert!(!config.generation.enable_image_generation);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.text_providers.len(), config.text_providers.len());
        assert_eq!(parsed.memory.retention, config.memory.retention);
        assert_eq!(parsed.image_providers[1].models, vec!["imagen-3.0-generate-002"]);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().text_providers[1].name, "openai");
    }

    #[test]
    fn parses_custom_provider_chain() {
        let toml_str = r#"
[[text_providers]]
name = "primary"
kind = "openai"
api_keys = ["sk-one", "sk-two"]
base_url = "http://localhost:8000/v1"
models = ["local-large", "local-small"]
timeout_secs = 10

[memory]
backend = "in_memory"
retention = 5
"#;
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), toml_str).unwrap();

        let config = AppConfig::load_from(tmp.path()).unwrap();
        assert_eq!(config.text_providers.len(), 1);
        assert_eq!(config.text_providers[0].api_keys.len(), 2);
        assert_eq!(config.memory.retention, 5);
        assert_eq!(config.memory.backend, "in_memory");
        // Image providers untouched by the file keep their defaults
        assert_eq!(config.image_providers.len(), 3);
    }

    #[test]
    fn unparseable_file_is_parse_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "text_providers = 42").unwrap();
        let err = AppConfig::load_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn zero_retention_rejected() {
        let mut config = AppConfig::default();
        config.memory.retention = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn provider_without_models_rejected() {
        let mut config = AppConfig::default();
        config.text_providers[0].models.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_provider_names_rejected() {
        let mut config = AppConfig::default();
        let dup = config.text_providers[0].clone();
        config.text_providers.push(dup);
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let env = HashMap::from([
            ("STORYFORGE_RETENTION", "4"),
            ("STORYFORGE_MEMORY_BACKEND", "sqlite"),
            ("STORYFORGE_DATA_DIR", "/var/lib/storyforge"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.memory.retention, 4);
        assert_eq!(config.memory.backend, "sqlite");
        assert_eq!(config.memory.data_dir(), PathBuf::from("/var/lib/storyforge"));
    }

    #[test]
    fn bad_retention_env_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(|name| {
            (name == "STORYFORGE_RETENTION").then(|| "lots".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn key_blob_merges_inline_and_env() {
        let mut provider = AppConfig::default().text_providers[0].clone();
        provider.api_keys = vec!["AIzaInlineKey".into()];
        let blob = provider.key_blob_with(|name| {
            (name == "GEMINI_API_KEY").then(|| "AIzaEnvKeyOne, AIzaEnvKeyTwo".to_string())
        });
        assert_eq!(blob, "AIzaInlineKey,AIzaEnvKeyOne, AIzaEnvKeyTwo");
    }

    #[test]
    fn provider_debug_redacts_keys() {
        let mut provider = AppConfig::default().text_providers[1].clone();
        provider.api_keys = vec!["sk-very-secret".into()];
        let debug = format!("{provider:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini-2.0-flash"));
        assert!(toml_str.contains("STABILITY_API_KEY"));
    }

    #[test]
    fn generation_toggles_come_from_file() {
        let config: AppConfig = toml::from_str(
            "[generation]\nenable_image_generation = true\nenable_sentiment = false\n",
        )
        .unwrap();
        let toggles = config.generation.toggles();
        assert!(toggles.enable_image_generation);
        assert!(!toggles.enable_sentiment);
        assert!(toggles.enable_plot_coherence);
        assert_eq!(AppConfig::default().generation.toggles(), StoryToggles::default());
    }
}
