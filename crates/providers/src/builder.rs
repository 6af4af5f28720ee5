//! Building orchestrators from configuration.

use std::sync::Arc;
use std::time::Duration;
use storyforge_config::{AppConfig, ProviderConfig};
use storyforge_core::{Backend, ImageBackend, ProviderKind, TextBackend};
use tracing::{debug, warn};

use crate::fallback::{FallbackOrchestrator, ImageOrchestrator, ProviderFamily, TextOrchestrator};
use crate::gemini::{GEMINI_BASE_URL, GeminiBackend, ImagenBackend};
use crate::keys::KeyPool;
use crate::openai_compat::{
    HUGGINGFACE_BASE_URL, OPENAI_BASE_URL, OpenAiCompatBackend, OpenAiImageBackend,
    PERPLEXITY_BASE_URL,
};
use crate::refusal::RefusalDetector;
use crate::registry::ClientRegistry;
use crate::stability::{STABILITY_BASE_URL, StabilityBackend};

/// Build the text orchestrator, reading key blobs from the process
/// environment.
pub fn build_text_orchestrator(
    config: &AppConfig,
    registry: Arc<ClientRegistry>,
) -> TextOrchestrator {
    build_text_orchestrator_with(config, registry, |name| std::env::var(name).ok())
}

/// Build the text orchestrator with an explicit environment lookup.
pub fn build_text_orchestrator_with(
    config: &AppConfig,
    registry: Arc<ClientRegistry>,
    lookup: impl Fn(&str) -> Option<String>,
) -> TextOrchestrator {
    let refusals = RefusalDetector::new(&config.generation.refusal_phrases);
    let mut orchestrator = FallbackOrchestrator::new("text").with_refusal_detector(refusals);

    for provider in &config.text_providers {
        let Some(backend) = text_backend(provider, registry.clone()) else {
            warn!(
                provider = %provider.name,
                kind = %provider.kind,
                "No text transport for this kind, skipping"
            );
            continue;
        };
        if let Some(family) = family(provider, backend, &lookup) {
            orchestrator = orchestrator.add(family);
        }
    }

    orchestrator
}

/// Build the image orchestrator, reading key blobs from the process
/// environment.
pub fn build_image_orchestrator(
    config: &AppConfig,
    registry: Arc<ClientRegistry>,
) -> ImageOrchestrator {
    build_image_orchestrator_with(config, registry, |name| std::env::var(name).ok())
}

/// Build the image orchestrator with an explicit environment lookup.
pub fn build_image_orchestrator_with(
    config: &AppConfig,
    registry: Arc<ClientRegistry>,
    lookup: impl Fn(&str) -> Option<String>,
) -> ImageOrchestrator {
    let mut orchestrator: ImageOrchestrator = FallbackOrchestrator::new("image");

    for provider in &config.image_providers {
        let Some(backend) = image_backend(provider, registry.clone()) else {
            warn!(
                provider = %provider.name,
                kind = %provider.kind,
                "No image transport for this kind, skipping"
            );
            continue;
        };
        if let Some(family) = family(provider, backend, &lookup) {
            orchestrator = orchestrator.add(family);
        }
    }

    orchestrator
}

fn family<P>(
    provider: &ProviderConfig,
    backend: Arc<dyn Backend<P>>,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Option<ProviderFamily<P>> {
    let keys = KeyPool::parse(provider.kind, &provider.key_blob_with(lookup));
    if keys.is_empty() {
        debug!(provider = %provider.name, "No usable keys, skipping family");
        return None;
    }

    debug!(
        provider = %provider.name,
        keys = keys.len(),
        models = provider.models.len(),
        "Registered provider family"
    );

    Some(ProviderFamily::new(
        provider.name.clone(),
        keys,
        provider.models.clone(),
        Duration::from_secs(provider.timeout_secs),
        backend,
    ))
}

fn text_backend(
    provider: &ProviderConfig,
    registry: Arc<ClientRegistry>,
) -> Option<Arc<TextBackend>> {
    let name = provider.name.clone();
    let url = provider.base_url.as_deref();
    let backend: Arc<TextBackend> = match provider.kind {
        ProviderKind::Gemini => Arc::new(GeminiBackend::custom(
            name,
            url.unwrap_or(GEMINI_BASE_URL),
            registry,
        )),
        ProviderKind::OpenAi => Arc::new(OpenAiCompatBackend::custom(
            name,
            url.unwrap_or(OPENAI_BASE_URL),
            registry,
        )),
        ProviderKind::Perplexity => Arc::new(OpenAiCompatBackend::custom(
            name,
            url.unwrap_or(PERPLEXITY_BASE_URL),
            registry,
        )),
        ProviderKind::HuggingFace => Arc::new(OpenAiCompatBackend::custom(
            name,
            url.unwrap_or(HUGGINGFACE_BASE_URL),
            registry,
        )),
        ProviderKind::Stability => return None,
    };
    Some(backend)
}

fn image_backend(
    provider: &ProviderConfig,
    registry: Arc<ClientRegistry>,
) -> Option<Arc<ImageBackend>> {
    let name = provider.name.clone();
    let url = provider.base_url.as_deref();
    let backend: Arc<ImageBackend> = match provider.kind {
        ProviderKind::Stability => Arc::new(StabilityBackend::custom(
            name,
            url.unwrap_or(STABILITY_BASE_URL),
            registry,
        )),
        ProviderKind::Gemini => Arc::new(ImagenBackend::custom(
            name,
            url.unwrap_or(GEMINI_BASE_URL),
            registry,
        )),
        ProviderKind::OpenAi => Arc::new(OpenAiImageBackend::custom(
            name,
            url.unwrap_or(OPENAI_BASE_URL),
            registry,
        )),
        ProviderKind::Perplexity | ProviderKind::HuggingFace => return None,
    };
    Some(backend)
}
