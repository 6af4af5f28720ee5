//! Stability AI text-to-image transport.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::sync::Arc;
use storyforge_core::{Backend, ImagePayload, ProviderError, ProviderKey};
use tracing::debug;

use crate::http::{error_from_response, map_transport};
use crate::registry::ClientRegistry;

pub const STABILITY_BASE_URL: &str = "https://api.stability.ai";

pub struct StabilityBackend {
    name: String,
    base_url: String,
    registry: Arc<ClientRegistry>,
}

impl StabilityBackend {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self::custom("stability", STABILITY_BASE_URL, registry)
    }

    pub fn custom(
        name: impl Into<String>,
        base_url: impl Into<String>,
        registry: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            registry,
        }
    }
}

fn request_body(prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "steps": 40,
        "width": 1024,
        "height": 1024,
        "seed": 0,
        "cfg_scale": 5,
        "samples": 1,
        "text_prompts": [{ "text": prompt, "weight": 1 }],
    })
}

#[async_trait]
impl Backend<ImagePayload> for StabilityBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(
        &self,
        key: &ProviderKey,
        model: &str,
        prompt: &str,
    ) -> std::result::Result<ImagePayload, ProviderError> {
        let url = format!("{}/v1/generation/{}/text-to-image", self.base_url, model);

        debug!(
            provider = %self.name,
            model,
            key = key.fingerprint(),
            "Sending text-to-image request"
        );

        let response = self
            .registry
            .client_for(key)
            .post(&url)
            .bearer_auth(key.secret())
            .header("Accept", "application/json")
            .json(&request_body(prompt))
            .send()
            .await
            .map_err(map_transport)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let api: GenerationResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        extract_image(api)
    }
}

fn extract_image(api: GenerationResponse) -> std::result::Result<ImagePayload, ProviderError> {
    let artifact = api
        .artifacts
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse)?;

    if artifact.finish_reason.as_deref() == Some("CONTENT_FILTERED") {
        return Err(ProviderError::ContentBlocked("CONTENT_FILTERED".into()));
    }

    let b64 = artifact.base64.unwrap_or_default();
    if b64.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    STANDARD
        .decode(b64.as_bytes())
        .map_err(|e| ProviderError::InvalidResponse(format!("Artifact is not base64: {e}")))?;

    Ok(ImagePayload::png(b64))
}

// --- Stability API types ---

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    #[serde(default)]
    base64: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerationResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn body_matches_generation_settings() {
        let body = request_body("a lighthouse at dusk");
        assert_eq!(body["steps"], 40);
        assert_eq!(body["width"], 1024);
        assert_eq!(body["cfg_scale"], 5);
        assert_eq!(body["samples"], 1);
        assert_eq!(body["text_prompts"][0]["text"], "a lighthouse at dusk");
    }

    #[test]
    fn returns_first_artifact() {
        let api = parse(r#"{"artifacts":[{"base64":"iVBORw0KGgo=","finishReason":"SUCCESS"}]}"#);
        let image = extract_image(api).unwrap();
        assert_eq!(image.base64, "iVBORw0KGgo=");
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn filtered_artifact_is_blocked() {
        let api = parse(r#"{"artifacts":[{"base64":"","finishReason":"CONTENT_FILTERED"}]}"#);
        assert!(matches!(
            extract_image(api),
            Err(ProviderError::ContentBlocked(_))
        ));
    }

    #[test]
    fn rejects_garbage_payload() {
        let api = parse(r#"{"artifacts":[{"base64":"not base64 at all!"}]}"#);
        assert!(matches!(
            extract_image(api),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn no_artifacts_is_empty() {
        assert!(matches!(
            extract_image(parse(r#"{"artifacts":[]}"#)),
            Err(ProviderError::EmptyResponse)
        ));
    }
}
