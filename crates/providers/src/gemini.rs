//! Google Gemini transports: `generateContent` for text and Imagen
//! `predict` for images.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use storyforge_core::{Backend, ImagePayload, ProviderError, ProviderKey};
use tracing::debug;

use crate::http::{error_from_response, map_transport};
use crate::registry::ClientRegistry;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Text generation via `models/{model}:generateContent`.
pub struct GeminiBackend {
    name: String,
    base_url: String,
    registry: Arc<ClientRegistry>,
}

impl GeminiBackend {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self::custom("gemini", GEMINI_BASE_URL, registry)
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

#[async_trait]
impl Backend<String> for GeminiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(
        &self,
        key: &ProviderKey,
        model: &str,
        prompt: &str,
    ) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.8 },
        });

        debug!(
            provider = %self.name,
            model,
            key = key.fingerprint(),
            "Sending generateContent request"
        );

        let response = self
            .registry
            .client_for(key)
            .post(&url)
            .header("x-goog-api-key", key.secret())
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let api: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        extract_text(api)
    }
}

fn extract_text(api: GenerateContentResponse) -> std::result::Result<String, ProviderError> {
    if let Some(reason) = api.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ProviderError::ContentBlocked(reason));
    }

    let candidate = api
        .candidates
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse)?;

    match candidate.finish_reason.as_deref() {
        Some(reason @ ("SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST")) => {
            return Err(ProviderError::ContentBlocked(reason.to_string()));
        }
        _ => {}
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(ProviderError::EmptyResponse)
    } else {
        Ok(text)
    }
}

/// Image generation via Imagen `models/{model}:predict`.
pub struct ImagenBackend {
    name: String,
    base_url: String,
    registry: Arc<ClientRegistry>,
}

impl ImagenBackend {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self::custom("gemini-imagen", GEMINI_BASE_URL, registry)
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

#[async_trait]
impl Backend<ImagePayload> for ImagenBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(
        &self,
        key: &ProviderKey,
        model: &str,
        prompt: &str,
    ) -> std::result::Result<ImagePayload, ProviderError> {
        let url = format!("{}/models/{}:predict", self.base_url, model);
        let body = serde_json::json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "sampleCount": 1, "aspectRatio": "1:1" },
        });

        debug!(provider = %self.name, model, key = key.fingerprint(), "Sending predict request");

        let response = self
            .registry
            .client_for(key)
            .post(&url)
            .header("x-goog-api-key", key.secret())
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let api: PredictResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let prediction = api
            .predictions
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        match prediction.bytes_base64_encoded {
            Some(b64) if !b64.trim().is_empty() => Ok(ImagePayload {
                base64: b64,
                mime_type: prediction.mime_type.unwrap_or_else(|| "image/png".into()),
            }),
            _ => Err(ProviderError::EmptyResponse),
        }
    }
}

// --- Gemini API types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn joins_candidate_parts() {
        let api = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"Night fell. "},{"text":"The bell rang."}]},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(extract_text(api).unwrap(), "Night fell. The bell rang.");
    }

    #[test]
    fn prompt_block_is_content_blocked() {
        let api = parse(r#"{"candidates":[],"promptFeedback":{"blockReason":"SAFETY"}}"#);
        assert!(matches!(
            extract_text(api),
            Err(ProviderError::ContentBlocked(r)) if r == "SAFETY"
        ));
    }

    #[test]
    fn safety_finish_is_content_blocked() {
        let api = parse(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#);
        assert!(matches!(
            extract_text(api),
            Err(ProviderError::ContentBlocked(_))
        ));
    }

    #[test]
    fn no_candidates_is_empty() {
        assert!(matches!(
            extract_text(parse(r#"{}"#)),
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[test]
    fn predict_response_parses() {
        let api: PredictResponse = serde_json::from_str(
            r#"{"predictions":[{"bytesBase64Encoded":"iVBORw0KGgo=","mimeType":"image/png"}]}"#,
        )
        .unwrap();
        assert_eq!(
            api.predictions[0].bytes_base64_encoded.as_deref(),
            Some("iVBORw0KGgo=")
        );
    }
}
