//! OpenAI-compatible transports.
//!
//! Works with: OpenAI, Perplexity, the Hugging Face inference router, and
//! any other endpoint exposing `/chat/completions`. The image backend
//! speaks OpenAI's `/images/generations`.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use storyforge_core::{Backend, ImagePayload, ProviderError, ProviderKey};
use tracing::debug;

use crate::http::{error_from_response, map_transport};
use crate::registry::ClientRegistry;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
pub const HUGGINGFACE_BASE_URL: &str = "https://router.huggingface.co/v1";

const SYSTEM_PROMPT: &str = "You are a creative storytelling engine. Write vivid, original fiction \
and follow the requested output format exactly.";

/// Chat-completions transport.
pub struct OpenAiCompatBackend {
    name: String,
    base_url: String,
    registry: Arc<ClientRegistry>,
}

impl OpenAiCompatBackend {
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

    pub fn openai(registry: Arc<ClientRegistry>) -> Self {
        Self::custom("openai", OPENAI_BASE_URL, registry)
    }

    pub fn perplexity(registry: Arc<ClientRegistry>) -> Self {
        Self::custom("perplexity", PERPLEXITY_BASE_URL, registry)
    }

    pub fn huggingface(registry: Arc<ClientRegistry>) -> Self {
        Self::custom("huggingface", HUGGINGFACE_BASE_URL, registry)
    }
}

#[async_trait]
impl Backend<String> for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(
        &self,
        key: &ProviderKey,
        model: &str,
        prompt: &str,
    ) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": 0.8,
            "stream": false,
        });

        debug!(provider = %self.name, model, key = key.fingerprint(), "Sending completion request");

        let response = self
            .registry
            .client_for(key)
            .post(&url)
            .bearer_auth(key.secret())
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let api: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        extract_chat_text(api)
    }
}

fn extract_chat_text(api: ChatResponse) -> std::result::Result<String, ProviderError> {
    let choice = api
        .choices
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse)?;

    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(ProviderError::ContentBlocked("content_filter".into()));
    }

    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ProviderError::EmptyResponse),
    }
}

/// Image transport for OpenAI's images API.
pub struct OpenAiImageBackend {
    name: String,
    base_url: String,
    registry: Arc<ClientRegistry>,
}

impl OpenAiImageBackend {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self::custom("openai-images", OPENAI_BASE_URL, registry)
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
impl Backend<ImagePayload> for OpenAiImageBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(
        &self,
        key: &ProviderKey,
        model: &str,
        prompt: &str,
    ) -> std::result::Result<ImagePayload, ProviderError> {
        let url = format!("{}/images/generations", self.base_url);
        let body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "n": 1,
            "size": "1024x1024",
            "response_format": "b64_json",
        });

        debug!(provider = %self.name, model, key = key.fingerprint(), "Sending image request");

        let response = self
            .registry
            .client_for(key)
            .post(&url)
            .bearer_auth(key.secret())
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let api: ImageResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        api.data
            .into_iter()
            .find_map(|d| d.b64_json)
            .filter(|b64| !b64.trim().is_empty())
            .map(ImagePayload::png)
            .ok_or(ProviderError::EmptyResponse)
    }
}

// --- OpenAI API types ---

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ChatResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn extracts_first_choice() {
        let api = parse(
            r#"{"choices":[{"message":{"role":"assistant","content":"The tide rose."},"finish_reason":"stop"}]}"#,
        );
        assert_eq!(extract_chat_text(api).unwrap(), "The tide rose.");
    }

    #[test]
    fn content_filter_is_blocked() {
        let api = parse(
            r#"{"choices":[{"message":{"content":""},"finish_reason":"content_filter"}]}"#,
        );
        assert!(matches!(
            extract_chat_text(api),
            Err(ProviderError::ContentBlocked(_))
        ));
    }

    #[test]
    fn missing_choices_is_empty() {
        assert!(matches!(
            extract_chat_text(parse(r#"{"choices":[]}"#)),
            Err(ProviderError::EmptyResponse)
        ));
        assert!(matches!(
            extract_chat_text(parse(r#"{"choices":[{"message":{"content":null}}]}"#)),
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[test]
    fn constructors_set_names_and_urls() {
        let registry = Arc::new(ClientRegistry::new());
        let hf = OpenAiCompatBackend::huggingface(registry.clone());
        assert_eq!(Backend::<String>::name(&hf), "huggingface");
        assert_eq!(hf.base_url, HUGGINGFACE_BASE_URL);

        let custom = OpenAiCompatBackend::custom("local", "http://localhost:8080/v1/", registry);
        assert_eq!(custom.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn image_response_parses() {
        let api: ImageResponse =
            serde_json::from_str(r#"{"data":[{"b64_json":"iVBORw0KGgo="}]}"#).unwrap();
        assert_eq!(api.data[0].b64_json.as_deref(), Some("iVBORw0KGgo="));
    }
}
