//! Google Gemini `generateContent` adapter

use async_trait::async_trait;
use std::time::Duration;

use super::{build_http_client, join_url, send_json, LlmProvider};
use crate::core::config::GeminiConfig;
use crate::core::errors::{Result, TranslationError};
use crate::core::models::Prompt;

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            config,
        })
    }

    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        let mut generation = serde_json::json!({
            "temperature": self.config.temperature,
            "topP": self.config.top_p,
            "topK": self.config.top_k,
        });
        if let Some(max_tokens) = self.config.max_tokens {
            generation["maxOutputTokens"] = serde_json::json!(max_tokens);
        }

        serde_json::json!({
            "systemInstruction": { "parts": [{ "text": prompt.system }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt.user }] }],
            "generationConfig": generation,
        })
    }
}

/// Concatenate the text parts of the first candidate
fn candidate_text(json: &serde_json::Value) -> Result<String> {
    let candidate = json["candidates"].get(0).ok_or_else(|| {
        let reason = json["promptFeedback"]["blockReason"]
            .as_str()
            .unwrap_or("no candidates returned");
        TranslationError::InvalidResponseError {
            message: reason.to_string(),
        }
    })?;

    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate["finishReason"].as_str().unwrap_or("empty candidate");
        return Err(TranslationError::InvalidResponseError {
            message: format!("Gemini returned no text ({})", reason),
        });
    }
    Ok(text)
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let url = join_url(
            &self.config.base_url,
            &format!("models/{}:generateContent", self.config.model),
        );
        let request = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.request_body(prompt));

        let json = send_json(self.name(), request).await?;
        candidate_text(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::providers::test_support::spawn_server;
    use axum::http::{HeaderMap, StatusCode, Uri};
    use axum::response::IntoResponse;
    use axum::{Json, Router};

    fn local_provider(base_url: String) -> GeminiProvider {
        GeminiProvider::new(
            GeminiConfig {
                api_key: "g-key".to_string(),
                model: "gemini-test".to_string(),
                base_url,
                ..Default::default()
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn prompt() -> Prompt {
        Prompt {
            system: "translate".to_string(),
            user: "<p>Good morning</p>".to_string(),
        }
    }

    #[test]
    fn test_request_body_shape() {
        let provider = GeminiProvider::new(
            GeminiConfig {
                api_key: "k".to_string(),
                max_tokens: Some(8192),
                ..Default::default()
            },
            Duration::from_secs(5),
        )
        .unwrap();

        let body = provider.request_body(&Prompt {
            system: "sys".to_string(),
            user: "text".to_string(),
        });
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "text");
        assert_eq!(body["generationConfig"]["topK"], 64);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
    }

    #[test]
    fn test_candidate_text_joins_parts() {
        let json = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "<p>Dzień " }, { "text": "dobry</p>" }] },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(candidate_text(&json).unwrap(), "<p>Dzień dobry</p>");
    }

    #[test]
    fn test_blocked_prompt_is_invalid_response() {
        let json = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = candidate_text(&json).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_generate_content_round_trip() {
        async fn handler(uri: Uri, headers: HeaderMap, Json(body): Json<serde_json::Value>) -> impl IntoResponse {
            if uri.path() != "/v1beta/models/gemini-test:generateContent" || headers["x-goog-api-key"] != "g-key" {
                return StatusCode::NOT_FOUND.into_response();
            }
            let user = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or_default();
            Json(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": user.replace("Good morning", "Dzień dobry") }] },
                    "finishReason": "STOP"
                }]
            }))
            .into_response()
        }

        let base = spawn_server(Router::new().fallback(handler)).await;
        let provider = local_provider(format!("{}/v1beta", base));

        let text = provider.complete(&prompt()).await.unwrap();
        assert_eq!(text, "<p>Dzień dobry</p>");
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        async fn handler() -> (StatusCode, [(&'static str, &'static str); 1], &'static str) {
            (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "7")], "RESOURCE_EXHAUSTED")
        }

        let base = spawn_server(Router::new().fallback(handler)).await;
        let err = local_provider(base).complete(&prompt()).await.unwrap_err();
        assert!(matches!(
            err,
            TranslationError::RateLimitError {
                retry_after: Some(7)
            }
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable_api_error() {
        async fn handler() -> (StatusCode, &'static str) {
            (StatusCode::SERVICE_UNAVAILABLE, "overloaded")
        }

        let base = spawn_server(Router::new().fallback(handler)).await;
        let err = local_provider(base).complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, TranslationError::ApiError { status: 503, .. }));
        assert!(err.is_retryable());
    }
}
