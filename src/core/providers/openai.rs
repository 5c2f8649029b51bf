//! OpenAI chat-completions adapter

use async_trait::async_trait;
use std::time::Duration;

use super::{build_http_client, chat_completion_text, chat_messages, join_url, send_json, LlmProvider};
use crate::core::config::OpenAiConfig;
use crate::core::errors::Result;
use crate::core::models::Prompt;

/// OpenAI or any OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            config,
        })
    }

    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": chat_messages(prompt),
        });
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let url = join_url(&self.config.base_url, "chat/completions");
        let request = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(prompt));

        let json = send_json(self.name(), request).await?;
        chat_completion_text(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::TranslationError;
    use crate::core::providers::test_support::spawn_server;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    fn config(base_url: String) -> OpenAiConfig {
        OpenAiConfig {
            api_key: "sk-test".to_string(),
            base_url,
            max_tokens: Some(512),
            ..Default::default()
        }
    }

    fn prompt() -> Prompt {
        Prompt {
            system: "translate".to_string(),
            user: "<p>Hello</p>".to_string(),
        }
    }

    #[test]
    fn test_request_body() {
        let provider =
            OpenAiProvider::new(config("http://unused".to_string()), Duration::from_secs(5)).unwrap();
        let body = provider.request_body(&prompt());
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "<p>Hello</p>");
    }

    #[tokio::test]
    async fn test_complete_against_local_server() {
        async fn handler(headers: HeaderMap, Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
            assert_eq!(headers["authorization"], "Bearer sk-test");
            let user = body["messages"][1]["content"].as_str().unwrap().to_string();
            Json(serde_json::json!({
                "choices": [{ "index": 0, "message": { "role": "assistant", "content": user.replace("Hello", "Cześć") } }]
            }))
        }

        let base = spawn_server(Router::new().route("/v1/chat/completions", post(handler))).await;
        let provider =
            OpenAiProvider::new(config(format!("{}/v1", base)), Duration::from_secs(5)).unwrap();

        let text = provider.complete(&prompt()).await.unwrap();
        assert_eq!(text, "<p>Cześć</p>");
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        async fn handler() -> (StatusCode, [(&'static str, &'static str); 1], &'static str) {
            (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "3")], "slow down")
        }

        let base = spawn_server(Router::new().route("/v1/chat/completions", post(handler))).await;
        let provider =
            OpenAiProvider::new(config(format!("{}/v1", base)), Duration::from_secs(5)).unwrap();

        let err = provider.complete(&prompt()).await.unwrap_err();
        assert!(matches!(
            err,
            TranslationError::RateLimitError {
                retry_after: Some(3)
            }
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_is_authentication_error() {
        async fn handler() -> (StatusCode, &'static str) {
            (StatusCode::UNAUTHORIZED, "invalid api key")
        }

        let base = spawn_server(Router::new().route("/v1/chat/completions", post(handler))).await;
        let provider =
            OpenAiProvider::new(config(format!("{}/v1", base)), Duration::from_secs(5)).unwrap();

        let err = provider.complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, TranslationError::AuthenticationError { .. }));
    }
}
