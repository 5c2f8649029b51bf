//! Local Ollama server adapter

use async_trait::async_trait;
use std::time::Duration;

use super::{build_http_client, chat_messages, join_url, send_json, LlmProvider};
use crate::core::config::OllamaConfig;
use crate::core::errors::{Result, TranslationError};
use crate::core::models::Prompt;

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            config,
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": chat_messages(prompt),
            "stream": false,
            "options": { "temperature": self.config.temperature },
        });

        let request = self
            .client
            .post(join_url(&self.config.base_url, "api/chat"))
            .json(&body);

        let json = send_json(self.name(), request).await?;
        json["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| TranslationError::InvalidResponseError {
                message: json["error"]
                    .as_str()
                    .unwrap_or("No message content in Ollama response")
                    .to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::providers::test_support::spawn_server;
    use axum::routing::post;
    use axum::{Json, Router};

    #[tokio::test]
    async fn test_chat_round_trip() {
        async fn handler(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
            assert_eq!(body["stream"], false);
            assert_eq!(body["model"], "llama3.1");
            Json(serde_json::json!({
                "model": "llama3.1",
                "message": { "role": "assistant", "content": "<p>Hallo</p>" },
                "done": true
            }))
        }

        let base = spawn_server(Router::new().route("/api/chat", post(handler))).await;
        let provider = OllamaProvider::new(
            OllamaConfig {
                model: "llama3.1".to_string(),
                base_url: base,
                ..Default::default()
            },
            Duration::from_secs(5),
        )
        .unwrap();

        let text = provider
            .complete(&Prompt {
                system: "translate".to_string(),
                user: "<p>Hello</p>".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(text, "<p>Hallo</p>");
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then drop to get a port with nothing listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let provider = OllamaProvider::new(
            OllamaConfig {
                model: "llama3.1".to_string(),
                base_url: format!("http://127.0.0.1:{}", port),
                ..Default::default()
            },
            Duration::from_secs(5),
        )
        .unwrap();

        let err = provider
            .complete(&Prompt {
                system: String::new(),
                user: "x".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TranslationError::NetworkError { .. }));
        assert!(err.is_retryable());
    }
}
