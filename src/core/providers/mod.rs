//! LLM provider adapters
//!
//! Every backend exposes the same `complete(prompt) -> text` capability so the
//! translation client never needs to know which vendor it talks to.

pub mod azure;
pub mod gemini;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

use crate::core::config::{AppConfig, ProviderSettings};
use crate::core::errors::{Result, TranslationError};
use crate::core::models::{Prompt, ProviderKind};

pub use azure::AzureProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// A text-completion backend
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name as used in the config file
    fn name(&self) -> &str;

    /// Model or deployment the requests go to
    fn model(&self) -> &str;

    /// Send one prompt and return the completion text
    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}

/// Build the provider selected on the command line
///
/// Fails with a configuration error before any network I/O when the provider
/// has no section in the config file or its settings are invalid.
pub fn create_provider(kind: ProviderKind, config: &AppConfig) -> Result<Box<dyn LlmProvider>> {
    let settings = config.provider_settings(kind)?;
    let timeout = config.translation.request_timeout();

    let provider: Box<dyn LlmProvider> = match settings {
        ProviderSettings::OpenAi(cfg) => Box::new(OpenAiProvider::new(cfg, timeout)?),
        ProviderSettings::Azure(cfg) => Box::new(AzureProvider::new(cfg, timeout)?),
        ProviderSettings::Gemini(cfg) => Box::new(GeminiProvider::new(cfg, timeout)?),
        ProviderSettings::Ollama(cfg) => {
            let timeout = Duration::try_from_secs_f64(cfg.request_timeout).map_err(|_| {
                TranslationError::config("ollama.request_timeout must be a positive number of seconds")
            })?;
            Box::new(OllamaProvider::new(cfg, timeout)?)
        }
    };

    info!("Initialized {} provider with model {}", provider.name(), provider.model());
    Ok(provider)
}

/// HTTP client shared by the adapters
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Some(Duration::from_secs(30)))
        .build()?;
    Ok(client)
}

/// Send a request and decode the JSON body, mapping failures onto the error taxonomy
pub(crate) async fn send_json(provider: &str, request: RequestBuilder) -> Result<serde_json::Value> {
    let response = request.send().await.map_err(map_transport_error)?;
    let status = response.status();

    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| TranslationError::InvalidResponseError {
                message: e.to_string(),
            });
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    debug!("{} returned {}: {}", provider, status, body);

    Err(map_status_error(provider, status, retry_after, body))
}

fn map_transport_error(err: reqwest::Error) -> TranslationError {
    if err.is_timeout() {
        TranslationError::TimeoutError
    } else {
        TranslationError::NetworkError {
            message: err.to_string(),
        }
    }
}

pub(crate) fn map_status_error(
    provider: &str,
    status: StatusCode,
    retry_after: Option<u64>,
    body: String,
) -> TranslationError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TranslationError::AuthenticationError {
            provider: provider.to_string(),
            message: body,
        },
        StatusCode::TOO_MANY_REQUESTS => TranslationError::RateLimitError { retry_after },
        _ => TranslationError::ApiError {
            status: status.as_u16(),
            message: body,
        },
    }
}

/// Join an endpoint root and a path without doubling slashes
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Pull `choices[0].message.content` out of a chat-completions body
pub(crate) fn chat_completion_text(json: &serde_json::Value) -> Result<String> {
    json["choices"]
        .get(0)
        .and_then(|c| c["message"]["content"].as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| TranslationError::InvalidResponseError {
            message: "No completion text in response".to_string(),
        })
}

/// Chat-completions message list shared by OpenAI and Azure
pub(crate) fn chat_messages(prompt: &Prompt) -> serde_json::Value {
    serde_json::json!([
        { "role": "system", "content": prompt.system },
        { "role": "user", "content": prompt.user },
    ])
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-process stand-in for vendor HTTP APIs

    use axum::Router;
    use std::net::SocketAddr;

    /// Serve `app` on an ephemeral port and return its base URL
    pub async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = map_status_error("openai", StatusCode::UNAUTHORIZED, None, "bad key".into());
        assert!(matches!(err, TranslationError::AuthenticationError { .. }));
        assert!(!err.is_retryable());

        let err = map_status_error("openai", StatusCode::TOO_MANY_REQUESTS, Some(12), String::new());
        assert_eq!(err.retry_after(), Some(12));
        assert!(err.is_retryable());

        let err = map_status_error("gemini", StatusCode::BAD_GATEWAY, None, String::new());
        assert!(err.is_retryable());

        let err = map_status_error("gemini", StatusCode::BAD_REQUEST, None, String::new());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://api.openai.com/v1/", "/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(join_url("http://localhost:11434", "api/chat"), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_chat_completion_text() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Cześć" } }]
        });
        assert_eq!(chat_completion_text(&json).unwrap(), "Cześć");

        let empty = serde_json::json!({ "choices": [] });
        assert!(matches!(
            chat_completion_text(&empty),
            Err(TranslationError::InvalidResponseError { .. })
        ));
    }

    #[test]
    fn test_unconfigured_provider_is_rejected_before_network() {
        let config = AppConfig::from_yaml_str("ollama:\n  model: llama3.1\n").unwrap();
        let err = create_provider(ProviderKind::Gemini, &config).err().unwrap();
        assert!(matches!(err, TranslationError::ConfigError { .. }));
    }

    #[test]
    fn test_create_configured_provider() {
        let config = AppConfig::from_yaml_str("ollama:\n  model: llama3.1\n").unwrap();
        let provider = create_provider(ProviderKind::Ollama, &config).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.model(), "llama3.1");
    }
}
