//! Azure OpenAI adapter

use async_trait::async_trait;
use std::time::Duration;

use super::{build_http_client, chat_completion_text, chat_messages, join_url, send_json, LlmProvider};
use crate::core::config::AzureConfig;
use crate::core::errors::Result;
use crate::core::models::Prompt;

#[derive(Debug, Clone)]
pub struct AzureProvider {
    client: reqwest::Client,
    config: AzureConfig,
}

impl AzureProvider {
    pub fn new(config: AzureConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            config,
        })
    }

    fn url(&self) -> String {
        let path = format!(
            "openai/deployments/{}/chat/completions?api-version={}",
            self.config.deployment_name, self.config.api_version
        );
        join_url(&self.config.endpoint, &path)
    }
}

#[async_trait]
impl LlmProvider for AzureProvider {
    fn name(&self) -> &str {
        "azure"
    }

    fn model(&self) -> &str {
        &self.config.deployment_name
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let mut body = serde_json::json!({
            "temperature": self.config.temperature,
            "messages": chat_messages(prompt),
        });
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        let request = self
            .client
            .post(self.url())
            .header("api-key", &self.config.api_key)
            .json(&body);

        let json = send_json(self.name(), request).await?;
        chat_completion_text(&json)
    }
}
