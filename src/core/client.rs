//! Async translation client with retry logic

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::core::config::TranslationSettings;
use crate::core::errors::{Result, TranslationError};
use crate::core::models::{TranslationRequest, TranslationResult};
use crate::core::providers::LlmProvider;

/// Exponential backoff for rate limits and transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total provider calls per request, including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&TranslationSettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &TranslationSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_retry_delay_ms),
            max_delay: Duration::from_millis(settings.max_retry_delay_ms),
        }
    }

    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        if let Some(secs) = retry_after {
            return Duration::from_secs(secs).min(self.max_delay.max(self.initial_delay));
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Translation client on top of a single provider
#[derive(Clone)]
pub struct AsyncTranslator {
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
    extra_prompts: String,
}

impl std::fmt::Debug for AsyncTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTranslator")
            .field("provider", &self.provider.name())
            .field("model", &self.provider.model())
            .field("retry", &self.retry)
            .finish()
    }
}

impl AsyncTranslator {
    /// Create a new async translator
    pub fn new(provider: Box<dyn LlmProvider>, retry: RetryPolicy) -> Self {
        Self {
            provider: Arc::from(provider),
            retry,
            extra_prompts: String::new(),
        }
    }

    /// Instructions appended to every system prompt
    pub fn with_extra_prompts(mut self, extra: impl Into<String>) -> Self {
        self.extra_prompts = extra.into();
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Translate `text` from one language to another
    pub async fn translate_text(&self, text: &str, from_lang: &str, to_lang: &str) -> Result<String> {
        let request = TranslationRequest::new(text, from_lang, to_lang)
            .with_extra_prompts(self.extra_prompts.clone());
        Ok(self.translate(&request).await?.translation)
    }

    /// Translate a single request
    pub async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        if request.text.trim().is_empty() {
            return Ok(TranslationResult {
                translation: request.text.clone(),
                model_used: self.provider.model().to_string(),
                attempts: 0,
            });
        }

        let prompt = request.to_prompt();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                "Sending {} chars to {} (attempt {}/{})",
                request.text.len(),
                self.provider.name(),
                attempt,
                self.retry.max_attempts
            );

            match self.provider.complete(&prompt).await {
                Ok(text) => {
                    if attempt > 1 {
                        info!("Successfully translated after {} retries", attempt - 1);
                    }
                    return Ok(TranslationResult {
                        translation: strip_code_fences(&text),
                        model_used: self.provider.model().to_string(),
                        attempts: attempt,
                    });
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= self.retry.max_attempts => {
                    return Err(TranslationError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.retry.delay_for(attempt, e.retry_after());
                    warn!(
                        "{} (attempt {}/{}), retrying in {:?}",
                        e, attempt, self.retry.max_attempts, delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Drop a ```html ... ``` wrapper that chat models like to add
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(inner) = rest.strip_suffix("```") {
            // Skip the language tag on the opening fence
            return match inner.split_once('\n') {
                Some((_, body)) => body.trim().to_string(),
                None => inner.trim().to_string(),
            };
        }
    }
    trimmed.to_string()
}
