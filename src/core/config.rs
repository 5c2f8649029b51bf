//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::errors::{Result, TranslationError};
use crate::core::models::ProviderKind;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_AZURE_API_VERSION: &str = "2024-02-01";
const DEFAULT_TEMPERATURE: f32 = 0.2;

const KNOWN_AZURE_API_VERSIONS: &[&str] = &[
    "2024-10-21",
    "2024-06-01",
    "2024-02-01",
    "2023-12-01-preview",
    "2023-10-01-preview",
    "2023-05-15",
];

/// Placeholder keys shipped in the sample config
const API_KEY_PLACEHOLDERS: &[&str] = &[
    "YOUR_OPENAI_API_KEY",
    "YOUR_AZURE_OPENAI_API_KEY",
    "YOUR_GEMINI_API_KEY",
];

/// Whole configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub openai: Option<OpenAiConfig>,
    pub azure: Option<AzureConfig>,
    pub gemini: Option<GeminiConfig>,
    pub ollama: Option<OllamaConfig>,
    #[serde(default)]
    pub translation: TranslationSettings,
}

/// OpenAI (or OpenAI-compatible) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
        }
    }
}

/// Azure OpenAI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    pub api_key: String,
    pub endpoint: String,
    pub deployment_name: String,
    pub api_version: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: String::new(),
            deployment_name: String::new(),
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
        }
    }
}

/// Google Gemini settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: Option<u32>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: 0.95,
            top_k: 64,
            max_tokens: None,
        }
    }
}

/// Local Ollama server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    /// Seconds
    pub request_timeout: f64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            request_timeout: 60.0,
        }
    }
}

/// Pipeline tuning; every field can be overridden from the command line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    pub chunk_size: usize,
    pub max_attempts: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub extra_prompts: String,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            chunk_size: 20_000,
            max_attempts: 3,
            initial_retry_delay_ms: 5_000,
            max_retry_delay_ms: 120_000,
            request_timeout_secs: 300,
            extra_prompts: "Preserve paragraph breaks and formatting structure.".to_string(),
        }
    }
}

impl TranslationSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(TranslationError::config("translation.chunk_size must be greater than 0"));
        }
        if self.max_attempts == 0 {
            return Err(TranslationError::config("translation.max_attempts must be greater than 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(TranslationError::config(
                "translation.request_timeout_secs must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Validated settings for the selected provider
#[derive(Debug, Clone)]
pub enum ProviderSettings {
    OpenAi(OpenAiConfig),
    Azure(AzureConfig),
    Gemini(GeminiConfig),
    Ollama(OllamaConfig),
}

impl ProviderSettings {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderSettings::OpenAi(_) => ProviderKind::OpenAi,
            ProviderSettings::Azure(_) => ProviderKind::Azure,
            ProviderSettings::Gemini(_) => ProviderKind::Gemini,
            ProviderSettings::Ollama(_) => ProviderKind::Ollama,
        }
    }
}

impl AppConfig {
    /// Load from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(TranslationError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            TranslationError::config(format!("Error reading {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml_str(&content)?;
        debug!(
            "Loaded configuration from {} (providers: {:?})",
            path.display(),
            config.configured_providers()
        );
        Ok(config)
    }

    /// Parse and validate YAML content
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| TranslationError::config(format!("Invalid YAML in config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.configured_providers().is_empty() {
            let names: Vec<&str> = ProviderKind::ALL.iter().map(|p| p.as_str()).collect();
            return Err(TranslationError::config(format!(
                "At least one provider must be configured: {}",
                names.join(", ")
            )));
        }
        self.translation.validate()
    }

    /// Providers that have a section in the file
    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                ProviderKind::OpenAi => self.openai.is_some(),
                ProviderKind::Azure => self.azure.is_some(),
                ProviderKind::Gemini => self.gemini.is_some(),
                ProviderKind::Ollama => self.ollama.is_some(),
            })
            .collect()
    }

    /// Validated settings for one provider, with API keys falling back to the environment
    pub fn provider_settings(&self, kind: ProviderKind) -> Result<ProviderSettings> {
        self.provider_settings_with(kind, |name| std::env::var(name).ok())
    }

    fn provider_settings_with<F>(&self, kind: ProviderKind, env: F) -> Result<ProviderSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let not_configured =
            || TranslationError::config(format!("Provider '{}' not configured", kind));

        match kind {
            ProviderKind::OpenAi => {
                let mut cfg = self.openai.clone().ok_or_else(not_configured)?;
                cfg.api_key = resolve_api_key(&cfg.api_key, "OPENAI_API_KEY", &env);
                validate_openai(&cfg)?;
                Ok(ProviderSettings::OpenAi(cfg))
            }
            ProviderKind::Azure => {
                let mut cfg = self.azure.clone().ok_or_else(not_configured)?;
                cfg.api_key = resolve_api_key(&cfg.api_key, "AZURE_OPENAI_API_KEY", &env);
                validate_azure(&cfg)?;
                Ok(ProviderSettings::Azure(cfg))
            }
            ProviderKind::Gemini => {
                let mut cfg = self.gemini.clone().ok_or_else(not_configured)?;
                cfg.api_key = resolve_api_key(&cfg.api_key, "GEMINI_API_KEY", &env);
                validate_gemini(&cfg)?;
                Ok(ProviderSettings::Gemini(cfg))
            }
            ProviderKind::Ollama => {
                let cfg = self.ollama.clone().ok_or_else(not_configured)?;
                validate_ollama(&cfg)?;
                Ok(ProviderSettings::Ollama(cfg))
            }
        }
    }
}

fn resolve_api_key<F>(configured: &str, env_name: &str, env: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if !configured.trim().is_empty() {
        return configured.trim().to_string();
    }
    match env(env_name) {
        Some(value) if !value.trim().is_empty() => {
            debug!("Using API key from {}", env_name);
            value.trim().to_string()
        }
        _ => String::new(),
    }
}

fn require_api_key(provider: &str, key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(TranslationError::config(format!("{} api_key is required", provider)));
    }
    if API_KEY_PLACEHOLDERS.contains(&key) {
        return Err(TranslationError::config(format!(
            "Please set your actual {} API key",
            provider
        )));
    }
    Ok(())
}

fn require_http_url(field: &str, url: &str, https_only: bool) -> Result<()> {
    let ok = if https_only {
        url.starts_with("https://")
    } else {
        url.starts_with("http://") || url.starts_with("https://")
    };
    if ok {
        Ok(())
    } else {
        let scheme = if https_only { "HTTPS" } else { "HTTP/HTTPS" };
        Err(TranslationError::config(format!(
            "{} must be a valid {} URL, got '{}'",
            field, scheme, url
        )))
    }
}

fn require_unit_range(field: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TranslationError::config(format!(
            "{} must be between 0.0 and 1.0, got {}",
            field, value
        )))
    }
}

fn validate_openai(cfg: &OpenAiConfig) -> Result<()> {
    require_api_key("OpenAI", &cfg.api_key)?;
    if cfg.model.trim().is_empty() {
        return Err(TranslationError::config("openai.model must not be empty"));
    }
    require_http_url("openai.base_url", &cfg.base_url, false)
}

fn validate_azure(cfg: &AzureConfig) -> Result<()> {
    require_api_key("Azure OpenAI", &cfg.api_key)?;
    if cfg.endpoint.trim().is_empty() {
        return Err(TranslationError::config("azure.endpoint is required"));
    }
    if cfg.deployment_name.trim().is_empty() {
        return Err(TranslationError::config("azure.deployment_name is required"));
    }
    require_http_url("azure.endpoint", &cfg.endpoint, true)?;

    if !cfg.endpoint.contains("openai.azure.com") {
        warn!(
            "Endpoint '{}' doesn't look like a standard Azure OpenAI endpoint",
            cfg.endpoint
        );
    }
    if !KNOWN_AZURE_API_VERSIONS.contains(&cfg.api_version.as_str()) {
        warn!("Azure API version '{}' is not a known version", cfg.api_version);
    }
    Ok(())
}

fn validate_gemini(cfg: &GeminiConfig) -> Result<()> {
    require_api_key("Gemini", &cfg.api_key)?;
    require_unit_range("gemini.temperature", cfg.temperature)?;
    require_unit_range("gemini.top_p", cfg.top_p)?;
    if cfg.top_k < 1 {
        return Err(TranslationError::config("gemini.top_k must be a positive integer"));
    }
    require_http_url("gemini.base_url", &cfg.base_url, false)
}

fn validate_ollama(cfg: &OllamaConfig) -> Result<()> {
    if cfg.model.trim().is_empty() {
        return Err(TranslationError::config("Ollama model name is required"));
    }
    if !(cfg.request_timeout.is_finite() && cfg.request_timeout > 0.0)
        || Duration::try_from_secs_f64(cfg.request_timeout).is_err()
    {
        return Err(TranslationError::config(
            "ollama.request_timeout must be a positive number of seconds",
        ));
    }
    require_http_url("ollama.base_url", &cfg.base_url, false)
}
