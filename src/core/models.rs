//! Core data models for translation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported LLM backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// api.openai.com or any OpenAI-compatible endpoint
    #[value(name = "openai")]
    OpenAi,
    /// Azure OpenAI deployment
    Azure,
    /// Google Gemini
    Gemini,
    /// Local Ollama server
    Ollama,
}

impl ProviderKind {
    /// All providers, in config-file order
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::Azure,
        ProviderKind::Gemini,
        ProviderKind::Ollama,
    ];

    /// Top-level key of this provider in the config file
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Azure => "azure",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A system/user message pair sent to a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Translation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub extra_prompts: Option<String>,
}

impl TranslationRequest {
    pub fn new(
        text: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            extra_prompts: None,
        }
    }

    pub fn with_extra_prompts(mut self, extra: impl Into<String>) -> Self {
        let extra = extra.into();
        self.extra_prompts = if extra.trim().is_empty() {
            None
        } else {
            Some(extra)
        };
        self
    }

    /// Build the prompt sent to the provider
    pub fn to_prompt(&self) -> Prompt {
        let from = &self.source_lang;
        let to = &self.target_lang;
        let mut system = format!(
            "You are a professional {from}-to-{to} translator. \
             Keep all special characters and HTML tags exactly as they appear in the source text, \
             including attributes, links, image references and footnote anchors. \
             Your translation should be in {to} only. \
             Avoid overly literal translations so the result reads naturally in {to}, \
             while staying consistent with the source text."
        );
        if let Some(extra) = &self.extra_prompts {
            system.push(' ');
            system.push_str(extra.trim());
        }
        system.push_str(
            " Do not add explanations, comments, or notes - only provide the translation.",
        );

        Prompt {
            system,
            user: self.text.clone(),
        }
    }
}

/// Translation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub translation: String,
    pub model_used: String,
    pub attempts: u32,
}
