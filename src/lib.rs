//! EPUB Translator - translate e-books chapter by chapter with large language models
//!
//! This library reads an EPUB, sends each chapter body to an LLM provider
//! (OpenAI, Azure OpenAI, Gemini or a local Ollama server) and writes a new
//! EPUB with the translated chapters, checkpointing progress after every
//! chapter so an interrupted run can be resumed.

#![forbid(unsafe_code)]

pub mod cli;
pub mod core;
pub mod processors;

// Re-export key types for convenience
pub use crate::core::{
    client::{AsyncTranslator, RetryPolicy},
    config::AppConfig,
    errors::{Result, TranslationError},
    models::{ProviderKind, TranslationRequest, TranslationResult},
    progress::ProgressStore,
    providers::{create_provider, LlmProvider},
};

pub use crate::processors::{
    book::{Chapter, EpubBook},
    epub::{EpubProcessor, TranslateOptions, TranslationSummary},
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
