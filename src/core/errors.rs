//! Custom error types for translation operations

use thiserror::Error;

/// Translation-related errors
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
    },

    /// Provider rejected the credentials
    #[error("Authentication failed for {provider}: {message}")]
    AuthenticationError {
        provider: String,
        message: String,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Retry after {retry_after:?} seconds")]
    RateLimitError {
        retry_after: Option<u64>,
    },

    /// Network error
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
    },

    /// Request timeout
    #[error("Request timeout")]
    TimeoutError,

    /// API request failed
    #[error("API error: {status} - {message}")]
    ApiError {
        status: u16,
        message: String,
    },

    /// Invalid response from API
    #[error("Invalid response: {message}")]
    InvalidResponseError {
        message: String,
    },

    /// Every attempt failed with a retryable error
    #[error("All retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<TranslationError>,
    },

    /// EPUB container could not be read or written
    #[error("EPUB error: {path} - {message}")]
    EpubError {
        path: String,
        message: String,
    },

    /// File operation error
    #[error("File error: {path} - {message}")]
    FileError {
        path: String,
        message: String,
    },

    /// Progress file could not be read or written
    #[error("Progress error: {message}")]
    ProgressError {
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Zip archive error
    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),
}

impl TranslationError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        TranslationError::ConfigError {
            message: message.into(),
        }
    }

    /// Shorthand for an EPUB error tied to a path
    pub fn epub(path: impl std::fmt::Display, message: impl std::fmt::Display) -> Self {
        TranslationError::EpubError {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::RateLimitError { .. }
            | TranslationError::NetworkError { .. }
            | TranslationError::TimeoutError => true,
            TranslationError::ApiError { status, .. } => *status == 408 || *status >= 500,
            TranslationError::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Seconds the provider asked us to wait, if any
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            TranslationError::RateLimitError { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, TranslationError>;
