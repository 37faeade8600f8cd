//! Error types for pdf-embed-rs
//!
//! This module provides error handling for every pipeline stage, from text
//! splitting and chunking through embedding generation, vector storage and
//! manifest mirroring.

use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Text processing errors
    #[error("Text processing error: {0}")]
    TextProcessing(String),

    /// The caller passed input the pipeline cannot accept
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Token counting errors
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// PDF processing errors
    #[error("PDF processing error: {0}")]
    Pdf(String),

    /// Document download errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Embedding API errors that another attempt will not fix
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Remote service temporarily unavailable: rate limited, 5xx, timeout or
    /// connection failure
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Vector search errors
    #[error("Search error: {0}")]
    Search(String),

    /// Database/storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Object storage (manifest mirror) errors
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic errors
    #[error("Generic error: {0}")]
    Generic(String),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

// Implement From traits for external error types
impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        if is_transient_http(&err) {
            PipelineError::Unavailable(err.to_string())
        } else {
            PipelineError::Http(err.to_string())
        }
    }
}

impl From<async_openai::error::OpenAIError> for PipelineError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        use async_openai::error::OpenAIError;

        match err {
            OpenAIError::Reqwest(e) if is_transient_http(&e) => {
                PipelineError::Unavailable(e.to_string())
            }
            OpenAIError::ApiError(api) if is_transient_api_error(api.r#type.as_deref()) => {
                PipelineError::Unavailable(api.message)
            }
            // Error bodies that are not JSON come from gateways and proxies
            OpenAIError::JSONDeserialize(e) => PipelineError::Unavailable(e.to_string()),
            other => PipelineError::Embedding(other.to_string()),
        }
    }
}

fn is_transient_http(err: &reqwest::Error) -> bool {
    if err.is_connect() || err.is_timeout() {
        return true;
    }
    err.status().is_some_and(|status| {
        status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    })
}

/// Whether an OpenAI error `type` denotes a condition that clears by itself.
/// Quota exhaustion (`insufficient_quota`) and request errors do not.
fn is_transient_api_error(kind: Option<&str>) -> bool {
    matches!(
        kind,
        Some("server_error" | "service_unavailable" | "rate_limit_exceeded" | "requests" | "tokens")
    )
}

impl From<object_store::Error> for PipelineError {
    fn from(err: object_store::Error) -> Self {
        PipelineError::ObjectStore(err.to_string())
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Generic(err.to_string())
    }
}
