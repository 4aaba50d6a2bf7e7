//! Error types for the RAG core

use thiserror::Error;

use crate::types::{FragmentFailure, SearchResult};

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// What had already been retrieved when the LLM callback failed.
///
/// Kept on [`Error::LlmCallback`] so a caller can retry generation without
/// searching again.
#[derive(Debug, Clone)]
pub struct RetrievalContext {
    /// The question that was asked
    pub question: String,
    /// The fully rendered prompt handed to the callback
    pub prompt: String,
    /// Ranked retrieval results used to build the prompt
    pub results: Vec<SearchResult>,
}

/// RAG core errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encoding backend failed
    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    /// Embedding provider failed
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector dimension does not match the index
    #[error("Embedding dimension mismatch: index holds {expected}-d vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Unknown vector index backend name
    #[error("Vector index provider not registered: '{0}'")]
    ProviderNotRegistered(String),

    /// LLM backend error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Generation callback failed or timed out
    #[error("LLM callback failed: {message}")]
    LlmCallback {
        message: String,
        context: Box<RetrievalContext>,
    },

    /// Some fragments of a source failed to ingest
    #[error("Ingest of '{source_name}' partially failed: {} of {} fragments failed", failures.len(), failures.len() + succeeded.len())]
    PartialIngest {
        source_name: String,
        succeeded: Vec<String>,
        failures: Vec<FragmentFailure>,
    },

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Document conversion error
    #[error("Failed to convert '{filename}': {message}")]
    Conversion { filename: String, message: String },

    /// Operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a tokenization error
    pub fn tokenization(message: impl Into<String>) -> Self {
        Self::Tokenization(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an LLM backend error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create a conversion error
    pub fn conversion(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True for provider failures and dimension mismatches
    pub fn is_embedding_failure(&self) -> bool {
        matches!(self, Self::Embedding(_) | Self::DimensionMismatch { .. })
    }

    /// Retrieval context preserved by an LLM callback failure
    pub fn retrieval_context(&self) -> Option<&RetrievalContext> {
        match self {
            Self::LlmCallback { context, .. } => Some(context),
            _ => None,
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(format!("Task join error: {}", err))
    }
}
