//! Error types for the RAG system

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG system errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required build artifact is missing (index, chunk store, manifest)
    #[error("Missing artifact '{}': {hint}", path.display())]
    MissingArtifact { path: PathBuf, hint: String },

    /// Corpus input could not be used
    #[error("Invalid corpus: {0}")]
    Corpus(String),

    /// Vector dimensions disagree within one index generation
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// Query rejected before reaching the pipeline
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Metadata filter references an unknown field or unsupported value
    #[error("Invalid metadata filter: {0}")]
    InvalidFilter(String),

    /// Metadata filters sent to a backend that cannot apply them
    #[error("Backend '{backend}' does not support metadata filtering")]
    UnsupportedFilter { backend: String },

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Generation provider error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Index storage error
    #[error("Index storage error: {0}")]
    Storage(String),

    /// Binary (de)serialization of index artifacts
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a missing artifact error
    pub fn missing_artifact(path: impl Into<PathBuf>, hint: impl Into<String>) -> Self {
        Self::MissingArtifact {
            path: path.into(),
            hint: hint.into(),
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<ndarray_npy::WriteNpyError> for Error {
    fn from(err: ndarray_npy::WriteNpyError) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<ndarray_npy::ReadNpyError> for Error {
    fn from(err: ndarray_npy::ReadNpyError) -> Self {
        Error::Serialization(err.to_string())
    }
}
