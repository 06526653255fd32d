//! Error types shared across the ingestion and query pipelines.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures from the embedding and language-model collaborators.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("completion failed: {0}")]
    CompletionFailed(String),

    #[error("missing credentials: {0} is not set")]
    MissingCredentials(&'static str),

    #[error("malformed message sequence: {0}")]
    InvalidMessages(String),
}

/// Vector index storage failures.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("lancedb error: {0}")]
    LanceDb(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Invalid or unloadable configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
