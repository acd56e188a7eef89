use std::io;
use thiserror::Error;

/// Errors surfaced by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The ONNX model or tokenizer could not be located locally.
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    /// Configuration is inconsistent (unknown mode, missing URL, zero dimension).
    #[error("invalid embedding config: {0}")]
    InvalidConfig(String),
    /// A credential named in the config is absent from the environment.
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),
    /// Transport or HTTP status failure talking to a remote provider.
    #[error("embedding request failed: {0}")]
    Request(String),
    /// Provider returned a vector of the wrong width.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// Low-level IO failures while touching the filesystem.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Runtime, tokenizer, or response-shape errors.
    #[error("inference failure: {0}")]
    Inference(String),
}
