use index::IndexError;
use semantic::EmbeddingError;
use thiserror::Error;

/// Failure of the generative backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("invalid generation config: {0}")]
    InvalidConfig(String),
    #[error("generation credential missing: set the {0} environment variable")]
    MissingCredential(String),
    #[error("generation request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("generation transport error: {0}")]
    Transport(String),
    #[error("generation backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("generation backend returned an unreadable response: {0}")]
    InvalidResponse(String),
    #[error("generation backend returned an empty answer")]
    EmptyAnswer,
}

impl GenerationError {
    /// Timeouts, connection failures, rate limiting and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Timeout(_) | GenerationError::Transport(_) => true,
            GenerationError::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Failure anywhere in the question-answering pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("failed to embed question: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("failed to retrieve context: {0}")]
    Retrieval(#[from] IndexError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn transient_classification() {
        assert!(GenerationError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(GenerationError::Transport("reset".into()).is_transient());
        assert!(GenerationError::Http { status: 429, body: String::new() }.is_transient());
        assert!(GenerationError::Http { status: 503, body: String::new() }.is_transient());

        assert!(!GenerationError::Http { status: 401, body: String::new() }.is_transient());
        assert!(!GenerationError::MissingCredential("GROQ_API_KEY".into()).is_transient());
        assert!(!GenerationError::EmptyAnswer.is_transient());
    }

    #[test]
    fn missing_credential_names_the_variable() {
        let err = GenerationError::MissingCredential("GROQ_API_KEY".into());
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }
}
