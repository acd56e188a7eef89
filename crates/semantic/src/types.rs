use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of the strategy that produced a vector.
///
/// Vectors from different embedders live in unrelated spaces; every stored
/// chunk carries the id of its embedder so mixed corpora can be detected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmbedderId {
    /// Strategy family: `"hash"`, `"api"`, or `"onnx"`.
    pub provider: String,
    /// Model or digest name within the family.
    pub model: String,
    /// Width of every produced vector.
    pub dim: usize,
}

impl EmbedderId {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, dim: usize) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            dim,
        }
    }
}

impl fmt::Display for EmbedderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.provider, self.model, self.dim)
    }
}

/// Embedding output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Embedding {
    /// Final embedding values.
    pub vector: Vec<f32>,
    /// Strategy that produced [`vector`](Self::vector).
    pub embedder: EmbedderId,
    /// Whether [`vector`](Self::vector) was L2-normalized.
    pub normalized: bool,
}

impl Embedding {
    pub fn dim(&self) -> usize {
        self.vector.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedder_id_renders_as_tag() {
        let id = EmbedderId::new("hash", "sha256", 768);
        assert_eq!(id.to_string(), "hash:sha256:768");
    }

    #[test]
    fn embedding_serde_roundtrip() {
        let embedding = Embedding {
            vector: vec![0.6, 0.8],
            embedder: EmbedderId::new("api", "all-MiniLM-L6-v2", 2),
            normalized: true,
        };
        let serialized = serde_json::to_string(&embedding).unwrap();
        let back: Embedding = serde_json::from_str(&serialized).unwrap();
        assert_eq!(back, embedding);
        assert_eq!(back.dim(), 2);
    }
}
