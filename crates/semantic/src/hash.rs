use sha2::{Digest, Sha256};

use crate::normalize::l2_normalize_in_place;
use crate::{Embedder, EmbedderId, Embedding, EmbeddingError};

/// Default width of hash embeddings.
pub const DEFAULT_HASH_DIM: usize = 768;

/// Deterministic placeholder embedder.
///
/// The SHA-256 digest bytes of the text are repeated to fill `dim` slots and
/// the result is L2-normalized. Identical text always yields identical
/// vectors; there is no semantic signal beyond exact matches.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    id: EmbedderId,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Result<Self, EmbeddingError> {
        if dim == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "hash embedding dimension must be positive".into(),
            ));
        }
        Ok(Self {
            id: EmbedderId::new("hash", "sha256", dim),
        })
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        let mut v: Vec<f32> = digest
            .iter()
            .cycle()
            .take(self.id.dim)
            .map(|&b| b as f32)
            .collect();
        l2_normalize_in_place(&mut v);
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            id: EmbedderId::new("hash", "sha256", DEFAULT_HASH_DIM),
        }
    }
}

impl Embedder for HashEmbedder {
    fn id(&self) -> &EmbedderId {
        &self.id
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        Ok(Embedding {
            vector: self.vectorize(text),
            embedder: self.id.clone(),
            normalized: true,
        })
    }
}
