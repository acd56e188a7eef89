//! # Plant Semantic
//!
//! Embedding providers for document retrieval.
//!
//! Every provider implements [`Embedder`] and stamps each vector with an
//! [`EmbedderId`]. Three strategies exist:
//!
//! - [`HashEmbedder`]: SHA-256 digest bytes stretched to the configured width
//!   and L2-normalized. Deterministic and offline; useful for tests and as a
//!   placeholder before a learned model is deployed.
//! - [`ApiEmbedder`]: a learned sentence-embedding model behind an HTTP
//!   endpoint (Hugging Face, OpenAI-compatible, or custom JSON).
//! - `OnnxEmbedder` (feature `onnx`): a local sentence-transformer run with
//!   ONNX Runtime and mean pooling.
//!
//! The strategy is chosen once via [`build_embedder`]. There is no silent
//! fallback between strategies: a missing model is an error, because mixing
//! vectors from two embedders in one index corrupts retrieval.
//!
//! ```
//! use semantic::{Embedder, HashEmbedder};
//!
//! let embedder = HashEmbedder::default();
//! let e = embedder.embed("Raise drying temperature gradually").unwrap();
//! assert_eq!(e.vector.len(), 768);
//! assert_eq!(e.embedder.to_string(), "hash:sha256:768");
//! ```

mod api;
#[cfg(feature = "onnx")]
mod cache;
mod config;
mod error;
mod hash;
mod normalize;
#[cfg(feature = "onnx")]
mod onnx;
mod types;

pub use api::ApiEmbedder;
pub use config::EmbeddingConfig;
pub use error::EmbeddingError;
pub use hash::{HashEmbedder, DEFAULT_HASH_DIM};
pub use normalize::l2_normalize_in_place;
#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;
pub use types::{EmbedderId, Embedding};

use tracing::info;

/// A text embedding strategy.
pub trait Embedder: Send + Sync {
    /// Identity stamped on every vector this embedder produces.
    fn id(&self) -> &EmbedderId;

    /// Embed one text.
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Embed several texts, preserving order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Build the embedder selected by `cfg.mode`.
pub fn build_embedder(cfg: &EmbeddingConfig) -> Result<Box<dyn Embedder>, EmbeddingError> {
    cfg.validate().map_err(EmbeddingError::InvalidConfig)?;
    let embedder: Box<dyn Embedder> = match cfg.mode.as_str() {
        "hash" => Box::new(HashEmbedder::new(cfg.dim)?),
        "api" => Box::new(ApiEmbedder::from_config(cfg)?),
        "onnx" => build_onnx(cfg)?,
        other => {
            return Err(EmbeddingError::InvalidConfig(format!(
                "unknown embedding mode '{other}'"
            )))
        }
    };
    info!(embedder = %embedder.id(), "embedder_ready");
    Ok(embedder)
}

#[cfg(feature = "onnx")]
fn build_onnx(cfg: &EmbeddingConfig) -> Result<Box<dyn Embedder>, EmbeddingError> {
    Ok(Box::new(OnnxEmbedder::from_config(cfg)?))
}

#[cfg(not(feature = "onnx"))]
fn build_onnx(_cfg: &EmbeddingConfig) -> Result<Box<dyn Embedder>, EmbeddingError> {
    Err(EmbeddingError::InvalidConfig(
        "onnx embeddings disabled at compile time (enable the `onnx` feature)".into(),
    ))
}
