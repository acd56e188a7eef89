use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime configuration selecting and tuning the embedding strategy.
///
/// # Example
/// ```
/// use semantic::{build_embedder, EmbeddingConfig};
///
/// let cfg = EmbeddingConfig {
///     mode: "hash".into(),
///     dim: 256,
///     ..Default::default()
/// };
/// let embedder = build_embedder(&cfg).unwrap();
/// assert_eq!(embedder.id().dim, 256);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Strategy selector: `"hash"` (deterministic digest), `"api"` (remote
    /// HTTP model), or `"onnx"` (local model, needs the `onnx` feature).
    pub mode: String,
    /// Model label recorded in every [`EmbedderId`](crate::EmbedderId).
    pub model_name: String,
    /// Vector width. Remote and local models must return exactly this many values.
    pub dim: usize,
    /// API inference endpoint when [`mode`](Self::mode) is `"api"`.
    pub api_url: Option<String>,
    /// Remote provider hint: `"hf"`, `"openai"`, or `"custom"` (default).
    pub api_provider: Option<String>,
    /// Name of the environment variable holding the API token, if any.
    pub api_key_env: Option<String>,
    /// Per-request timeout in seconds for remote providers.
    pub api_timeout_secs: u64,
    /// Local ONNX model file.
    pub model_path: PathBuf,
    /// Local `tokenizer.json`.
    pub tokenizer_path: PathBuf,
    /// Token budget per text for local inference; longer input is truncated.
    pub max_sequence_length: usize,
    /// Normalize learned vectors to unit length. Hash vectors are always normalized.
    pub normalize: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: "hash".into(),
            model_name: "all-MiniLM-L6-v2".into(),
            dim: crate::DEFAULT_HASH_DIM,
            api_url: None,
            api_provider: None,
            api_key_env: None,
            api_timeout_secs: 30,
            model_path: PathBuf::from("./models/all-MiniLM-L6-v2/onnx/model.onnx"),
            tokenizer_path: PathBuf::from("./models/all-MiniLM-L6-v2/tokenizer.json"),
            max_sequence_length: 256,
            normalize: true,
        }
    }
}

impl EmbeddingConfig {
    /// Check the fields the selected mode depends on.
    pub fn validate(&self) -> Result<(), String> {
        if self.dim == 0 {
            return Err("embedding.dim must be positive".into());
        }
        match self.mode.as_str() {
            "hash" => Ok(()),
            "api" => match self.api_url.as_deref() {
                Some(url) if !url.trim().is_empty() => Ok(()),
                _ => Err("embedding.api_url is required for api mode".into()),
            },
            "onnx" => {
                if self.max_sequence_length == 0 {
                    return Err("embedding.max_sequence_length must be positive".into());
                }
                Ok(())
            }
            other => Err(format!(
                "unknown embedding mode '{other}' (expected hash, api or onnx)"
            )),
        }
    }
}
