use serde_json::{json, Value};
use std::time::Duration;

use crate::normalize::l2_normalize_in_place;
use crate::{Embedder, EmbedderId, Embedding, EmbeddingConfig, EmbeddingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApiProviderKind {
    HuggingFace,
    OpenAI,
    Custom,
}

impl ApiProviderKind {
    fn from_hint(hint: Option<&str>) -> Self {
        match hint.unwrap_or("custom").to_ascii_lowercase().as_str() {
            "hf" | "huggingface" => ApiProviderKind::HuggingFace,
            "openai" | "gpt" => ApiProviderKind::OpenAI,
            _ => ApiProviderKind::Custom,
        }
    }
}

/// Learned sentence-embedding model reached over HTTP.
///
/// Supports Hugging Face feature-extraction, OpenAI-style `/embeddings`, and
/// a plain `{"text": ...}` endpoint. Returned vectors must match the
/// configured dimension.
pub struct ApiEmbedder {
    id: EmbedderId,
    url: String,
    provider: ApiProviderKind,
    auth_header: Option<String>,
    normalize: bool,
    client: reqwest::blocking::Client,
}

impl ApiEmbedder {
    pub fn from_config(cfg: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let url = cfg
            .api_url
            .clone()
            .ok_or_else(|| EmbeddingError::InvalidConfig("api_url is required for api mode".into()))?;
        let auth_header = match cfg.api_key_env.as_deref() {
            Some(var) => {
                let token = std::env::var(var)
                    .map_err(|_| EmbeddingError::MissingCredential(var.to_string()))?;
                Some(format!("Bearer {token}"))
            }
            None => None,
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.api_timeout_secs.max(1)))
            .build()
            .map_err(|e| EmbeddingError::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            id: EmbedderId::new("api", cfg.model_name.clone(), cfg.dim),
            url,
            provider: ApiProviderKind::from_hint(cfg.api_provider.as_deref()),
            auth_header,
            normalize: cfg.normalize,
            client,
        })
    }

    fn request(&self, payload: Value) -> Result<Value, EmbeddingError> {
        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(header) = self.auth_header.as_deref() {
            request = request.header("Authorization", header);
        }
        let response = request
            .send()
            .map_err(|e| EmbeddingError::Request(format!("HTTP request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EmbeddingError::Request(format!("HTTP error {status}: {body}")));
        }
        response
            .json::<Value>()
            .map_err(|e| EmbeddingError::Inference(format!("Invalid JSON response: {e}")))
    }

    fn finish(&self, mut vector: Vec<f32>) -> Result<Embedding, EmbeddingError> {
        if vector.len() != self.id.dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.id.dim,
                actual: vector.len(),
            });
        }
        if self.normalize {
            l2_normalize_in_place(&mut vector);
        }
        Ok(Embedding {
            vector,
            embedder: self.id.clone(),
            normalized: self.normalize,
        })
    }
}

impl Embedder for ApiEmbedder {
    fn id(&self) -> &EmbedderId {
        &self.id
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let payload = build_api_payload(self.provider, &[text], &self.id.model, false);
        let mut vectors = parse_embeddings_from_value(self.request(payload)?)?;
        let vector = vectors.pop().ok_or_else(|| {
            EmbeddingError::Inference("API response did not contain embeddings".into())
        })?;
        self.finish(vector)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let payload = build_api_payload(self.provider, texts, &self.id.model, true);
        let vectors = parse_embeddings_from_value(self.request(payload)?)?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::Inference(format!(
                "API returned {} embeddings for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        vectors.into_iter().map(|v| self.finish(v)).collect()
    }
}

fn build_api_payload(provider: ApiProviderKind, texts: &[&str], model: &str, batch: bool) -> Value {
    let first = texts.first().copied().unwrap_or("");
    match (provider, batch) {
        (ApiProviderKind::HuggingFace, true) => json!({ "inputs": texts }),
        (ApiProviderKind::HuggingFace, false) => json!({ "inputs": first }),
        (ApiProviderKind::OpenAI, true) => json!({ "input": texts, "model": model }),
        (ApiProviderKind::OpenAI, false) => json!({ "input": first, "model": model }),
        (ApiProviderKind::Custom, true) => json!({ "texts": texts }),
        (ApiProviderKind::Custom, false) => json!({ "text": first }),
    }
}

fn parse_embeddings_from_value(value: Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    match value {
        Value::Object(mut map) => {
            if let Some(embeddings) = map.remove("embeddings") {
                return parse_embedding_collection(embeddings);
            }
            if let Some(embedding) = map.remove("embedding") {
                return parse_embedding_vector(embedding).map(|v| vec![v]);
            }
            if let Some(Value::Array(items)) = map.remove("data") {
                return items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(mut obj) => obj
                            .remove("embedding")
                            .ok_or_else(|| {
                                EmbeddingError::Inference(
                                    "missing `embedding` field in data item".into(),
                                )
                            })
                            .and_then(parse_embedding_vector),
                        _ => Err(EmbeddingError::Inference(
                            "unexpected entry inside `data` array".into(),
                        )),
                    })
                    .collect();
            }
            Err(EmbeddingError::Inference(
                "unsupported API response shape".into(),
            ))
        }
        other => parse_embedding_collection(other),
    }
}

fn parse_embedding_collection(value: Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    match value {
        Value::Array(items) if items.is_empty() => Ok(Vec::new()),
        Value::Array(items) if items.iter().all(|item| matches!(item, Value::Array(_))) => {
            items.into_iter().map(parse_embedding_vector).collect()
        }
        other => parse_embedding_vector(other).map(|vec| vec![vec]),
    }
}

fn parse_embedding_vector(value: Value) -> Result<Vec<f32>, EmbeddingError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                item.as_f64().map(|v| v as f32).ok_or_else(|| {
                    EmbeddingError::Inference("embedding contains a non-numeric value".into())
                })
            })
            .collect(),
        _ => Err(EmbeddingError::Inference(
            "embedding is not an array".into(),
        )),
    }
}
