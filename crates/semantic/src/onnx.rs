use onnxruntime::ndarray::{Array, Array2};
use onnxruntime::session::Session;
use std::cell::RefCell;
use tokenizers::Tokenizer;

use crate::cache::{get_or_load_model_handle, ModelCacheKey};
use crate::normalize::l2_normalize_in_place;
use crate::{Embedder, EmbedderId, Embedding, EmbeddingConfig, EmbeddingError};

/// Local sentence-transformer (e.g. all-MiniLM-L6-v2) run through ONNX
/// Runtime, with attention-masked mean pooling over token states.
pub struct OnnxEmbedder {
    id: EmbedderId,
    key: ModelCacheKey,
    max_sequence_length: usize,
    normalize: bool,
}

impl OnnxEmbedder {
    pub fn from_config(cfg: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        if !cfg.model_path.exists() {
            return Err(EmbeddingError::ModelNotFound(
                cfg.model_path.display().to_string(),
            ));
        }
        Ok(Self {
            id: EmbedderId::new("onnx", cfg.model_name.clone(), cfg.dim),
            key: ModelCacheKey {
                model_path: cfg.model_path.clone(),
                tokenizer_path: cfg.tokenizer_path.clone(),
            },
            max_sequence_length: cfg.max_sequence_length,
            normalize: cfg.normalize,
        })
    }
}

impl Embedder for OnnxEmbedder {
    fn id(&self) -> &EmbedderId {
        &self.id
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| EmbeddingError::Inference("model returned no outputs".into()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let handle = get_or_load_model_handle(&self.key)?;
        let (encoded, max_len) = encode_documents(&handle.tokenizer, texts, self.max_sequence_length)?;
        let (input_ids, attn_mask) = build_padded_arrays(encoded, max_len)?;
        let vectors = execute_session(&handle.session, input_ids, attn_mask)?;
        vectors
            .into_iter()
            .map(|mut vector| {
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
            })
            .collect()
    }
}

struct EncodedDoc {
    ids: Vec<i64>,
    mask: Vec<i64>,
}

fn encode_documents(
    tokenizer: &Tokenizer,
    texts: &[&str],
    max_sequence_length: usize,
) -> Result<(Vec<EncodedDoc>, usize), EmbeddingError> {
    let mut encoded = Vec::with_capacity(texts.len());
    let mut max_len = 0usize;

    for text in texts {
        let encoding = tokenizer
            .encode(*text, true)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
        let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&x| x as i64).collect();
        let mut mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&x| x as i64)
            .collect();
        ids.truncate(max_sequence_length);
        mask.truncate(max_sequence_length);
        max_len = max_len.max(ids.len());
        encoded.push(EncodedDoc { ids, mask });
    }

    Ok((encoded, max_len))
}

fn build_padded_arrays(
    encoded: Vec<EncodedDoc>,
    max_len: usize,
) -> Result<(Array2<i64>, Array2<i64>), EmbeddingError> {
    let seq_len = max_len.max(1);
    let batch = encoded.len();
    let mut id_storage = Vec::with_capacity(batch * seq_len);
    let mut mask_storage = Vec::with_capacity(batch * seq_len);

    for EncodedDoc { ids, mask } in encoded {
        if ids.len() != mask.len() {
            return Err(EmbeddingError::Inference(
                "tokenizer produced mismatched id/mask lengths".into(),
            ));
        }
        let pad = seq_len.saturating_sub(ids.len());
        id_storage.extend(ids);
        mask_storage.extend(mask);
        id_storage.extend(std::iter::repeat(0).take(pad));
        mask_storage.extend(std::iter::repeat(0).take(pad));
    }

    let input_ids = Array::from_shape_vec((batch, seq_len), id_storage)
        .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
    let attn_mask = Array::from_shape_vec((batch, seq_len), mask_storage)
        .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
    Ok((input_ids, attn_mask))
}

fn execute_session(
    session: &RefCell<Session<'static>>,
    input_ids: Array2<i64>,
    attn_mask: Array2<i64>,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let (batch, seq_len) = input_ids.dim();
    let mask_rows: Vec<Vec<i64>> = attn_mask.outer_iter().map(|row| row.to_vec()).collect();
    let mut guard = session.borrow_mut();
    let session_ref = &mut *guard;
    let mut runtime_inputs = Vec::with_capacity(session_ref.inputs.len());
    let mut input_ids_tensor = Some(input_ids);
    let mut attn_mask_tensor = Some(attn_mask);

    for input in &session_ref.inputs {
        match input.name.as_str() {
            "input_ids" => {
                let tensor = input_ids_tensor.take().ok_or_else(|| {
                    EmbeddingError::InvalidConfig("model requested `input_ids` twice".into())
                })?;
                runtime_inputs.push(tensor.into_dyn());
            }
            "attention_mask" => {
                let tensor = attn_mask_tensor.take().ok_or_else(|| {
                    EmbeddingError::InvalidConfig("model requested `attention_mask` twice".into())
                })?;
                runtime_inputs.push(tensor.into_dyn());
            }
            "token_type_ids" => {
                runtime_inputs.push(Array::from_elem((batch, seq_len), 0_i64).into_dyn());
            }
            other => {
                return Err(EmbeddingError::Inference(format!(
                    "unsupported model input '{other}'"
                )))
            }
        }
    }

    let outputs = session_ref
        .run::<i64, f32, _>(runtime_inputs)
        .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
    let output_tensor = outputs
        .into_iter()
        .next()
        .ok_or_else(|| EmbeddingError::Inference("model returned no outputs".into()))?;

    let shape = output_tensor.shape().to_vec();
    let flat: Vec<f32> = output_tensor.iter().copied().collect();
    match shape.as_slice() {
        // Token states: [batch, seq, hidden].
        [b, s, hidden] if *b == batch && *s == seq_len => {
            Ok(mean_pool(&flat, &mask_rows, seq_len, *hidden))
        }
        // Already pooled: [batch, hidden].
        [b, hidden] if *b == batch && *hidden > 0 => Ok(flat.chunks(*hidden).map(|c| c.to_vec()).collect()),
        other => Err(EmbeddingError::Inference(format!(
            "unexpected model output shape {other:?}"
        ))),
    }
}

fn mean_pool(flat: &[f32], mask_rows: &[Vec<i64>], seq_len: usize, hidden: usize) -> Vec<Vec<f32>> {
    mask_rows
        .iter()
        .enumerate()
        .map(|(b, mask)| {
            let mut pooled = vec![0.0f32; hidden];
            let mut count = 0.0f32;
            for (t, &m) in mask.iter().enumerate() {
                if m == 0 {
                    continue;
                }
                let offset = (b * seq_len + t) * hidden;
                for (acc, v) in pooled.iter_mut().zip(&flat[offset..offset + hidden]) {
                    *acc += v;
                }
                count += 1.0;
            }
            if count > 0.0 {
                for acc in pooled.iter_mut() {
                    *acc /= count;
                }
            }
            pooled
        })
        .collect()
}
