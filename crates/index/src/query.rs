use crate::{DocumentChunk, IndexError};
use semantic::Embedding;

/// Added to the norm product so zero vectors score 0 instead of NaN.
const NORM_EPSILON: f64 = 1e-9;

/// Result entry for a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalHit {
    /// The matched chunk.
    pub chunk: DocumentChunk,
    /// Cosine similarity to the query, higher is closer.
    pub score: f32,
}

/// Cosine similarity, accumulated in `f64`.
///
/// Vectors of different length compare as 0.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt() + NORM_EPSILON)) as f32
}

/// NaN similarities rank below every real score.
fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Rank `corpus` against `query` and return the best `k` chunks.
///
/// Linear scan; ties keep corpus order. Every chunk must come from the same
/// embedder as the query.
pub fn retrieve(
    query: &Embedding,
    corpus: &[DocumentChunk],
    k: usize,
) -> Result<Vec<RetrievalHit>, IndexError> {
    if k == 0 || corpus.is_empty() {
        return Ok(Vec::new());
    }

    let mut scored = Vec::with_capacity(corpus.len());
    for (position, chunk) in corpus.iter().enumerate() {
        if chunk.embedder != query.embedder {
            return Err(IndexError::EmbedderMismatch {
                expected: query.embedder.to_string(),
                found: chunk.embedder.to_string(),
            });
        }
        scored.push((position, cosine_similarity(&query.vector, &chunk.embedding)));
    }

    // sort_by is stable, so equal scores stay in corpus order.
    scored.sort_by(|a, b| rank_key(b.1).total_cmp(&rank_key(a.1)));
    scored.truncate(k);

    Ok(scored
        .into_iter()
        .map(|(position, score)| RetrievalHit {
            chunk: corpus[position].clone(),
            score,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DocType, DocumentRef};
    use chrono::Utc;
    use semantic::EmbedderId;

    fn id() -> EmbedderId {
        EmbedderId::new("test", "fixed", 2)
    }

    fn chunk(doc: u64, vector: Vec<f32>) -> DocumentChunk {
        DocumentChunk {
            document: DocumentRef {
                id: doc,
                title: format!("doc-{doc}"),
                doc_type: DocType::Sop,
            },
            chunk_index: 0,
            text: format!("text {doc}"),
            embedding: vector,
            embedder: id(),
            created_at: Utc::now(),
        }
    }

    fn query(vector: Vec<f32>) -> Embedding {
        Embedding {
            vector,
            embedder: id(),
            normalized: false,
        }
    }

    #[test]
    fn cosine_self_similarity_is_one() {
        let v = [0.3f32, -1.2, 4.0, 0.01];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = [1.0f32, 2.0, 3.0];
        let b = [-2.0f32, 0.5, 1.0];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn k_zero_and_empty_corpus_yield_nothing() {
        let corpus = vec![chunk(1, vec![1.0, 0.0])];
        assert!(retrieve(&query(vec![1.0, 0.0]), &corpus, 0).unwrap().is_empty());
        assert!(retrieve(&query(vec![1.0, 0.0]), &[], 5).unwrap().is_empty());
    }

    #[test]
    fn results_are_sorted_and_truncated() {
        let corpus = vec![
            chunk(1, vec![0.0, 1.0]),
            chunk(2, vec![1.0, 0.0]),
            chunk(3, vec![1.0, 1.0]),
        ];
        let hits = retrieve(&query(vec![1.0, 0.0]), &corpus, 2).unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.chunk.document.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn ties_keep_corpus_order() {
        let corpus = vec![
            chunk(7, vec![1.0, 0.0]),
            chunk(3, vec![2.0, 0.0]),
            chunk(5, vec![0.5, 0.0]),
        ];
        let hits = retrieve(&query(vec![1.0, 0.0]), &corpus, 10).unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.chunk.document.id).collect();
        assert_eq!(ids, vec![7, 3, 5]);
    }

    #[test]
    fn foreign_embedder_is_rejected() {
        let mut foreign = chunk(2, vec![1.0, 0.0]);
        foreign.embedder = EmbedderId::new("hash", "sha256", 2);
        let corpus = vec![chunk(1, vec![1.0, 0.0]), foreign];
        let err = retrieve(&query(vec![1.0, 0.0]), &corpus, 1).unwrap_err();
        assert!(matches!(err, IndexError::EmbedderMismatch { .. }));
    }

    #[test]
    fn nan_scores_rank_last() {
        let corpus = vec![
            chunk(1, vec![f32::NAN, 0.0]),
            chunk(2, vec![0.0, 1.0]),
            chunk(3, vec![1.0, 0.0]),
            chunk(4, vec![f32::NAN, 1.0]),
        ];
        let hits = retrieve(&query(vec![1.0, 0.0]), &corpus, 4).unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.chunk.document.id).collect();
        assert_eq!(ids, vec![3, 2, 1, 4]);
        assert!(hits[2].score.is_nan() && hits[3].score.is_nan());
    }
}
