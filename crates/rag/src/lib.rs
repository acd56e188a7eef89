//! # Plant RAG
//!
//! Question answering over the plant knowledge base.
//!
//! [`AnswerSynthesizer::answer`] embeds the question, ranks the stored chunks
//! by cosine similarity, and asks a [`GenerationBackend`] to answer from the
//! best `k` of them. The prompt is fixed: a plant-assistant system
//! instruction, the question, optional batch context, and the retrieved
//! chunks labelled with their document title and type.
//!
//! [`ChatCompletionsBackend`] speaks the OpenAI-compatible chat-completions
//! protocol (Groq by default). Tests and offline tools can plug in any other
//! [`GenerationBackend`].

mod backend;
mod error;
mod prompt;
mod retry;

pub use backend::{
    ChatCompletionsBackend, GenerationBackend, GenerationConfig, DEFAULT_API_KEY_ENV,
    DEFAULT_CHAT_MODEL, DEFAULT_CHAT_URL,
};
pub use error::{GenerationError, RagError};
pub use prompt::{build_user_prompt, format_context, SYSTEM_PROMPT};
pub use retry::{execute_with_retry, RetryConfig, RetryResult};

use index::{search, ChunkFilter, DocType, DocumentStore, RetrievalHit};
use semantic::Embedder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Chunks retrieved per question unless the caller asks otherwise.
pub const DEFAULT_TOP_K: usize = 5;

/// A chunk the answer was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub document_id: u64,
    pub title: String,
    pub doc_type: DocType,
    pub chunk_index: u32,
    pub score: f32,
}

impl From<&RetrievalHit> for SourceRef {
    fn from(hit: &RetrievalHit) -> Self {
        Self {
            document_id: hit.chunk.document.id,
            title: hit.chunk.document.title.clone(),
            doc_type: hit.chunk.document.doc_type,
            chunk_index: hit.chunk.chunk_index,
            score: hit.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub question: String,
    pub answer: String,
    /// Best match first.
    pub sources: Vec<SourceRef>,
}

/// Builds prompts from retrieved chunks and delegates generation.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    backend: Arc<dyn GenerationBackend>,
}

impl AnswerSynthesizer {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Answer `question` from already-retrieved `hits`.
    pub fn synthesize(
        &self,
        question: &str,
        batch_context: Option<&str>,
        hits: &[RetrievalHit],
    ) -> Result<String, GenerationError> {
        let user = build_user_prompt(question, batch_context, hits);
        self.backend.generate(SYSTEM_PROMPT, &user)
    }

    /// Retrieve the top `k` chunks from `store` and answer from them.
    pub fn answer(
        &self,
        store: &dyn DocumentStore,
        embedder: &dyn Embedder,
        question: &str,
        batch_context: Option<&str>,
        k: usize,
    ) -> Result<RagAnswer, RagError> {
        let query = embedder.embed(question)?;
        let hits = search(store, &query, &ChunkFilter::all(), k)?;
        let answer = self.synthesize(question, batch_context, &hits)?;
        info!(
            k,
            sources = hits.len(),
            with_batch_context = batch_context.is_some(),
            "question_answered"
        );
        Ok(RagAnswer {
            question: question.to_string(),
            answer,
            sources: hits.iter().map(SourceRef::from).collect(),
        })
    }
}
