//! # Plant Index
//!
//! Storage and retrieval for the plant knowledge base: SOPs, manuals, QC
//! notes and incident reports.
//!
//! ## Pieces
//!
//! - [`chunk_text`] splits document text into paragraph-packed chunks.
//! - [`ChunkIndex`] stores documents and embedded chunks over a pluggable
//!   [`IndexBackend`]. Out of the box:
//!   - [`InMemoryBackend`], an ordered in-process map (tests, one-shot runs).
//!   - `RedbBackend`, a persistent file (feature `backend-redb`, on by default).
//!
//!   Records are `bincode`-encoded and, by default, Zstd-compressed.
//! - [`retrieve`] ranks a corpus of chunks against a query embedding by
//!   cosine similarity.
//!
//! The index remembers the [`EmbedderId`] of the first chunk written and
//! refuses chunks from any other embedder, so a corpus never mixes vector
//! spaces.
//!
//! ## Example
//!
//! ```
//! use index::{index_text, search, ChunkFilter, ChunkIndex, DocType, IndexConfig, NewDocument};
//! use semantic::{Embedder, HashEmbedder};
//!
//! let store = ChunkIndex::new(IndexConfig::new()).unwrap();
//! let embedder = HashEmbedder::new(64).unwrap();
//!
//! let text = "Preheat dryer to 80C.\nHold for 45 minutes before discharge.";
//! let indexed = index_text(&store, &embedder, NewDocument::new("Dryer SOP", DocType::Sop), text, 800).unwrap();
//! assert_eq!(indexed.chunk_count, 1);
//!
//! let query = embedder.embed("How long do we hold the dryer?").unwrap();
//! let hits = search(&store, &query, &ChunkFilter::all(), 5).unwrap();
//! assert_eq!(hits[0].chunk.document.title, "Dryer SOP");
//! ```

mod backend;
mod chunker;
mod document;
mod query;

#[cfg(feature = "backend-redb")]
pub use backend::RedbBackend;
pub use backend::{BackendConfig, InMemoryBackend, IndexBackend};
pub use chunker::{chunk_text, DEFAULT_MAX_CHARS};
pub use document::{ChunkFilter, DocType, Document, DocumentChunk, DocumentRef, NewDocument};
pub use query::{cosine_similarity, retrieve, RetrievalHit};

use bincode::config::standard;
use bincode::error::{DecodeError, EncodeError};
use bincode::serde::{decode_from_slice, encode_to_vec};
use chrono::Utc;
use semantic::{Embedder, EmbedderId, Embedding, EmbeddingError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};
use zstd::{decode_all, encode_all};

const DOC_PREFIX: &str = "doc/";
const CHUNK_PREFIX: &str = "chunk/";
const NEXT_DOCUMENT_ID_KEY: &str = "meta/next_document_id";
const EMBEDDER_KEY: &str = "meta/embedder";

fn document_key(id: u64) -> String {
    format!("{DOC_PREFIX}{id:016x}")
}

fn document_chunks_prefix(id: u64) -> String {
    format!("{CHUNK_PREFIX}{id:016x}/")
}

fn chunk_key(document_id: u64, chunk_index: u32) -> String {
    format!("{CHUNK_PREFIX}{document_id:016x}/{chunk_index:08x}")
}

/// Compression codec options for index storage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CompressionCodec {
    /// No compression (useful for debugging or when storage is not a concern).
    None,
    /// Zstd compression (default, good balance of speed and ratio).
    #[default]
    Zstd,
}

/// Compression behavior configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressionConfig {
    /// The compression codec to use (None or Zstd).
    pub codec: CompressionCodec,
    /// Compression level (1-22 for Zstd, where higher = better compression but slower).
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            codec: CompressionCodec::default(),
            level: 3,
        }
    }
}

impl CompressionConfig {
    pub fn new(codec: CompressionCodec, level: i32) -> Self {
        Self { codec, level }
    }

    pub fn with_codec(mut self, codec: CompressionCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, IndexError> {
        match self.codec {
            CompressionCodec::None => Ok(data.to_vec()),
            CompressionCodec::Zstd => Ok(encode_all(data, self.level)?),
        }
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, IndexError> {
        match self.codec {
            CompressionCodec::None => Ok(data.to_vec()),
            CompressionCodec::Zstd => Ok(decode_all(data)?),
        }
    }
}

/// Config for initializing the index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexConfig {
    /// Backend storage configuration (in-memory or redb).
    pub backend: BackendConfig,
    /// Compression settings for stored records.
    pub compression: CompressionConfig,
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Serialization encode error: {0}")]
    Encode(String),
    #[error("Serialization decode error: {0}")]
    Decode(String),
    #[error("Compression error: {0}")]
    Zstd(String),
    #[error("embedder mismatch: index holds vectors from {expected}, got {found}")]
    EmbedderMismatch { expected: String, found: String },
    #[error("document {0} does not exist")]
    DocumentNotFound(u64),
    #[error("chunk {chunk_index} of document {document_id} already exists")]
    DuplicateChunk { document_id: u64, chunk_index: u32 },
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

impl From<EncodeError> for IndexError {
    fn from(e: EncodeError) -> Self {
        IndexError::Encode(e.to_string())
    }
}

impl From<DecodeError> for IndexError {
    fn from(e: DecodeError) -> Self {
        IndexError::Decode(e.to_string())
    }
}

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        IndexError::Zstd(e.to_string())
    }
}

impl IndexError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Persistence for documents and their embedded chunks.
pub trait DocumentStore: Send + Sync {
    /// Register a document and assign its id.
    fn create_document(&self, doc: NewDocument) -> Result<Document, IndexError>;

    fn get_document(&self, id: u64) -> Result<Option<Document>, IndexError>;

    /// Store chunks of existing documents. All or nothing.
    fn create_chunks(&self, chunks: &[DocumentChunk]) -> Result<(), IndexError>;

    fn create_chunk(&self, chunk: &DocumentChunk) -> Result<(), IndexError> {
        self.create_chunks(std::slice::from_ref(chunk))
    }

    /// Register a document and store its embedded chunks in one write.
    ///
    /// `pieces` are chunk texts with their embeddings, in chunk order. On
    /// error nothing is stored, the document included.
    fn create_document_with_chunks(
        &self,
        doc: NewDocument,
        pieces: Vec<(String, Embedding)>,
    ) -> Result<(Document, Vec<DocumentChunk>), IndexError>;

    /// Chunks matching `filter`, ordered by document id then chunk index.
    fn list_chunks(&self, filter: &ChunkFilter) -> Result<Vec<DocumentChunk>, IndexError>;

    /// The embedder every stored chunk came from, once one has been written.
    fn pinned_embedder(&self) -> Result<Option<EmbedderId>, IndexError> {
        Ok(None)
    }
}

/// [`DocumentStore`] over an [`IndexBackend`].
pub struct ChunkIndex {
    backend: Box<dyn IndexBackend>,
    cfg: IndexConfig,
    /// Serializes id allocation, pin checks and chunk writes.
    writer: Mutex<()>,
}

impl ChunkIndex {
    /// Open the index on the configured backend.
    pub fn new(cfg: IndexConfig) -> Result<Self, IndexError> {
        let backend = cfg.backend.build()?;
        Ok(Self::with_backend(cfg, backend))
    }

    /// Build an index with a custom backend.
    pub fn with_backend(cfg: IndexConfig, backend: Box<dyn IndexBackend>) -> Self {
        Self {
            backend,
            cfg,
            writer: Mutex::new(()),
        }
    }

    /// Flush backend buffers if supported.
    pub fn flush(&self) -> Result<(), IndexError> {
        self.backend.flush()
    }

    fn get_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, IndexError> {
        match self.backend.get(key)? {
            Some(data) => Ok(Some(self.decode_record(&data)?)),
            None => Ok(None),
        }
    }

    /// Decodes and decompresses a record from the backend.
    fn decode_record<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, IndexError> {
        let decompressed = self.cfg.compression.decompress(data)?;
        let (record, _) = decode_from_slice(&decompressed, standard())?;
        Ok(record)
    }

    /// Encodes and compresses a record for storage in the backend.
    fn encode_record<T: Serialize>(&self, rec: &T) -> Result<Vec<u8>, IndexError> {
        let encoded = encode_to_vec(rec, standard())?;
        self.cfg.compression.compress(&encoded)
    }

    fn lock_writer(&self) -> Result<std::sync::MutexGuard<'_, ()>, IndexError> {
        self.writer
            .lock()
            .map_err(|_| IndexError::backend("poisoned lock"))
    }

    /// Allocate the next document id. Caller holds the writer lock.
    fn allocate_document(
        &self,
        doc: NewDocument,
    ) -> Result<(Document, Vec<(String, Vec<u8>)>), IndexError> {
        let id = self.get_record::<u64>(NEXT_DOCUMENT_ID_KEY)?.unwrap_or(1);
        let document = Document {
            id,
            title: doc.title,
            doc_type: doc.doc_type,
            source_path: doc.source_path,
            created_at: Utc::now(),
        };
        let entries = vec![
            (document_key(id), self.encode_record(&document)?),
            (NEXT_DOCUMENT_ID_KEY.to_string(), self.encode_record(&(id + 1))?),
        ];
        Ok((document, entries))
    }

    /// Validate `chunks` and encode them, plus the embedder pin if this is
    /// the first write. `pending` is a document being created in the same
    /// batch. Caller holds the writer lock.
    fn chunk_entries(
        &self,
        chunks: &[DocumentChunk],
        pending: Option<u64>,
    ) -> Result<Vec<(String, Vec<u8>)>, IndexError> {
        let Some(first) = chunks.first() else {
            return Ok(Vec::new());
        };
        let pinned = self.get_record::<EmbedderId>(EMBEDDER_KEY)?;
        let expected = pinned.as_ref().unwrap_or(&first.embedder);
        let mut entries = Vec::with_capacity(chunks.len() + 1);
        let mut seen_keys = HashSet::with_capacity(chunks.len());
        let mut known_documents: HashSet<u64> = pending.into_iter().collect();

        for chunk in chunks {
            if &chunk.embedder != expected {
                return Err(IndexError::EmbedderMismatch {
                    expected: expected.to_string(),
                    found: chunk.embedder.to_string(),
                });
            }
            let document_id = chunk.document.id;
            if !known_documents.contains(&document_id) {
                if self.backend.get(&document_key(document_id))?.is_none() {
                    return Err(IndexError::DocumentNotFound(document_id));
                }
                known_documents.insert(document_id);
            }
            let key = chunk_key(document_id, chunk.chunk_index);
            if !seen_keys.insert(key.clone()) || self.backend.get(&key)?.is_some() {
                return Err(IndexError::DuplicateChunk {
                    document_id,
                    chunk_index: chunk.chunk_index,
                });
            }
            entries.push((key, self.encode_record(chunk)?));
        }

        if pinned.is_none() {
            info!(embedder = %expected, "index_embedder_pinned");
            entries.push((EMBEDDER_KEY.to_string(), self.encode_record(expected)?));
        }
        Ok(entries)
    }
}

fn build_chunks(document: &Document, pieces: Vec<(String, Embedding)>) -> Vec<DocumentChunk> {
    let created_at = Utc::now();
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, (text, embedding))| DocumentChunk {
            document: document.to_ref(),
            chunk_index: i as u32,
            text,
            embedding: embedding.vector,
            embedder: embedding.embedder,
            created_at,
        })
        .collect()
}

impl DocumentStore for ChunkIndex {
    fn create_document(&self, doc: NewDocument) -> Result<Document, IndexError> {
        let _guard = self.lock_writer()?;
        let (document, entries) = self.allocate_document(doc)?;
        self.backend.batch_put(entries)?;
        debug!(document_id = document.id, title = %document.title, "document_created");
        Ok(document)
    }

    fn get_document(&self, id: u64) -> Result<Option<Document>, IndexError> {
        self.get_record(&document_key(id))
    }

    fn create_chunks(&self, chunks: &[DocumentChunk]) -> Result<(), IndexError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let _guard = self.lock_writer()?;
        let entries = self.chunk_entries(chunks, None)?;
        self.backend.batch_put(entries)
    }

    fn create_document_with_chunks(
        &self,
        doc: NewDocument,
        pieces: Vec<(String, Embedding)>,
    ) -> Result<(Document, Vec<DocumentChunk>), IndexError> {
        let _guard = self.lock_writer()?;
        let (document, mut entries) = self.allocate_document(doc)?;
        let chunks = build_chunks(&document, pieces);
        entries.extend(self.chunk_entries(&chunks, Some(document.id))?);
        self.backend.batch_put(entries)?;
        debug!(document_id = document.id, title = %document.title, "document_created");
        Ok((document, chunks))
    }

    fn list_chunks(&self, filter: &ChunkFilter) -> Result<Vec<DocumentChunk>, IndexError> {
        let prefix = match filter.document_id {
            Some(id) => document_chunks_prefix(id),
            None => CHUNK_PREFIX.to_string(),
        };
        let limit = filter.limit.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        if limit == 0 {
            return Ok(out);
        }

        self.backend.scan_prefix(&prefix, &mut |_key, data| {
            let chunk: DocumentChunk = self.decode_record(data)?;
            if filter.matches(&chunk) {
                out.push(chunk);
            }
            Ok(out.len() < limit)
        })?;
        Ok(out)
    }

    fn pinned_embedder(&self) -> Result<Option<EmbedderId>, IndexError> {
        self.get_record(EMBEDDER_KEY)
    }
}

/// Outcome of [`index_text`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub document: Document,
    pub chunk_count: usize,
}

/// Chunk `text`, embed every chunk, and store the document with its chunks.
///
/// Embedding happens before anything is written, and the document is stored
/// in the same write as its chunks, so any failure leaves the store
/// untouched. Text with no non-blank lines yields a document with zero
/// chunks.
pub fn index_text(
    store: &dyn DocumentStore,
    embedder: &dyn Embedder,
    doc: NewDocument,
    text: &str,
    max_chars: usize,
) -> Result<IndexedDocument, IndexError> {
    if let Some(pinned) = store.pinned_embedder()? {
        if &pinned != embedder.id() {
            return Err(IndexError::EmbedderMismatch {
                expected: pinned.to_string(),
                found: embedder.id().to_string(),
            });
        }
    }

    let pieces = chunk_text(text, max_chars);
    let texts: Vec<&str> = pieces.iter().map(String::as_str).collect();
    let embeddings = embedder.embed_batch(&texts)?;

    // The pin is checked again under the store's writer lock.
    let (document, chunks) =
        store.create_document_with_chunks(doc, pieces.into_iter().zip(embeddings).collect())?;

    info!(
        document_id = document.id,
        title = %document.title,
        doc_type = %document.doc_type,
        chunks = chunks.len(),
        "document_indexed"
    );
    Ok(IndexedDocument {
        document,
        chunk_count: chunks.len(),
    })
}

/// Load the chunks selected by `filter` and rank them against `query`.
pub fn search(
    store: &dyn DocumentStore,
    query: &Embedding,
    filter: &ChunkFilter,
    k: usize,
) -> Result<Vec<RetrievalHit>, IndexError> {
    if k == 0 {
        return Ok(Vec::new());
    }
    let corpus = store.list_chunks(filter)?;
    let hits = retrieve(query, &corpus, k)?;
    debug!(corpus = corpus.len(), hits = hits.len(), "retrieval_complete");
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use semantic::HashEmbedder;

    fn memory_index() -> ChunkIndex {
        ChunkIndex::with_backend(IndexConfig::new(), Box::new(InMemoryBackend::new()))
    }

    fn sample_chunk(document: &Document, chunk_index: u32, embedder: &EmbedderId) -> DocumentChunk {
        DocumentChunk {
            document: document.to_ref(),
            chunk_index,
            text: format!("chunk {chunk_index}"),
            embedding: vec![1.0; embedder.dim],
            embedder: embedder.clone(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn document_ids_are_sequential() {
        let index = memory_index();
        let a = index.create_document(NewDocument::new("A", DocType::Sop)).unwrap();
        let b = index
            .create_document(NewDocument::new("B", DocType::Manual).with_source_path("kb/b.txt"))
            .unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let fetched = index.get_document(2).unwrap().unwrap();
        assert_eq!(fetched, b);
        assert!(index.get_document(3).unwrap().is_none());
    }

    #[test]
    fn chunks_roundtrip_without_compression() {
        let cfg = IndexConfig::new()
            .with_compression(CompressionConfig::default().with_codec(CompressionCodec::None));
        let index = ChunkIndex::with_backend(cfg, Box::new(InMemoryBackend::new()));
        let doc = index.create_document(NewDocument::new("QC log", DocType::Qc)).unwrap();
        let id = EmbedderId::new("test", "fixed", 3);

        let chunk = sample_chunk(&doc, 0, &id);
        index.create_chunk(&chunk).unwrap();
        assert_eq!(index.list_chunks(&ChunkFilter::all()).unwrap(), vec![chunk]);
    }

    #[test]
    fn first_chunk_pins_embedder() {
        let index = memory_index();
        let doc = index.create_document(NewDocument::new("A", DocType::Sop)).unwrap();
        let first = EmbedderId::new("hash", "sha256", 4);
        let other = EmbedderId::new("api", "minilm", 4);

        assert!(index.pinned_embedder().unwrap().is_none());
        index.create_chunk(&sample_chunk(&doc, 0, &first)).unwrap();
        assert_eq!(index.pinned_embedder().unwrap(), Some(first));

        let err = index.create_chunk(&sample_chunk(&doc, 1, &other)).unwrap_err();
        assert!(matches!(err, IndexError::EmbedderMismatch { .. }));
        assert_eq!(index.list_chunks(&ChunkFilter::all()).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_and_orphan_chunks_are_rejected() {
        let index = memory_index();
        let doc = index.create_document(NewDocument::new("A", DocType::Sop)).unwrap();
        let id = EmbedderId::new("test", "fixed", 2);

        index.create_chunk(&sample_chunk(&doc, 0, &id)).unwrap();
        assert!(matches!(
            index.create_chunk(&sample_chunk(&doc, 0, &id)),
            Err(IndexError::DuplicateChunk { chunk_index: 0, .. })
        ));

        let mut orphan = sample_chunk(&doc, 0, &id);
        orphan.document.id = 99;
        assert!(matches!(
            index.create_chunk(&orphan),
            Err(IndexError::DocumentNotFound(99))
        ));
    }

    #[test]
    fn list_chunks_applies_filter_and_limit() {
        let index = memory_index();
        let id = EmbedderId::new("test", "fixed", 2);
        let sop = index.create_document(NewDocument::new("SOP", DocType::Sop)).unwrap();
        let inc = index
            .create_document(NewDocument::new("Incident", DocType::Incident))
            .unwrap();
        index
            .create_chunks(&[
                sample_chunk(&sop, 0, &id),
                sample_chunk(&sop, 1, &id),
                sample_chunk(&inc, 0, &id),
            ])
            .unwrap();

        assert_eq!(index.list_chunks(&ChunkFilter::all()).unwrap().len(), 3);
        assert_eq!(index.list_chunks(&ChunkFilter::document(sop.id)).unwrap().len(), 2);
        let incidents = index
            .list_chunks(&ChunkFilter::all().with_doc_type(DocType::Incident))
            .unwrap();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].document.title, "Incident");
        assert_eq!(index.list_chunks(&ChunkFilter::all().with_limit(1)).unwrap().len(), 1);
        assert!(index.list_chunks(&ChunkFilter::all().with_limit(0)).unwrap().is_empty());
    }

    #[test]
    fn chunks_list_in_document_then_index_order() {
        let index = memory_index();
        let id = EmbedderId::new("test", "fixed", 2);
        let doc = index.create_document(NewDocument::new("A", DocType::Sop)).unwrap();
        let chunks: Vec<_> = (0..20).rev().map(|i| sample_chunk(&doc, i, &id)).collect();
        index.create_chunks(&chunks).unwrap();

        let listed: Vec<u32> = index
            .list_chunks(&ChunkFilter::all())
            .unwrap()
            .iter()
            .map(|c| c.chunk_index)
            .collect();
        assert_eq!(listed, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn index_text_refuses_a_second_embedder_before_writing() {
        let index = memory_index();
        let first = HashEmbedder::new(16).unwrap();
        let second = HashEmbedder::new(32).unwrap();

        index_text(&index, &first, NewDocument::new("A", DocType::Sop), "one\ntwo", 800).unwrap();
        let err = index_text(&index, &second, NewDocument::new("B", DocType::Sop), "three", 800)
            .unwrap_err();
        assert!(matches!(err, IndexError::EmbedderMismatch { .. }));
        assert!(index.get_document(2).unwrap().is_none());
    }

    #[test]
    fn rejected_chunks_leave_no_document_behind() {
        let index = memory_index();
        let first = HashEmbedder::new(16).unwrap();
        let second = HashEmbedder::new(32).unwrap();
        index_text(&index, &first, NewDocument::new("A", DocType::Sop), "one", 800).unwrap();

        let piece = ("two".to_string(), second.embed("two").unwrap());
        let err = index
            .create_document_with_chunks(NewDocument::new("B", DocType::Sop), vec![piece])
            .unwrap_err();
        assert!(matches!(err, IndexError::EmbedderMismatch { .. }));
        assert!(index.get_document(2).unwrap().is_none());

        // The id was not consumed either.
        let next = index.create_document(NewDocument::new("C", DocType::Qc)).unwrap();
        assert_eq!(next.id, 2);
    }

    struct SlowEmbedder {
        inner: HashEmbedder,
        delay: std::time::Duration,
    }

    impl Embedder for SlowEmbedder {
        fn id(&self) -> &EmbedderId {
            self.inner.id()
        }

        fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
            std::thread::sleep(self.delay);
            self.inner.embed(text)
        }
    }

    #[test]
    fn racing_embedders_store_only_the_winner() {
        let index = memory_index();
        let embedders = [
            SlowEmbedder {
                inner: HashEmbedder::new(16).unwrap(),
                delay: std::time::Duration::from_millis(50),
            },
            SlowEmbedder {
                inner: HashEmbedder::new(32).unwrap(),
                delay: std::time::Duration::from_millis(50),
            },
        ];
        let barrier = std::sync::Barrier::new(embedders.len());

        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = embedders
                .iter()
                .enumerate()
                .map(|(i, embedder)| {
                    let (index, barrier) = (&index, &barrier);
                    scope.spawn(move || {
                        barrier.wait();
                        let doc = NewDocument::new(format!("doc-{i}"), DocType::Sop);
                        index_text(index, embedder, doc, "line one\nline two", 800)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(IndexError::EmbedderMismatch { .. }))));

        assert_eq!(winners[0].document.id, 1);
        assert!(index.get_document(1).unwrap().is_some());
        assert!(index.get_document(2).unwrap().is_none());
        let chunks = index.list_chunks(&ChunkFilter::all()).unwrap();
        assert_eq!(chunks.len(), winners[0].chunk_count);
        assert!(chunks.iter().all(|c| c.document.id == 1));
    }

    #[test]
    fn blank_text_creates_document_without_chunks() {
        let index = memory_index();
        let embedder = HashEmbedder::new(8).unwrap();
        let indexed =
            index_text(&index, &embedder, NewDocument::new("Empty", DocType::Manual), "\n \n", 800)
                .unwrap();
        assert_eq!(indexed.chunk_count, 0);
        assert!(index.list_chunks(&ChunkFilter::all()).unwrap().is_empty());
    }

    #[test]
    fn search_finds_the_matching_chunk() {
        let index = memory_index();
        let embedder = HashEmbedder::new(64).unwrap();
        index_text(
            &index,
            &embedder,
            NewDocument::new("Dryer SOP", DocType::Sop),
            "Dryer outlet must stay below 90C.",
            800,
        )
        .unwrap();
        index_text(
            &index,
            &embedder,
            NewDocument::new("Mill manual", DocType::Manual),
            "Mill screen size is 0.5 mm.",
            800,
        )
        .unwrap();

        // The hash embedder is exact-match only: identical text scores 1.
        let query = embedder.embed("Mill screen size is 0.5 mm.").unwrap();
        let hits = search(&index, &query, &ChunkFilter::all(), 1).unwrap();
        assert_eq!(hits[0].chunk.document.title, "Mill manual");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }
}
