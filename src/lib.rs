//! Umbrella crate for the plant intelligence layer.
//!
//! [`PlantIntelligence`] wires the model registry, the quality predictor, the
//! anomaly detector, the chunk index, the embedder and the answer synthesizer
//! behind one API. It also owns the bulk operations that walk the batch store:
//! threshold recomputation and anomaly backfill.
//!
//! ```
//! use plantintel::{batch_context_for, BatchRecord};
//!
//! let batch = BatchRecord::new(1, "B-001");
//! assert_eq!(
//!     batch_context_for(&batch),
//!     "Batch B-001 status=PLANNED, raw=, qc_count=0"
//! );
//! ```

pub mod batch;
pub mod config;

pub use batch::{BatchRecord, BatchStore, BatchStoreError, InMemoryBatchStore, JsonBatchStore};
pub use config::{ConfigLoadError, PlantConfig};
pub use features::{FeatureError, FeatureSchema, FeatureVector, Record};
pub use index::{
    ChunkFilter, ChunkIndex, DocType, Document, DocumentStore, IndexError, IndexedDocument,
    NewDocument, RetrievalHit,
};
pub use models::{
    AnomalyDecision, AnomalyResult, AnomalyThreshold, ModelError, ModelPaths, ModelProvider,
    ModelRegistry, QcReading, QualityPrediction, DEFAULT_PERCENTILE,
};
pub use rag::{GenerationBackend, GenerationError, RagAnswer, RagError, SourceRef};
pub use semantic::{Embedder, EmbeddingError};

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use index::{index_text, search};
use models::{AnomalyDetector, QualityPredictor};
use rag::{AnswerSynthesizer, ChatCompletionsBackend};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Backfill progress is logged every this many batches.
const BACKFILL_PROGRESS_EVERY: usize = 50;

/// Errors surfaced by the plant intelligence facade.
#[derive(Debug)]
pub enum PlantError {
    Config(ConfigLoadError),
    Model(ModelError),
    Embedding(EmbeddingError),
    Index(IndexError),
    Generation(GenerationError),
    Batch(BatchStoreError),
    Io { path: PathBuf, source: std::io::Error },
}

impl PlantError {
    /// True when the caller's input, not the deployment, caused the failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PlantError::Model(err) if err.is_client_error())
    }
}

impl fmt::Display for PlantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlantError::Config(err) => write!(f, "configuration error: {err}"),
            PlantError::Model(err) => write!(f, "model failure: {err}"),
            PlantError::Embedding(err) => write!(f, "embedding failure: {err}"),
            PlantError::Index(err) => write!(f, "document index failure: {err}"),
            PlantError::Generation(err) => write!(f, "answer generation failed: {err}"),
            PlantError::Batch(err) => write!(f, "batch store failure: {err}"),
            PlantError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
        }
    }
}

impl Error for PlantError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PlantError::Config(err) => Some(err),
            PlantError::Model(err) => Some(err),
            PlantError::Embedding(err) => Some(err),
            PlantError::Index(err) => Some(err),
            PlantError::Generation(err) => Some(err),
            PlantError::Batch(err) => Some(err),
            PlantError::Io { source, .. } => Some(source),
        }
    }
}

impl From<ConfigLoadError> for PlantError {
    fn from(value: ConfigLoadError) -> Self {
        PlantError::Config(value)
    }
}

impl From<ModelError> for PlantError {
    fn from(value: ModelError) -> Self {
        PlantError::Model(value)
    }
}

impl From<FeatureError> for PlantError {
    fn from(value: FeatureError) -> Self {
        PlantError::Model(ModelError::Feature(value))
    }
}

impl From<EmbeddingError> for PlantError {
    fn from(value: EmbeddingError) -> Self {
        PlantError::Embedding(value)
    }
}

impl From<IndexError> for PlantError {
    fn from(value: IndexError) -> Self {
        PlantError::Index(value)
    }
}

impl From<GenerationError> for PlantError {
    fn from(value: GenerationError) -> Self {
        PlantError::Generation(value)
    }
}

impl From<BatchStoreError> for PlantError {
    fn from(value: BatchStoreError) -> Self {
        PlantError::Batch(value)
    }
}

impl From<RagError> for PlantError {
    fn from(value: RagError) -> Self {
        match value {
            RagError::Embedding(err) => PlantError::Embedding(err),
            RagError::Retrieval(err) => PlantError::Index(err),
            RagError::Generation(err) => PlantError::Generation(err),
        }
    }
}

/// Metrics observer for facade operations.
pub trait IntelligenceMetrics: Send + Sync {
    fn record_prediction(&self, latency: Duration, result: Result<(), &PlantError>);
    fn record_anomaly(&self, latency: Duration, result: Result<(), &PlantError>);
    fn record_retrieval(&self, latency: Duration, result: Result<(), &PlantError>);
    fn record_generation(&self, latency: Duration, result: Result<(), &PlantError>);
}

/// Install or clear the global metrics recorder.
pub fn set_intelligence_metrics(recorder: Option<Arc<dyn IntelligenceMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn IntelligenceMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn IntelligenceMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn IntelligenceMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

#[derive(Clone, Copy)]
enum Stage {
    Prediction,
    Anomaly,
    Retrieval,
    Generation,
}

struct MetricsSpan {
    recorder: Arc<dyn IntelligenceMetrics>,
    stage: Stage,
    start: Instant,
}

impl MetricsSpan {
    fn start(stage: Stage) -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            stage,
            start: Instant::now(),
        })
    }

    fn finish(self, result: Result<(), &PlantError>) {
        let latency = self.start.elapsed();
        match self.stage {
            Stage::Prediction => self.recorder.record_prediction(latency, result),
            Stage::Anomaly => self.recorder.record_anomaly(latency, result),
            Stage::Retrieval => self.recorder.record_retrieval(latency, result),
            Stage::Generation => self.recorder.record_generation(latency, result),
        }
    }
}

fn observed<T>(stage: Stage, op: impl FnOnce() -> Result<T, PlantError>) -> Result<T, PlantError> {
    let span = MetricsSpan::start(stage);
    let result = op();
    if let Some(span) = span {
        span.finish(result.as_ref().map(|_| ()));
    }
    result
}

fn io_error(path: &Path, source: std::io::Error) -> PlantError {
    PlantError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Selection for [`PlantIntelligence::backfill_anomaly_scores`].
#[derive(Debug, Clone, Default)]
pub struct BackfillOptions {
    /// Skip batches that already carry an anomaly score.
    pub only_missing: bool,
    /// Process at most this many batches, in id order.
    pub limit: Option<usize>,
    /// Overrides the facade's configured threshold for this run.
    pub threshold: Option<AnomalyThreshold>,
}

impl BackfillOptions {
    pub fn only_missing(mut self, only_missing: bool) -> Self {
        self.only_missing = only_missing;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_threshold(mut self, threshold: AnomalyThreshold) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    /// Batches matching the selection.
    pub selected: usize,
    pub processed: usize,
    /// Processed batches flagged anomalous.
    pub anomalies: usize,
}

/// Context string for `batch`, as handed to the answer synthesizer.
pub fn batch_context_for(batch: &BatchRecord) -> String {
    batch.batch_context()
}

/// Facade over every intelligence component.
pub struct PlantIntelligence {
    quality: QualityPredictor,
    anomaly: AnomalyDetector,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    synthesizer: AnswerSynthesizer,
    chunk_max_chars: usize,
    top_k: usize,
    threshold: Option<AnomalyThreshold>,
}

impl PlantIntelligence {
    /// Build every component from configuration.
    ///
    /// Model artifacts load lazily on first use. A missing generation
    /// credential is reported when a question is asked, not here.
    pub fn from_config(cfg: &PlantConfig) -> Result<Self, PlantError> {
        let schema = cfg.anomaly.schema()?;
        let models = Arc::new(ModelRegistry::with_anomaly_schema(cfg.models.paths(), schema));
        let embedder: Arc<dyn Embedder> = Arc::from(semantic::build_embedder(&cfg.embedding)?);
        let store = Arc::new(ChunkIndex::new(cfg.index.index_config())?);
        let generator = Arc::new(ChatCompletionsBackend::from_config(&cfg.generation)?);

        info!(
            quality_model = %cfg.models.quality_path.display(),
            anomaly_model = %cfg.models.anomaly_path.display(),
            embedder = %embedder.id(),
            index_backend = %cfg.index.backend,
            generation_model = %cfg.generation.model,
            "plant_intelligence_ready"
        );

        Ok(Self::with_components(models, embedder, store, generator)
            .with_chunk_max_chars(cfg.index.chunk_max_chars)
            .with_top_k(cfg.index.top_k)
            .with_threshold(cfg.anomaly.threshold()))
    }

    pub fn with_components(
        models: Arc<dyn ModelProvider>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        generator: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            quality: QualityPredictor::new(models.clone()),
            anomaly: AnomalyDetector::new(models),
            embedder,
            store,
            synthesizer: AnswerSynthesizer::new(generator),
            chunk_max_chars: index::DEFAULT_MAX_CHARS,
            top_k: rag::DEFAULT_TOP_K,
            threshold: None,
        }
    }

    pub fn with_chunk_max_chars(mut self, max_chars: usize) -> Self {
        self.chunk_max_chars = max_chars;
        self
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// Default threshold for anomaly scoring; `None` uses the model's own label.
    pub fn with_threshold(mut self, threshold: Option<AnomalyThreshold>) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> Option<&AnomalyThreshold> {
        self.threshold.as_ref()
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Predict QC pass/fail from a batch's process parameters.
    pub fn predict_quality(&self, parameters: &Record) -> Result<QualityPrediction, PlantError> {
        observed(Stage::Prediction, || Ok(self.quality.predict(parameters)?))
    }

    /// Score free-form batch telemetry. Missing fields count as `0.0`.
    pub fn score_batch_anomaly(
        &self,
        attributes: &Record,
        threshold: Option<&AnomalyThreshold>,
    ) -> Result<AnomalyResult, PlantError> {
        let threshold = threshold.or(self.threshold.as_ref());
        observed(Stage::Anomaly, || {
            Ok(self.anomaly.score_attributes(attributes, threshold)?)
        })
    }

    /// Score the mean of a batch's QC readings. Every mean must be present.
    pub fn score_qc(
        &self,
        readings: &[QcReading],
        threshold: Option<&AnomalyThreshold>,
    ) -> Result<AnomalyResult, PlantError> {
        let threshold = threshold.or(self.threshold.as_ref());
        observed(Stage::Anomaly, || {
            Ok(self.anomaly.score_qc_readings(readings, threshold)?)
        })
    }

    /// Percentile of every stored anomaly score. The result is returned, not
    /// installed; callers decide whether to adopt it.
    pub fn recompute_threshold(
        &self,
        batches: &dyn BatchStore,
        percentile: f64,
    ) -> Result<AnomalyThreshold, PlantError> {
        let all = batches.list_batches()?;
        let threshold =
            AnomalyThreshold::from_scores(all.iter().map(|b| b.anomaly_score), percentile)?;
        info!(
            percentile,
            batches = all.len(),
            threshold = threshold.value,
            "anomaly_threshold_computed"
        );
        Ok(threshold)
    }

    /// Score batch telemetry in id order and store each decision.
    ///
    /// Stops at the first failure; batches already written keep their new
    /// scores.
    pub fn backfill_anomaly_scores(
        &self,
        batches: &dyn BatchStore,
        options: &BackfillOptions,
    ) -> Result<BackfillReport, PlantError> {
        let selected: Vec<BatchRecord> = batches
            .list_batches()?
            .into_iter()
            .filter(|b| !options.only_missing || b.anomaly_score.is_none())
            .take(options.limit.unwrap_or(usize::MAX))
            .collect();

        let mut report = BackfillReport {
            selected: selected.len(),
            ..Default::default()
        };
        if selected.is_empty() {
            warn!(only_missing = options.only_missing, "backfill_nothing_to_process");
            return Ok(report);
        }

        let threshold = options.threshold.as_ref();
        for batch in &selected {
            let result = self.score_batch_anomaly(&batch.attributes, threshold)?;
            batches.record_anomaly(batch.id, &result)?;

            report.processed += 1;
            if result.is_anomaly {
                report.anomalies += 1;
            }
            if report.processed % BACKFILL_PROGRESS_EVERY == 0 {
                info!(
                    processed = report.processed,
                    total = report.selected,
                    "backfill_progress"
                );
            }
        }

        info!(
            processed = report.processed,
            anomalies = report.anomalies,
            "backfill_complete"
        );
        Ok(report)
    }

    /// Chunk, embed and store one document.
    pub fn index_document(&self, doc: NewDocument, text: &str) -> Result<IndexedDocument, PlantError> {
        Ok(index_text(
            self.store.as_ref(),
            self.embedder.as_ref(),
            doc,
            text,
            self.chunk_max_chars,
        )?)
    }

    /// Index every `*.txt` file directly inside `folder`, in file-name order.
    /// Each document is titled with its file name.
    pub fn index_folder(
        &self,
        folder: &Path,
        doc_type: DocType,
    ) -> Result<Vec<IndexedDocument>, PlantError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(folder).map_err(|e| io_error(folder, e))? {
            let path = entry.map_err(|e| io_error(folder, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut indexed = Vec::with_capacity(files.len());
        for path in files {
            let text = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
            let title = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let doc = NewDocument::new(title, doc_type)
                .with_source_path(path.to_string_lossy().into_owned());
            indexed.push(self.index_document(doc, &text)?);
        }
        info!(
            folder = %folder.display(),
            doc_type = %doc_type,
            documents = indexed.len(),
            "folder_indexed"
        );
        Ok(indexed)
    }

    /// Top `k` chunks for `question`, best first.
    pub fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievalHit>, PlantError> {
        observed(Stage::Retrieval, || {
            let query = self.embedder.embed(question)?;
            Ok(search(self.store.as_ref(), &query, &ChunkFilter::all(), k)?)
        })
    }

    /// Answer `question` from the knowledge base. `k` defaults to the
    /// configured top-k.
    pub fn answer_question(
        &self,
        question: &str,
        batch_context: Option<&str>,
        k: Option<usize>,
    ) -> Result<RagAnswer, PlantError> {
        let hits = self.retrieve(question, k.unwrap_or(self.top_k))?;
        let answer = observed(Stage::Generation, || {
            Ok(self.synthesizer.synthesize(question, batch_context, &hits)?)
        })?;
        info!(
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

    /// Answer `question` with batch `batch_id` as context. An unknown batch
    /// is answered without context.
    pub fn answer_for_batch(
        &self,
        question: &str,
        batches: &dyn BatchStore,
        batch_id: u64,
        k: Option<usize>,
    ) -> Result<RagAnswer, PlantError> {
        let context = match batches.get_batch(batch_id)? {
            Some(batch) => Some(batch.batch_context()),
            None => {
                warn!(batch_id, "batch_context_unavailable");
                None
            }
        };
        self.answer_question(question, context.as_deref(), k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{OutlierModel, QualityClassifier};
    use serde_json::json;
    use std::sync::Mutex;

    /// Outlier decision is `1 - moisture`, so wetter batches score higher.
    struct LinearModels {
        quality_names: Vec<String>,
        anomaly_names: Vec<String>,
        schema: FeatureSchema,
    }

    impl LinearModels {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                quality_names: FeatureSchema::quality().fields().to_vec(),
                anomaly_names: FeatureSchema::anomaly().fields().to_vec(),
                schema: FeatureSchema::anomaly(),
            })
        }
    }

    impl ModelProvider for LinearModels {
        fn quality_classifier(&self) -> Result<Arc<dyn QualityClassifier>, ModelError> {
            Ok(Arc::new(Classifier(self.quality_names.clone())))
        }

        fn outlier_model(&self) -> Result<Arc<dyn OutlierModel>, ModelError> {
            Ok(Arc::new(Outlier(self.anomaly_names.clone())))
        }

        fn anomaly_schema(&self) -> &FeatureSchema {
            &self.schema
        }
    }

    struct Classifier(Vec<String>);

    impl QualityClassifier for Classifier {
        fn feature_names(&self) -> &[String] {
            &self.0
        }

        fn pass_probability(&self, _x: &FeatureVector) -> Result<f64, ModelError> {
            Ok(0.75)
        }

        fn predict_pass(&self, _x: &FeatureVector) -> Result<bool, ModelError> {
            Ok(true)
        }

        fn model_version(&self) -> &str {
            "linear"
        }
    }

    struct Outlier(Vec<String>);

    impl OutlierModel for Outlier {
        fn feature_names(&self) -> &[String] {
            &self.0
        }

        fn decision_function(&self, x: &FeatureVector) -> Result<f64, ModelError> {
            Ok(1.0 - x.get("moisture_actual").unwrap_or(0.0))
        }

        fn model_version(&self) -> &str {
            "linear"
        }
    }

    struct EchoBackend;

    impl GenerationBackend for EchoBackend {
        fn generate(&self, _system: &str, user: &str) -> Result<String, GenerationError> {
            Ok(format!("echo: {}", user.lines().next().unwrap_or_default()))
        }
    }

    fn facade() -> PlantIntelligence {
        let store = Arc::new(ChunkIndex::new(index::IndexConfig::new()).unwrap());
        let embedder = Arc::new(semantic::HashEmbedder::new(64).unwrap());
        PlantIntelligence::with_components(LinearModels::new(), embedder, store, Arc::new(EchoBackend))
    }

    fn attrs(moisture: f64) -> Record {
        json!({"moisture_actual": moisture, "particle_size_actual": 90.0})
            .as_object()
            .cloned()
            .unwrap()
    }

    fn batches(moistures: &[f64]) -> InMemoryBatchStore {
        InMemoryBatchStore::from_batches(moistures.iter().enumerate().map(|(i, m)| {
            let mut batch = BatchRecord::new(i as u64 + 1, format!("B{}", i + 1));
            batch.attributes = attrs(*m);
            batch
        }))
        .unwrap()
    }

    #[test]
    fn predict_quality_requires_every_parameter() {
        let intel = facade();
        let err = intel.predict_quality(&Record::new()).unwrap_err();
        assert!(err.is_client_error());
        match err {
            PlantError::Model(model_err) => {
                assert_eq!(model_err.missing_feature(), Some("pretreatment_temperature"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn configured_threshold_applies_unless_overridden() {
        let intel = facade().with_threshold(Some(AnomalyThreshold::fixed(0.5)));
        // decision = 1 - 2 = -1, score = 1
        let result = intel.score_batch_anomaly(&attrs(2.0), None).unwrap();
        assert_eq!(result.score, 1.0);
        assert!(result.is_anomaly);

        let strict = AnomalyThreshold::fixed(5.0);
        let result = intel.score_batch_anomaly(&attrs(2.0), Some(&strict)).unwrap();
        assert!(!result.is_anomaly);
        assert_eq!(result.decision, AnomalyDecision::Threshold { value: 5.0 });
    }

    #[test]
    fn score_qc_rejects_incomplete_aggregates() {
        let intel = facade();
        let readings = [QcReading {
            moisture_actual: Some(4.0),
            particle_size_actual: None,
        }];
        let err = intel.score_qc(&readings, None).unwrap_err();
        assert!(matches!(
            err,
            PlantError::Model(ModelError::IncompleteAggregates { .. })
        ));
    }

    #[test]
    fn backfill_respects_only_missing_and_limit() {
        let intel = facade();
        let store = batches(&[0.5, 3.0, 0.2, 4.0]);
        let first = store.list_batches().unwrap()[0].clone();
        store
            .record_anomaly(
                first.id,
                &intel.score_batch_anomaly(&first.attributes, None).unwrap(),
            )
            .unwrap();

        let report = intel
            .backfill_anomaly_scores(&store, &BackfillOptions::default().only_missing(true).with_limit(2))
            .unwrap();
        assert_eq!(report.selected, 2);
        assert_eq!(report.processed, 2);
        // batch 2 has decision -2, a native outlier
        assert_eq!(report.anomalies, 1);

        let scored: Vec<bool> = store
            .list_batches()
            .unwrap()
            .iter()
            .map(|b| b.anomaly_score.is_some())
            .collect();
        assert_eq!(scored, vec![true, true, true, false]);
    }

    #[test]
    fn backfill_with_nothing_selected_is_empty() {
        let intel = facade();
        let store = InMemoryBatchStore::new();
        let report = intel
            .backfill_anomaly_scores(&store, &BackfillOptions::default())
            .unwrap();
        assert_eq!(report, BackfillReport::default());
    }

    #[test]
    fn threshold_requires_scored_batches() {
        let intel = facade();
        let store = batches(&[1.0, 2.0]);
        assert!(matches!(
            intel.recompute_threshold(&store, 97.0),
            Err(PlantError::Model(ModelError::InsufficientData(_)))
        ));

        intel
            .backfill_anomaly_scores(&store, &BackfillOptions::default())
            .unwrap();
        let threshold = intel.recompute_threshold(&store, 100.0).unwrap();
        // scores are moisture - 1
        assert!((threshold.value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn answer_for_batch_tolerates_unknown_ids() {
        let intel = facade();
        intel
            .index_document(NewDocument::new("Dryer SOP", DocType::Sop), "Keep the dryer below 90C.")
            .unwrap();
        let store = batches(&[1.0]);

        let answer = intel
            .answer_for_batch("dryer limit?", &store, 1, None)
            .unwrap();
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.answer, "echo: Question: dryer limit?");

        let answer = intel
            .answer_for_batch("dryer limit?", &store, 42, Some(1))
            .unwrap();
        assert_eq!(answer.sources[0].title, "Dryer SOP");
    }

    #[derive(Default)]
    struct CountingMetrics {
        events: Mutex<Vec<&'static str>>,
    }

    impl CountingMetrics {
        fn push(&self, ok: &'static str, err: &'static str, result: Result<(), &PlantError>) {
            self.events
                .lock()
                .unwrap()
                .push(if result.is_ok() { ok } else { err });
        }
    }

    impl IntelligenceMetrics for CountingMetrics {
        fn record_prediction(&self, _latency: Duration, result: Result<(), &PlantError>) {
            self.push("prediction_ok", "prediction_err", result);
        }

        fn record_anomaly(&self, _latency: Duration, result: Result<(), &PlantError>) {
            self.push("anomaly_ok", "anomaly_err", result);
        }

        fn record_retrieval(&self, _latency: Duration, result: Result<(), &PlantError>) {
            self.push("retrieval_ok", "retrieval_err", result);
        }

        fn record_generation(&self, _latency: Duration, result: Result<(), &PlantError>) {
            self.push("generation_ok", "generation_err", result);
        }
    }

    #[test]
    fn metrics_recorder_tracks_outcomes() {
        let metrics = Arc::new(CountingMetrics::default());
        set_intelligence_metrics(Some(metrics.clone()));

        let intel = facade();
        let _ = intel.predict_quality(&Record::new());
        let _ = intel.score_batch_anomaly(&attrs(0.1), None);
        let _ = intel.answer_question("anything", None, None);

        let events = metrics.events.lock().unwrap().clone();
        assert!(events.contains(&"prediction_err"));
        assert!(events.contains(&"anomaly_ok"));
        assert!(events.contains(&"retrieval_ok"));
        assert!(events.contains(&"generation_ok"));

        set_intelligence_metrics(None);
    }
}
