//! Production batches as seen by the intelligence layer.
//!
//! Batches live in an external system of record. [`BatchStore`] is the narrow
//! view the bulk operations need: list batches, read one, and write back an
//! anomaly decision.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use features::Record;
use models::{AnomalyResult, QcReading};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BatchStoreError {
    #[error("batch {0} not found")]
    NotFound(u64),
    #[error("duplicate batch id {0}")]
    DuplicateId(u64),
    #[error("batch file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("batch file {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One production batch with its QC reports and last anomaly decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub id: u64,
    pub batch_no: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub raw_material: String,
    /// Process parameters, the quality model's inputs.
    #[serde(default)]
    pub parameters: Record,
    /// Free-form telemetry the anomaly model reads leniently.
    #[serde(default)]
    pub attributes: Record,
    #[serde(default)]
    pub qc_reports: Vec<QcReading>,
    #[serde(default)]
    pub anomaly_score: Option<f64>,
    #[serde(default)]
    pub is_anomaly: Option<bool>,
    #[serde(default)]
    pub anomaly_scored_at: Option<DateTime<Utc>>,
}

impl BatchRecord {
    pub fn new<S: Into<String>>(id: u64, batch_no: S) -> Self {
        Self {
            id,
            batch_no: batch_no.into(),
            status: default_status(),
            raw_material: String::new(),
            parameters: Record::new(),
            attributes: Record::new(),
            qc_reports: Vec::new(),
            anomaly_score: None,
            is_anomaly: None,
            anomaly_scored_at: None,
        }
    }

    /// One-line summary handed to the answer synthesizer.
    pub fn batch_context(&self) -> String {
        format!(
            "Batch {} status={}, raw={}, qc_count={}",
            self.batch_no,
            self.status,
            self.raw_material,
            self.qc_reports.len()
        )
    }

    fn apply_anomaly(&mut self, result: &AnomalyResult) {
        self.anomaly_score = Some(result.score);
        self.is_anomaly = Some(result.is_anomaly);
        self.anomaly_scored_at = Some(result.computed_at);
    }
}

fn default_status() -> String {
    "PLANNED".to_string()
}

/// Access to the external batch records.
pub trait BatchStore: Send + Sync {
    /// Every batch, ascending by id.
    fn list_batches(&self) -> Result<Vec<BatchRecord>, BatchStoreError>;

    fn get_batch(&self, id: u64) -> Result<Option<BatchRecord>, BatchStoreError>;

    /// Persist `score`, `is_anomaly` and the scoring time on batch `id`.
    fn record_anomaly(&self, id: u64, result: &AnomalyResult) -> Result<(), BatchStoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryBatchStore {
    batches: RwLock<BTreeMap<u64, BatchRecord>>,
}

impl InMemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_batches<I>(batches: I) -> Result<Self, BatchStoreError>
    where
        I: IntoIterator<Item = BatchRecord>,
    {
        Ok(Self {
            batches: RwLock::new(index_by_id(batches)?),
        })
    }

    pub fn insert(&self, batch: BatchRecord) -> Result<(), BatchStoreError> {
        let mut guard = self
            .batches
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.contains_key(&batch.id) {
            return Err(BatchStoreError::DuplicateId(batch.id));
        }
        guard.insert(batch.id, batch);
        Ok(())
    }
}

impl BatchStore for InMemoryBatchStore {
    fn list_batches(&self) -> Result<Vec<BatchRecord>, BatchStoreError> {
        let guard = self
            .batches
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.values().cloned().collect())
    }

    fn get_batch(&self, id: u64) -> Result<Option<BatchRecord>, BatchStoreError> {
        let guard = self
            .batches
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.get(&id).cloned())
    }

    fn record_anomaly(&self, id: u64, result: &AnomalyResult) -> Result<(), BatchStoreError> {
        let mut guard = self
            .batches
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let batch = guard.get_mut(&id).ok_or(BatchStoreError::NotFound(id))?;
        batch.apply_anomaly(result);
        Ok(())
    }
}

/// Batches kept in a JSON array on disk.
///
/// The whole file is loaded on open. Every update rewrites it through a
/// sibling temporary file so readers never see a partial write.
#[derive(Debug)]
pub struct JsonBatchStore {
    path: PathBuf,
    batches: RwLock<BTreeMap<u64, BatchRecord>>,
}

impl JsonBatchStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BatchStoreError> {
        let path = path.as_ref().to_path_buf();
        let raw = fs::read(&path).map_err(|source| BatchStoreError::Io {
            path: path.clone(),
            source,
        })?;
        let list: Vec<BatchRecord> =
            serde_json::from_slice(&raw).map_err(|source| BatchStoreError::Json {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), batches = list.len(), "batch_file_loaded");
        Ok(Self {
            batches: RwLock::new(index_by_id(list)?),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, batches: &BTreeMap<u64, BatchRecord>) -> Result<(), BatchStoreError> {
        let list: Vec<&BatchRecord> = batches.values().collect();
        let body = serde_json::to_vec_pretty(&list).map_err(|source| BatchStoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|source| BatchStoreError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

impl BatchStore for JsonBatchStore {
    fn list_batches(&self) -> Result<Vec<BatchRecord>, BatchStoreError> {
        let guard = self
            .batches
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.values().cloned().collect())
    }

    fn get_batch(&self, id: u64) -> Result<Option<BatchRecord>, BatchStoreError> {
        let guard = self
            .batches
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.get(&id).cloned())
    }

    fn record_anomaly(&self, id: u64, result: &AnomalyResult) -> Result<(), BatchStoreError> {
        let mut guard = self
            .batches
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = guard.get(&id).cloned().ok_or(BatchStoreError::NotFound(id))?;
        if let Some(batch) = guard.get_mut(&id) {
            batch.apply_anomaly(result);
        }
        if let Err(err) = self.persist(&guard) {
            // Keep memory and disk in agreement.
            guard.insert(id, previous);
            return Err(err);
        }
        Ok(())
    }
}

fn index_by_id<I>(batches: I) -> Result<BTreeMap<u64, BatchRecord>, BatchStoreError>
where
    I: IntoIterator<Item = BatchRecord>,
{
    let mut map = BTreeMap::new();
    for batch in batches {
        if map.contains_key(&batch.id) {
            return Err(BatchStoreError::DuplicateId(batch.id));
        }
        map.insert(batch.id, batch);
    }
    Ok(map)
}
