use std::sync::Arc;

use chrono::{DateTime, Utc};
use features::{extract_lenient, FeatureVector, Record};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AnomalyThreshold, ModelError, ModelProvider, QcAggregate, QcReading};

/// Which rule produced `is_anomaly`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum AnomalyDecision {
    /// The isolation forest's own outlier label.
    NativeLabel,
    /// `score >= value` against a stored percentile threshold.
    Threshold { value: f64 },
}

/// Anomaly score for one batch. Higher scores are more anomalous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub score: f64,
    pub is_anomaly: bool,
    pub decision: AnomalyDecision,
    pub model_version: String,
    pub computed_at: DateTime<Utc>,
}

/// Scores batches with the isolation forest.
///
/// The model's decision function is negated so that larger means more
/// anomalous. Two labeling paths exist: the native label of the model and a
/// comparison against an [`AnomalyThreshold`]. Callers pick one explicitly.
pub struct AnomalyDetector {
    models: Arc<dyn ModelProvider>,
}

impl AnomalyDetector {
    pub fn new(models: Arc<dyn ModelProvider>) -> Self {
        Self { models }
    }

    /// Inverted decision value for `features`.
    pub fn anomaly_score(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        let model = self.models.outlier_model()?;
        Ok(-model.decision_function(features)?)
    }

    /// Native path: `is_anomaly` is the model's outlier label.
    pub fn score(&self, features: &FeatureVector) -> Result<AnomalyResult, ModelError> {
        let model = self.models.outlier_model()?;
        let decision = model.decision_function(features)?;
        let is_anomaly = model.is_outlier(features)?;
        debug!(score = -decision, is_anomaly, "anomaly_scored");
        Ok(AnomalyResult {
            score: -decision,
            is_anomaly,
            decision: AnomalyDecision::NativeLabel,
            model_version: model.model_version().to_string(),
            computed_at: Utc::now(),
        })
    }

    /// Threshold path: `is_anomaly := score >= threshold`.
    pub fn score_against(
        &self,
        features: &FeatureVector,
        threshold: &AnomalyThreshold,
    ) -> Result<AnomalyResult, ModelError> {
        let model = self.models.outlier_model()?;
        let score = -model.decision_function(features)?;
        let is_anomaly = threshold.is_anomalous(score);
        debug!(score, is_anomaly, threshold = threshold.value, "anomaly_scored");
        Ok(AnomalyResult {
            score,
            is_anomaly,
            decision: AnomalyDecision::Threshold {
                value: threshold.value,
            },
            model_version: model.model_version().to_string(),
            computed_at: Utc::now(),
        })
    }

    /// Score ambient batch attributes; absent measurements default to zero.
    pub fn score_attributes(
        &self,
        attributes: &Record,
        threshold: Option<&AnomalyThreshold>,
    ) -> Result<AnomalyResult, ModelError> {
        let features = extract_lenient(self.models.anomaly_schema(), attributes);
        match threshold {
            Some(threshold) => self.score_against(&features, threshold),
            None => self.score(&features),
        }
    }

    /// Score a batch from its QC aggregates.
    ///
    /// Unlike [`score_attributes`](Self::score_attributes) nothing is
    /// defaulted: a missing mean is an [`ModelError::IncompleteAggregates`].
    pub fn score_aggregate(
        &self,
        aggregate: &QcAggregate,
        threshold: Option<&AnomalyThreshold>,
    ) -> Result<AnomalyResult, ModelError> {
        let features = aggregate.to_vector(self.models.anomaly_schema())?;
        match threshold {
            Some(threshold) => self.score_against(&features, threshold),
            None => self.score(&features),
        }
    }

    /// Aggregate raw QC readings and score them.
    pub fn score_qc_readings(
        &self,
        readings: &[QcReading],
        threshold: Option<&AnomalyThreshold>,
    ) -> Result<AnomalyResult, ModelError> {
        let aggregate = QcAggregate::from_readings(readings)?;
        self.score_aggregate(&aggregate, threshold)
    }
}
