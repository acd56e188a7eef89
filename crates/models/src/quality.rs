use std::sync::Arc;

use chrono::{DateTime, Utc};
use features::{extract_strict, FeatureSchema, FeatureVector, Record};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ModelError, ModelProvider};

/// Outcome of a quality prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityPrediction {
    /// The classifier's own pass/fail label.
    pub passed: bool,
    /// Probability of the pass class.
    pub probability: f64,
    pub model_version: String,
    pub computed_at: DateTime<Utc>,
}

/// Predicts QC pass/fail from the seven process parameters.
pub struct QualityPredictor {
    models: Arc<dyn ModelProvider>,
    schema: FeatureSchema,
}

impl QualityPredictor {
    pub fn new(models: Arc<dyn ModelProvider>) -> Self {
        Self {
            models,
            schema: FeatureSchema::quality(),
        }
    }

    /// Strictly extract the parameters and classify them.
    ///
    /// Any absent or `null` parameter fails with a missing-feature error; no
    /// defaults are substituted.
    pub fn predict(&self, parameters: &Record) -> Result<QualityPrediction, ModelError> {
        let features = extract_strict(&self.schema, parameters)?;
        self.predict_vector(&features)
    }

    pub fn predict_vector(&self, features: &FeatureVector) -> Result<QualityPrediction, ModelError> {
        let classifier = self.models.quality_classifier()?;
        let (passed, probability) = classifier.classify(features)?;
        debug!(passed, probability, "quality_predicted");
        Ok(QualityPrediction {
            passed,
            probability,
            model_version: classifier.model_version().to_string(),
            computed_at: Utc::now(),
        })
    }
}
