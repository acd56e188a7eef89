//! # Plant Models
//!
//! Loads the trained quality and anomaly estimators and exposes the two
//! scoring operations built on them.
//!
//! - [`ModelRegistry`] reads JSON artifacts on first use and caches them for
//!   its lifetime, one load per schema even under concurrent first access.
//! - [`QualityPredictor`] runs strict feature extraction and a random forest
//!   classifier to predict QC pass/fail.
//! - [`AnomalyDetector`] scores QC measurements with an isolation forest.
//!   Scores are the negated decision function, so higher means more anomalous.
//! - [`AnomalyThreshold`] derives a percentile cut-off from historical scores.
//!
//! ## Artifact format
//!
//! Artifacts are the output contract of the offline training scripts:
//!
//! ```json
//! {
//!   "kind": "random_forest_classifier",
//!   "format_version": 1,
//!   "schema": "quality",
//!   "feature_names": ["pretreatment_temperature", "..."],
//!   "model_version": "quality-rf-2024-11",
//!   "classes": [0, 1],
//!   "positive_class": 1,
//!   "trees": [{"nodes": [
//!     {"type": "split", "feature": 3, "threshold": 6.8, "left": 1, "right": 2},
//!     {"type": "leaf", "value": [2.0, 8.0]},
//!     {"type": "leaf", "value": [7.0, 3.0]}
//!   ]}]
//! }
//! ```
//!
//! Isolation forests use `"kind": "isolation_forest"`, carry `max_samples`
//! and `offset`, and their leaves hold `n_samples` instead of `value`.

mod anomaly;
mod artifact;
mod error;
mod estimator;
mod forest;
mod isolation;
mod qc;
mod quality;
mod registry;
mod threshold;
mod tree;

pub use anomaly::{AnomalyDecision, AnomalyDetector, AnomalyResult};
pub use artifact::{
    load_artifact, ArtifactFile, ArtifactIdentity, ModelArtifact, ARTIFACT_FORMAT_VERSION,
};
pub use error::ModelError;
pub use estimator::{OutlierModel, QualityClassifier};
pub use forest::{ClassifierNode, ClassifierTree, RandomForestClassifier};
pub use isolation::{average_path_length, IsolationForest, IsolationNode, IsolationTree};
pub use qc::{QcAggregate, QcReading};
pub use quality::{QualityPrediction, QualityPredictor};
pub use registry::{ModelPaths, ModelProvider, ModelRegistry};
pub use threshold::{percentile_linear, AnomalyThreshold, ThresholdSource, DEFAULT_PERCENTILE};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use features::{FeatureSchema, FeatureVector, Record};
    use serde_json::json;

    use crate::{ModelError, ModelProvider, OutlierModel, QualityClassifier};

    /// Provider returning canned outputs regardless of input.
    pub struct FakeModels {
        quality: Arc<FixedClassifier>,
        outlier: Arc<FixedOutlier>,
        schema: FeatureSchema,
        quality_calls: AtomicUsize,
    }

    impl FakeModels {
        pub fn new(probability: f64, passed: bool, decision: f64) -> Self {
            Self {
                quality: Arc::new(FixedClassifier {
                    names: FeatureSchema::quality().fields().to_vec(),
                    probability,
                    passed,
                    evaluations: AtomicUsize::new(0),
                }),
                outlier: Arc::new(FixedOutlier {
                    names: FeatureSchema::anomaly().fields().to_vec(),
                    decision,
                }),
                schema: FeatureSchema::anomaly(),
                quality_calls: AtomicUsize::new(0),
            }
        }

        pub fn quality_calls(&self) -> usize {
            self.quality_calls.load(Ordering::SeqCst)
        }

        pub fn quality_evaluations(&self) -> usize {
            self.quality.evaluations.load(Ordering::SeqCst)
        }
    }

    impl ModelProvider for FakeModels {
        fn quality_classifier(&self) -> Result<Arc<dyn QualityClassifier>, ModelError> {
            self.quality_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.quality.clone())
        }

        fn outlier_model(&self) -> Result<Arc<dyn OutlierModel>, ModelError> {
            Ok(self.outlier.clone())
        }

        fn anomaly_schema(&self) -> &FeatureSchema {
            &self.schema
        }
    }

    struct FixedClassifier {
        names: Vec<String>,
        probability: f64,
        passed: bool,
        evaluations: AtomicUsize,
    }

    impl QualityClassifier for FixedClassifier {
        fn feature_names(&self) -> &[String] {
            &self.names
        }

        fn pass_probability(&self, _x: &FeatureVector) -> Result<f64, ModelError> {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            Ok(self.probability)
        }

        fn predict_pass(&self, _x: &FeatureVector) -> Result<bool, ModelError> {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            Ok(self.passed)
        }

        fn classify(&self, _x: &FeatureVector) -> Result<(bool, f64), ModelError> {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            Ok((self.passed, self.probability))
        }

        fn model_version(&self) -> &str {
            "fixed"
        }
    }

    struct FixedOutlier {
        names: Vec<String>,
        decision: f64,
    }

    impl OutlierModel for FixedOutlier {
        fn feature_names(&self) -> &[String] {
            &self.names
        }

        fn decision_function(&self, _x: &FeatureVector) -> Result<f64, ModelError> {
            Ok(self.decision)
        }

        fn model_version(&self) -> &str {
            "fixed"
        }
    }

    pub fn quality_record() -> Record {
        json!({
            "pretreatment_temperature": 75,
            "hydrolysis_temperature": 105,
            "hydrolysis_time_min": 45,
            "ph": 6.3,
            "washing_cycles": 3,
            "drying_temperature": 80,
            "drying_time_min": 60,
        })
        .as_object()
        .cloned()
        .expect("object literal")
    }
}
