use std::path::PathBuf;

use features::{FeatureError, SchemaKind};
use thiserror::Error;

/// Errors raised by the registry, predictors and threshold computation.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Artifact file is not present at its configured path.
    #[error("model artifact not found: {}", .0.display())]
    ModelNotFound(PathBuf),
    /// Reading the artifact failed for a reason other than absence.
    #[error("failed to read model artifact {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Artifact is not valid JSON or does not follow the artifact format.
    #[error("failed to parse model artifact {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    /// Artifact parsed but is structurally unusable.
    #[error("corrupt model artifact: {0}")]
    Corrupt(String),
    /// Artifact was trained for a different schema or feature order.
    #[error("model artifact for `{schema}` does not match its schema: {reason}")]
    SchemaMismatch { schema: SchemaKind, reason: String },
    /// Input could not be turned into a feature vector.
    #[error(transparent)]
    Feature(#[from] FeatureError),
    /// QC aggregates contain a `null` measurement.
    #[error("incomplete QC aggregates: `{field}` has no measurements")]
    IncompleteAggregates { field: String },
    /// A batch has no QC reports to aggregate.
    #[error("no QC reports available for aggregation")]
    NoQcData,
    /// Threshold computation found no scored batches.
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    /// Percentile outside `[0, 100]`.
    #[error("percentile must be within 0..=100, got {0}")]
    InvalidPercentile(f64),
}

impl ModelError {
    /// True for errors caused by the caller's input rather than the models.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ModelError::Feature(_)
                | ModelError::IncompleteAggregates { .. }
                | ModelError::NoQcData
                | ModelError::InvalidPercentile(_)
        )
    }

    /// The missing feature's name when this is a strict-extraction failure.
    pub fn missing_feature(&self) -> Option<&str> {
        match self {
            ModelError::Feature(err @ FeatureError::MissingFeature { .. }) => err.field(),
            _ => None,
        }
    }
}
