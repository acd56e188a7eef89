use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use features::{FeatureSchema, SchemaKind};
use once_cell::sync::OnceCell;
use tracing::warn;

use crate::artifact::{load_artifact, ModelArtifact};
use crate::{ModelError, OutlierModel, QualityClassifier};

/// Source of loaded models for the predictors.
///
/// [`ModelRegistry`] is the production implementation; tests substitute
/// in-memory fakes.
pub trait ModelProvider: Send + Sync {
    fn quality_classifier(&self) -> Result<Arc<dyn QualityClassifier>, ModelError>;
    fn outlier_model(&self) -> Result<Arc<dyn OutlierModel>, ModelError>;
    fn anomaly_schema(&self) -> &FeatureSchema;
}

/// Artifact locations for both schemas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub quality: PathBuf,
    pub anomaly: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            quality: PathBuf::from("./ml_models/quality_model.json"),
            anomaly: PathBuf::from("./ml_models/anomaly_model.json"),
        }
    }
}

/// Lazily loads and caches one artifact per schema.
///
/// The first `get` for a schema reads the artifact; every later call returns
/// the same `Arc`. Concurrent first calls block on a single load. A failed
/// load leaves the slot empty so the next call tries again. There is no hot
/// reload; [`ModelRegistry::reset`] clears the cache explicitly.
pub struct ModelRegistry {
    paths: ModelPaths,
    quality_schema: FeatureSchema,
    anomaly_schema: FeatureSchema,
    quality: OnceCell<ModelArtifact>,
    anomaly: OnceCell<ModelArtifact>,
    loads: AtomicUsize,
}

impl ModelRegistry {
    pub fn new(paths: ModelPaths) -> Self {
        Self::with_anomaly_schema(paths, FeatureSchema::anomaly())
    }

    /// Registry whose anomaly model uses a configured field pair.
    pub fn with_anomaly_schema(paths: ModelPaths, anomaly_schema: FeatureSchema) -> Self {
        Self {
            paths,
            quality_schema: FeatureSchema::quality(),
            anomaly_schema,
            quality: OnceCell::new(),
            anomaly: OnceCell::new(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn paths(&self) -> &ModelPaths {
        &self.paths
    }

    /// The cached artifact for `kind`, loading it on first use.
    pub fn get(&self, kind: SchemaKind) -> Result<ModelArtifact, ModelError> {
        let (cell, path, schema) = match kind {
            SchemaKind::Quality => (&self.quality, &self.paths.quality, &self.quality_schema),
            SchemaKind::Anomaly => (&self.anomaly, &self.paths.anomaly, &self.anomaly_schema),
        };
        cell.get_or_try_init(|| {
            self.loads.fetch_add(1, Ordering::SeqCst);
            load_artifact(path, schema).inspect_err(|err| {
                warn!(schema = %kind, path = %path.display(), error = %err, "model_load_failed");
            })
        })
        .cloned()
    }

    /// Number of artifact reads attempted so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn is_loaded(&self, kind: SchemaKind) -> bool {
        match kind {
            SchemaKind::Quality => self.quality.get().is_some(),
            SchemaKind::Anomaly => self.anomaly.get().is_some(),
        }
    }

    /// Drop cached artifacts; the next `get` reads them from disk again.
    pub fn reset(&mut self) {
        self.quality.take();
        self.anomaly.take();
    }
}

impl ModelProvider for ModelRegistry {
    fn quality_classifier(&self) -> Result<Arc<dyn QualityClassifier>, ModelError> {
        match self.get(SchemaKind::Quality)? {
            ModelArtifact::Quality { model, .. } => Ok(model),
            other => Err(ModelError::SchemaMismatch {
                schema: SchemaKind::Quality,
                reason: format!("registry holds a {} model", other.schema()),
            }),
        }
    }

    fn outlier_model(&self) -> Result<Arc<dyn OutlierModel>, ModelError> {
        match self.get(SchemaKind::Anomaly)? {
            ModelArtifact::Anomaly { model, .. } => Ok(model),
            other => Err(ModelError::SchemaMismatch {
                schema: SchemaKind::Anomaly,
                reason: format!("registry holds a {} model", other.schema()),
            }),
        }
    }

    fn anomaly_schema(&self) -> &FeatureSchema {
        &self.anomaly_schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_paths() -> ModelPaths {
        ModelPaths {
            quality: PathBuf::from("/nonexistent/quality.json"),
            anomaly: PathBuf::from("/nonexistent/anomaly.json"),
        }
    }

    #[test]
    fn failed_loads_are_not_cached() {
        let registry = ModelRegistry::new(missing_paths());
        assert!(matches!(
            registry.get(SchemaKind::Quality),
            Err(ModelError::ModelNotFound(_))
        ));
        assert!(registry.get(SchemaKind::Quality).is_err());
        assert_eq!(registry.load_count(), 2);
        assert!(!registry.is_loaded(SchemaKind::Quality));
    }

    #[test]
    fn provider_surfaces_missing_models() {
        let registry = ModelRegistry::new(missing_paths());
        assert!(registry.outlier_model().is_err());
        assert!(registry.quality_classifier().is_err());
        assert_eq!(registry.anomaly_schema().fields().len(), 2);
    }
}
