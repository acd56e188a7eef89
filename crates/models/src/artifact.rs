use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use features::{FeatureSchema, SchemaKind};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{IsolationForest, ModelError, RandomForestClassifier};

/// Bump when the JSON artifact layout changes.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// On-disk artifact, tagged by estimator kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactFile {
    RandomForestClassifier(RandomForestClassifier),
    IsolationForest(IsolationForest),
}

/// Where an artifact came from and what it was trained for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactIdentity {
    pub path: PathBuf,
    pub schema: SchemaKind,
    pub model_version: String,
}

/// A loaded, validated model shared by the registry.
#[derive(Debug, Clone)]
pub enum ModelArtifact {
    Quality {
        identity: ArtifactIdentity,
        model: Arc<RandomForestClassifier>,
    },
    Anomaly {
        identity: ArtifactIdentity,
        model: Arc<IsolationForest>,
    },
}

impl ModelArtifact {
    pub fn identity(&self) -> &ArtifactIdentity {
        match self {
            ModelArtifact::Quality { identity, .. } | ModelArtifact::Anomaly { identity, .. } => {
                identity
            }
        }
    }

    pub fn schema(&self) -> SchemaKind {
        self.identity().schema
    }
}

/// Read, parse and validate an artifact against the schema it must serve.
pub fn load_artifact(path: &Path, schema: &FeatureSchema) -> Result<ModelArtifact, ModelError> {
    let raw = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ModelError::ModelNotFound(path.to_path_buf()),
        _ => ModelError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let file: ArtifactFile = serde_json::from_str(&raw).map_err(|e| ModelError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let artifact = match file {
        ArtifactFile::RandomForestClassifier(mut model) => {
            check_header(schema, SchemaKind::Quality, model.format_version, model.schema, &model.feature_names)?;
            model.validate()?;
            ModelArtifact::Quality {
                identity: ArtifactIdentity {
                    path: path.to_path_buf(),
                    schema: model.schema,
                    model_version: model.model_version.clone(),
                },
                model: Arc::new(model),
            }
        }
        ArtifactFile::IsolationForest(model) => {
            check_header(schema, SchemaKind::Anomaly, model.format_version, model.schema, &model.feature_names)?;
            model.validate()?;
            ModelArtifact::Anomaly {
                identity: ArtifactIdentity {
                    path: path.to_path_buf(),
                    schema: model.schema,
                    model_version: model.model_version.clone(),
                },
                model: Arc::new(model),
            }
        }
    };
    info!(
        schema = %artifact.schema(),
        path = %path.display(),
        model_version = artifact.identity().model_version.as_str(),
        "model_loaded"
    );
    Ok(artifact)
}

fn check_header(
    schema: &FeatureSchema,
    estimator_kind: SchemaKind,
    format_version: u32,
    declared: SchemaKind,
    feature_names: &[String],
) -> Result<(), ModelError> {
    if format_version != ARTIFACT_FORMAT_VERSION {
        return Err(ModelError::Corrupt(format!(
            "unsupported artifact format_version {format_version}"
        )));
    }
    if estimator_kind != schema.kind() || declared != schema.kind() {
        return Err(ModelError::SchemaMismatch {
            schema: schema.kind(),
            reason: format!("artifact declares a {declared} {estimator_kind} model"),
        });
    }
    if !schema.matches_order(feature_names) {
        return Err(ModelError::SchemaMismatch {
            schema: schema.kind(),
            reason: format!(
                "artifact features {:?} differ from schema {:?}",
                feature_names,
                schema.fields()
            ),
        });
    }
    Ok(())
}
