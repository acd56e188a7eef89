use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::FeatureError;

/// Quality model inputs, in the order the classifier was trained on.
pub const QUALITY_FIELDS: [&str; 7] = [
    "pretreatment_temperature",
    "hydrolysis_temperature",
    "hydrolysis_time_min",
    "ph",
    "washing_cycles",
    "drying_temperature",
    "drying_time_min",
];

/// Default anomaly model inputs (QC measurements).
pub const ANOMALY_FIELDS: [&str; 2] = ["moisture_actual", "particle_size_actual"];

/// Which estimator a schema feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    Quality,
    Anomaly,
}

impl SchemaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::Quality => "quality",
            SchemaKind::Anomaly => "anomaly",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered list of named numeric inputs a model expects.
///
/// The order is part of the model contract: artifacts record the feature
/// names they were trained with and the registry refuses to pair a model with
/// a schema whose order differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    kind: SchemaKind,
    fields: Vec<String>,
}

impl FeatureSchema {
    /// The seven process parameters used by the quality classifier.
    pub fn quality() -> Self {
        Self {
            kind: SchemaKind::Quality,
            fields: QUALITY_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// The default QC measurement pair used by the anomaly model.
    pub fn anomaly() -> Self {
        Self {
            kind: SchemaKind::Anomaly,
            fields: ANOMALY_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// An anomaly schema over a configured pair of measurements.
    pub fn anomaly_with_fields<S: Into<String>>(first: S, second: S) -> Result<Self, FeatureError> {
        Self::custom(SchemaKind::Anomaly, vec![first.into(), second.into()])
    }

    /// Build a schema from an explicit field list.
    ///
    /// Field names must be non-empty and unique. Anomaly schemas carry exactly
    /// two fields; quality schemas must use the fixed quality field order.
    pub fn custom(kind: SchemaKind, fields: Vec<String>) -> Result<Self, FeatureError> {
        if fields.is_empty() {
            return Err(FeatureError::InvalidSchema(format!(
                "{kind} schema has no fields"
            )));
        }
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if field.trim().is_empty() {
                return Err(FeatureError::InvalidSchema(format!(
                    "{kind} schema contains an empty field name"
                )));
            }
            if !seen.insert(field.as_str()) {
                return Err(FeatureError::InvalidSchema(format!(
                    "{kind} schema lists `{field}` more than once"
                )));
            }
        }
        match kind {
            SchemaKind::Anomaly if fields.len() != 2 => Err(FeatureError::InvalidSchema(format!(
                "anomaly schema needs exactly 2 fields, got {}",
                fields.len()
            ))),
            SchemaKind::Quality if fields.iter().map(String::as_str).ne(QUALITY_FIELDS) => {
                Err(FeatureError::InvalidSchema(
                    "quality schema must use the fixed quality field order".into(),
                ))
            }
            _ => Ok(Self { kind, fields }),
        }
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when `names` lists exactly this schema's fields in the same order.
    pub fn matches_order<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.len() == self.fields.len()
            && names
                .iter()
                .zip(&self.fields)
                .all(|(a, b)| a.as_ref() == b.as_str())
    }
}
