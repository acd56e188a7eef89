use features::{FeatureSchema, FeatureVector};
use serde::{Deserialize, Serialize};

use crate::ModelError;

/// One QC report's measurements. Either may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QcReading {
    pub moisture_actual: Option<f64>,
    pub particle_size_actual: Option<f64>,
}

impl QcReading {
    pub fn new(moisture_actual: f64, particle_size_actual: f64) -> Self {
        Self {
            moisture_actual: Some(moisture_actual),
            particle_size_actual: Some(particle_size_actual),
        }
    }
}

/// Per-batch mean of QC measurements. A mean is `None` when no report
/// carried that measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QcAggregate {
    pub moisture_mean: Option<f64>,
    pub particle_size_mean: Option<f64>,
    pub report_count: usize,
}

impl QcAggregate {
    /// Average every reading, ignoring missing measurements.
    pub fn from_readings(readings: &[QcReading]) -> Result<Self, ModelError> {
        if readings.is_empty() {
            return Err(ModelError::NoQcData);
        }
        Ok(Self {
            moisture_mean: mean(readings.iter().filter_map(|r| r.moisture_actual)),
            particle_size_mean: mean(readings.iter().filter_map(|r| r.particle_size_actual)),
            report_count: readings.len(),
        })
    }

    /// Strict conversion: both means must be present.
    ///
    /// The first schema field receives the moisture mean and the second the
    /// particle size mean.
    pub fn to_vector(&self, schema: &FeatureSchema) -> Result<FeatureVector, ModelError> {
        let fields = schema.fields();
        let moisture = self.moisture_mean.ok_or_else(|| ModelError::IncompleteAggregates {
            field: fields.first().cloned().unwrap_or_default(),
        })?;
        let particle = self.particle_size_mean.ok_or_else(|| ModelError::IncompleteAggregates {
            field: fields.get(1).cloned().unwrap_or_default(),
        })?;
        Ok(FeatureVector::from_values(schema, vec![moisture, particle])?)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .filter(|v| v.is_finite())
        .fold((0.0f64, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
