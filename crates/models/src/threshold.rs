use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Default percentile used when recomputing the anomaly cut-off.
pub const DEFAULT_PERCENTILE: f64 = 97.0;

/// How a threshold value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdSource {
    Fixed,
    Percentile { percentile: f64, sample_count: usize },
}

/// Score cut-off: a batch is anomalous when its score is at or above `value`.
///
/// Computed on demand and stored by the caller; it is never refreshed
/// implicitly when new scores arrive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyThreshold {
    pub value: f64,
    pub source: ThresholdSource,
    pub computed_at: DateTime<Utc>,
}

impl AnomalyThreshold {
    pub fn fixed(value: f64) -> Self {
        Self {
            value,
            source: ThresholdSource::Fixed,
            computed_at: Utc::now(),
        }
    }

    /// The `percentile`-th percentile of the known scores.
    ///
    /// Missing and non-finite scores are dropped first. Fails with
    /// [`ModelError::InsufficientData`] when nothing is left.
    pub fn from_scores<I>(scores: I, percentile: f64) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        if !(0.0..=100.0).contains(&percentile) {
            return Err(ModelError::InvalidPercentile(percentile));
        }
        let mut known: Vec<f64> = scores
            .into_iter()
            .flatten()
            .filter(|s| s.is_finite())
            .collect();
        if known.is_empty() {
            return Err(ModelError::InsufficientData(
                "no batches have an anomaly score".into(),
            ));
        }
        known.sort_by(f64::total_cmp);
        Ok(Self {
            value: percentile_linear(&known, percentile),
            source: ThresholdSource::Percentile {
                percentile,
                sample_count: known.len(),
            },
            computed_at: Utc::now(),
        })
    }

    pub fn is_anomalous(&self, score: f64) -> bool {
        score >= self.value
    }
}

/// Percentile of an ascending, non-empty slice with linear interpolation
/// between the two closest ranks (`rank = p/100 * (n - 1)`).
pub fn percentile_linear(sorted: &[f64], percentile: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (percentile / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = (lower + 1).min(n - 1);
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}
