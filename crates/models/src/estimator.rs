use features::{FeatureError, FeatureVector};

use crate::ModelError;

/// A binary pass/fail classifier over the quality schema.
pub trait QualityClassifier: Send + Sync {
    /// Feature names in training order.
    fn feature_names(&self) -> &[String];

    /// Probability of the positive ("pass") class, in `[0, 1]`.
    fn pass_probability(&self, x: &FeatureVector) -> Result<f64, ModelError>;

    /// The classifier's own label for `x`.
    fn predict_pass(&self, x: &FeatureVector) -> Result<bool, ModelError>;

    /// Label and pass probability together, as `(passed, probability)`.
    ///
    /// Implementations that derive both from one evaluation should override
    /// this.
    fn classify(&self, x: &FeatureVector) -> Result<(bool, f64), ModelError> {
        Ok((self.predict_pass(x)?, self.pass_probability(x)?))
    }

    fn model_version(&self) -> &str;
}

/// An unsupervised outlier model over the anomaly schema.
pub trait OutlierModel: Send + Sync {
    fn feature_names(&self) -> &[String];

    /// Signed decision value: negative for outliers, positive for inliers.
    fn decision_function(&self, x: &FeatureVector) -> Result<f64, ModelError>;

    /// The model's native outlier label.
    fn is_outlier(&self, x: &FeatureVector) -> Result<bool, ModelError> {
        Ok(self.decision_function(x)? < 0.0)
    }

    fn model_version(&self) -> &str;
}

/// Reject vectors whose fields differ from what the model was trained on.
pub(crate) fn check_input<'a>(
    feature_names: &[String],
    x: &'a FeatureVector,
) -> Result<&'a [f64], ModelError> {
    if x.len() != feature_names.len() {
        return Err(FeatureError::DimensionMismatch {
            schema: x.kind().to_string(),
            expected: feature_names.len(),
            actual: x.len(),
        }
        .into());
    }
    if x.fields() != feature_names {
        return Err(FeatureError::InvalidSchema(format!(
            "vector fields {:?} do not match model features {:?}",
            x.fields(),
            feature_names
        ))
        .into());
    }
    Ok(x.values())
}
