use thiserror::Error;

/// Errors raised while turning a record into a feature vector.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeatureError {
    /// A declared field is absent or `null` in strict mode.
    #[error("missing feature `{field}` for schema `{schema}`")]
    MissingFeature { schema: String, field: String },
    /// A declared field holds something that is not a number.
    #[error("feature `{field}` for schema `{schema}` is not numeric (found {found})")]
    NonNumeric {
        schema: String,
        field: String,
        found: String,
    },
    /// Schema definition is unusable (empty, duplicated or wrong arity).
    #[error("invalid feature schema: {0}")]
    InvalidSchema(String),
    /// A raw vector does not match the schema width.
    #[error("feature vector for `{schema}` has {actual} values, expected {expected}")]
    DimensionMismatch {
        schema: String,
        expected: usize,
        actual: usize,
    },
}

impl FeatureError {
    /// Name of the offending field, when the error concerns a single field.
    pub fn field(&self) -> Option<&str> {
        match self {
            FeatureError::MissingFeature { field, .. } | FeatureError::NonNumeric { field, .. } => {
                Some(field)
            }
            _ => None,
        }
    }
}
