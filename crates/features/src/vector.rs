use serde::{Deserialize, Serialize};

use crate::{FeatureError, FeatureSchema, SchemaKind};

/// Fixed-order numeric vector produced from a record and a schema.
///
/// Only constructible through extraction or [`FeatureVector::from_values`],
/// so every value lines up with a declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    kind: SchemaKind,
    fields: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub(crate) fn new_unchecked(schema: &FeatureSchema, values: Vec<f64>) -> Self {
        Self {
            kind: schema.kind(),
            fields: schema.fields().to_vec(),
            values,
        }
    }

    /// Wrap raw values that are already in schema order.
    pub fn from_values(schema: &FeatureSchema, values: Vec<f64>) -> Result<Self, FeatureError> {
        if values.len() != schema.len() {
            return Err(FeatureError::DimensionMismatch {
                schema: schema.name().to_string(),
                expected: schema.len(),
                actual: values.len(),
            });
        }
        Ok(Self::new_unchecked(schema, values))
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a named field, if the schema declares it.
    pub fn get(&self, field: &str) -> Option<f64> {
        self.fields
            .iter()
            .position(|f| f == field)
            .map(|idx| self.values[idx])
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_values_checks_width() {
        let schema = FeatureSchema::anomaly();
        let err = FeatureVector::from_values(&schema, vec![1.0]).unwrap_err();
        assert_eq!(
            err,
            FeatureError::DimensionMismatch {
                schema: "anomaly".into(),
                expected: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn get_looks_up_by_name() {
        let schema = FeatureSchema::anomaly();
        let v = FeatureVector::from_values(&schema, vec![4.5, 120.0]).unwrap();
        assert_eq!(v.get("particle_size_actual"), Some(120.0));
        assert_eq!(v.get("ph"), None);
        assert_eq!(v.kind(), SchemaKind::Anomaly);
    }
}
