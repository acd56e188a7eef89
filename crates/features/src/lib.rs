//! # Plant Features
//!
//! Turns sparse batch records into fixed-order numeric vectors for the plant
//! models.
//!
//! Two extraction modes exist and they are intentionally asymmetric:
//!
//! - [`extract_strict`] is used for explicit quality-prediction inputs. Any
//!   absent or `null` field yields [`FeatureError::MissingFeature`]; nothing is
//!   ever defaulted.
//! - [`extract_lenient`] is used for ambient anomaly telemetry read off live
//!   batch attributes. Absent, `null` or non-numeric fields become `0.0` and
//!   are logged at `debug`.
//!
//! ## Example
//!
//! ```
//! use features::{extract_strict, FeatureSchema, Record};
//! use serde_json::json;
//!
//! let record: Record = json!({"moisture_actual": 4.2, "particle_size_actual": 118.0})
//!     .as_object()
//!     .cloned()
//!     .unwrap();
//! let v = extract_strict(&FeatureSchema::anomaly(), &record).unwrap();
//! assert_eq!(v.values(), &[4.2, 118.0]);
//! ```

mod error;
mod schema;
mod vector;

pub use error::FeatureError;
pub use schema::{FeatureSchema, SchemaKind, ANOMALY_FIELDS, QUALITY_FIELDS};
pub use vector::FeatureVector;

use serde_json::Value;
use tracing::debug;

/// Sparse mapping of named values as it arrives from callers or storage.
pub type Record = serde_json::Map<String, Value>;

/// How to treat absent fields during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractMode {
    /// Fail on the first absent or `null` field.
    #[default]
    Strict,
    /// Substitute `0.0` for absent, `null` or non-numeric fields.
    Lenient,
}

/// Extract a vector using the given mode.
pub fn extract(
    schema: &FeatureSchema,
    record: &Record,
    mode: ExtractMode,
) -> Result<FeatureVector, FeatureError> {
    match mode {
        ExtractMode::Strict => extract_strict(schema, record),
        ExtractMode::Lenient => Ok(extract_lenient(schema, record)),
    }
}

/// Strict extraction: every declared field must be present and numeric.
///
/// Fields are checked in schema order, so the reported field is the first
/// missing one.
pub fn extract_strict(schema: &FeatureSchema, record: &Record) -> Result<FeatureVector, FeatureError> {
    let mut values = Vec::with_capacity(schema.len());
    for field in schema.fields() {
        match record.get(field) {
            None | Some(Value::Null) => {
                return Err(FeatureError::MissingFeature {
                    schema: schema.name().to_string(),
                    field: field.clone(),
                })
            }
            Some(value) => values.push(numeric(value).ok_or_else(|| FeatureError::NonNumeric {
                schema: schema.name().to_string(),
                field: field.clone(),
                found: describe(value),
            })?),
        }
    }
    Ok(FeatureVector::new_unchecked(schema, values))
}

/// Lenient extraction: unusable fields default to `0.0`.
pub fn extract_lenient(schema: &FeatureSchema, record: &Record) -> FeatureVector {
    let values = schema
        .fields()
        .iter()
        .map(|field| match record.get(field).and_then(numeric) {
            Some(v) => v,
            None => {
                debug!(
                    schema = schema.name(),
                    field = field.as_str(),
                    "feature_defaulted_to_zero"
                );
                0.0
            }
        })
        .collect();
    FeatureVector::new_unchecked(schema, values)
}

/// Numbers pass through; numeric strings (as some form encoders send them)
/// are parsed. Booleans and everything else are rejected. Non-finite results
/// are treated as unusable.
fn numeric(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(_) => "boolean".into(),
        Value::Number(_) => "number".into(),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(_) => "array".into(),
        Value::Object(_) => "object".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().expect("object literal")
    }

    fn full_quality_record() -> Record {
        record(json!({
            "pretreatment_temperature": 75,
            "hydrolysis_temperature": 105,
            "hydrolysis_time_min": 45,
            "ph": 6.3,
            "washing_cycles": 3,
            "drying_temperature": 80,
            "drying_time_min": 60,
        }))
    }

    #[test]
    fn strict_preserves_schema_order() {
        let v = extract_strict(&FeatureSchema::quality(), &full_quality_record()).unwrap();
        assert_eq!(v.values(), &[75.0, 105.0, 45.0, 6.3, 3.0, 80.0, 60.0]);
    }

    #[test]
    fn strict_reports_first_missing_field() {
        let mut rec = full_quality_record();
        rec.remove("ph");
        rec.remove("drying_time_min");
        let err = extract_strict(&FeatureSchema::quality(), &rec).unwrap_err();
        assert_eq!(
            err,
            FeatureError::MissingFeature {
                schema: "quality".into(),
                field: "ph".into(),
            }
        );
    }

    #[test]
    fn strict_treats_null_as_missing() {
        let mut rec = full_quality_record();
        rec.insert("washing_cycles".into(), Value::Null);
        let err = extract_strict(&FeatureSchema::quality(), &rec).unwrap_err();
        assert_eq!(err.field(), Some("washing_cycles"));
    }

    #[test]
    fn strict_rejects_non_numeric() {
        let mut rec = full_quality_record();
        rec.insert("ph".into(), json!("acidic"));
        let err = extract_strict(&FeatureSchema::quality(), &rec).unwrap_err();
        assert!(matches!(err, FeatureError::NonNumeric { .. }));
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let rec = record(json!({"moisture_actual": "4.5", "particle_size_actual": 110}));
        let v = extract_strict(&FeatureSchema::anomaly(), &rec).unwrap();
        assert_eq!(v.values(), &[4.5, 110.0]);
    }

    #[test]
    fn lenient_defaults_to_zero() {
        let rec = record(json!({"moisture_actual": null, "particle_size_actual": "n/a"}));
        let v = extract_lenient(&FeatureSchema::anomaly(), &rec);
        assert_eq!(v.values(), &[0.0, 0.0]);

        let rec = record(json!({"particle_size_actual": 98.5}));
        let v = extract(&FeatureSchema::anomaly(), &rec, ExtractMode::Lenient).unwrap();
        assert_eq!(v.values(), &[0.0, 98.5]);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let mut rec = full_quality_record();
        rec.insert("operator".into(), json!("night shift"));
        assert!(extract(&FeatureSchema::quality(), &rec, ExtractMode::Strict).is_ok());
    }
}
