use std::io::Write;
use std::path::PathBuf;

use plantintel::{ConfigLoadError, PlantConfig, PlantIntelligence, QcReading, Record};
use serde_json::json;
use tempfile::NamedTempFile;

fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

fn fixture_config(extra: &str) -> String {
    format!(
        r#"
version: "1.0"
name: "integration"
models:
  quality_path: "{}"
  anomaly_path: "{}"
embedding:
  mode: "hash"
  dim: 64
index:
  backend: "in_memory"
  compression: "none"
  top_k: 2
{extra}
"#,
        fixture("quality_forest.json"),
        fixture("anomaly_iforest.json"),
    )
}

#[test]
fn facade_builds_from_a_config_file() {
    let file = write_config(&fixture_config(""));
    let config = PlantConfig::from_file(file.path()).unwrap();
    let intel = PlantIntelligence::from_config(&config).unwrap();

    let params: Record = json!({
        "pretreatment_temperature": 75,
        "hydrolysis_temperature": 105,
        "hydrolysis_time_min": 45,
        "ph": 6.3,
        "washing_cycles": 3,
        "drying_temperature": 80,
        "drying_time_min": 60,
    })
    .as_object()
    .cloned()
    .unwrap();
    let prediction = intel.predict_quality(&params).unwrap();
    assert!(prediction.passed);
    assert!((prediction.probability - 0.8).abs() < 1e-9);
}

#[test]
fn fixed_threshold_from_config_drives_scoring() {
    let file = write_config(&fixture_config("anomaly:\n  fixed_threshold: 0.9\n"));
    let config = PlantConfig::from_file(file.path()).unwrap();
    let intel = PlantIntelligence::from_config(&config).unwrap();

    assert_eq!(intel.threshold().map(|t| t.value), Some(0.9));
    let result = intel.score_qc(&[QcReading::new(15.0, 300.0)], None).unwrap();
    assert!(!result.is_anomaly);
}

#[test]
fn renamed_anomaly_fields_must_match_the_artifact() {
    let extra = "anomaly:\n  moisture_field: \"moisture_pct\"\n  particle_size_field: \"d50_um\"\n";
    let file = write_config(&fixture_config(extra));
    let config = PlantConfig::from_file(file.path()).unwrap();
    let intel = PlantIntelligence::from_config(&config).unwrap();

    let err = intel.score_qc(&[QcReading::new(5.0, 100.0)], None).unwrap_err();
    assert!(matches!(
        err,
        plantintel::PlantError::Model(plantintel::ModelError::SchemaMismatch { .. })
    ));
}

#[test]
fn invalid_files_are_rejected() {
    let file = write_config("version: \"1.0\"\nindex:\n  top_k: 0\n");
    assert!(matches!(
        PlantConfig::from_file(file.path()),
        Err(ConfigLoadError::Validation(_))
    ));

    let file = write_config("version: [");
    assert!(matches!(
        PlantConfig::from_file(file.path()),
        Err(ConfigLoadError::YamlParse(_))
    ));

    assert!(matches!(
        PlantConfig::from_file("/nonexistent/plant.yaml"),
        Err(ConfigLoadError::FileRead(_))
    ));
}

#[test]
fn env_overrides_are_revalidated() {
    let file = write_config(&fixture_config(""));
    let mut config = PlantConfig::from_file(file.path()).unwrap();
    config
        .apply_overrides(|key| (key == "PLANT_INDEX_PATH").then(|| "/tmp/kb.redb".to_string()))
        .unwrap();
    assert_eq!(config.index.path.as_deref(), Some("/tmp/kb.redb"));
    // The backend is still in-memory; the path only matters for redb.
    assert_eq!(config.index.backend, "in_memory");
}
