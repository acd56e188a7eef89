//! YAML configuration for the plant intelligence layer.
//!
//! One file configures every component. Each section is optional and falls
//! back to its defaults; environment variables override selected fields after
//! the file is parsed (see [`PlantConfig::apply_env`]).
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "mill-3"
//!
//! models:
//!   quality_path: "./ml_models/quality_model.json"
//!   anomaly_path: "./ml_models/anomaly_model.json"
//!
//! anomaly:
//!   percentile: 97.0
//!   fixed_threshold: null
//!   moisture_field: "moisture_actual"
//!   particle_size_field: "particle_size_actual"
//!
//! embedding:
//!   mode: "hash"
//!   dim: 768
//!
//! index:
//!   backend: "redb"
//!   path: "./data/plant_index.redb"
//!   compression: "zstd"
//!   chunk_max_chars: 800
//!   top_k: 5
//!
//! generation:
//!   api_url: "https://api.groq.com/openai/v1/chat/completions"
//!   model: "llama-3.1-8b-instant"
//!   temperature: 0.1
//!   api_key_env: "GROQ_API_KEY"
//!   timeout_secs: 30
//!   max_retries: 0
//!
//! logging:
//!   level: "info"
//!   json: false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use features::FeatureSchema;
use index::{BackendConfig, CompressionCodec, CompressionConfig, IndexConfig};
use models::{AnomalyThreshold, ModelPaths, DEFAULT_PERCENTILE};
use rag::GenerationConfig;
use semantic::EmbeddingConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variables read by [`PlantConfig::apply_env`].
pub const ENV_QUALITY_MODEL_PATH: &str = "PLANT_QUALITY_MODEL_PATH";
pub const ENV_ANOMALY_MODEL_PATH: &str = "PLANT_ANOMALY_MODEL_PATH";
pub const ENV_INDEX_PATH: &str = "PLANT_INDEX_PATH";
pub const ENV_EMBEDDING_MODE: &str = "PLANT_EMBEDDING_MODE";
pub const ENV_GENERATION_MODEL: &str = "PLANT_GENERATION_MODEL";
pub const ENV_LOG_LEVEL: &str = "PLANT_LOG_LEVEL";

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlantConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub models: ModelsYamlConfig,

    #[serde(default)]
    pub anomaly: AnomalyYamlConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub index: IndexYamlConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub logging: LoggingYamlConfig,
}

impl PlantConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: PlantConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `PLANT_*` environment variables, then re-validate.
    pub fn apply_env(&mut self) -> Result<(), ConfigLoadError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Like [`apply_env`](Self::apply_env) with an explicit variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = lookup(ENV_QUALITY_MODEL_PATH) {
            self.models.quality_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_ANOMALY_MODEL_PATH) {
            self.models.anomaly_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_INDEX_PATH) {
            self.index.path = Some(path);
        }
        if let Some(mode) = lookup(ENV_EMBEDDING_MODE) {
            self.embedding.mode = mode;
        }
        if let Some(model) = lookup(ENV_GENERATION_MODEL) {
            self.generation.model = model;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        self.validate()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.models.validate()?;
        self.anomaly.validate()?;
        self.embedding
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("embedding: {e}")))?;
        self.index.validate()?;
        self.generation.validate().map_err(ConfigLoadError::Validation)?;
        self.logging.validate()?;
        Ok(())
    }
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            models: ModelsYamlConfig::default(),
            anomaly: AnomalyYamlConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexYamlConfig::default(),
            generation: GenerationConfig::default(),
            logging: LoggingYamlConfig::default(),
        }
    }
}

/// Model artifact locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelsYamlConfig {
    #[serde(default = "default_quality_path")]
    pub quality_path: PathBuf,

    #[serde(default = "default_anomaly_path")]
    pub anomaly_path: PathBuf,
}

impl ModelsYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.quality_path.as_os_str().is_empty() || self.anomaly_path.as_os_str().is_empty() {
            return Err(ConfigLoadError::Validation(
                "models.quality_path and models.anomaly_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn paths(&self) -> ModelPaths {
        ModelPaths {
            quality: self.quality_path.clone(),
            anomaly: self.anomaly_path.clone(),
        }
    }
}

impl Default for ModelsYamlConfig {
    fn default() -> Self {
        let paths = ModelPaths::default();
        Self {
            quality_path: paths.quality,
            anomaly_path: paths.anomaly,
        }
    }
}

/// Anomaly scoring settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnomalyYamlConfig {
    /// Percentile used when recomputing the threshold.
    #[serde(default = "default_percentile")]
    pub percentile: f64,

    /// When set, scoring compares against this value instead of the
    /// model's native outlier label.
    #[serde(default)]
    pub fixed_threshold: Option<f64>,

    #[serde(default = "default_moisture_field")]
    pub moisture_field: String,

    #[serde(default = "default_particle_size_field")]
    pub particle_size_field: String,
}

impl AnomalyYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if !(0.0..=100.0).contains(&self.percentile) {
            return Err(ConfigLoadError::Validation(format!(
                "anomaly.percentile must be within [0, 100], got {}",
                self.percentile
            )));
        }
        if let Some(value) = self.fixed_threshold {
            if !value.is_finite() {
                return Err(ConfigLoadError::Validation(
                    "anomaly.fixed_threshold must be finite".to_string(),
                ));
            }
        }
        self.schema()
            .map(|_| ())
            .map_err(|e| ConfigLoadError::Validation(format!("anomaly: {e}")))
    }

    /// Anomaly feature schema over the configured field pair.
    pub fn schema(&self) -> Result<FeatureSchema, features::FeatureError> {
        FeatureSchema::anomaly_with_fields(&self.moisture_field, &self.particle_size_field)
    }

    pub fn threshold(&self) -> Option<AnomalyThreshold> {
        self.fixed_threshold.map(AnomalyThreshold::fixed)
    }
}

impl Default for AnomalyYamlConfig {
    fn default() -> Self {
        Self {
            percentile: DEFAULT_PERCENTILE,
            fixed_threshold: None,
            moisture_field: default_moisture_field(),
            particle_size_field: default_particle_size_field(),
        }
    }
}

/// Document index YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexYamlConfig {
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default = "default_index_path")]
    pub path: Option<String>,

    #[serde(default = "default_compression")]
    pub compression: String,

    #[serde(default = "default_compression_level")]
    pub compression_level: i32,

    #[serde(default = "default_chunk_max_chars")]
    pub chunk_max_chars: usize,

    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl IndexYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        let valid_backends = ["in_memory", "redb"];
        if !valid_backends.contains(&self.backend.as_str()) {
            return Err(ConfigLoadError::Validation(format!(
                "index.backend must be one of: {valid_backends:?}"
            )));
        }

        if self.backend == "redb" && self.path.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigLoadError::Validation(
                "index.path is required when backend is 'redb'".to_string(),
            ));
        }

        let valid_compression = ["zstd", "none"];
        if !valid_compression.contains(&self.compression.as_str()) {
            return Err(ConfigLoadError::Validation(format!(
                "index.compression must be one of: {valid_compression:?}"
            )));
        }

        if self.chunk_max_chars == 0 {
            return Err(ConfigLoadError::Validation(
                "index.chunk_max_chars must be >= 1".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(ConfigLoadError::Validation(
                "index.top_k must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Storage settings for [`index::ChunkIndex`].
    pub fn index_config(&self) -> IndexConfig {
        let backend = match (self.backend.as_str(), &self.path) {
            ("redb", Some(path)) => BackendConfig::redb(path.clone()),
            _ => BackendConfig::in_memory(),
        };
        let codec = if self.compression == "none" {
            CompressionCodec::None
        } else {
            CompressionCodec::Zstd
        };
        IndexConfig::new()
            .with_backend(backend)
            .with_compression(CompressionConfig::new(codec, self.compression_level))
    }
}

impl Default for IndexYamlConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_index_path(),
            compression: default_compression(),
            compression_level: default_compression_level(),
            chunk_max_chars: default_chunk_max_chars(),
            top_k: default_top_k(),
        }
    }
}

/// Log output settings. `RUST_LOG` wins over `level` when set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingYamlConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl LoggingYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigLoadError::Validation(format!(
                "logging.level must be one of: {valid_levels:?}"
            )));
        }
        Ok(())
    }
}

impl Default for LoggingYamlConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Helper functions for serde defaults
fn default_quality_path() -> PathBuf {
    ModelPaths::default().quality
}
fn default_anomaly_path() -> PathBuf {
    ModelPaths::default().anomaly
}
fn default_percentile() -> f64 {
    DEFAULT_PERCENTILE
}
fn default_moisture_field() -> String {
    "moisture_actual".to_string()
}
fn default_particle_size_field() -> String {
    "particle_size_actual".to_string()
}
fn default_backend() -> String {
    "redb".to_string()
}
fn default_index_path() -> Option<String> {
    Some("./data/plant_index.redb".to_string())
}
fn default_compression() -> String {
    "zstd".to_string()
}
fn default_compression_level() -> i32 {
    3
}
fn default_chunk_max_chars() -> usize {
    index::DEFAULT_MAX_CHARS
}
fn default_top_k() -> usize {
    rag::DEFAULT_TOP_K
}
fn default_log_level() -> String {
    "info".to_string()
}
