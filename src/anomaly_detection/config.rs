//! Anomaly detection configuration
//!
//! Serde config with defaults, JSON file loading and environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::errors::{AnomalyDetectionError, Result};
use super::features::FrequencyMode;
use super::reasons::ReasonThresholds;

/// Anomaly detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnomalyDetectionConfig {
    /// Outlier model parameters
    pub model: ModelConfig,

    /// Feature construction
    pub features: FeatureConfig,

    /// Reason cascade thresholds
    pub reasons: ReasonThresholds,

    /// Batch aggregation
    pub analysis: AnalysisConfig,
}

/// Isolation forest parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of trees
    pub n_estimators: usize,

    /// Rows drawn per tree (capped at the training size)
    pub max_samples: usize,

    /// Expected anomalous fraction of the training set
    pub contamination: f64,

    /// RNG seed
    pub random_state: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            random_state: 42,
        }
    }
}

/// Feature construction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Where frequency features take their counts from
    pub frequency_mode: FrequencyMode,

    /// Standardise columns before scoring
    pub scale_features: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            frequency_mode: FrequencyMode::Historical,
            scale_features: true,
        }
    }
}

/// Batch aggregation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Anomaly rate above which a batch is HIGH risk
    pub high_risk_rate: f64,

    /// Anomaly rate above which a batch is MEDIUM risk
    pub medium_risk_rate: f64,

    /// Largest batch the front end accepts
    pub max_batch_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            high_risk_rate: 0.3,
            medium_risk_rate: 0.1,
            max_batch_size: 1000,
        }
    }
}

impl AnomalyDetectionConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `ANOMALY_*` environment overrides on top of this config.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_parse::<f64>("ANOMALY_CONTAMINATION")? {
            self.model.contamination = v;
        }
        if let Some(v) = env_parse::<u64>("ANOMALY_RANDOM_STATE")? {
            self.model.random_state = v;
        }
        if let Some(v) = env_parse::<usize>("ANOMALY_N_ESTIMATORS")? {
            self.model.n_estimators = v;
        }
        if let Some(v) = env_parse::<usize>("ANOMALY_MAX_BATCH_SIZE")? {
            self.analysis.max_batch_size = v;
        }
        if let Ok(mode) = std::env::var("ANOMALY_FREQUENCY_MODE") {
            self.features.frequency_mode = match mode.trim().to_ascii_lowercase().as_str() {
                "historical" => FrequencyMode::Historical,
                "batch_relative" | "batch" => FrequencyMode::BatchRelative,
                other => {
                    return Err(AnomalyDetectionError::Configuration(format!(
                        "ANOMALY_FREQUENCY_MODE must be historical or batch_relative, got {:?}",
                        other
                    )))
                }
            };
        }
        self.validate()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let err = |msg: &str| Err(AnomalyDetectionError::Configuration(msg.to_string()));

        if !(self.model.contamination > 0.0 && self.model.contamination <= 0.5) {
            return err("Contamination must be in (0.0, 0.5]");
        }
        if self.model.n_estimators == 0 {
            return err("n_estimators must be greater than 0");
        }
        if self.model.max_samples == 0 {
            return err("max_samples must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.analysis.medium_risk_rate)
            || !(0.0..=1.0).contains(&self.analysis.high_risk_rate)
            || self.analysis.medium_risk_rate > self.analysis.high_risk_rate
        {
            return err("Risk rates must satisfy 0 <= medium <= high <= 1");
        }
        if self.analysis.max_batch_size == 0 {
            return err("Maximum batch size must be greater than 0");
        }
        self.reasons.validate()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            AnomalyDetectionError::Configuration(format!("{} has an invalid value: {:?}", key, raw))
        }),
        Err(_) => Ok(None),
    }
}
