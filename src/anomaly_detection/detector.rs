//! Anomaly detector - trained scoring pipeline
//!
//! Bundles everything fixed at training time: the feature layout, the
//! training frequency counts, the fitted scaler and the fitted outlier model.
//! A detector is immutable once built, so it can be shared across threads
//! and scored concurrently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use super::config::{AnomalyDetectionConfig, FeatureConfig};
use super::errors::{AnomalyDetectionError, Result};
use super::features::{feature_columns, FeatureBuilder, FeatureVector, FrequencyMap, FrequencyMode};
use super::model::{IsolationForest, OutlierModel};
use super::scaling::StandardScaler;
use super::transaction::Transaction;

/// Model output for one transaction, index-aligned with the scored batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub index: usize,
    /// Lower = more anomalous
    pub anomaly_score: f64,
    pub is_anomaly: bool,
}

/// Trained anomaly detector
#[derive(Debug, Clone)]
pub struct AnomalyDetector<M: OutlierModel = IsolationForest> {
    builder: FeatureBuilder,
    frequency_mode: FrequencyMode,
    training_frequencies: FrequencyMap,
    scaler: StandardScaler,
    model: M,
    feature_columns: Vec<String>,
    trained_at: DateTime<Utc>,
    training_rows: usize,
}

impl AnomalyDetector<IsolationForest> {
    /// Train an isolation forest pipeline with the given config.
    pub fn train(transactions: &[Transaction], config: &AnomalyDetectionConfig) -> Result<Self> {
        config.validate()?;
        Self::train_with(IsolationForest::new(&config.model), transactions, &config.features)
    }
}

impl<M: OutlierModel> AnomalyDetector<M> {
    /// Train `model` on `transactions`.
    ///
    /// Training data must be clean: any invalid row fails the whole call.
    pub fn train_with(mut model: M, transactions: &[Transaction], config: &FeatureConfig) -> Result<Self> {
        if transactions.is_empty() {
            return Err(AnomalyDetectionError::EmptyBatch);
        }
        for (index, tx) in transactions.iter().enumerate() {
            tx.validate(index)?;
        }

        let start = Instant::now();
        let builder = FeatureBuilder::new();
        let raw = builder.build(transactions, None)?;

        let scaler = if config.scale_features {
            StandardScaler::fit(&raw)?
        } else {
            StandardScaler::identity()
        };
        model.fit(&scaler.transform(&raw))?;

        info!(
            "Trained {} on {} transactions in {}ms (frequency mode {:?})",
            model.name(),
            transactions.len(),
            start.elapsed().as_millis(),
            config.frequency_mode
        );

        Ok(Self {
            builder,
            frequency_mode: config.frequency_mode,
            training_frequencies: FrequencyMap::from_transactions(transactions),
            scaler,
            model,
            feature_columns: feature_columns(),
            trained_at: Utc::now(),
            training_rows: transactions.len(),
        })
    }

    /// Reassemble a detector from persisted parts.
    ///
    /// The column list must match the current feature layout exactly.
    pub fn from_parts(
        model: M,
        scaler: StandardScaler,
        training_frequencies: FrequencyMap,
        frequency_mode: FrequencyMode,
        columns: Vec<String>,
        trained_at: DateTime<Utc>,
        training_rows: usize,
    ) -> Result<Self> {
        let expected = feature_columns();
        if columns != expected {
            return Err(AnomalyDetectionError::FeatureMismatch {
                expected,
                found: columns,
            });
        }
        if !model.is_fitted() {
            return Err(AnomalyDetectionError::ModelNotTrained);
        }

        Ok(Self {
            builder: FeatureBuilder::new(),
            frequency_mode,
            training_frequencies,
            scaler,
            model,
            feature_columns: columns,
            trained_at,
            training_rows,
        })
    }

    /// Scaled feature matrix for `transactions`, as the model sees it
    pub fn features_for(&self, transactions: &[Transaction]) -> Result<Vec<FeatureVector>> {
        let historical = match self.frequency_mode {
            FrequencyMode::Historical => Some(&self.training_frequencies),
            FrequencyMode::BatchRelative => None,
        };
        let raw = self.builder.build(transactions, historical)?;
        Ok(self.scaler.transform(&raw))
    }

    /// Score a batch. The result is index-aligned with `transactions`.
    pub fn score(&self, transactions: &[Transaction]) -> Result<Vec<ScoreResult>> {
        if transactions.is_empty() {
            return Ok(Vec::new());
        }

        let features = self.features_for(transactions)?;
        let scores = self.model.decision_function(&features)?;
        let labels = self.model.predict(&features)?;

        let results: Vec<ScoreResult> = scores
            .into_iter()
            .zip(labels)
            .enumerate()
            .map(|(index, (anomaly_score, is_anomaly))| ScoreResult {
                index,
                anomaly_score,
                is_anomaly,
            })
            .collect();

        debug!(
            "Scored {} transactions, {} flagged",
            results.len(),
            results.iter().filter(|r| r.is_anomaly).count()
        );
        Ok(results)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn training_frequencies(&self) -> &FrequencyMap {
        &self.training_frequencies
    }

    pub fn frequency_mode(&self) -> FrequencyMode {
        self.frequency_mode
    }

    /// Column order the model was trained on
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }
}
