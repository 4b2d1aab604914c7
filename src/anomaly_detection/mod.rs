//! Budget transaction anomaly scoring
//!
//! Turns a batch of budget transactions into per-row anomaly scores with
//! human-readable reasons, then rolls them up into a batch risk tier and
//! review recommendations.
//!
//! ## Pipeline
//! - `FeatureBuilder`: eight numeric features per transaction
//! - `StandardScaler`: per-column standardisation fitted at training time
//! - `OutlierModel`: isolation forest scoring and labelling
//! - `ReasonEngine`: rule cascade explaining each row
//! - `BatchAnalyzer`: summary, risk tier, recommendations and flagged subset
//!
//! Trained detectors are immutable, persist as versioned JSON snapshots and
//! can be shared through a `ModelRegistry`.

pub mod analyzer;
pub mod config;
pub mod detector;
pub mod errors;
pub mod features;
pub mod model;
pub mod reasons;
pub mod registry;
pub mod samples;
pub mod scaling;
pub mod stats;
pub mod storage;
pub mod transaction;

pub use analyzer::{BatchAnalyzer, BatchReport, BatchSummary, FlaggedTransaction, RiskTier, TransactionAnalysis};
pub use config::{AnalysisConfig, AnomalyDetectionConfig, FeatureConfig, ModelConfig};
pub use detector::{AnomalyDetector, ScoreResult};
pub use errors::{AnomalyDetectionError, Result};
pub use features::{FeatureBuilder, FeatureVector, FrequencyMap, FrequencyMode, FEATURE_COLUMNS, FEATURE_COUNT};
pub use model::{IsolationForest, OutlierModel};
pub use reasons::{Explanation, ReasonEngine, ReasonThresholds};
pub use registry::{ModelRegistry, DEFAULT_MODEL};
pub use scaling::StandardScaler;
pub use stats::TransactionStatistics;
pub use storage::{FileSnapshotStore, MemorySnapshotStore, ModelSnapshot, SnapshotStore};
pub use transaction::Transaction;

/// Train a detector on the bundled training set and analyze `transactions`
/// with default settings.
pub fn analyze_with_default_model(transactions: &[Transaction]) -> Result<BatchReport> {
    let config = AnomalyDetectionConfig::default();
    let detector = AnomalyDetector::train(&samples::training_transactions(), &config)?;
    BatchAnalyzer::new(&config).analyze(transactions, &detector)
}
