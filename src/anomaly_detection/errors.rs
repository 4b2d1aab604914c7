//! Anomaly detection error types
//!
//! A single error enum shared by feature building, model scoring, snapshot
//! storage and the registry.

use thiserror::Error;

/// Anomaly detection error type
#[derive(Debug, Error)]
pub enum AnomalyDetectionError {
    /// A transaction field is malformed or out of range
    #[error("Invalid transaction at index {index}: {field} {message}")]
    InvalidTransaction {
        index: usize,
        field: &'static str,
        message: String,
    },

    /// Inference attempted before `fit` or snapshot load
    #[error("Model not trained: call fit or load a snapshot first")]
    ModelNotTrained,

    /// Zero rows where at least one is required
    #[error("Empty batch: at least one valid transaction is required")]
    EmptyBatch,

    /// Persisted column order differs from the current feature layout
    #[error("Feature mismatch: expected columns {expected:?}, found {found:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Snapshot written by an unknown format version
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedSnapshotVersion(u32),

    /// No model registered under the given name
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anomaly detection result type
pub type Result<T> = std::result::Result<T, AnomalyDetectionError>;

impl From<serde_json::Error> for AnomalyDetectionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl AnomalyDetectionError {
    pub(crate) fn invalid(index: usize, field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidTransaction {
            index,
            field,
            message: message.into(),
        }
    }

    /// Errors scoped to a single row or lookup; the rest of the batch or
    /// registry is still usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransaction { .. } | Self::ModelNotFound(_) | Self::EmptyBatch
        )
    }

    /// Additional context for logging
    pub fn context(&self) -> String {
        match self {
            Self::InvalidTransaction { index, field, .. } => {
                format!("Row: {}, field: {}", index, field)
            }
            Self::FeatureMismatch { expected, found } => format!(
                "Expected {} columns, found {}",
                expected.len(),
                found.len()
            ),
            Self::ModelNotFound(name) => format!("Model: {}", name),
            _ => "No additional context".to_string(),
        }
    }
}
