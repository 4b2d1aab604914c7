// src/lib.rs

// Anomaly detection module
pub mod anomaly_detection;

pub use anomaly_detection::{
    AnomalyDetectionConfig, AnomalyDetectionError, AnomalyDetector, BatchAnalyzer, BatchReport,
    ModelRegistry, Result, Transaction,
};
