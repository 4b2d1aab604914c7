//! Model registry
//!
//! Named, shareable detectors. Readers hold an `Arc` to the detector they
//! fetched, so publishing a replacement never disturbs in-flight scoring.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::config::AnomalyDetectionConfig;
use super::detector::AnomalyDetector;
use super::errors::{AnomalyDetectionError, Result};
use super::storage::{ModelSnapshot, SnapshotStore};
use super::transaction::Transaction;

/// Name used for the model built at startup
pub const DEFAULT_MODEL: &str = "default";

/// Registry of trained detectors
#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<AnomalyDetector>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a detector under `name`, returning the one it replaced
    pub fn insert(&self, name: impl Into<String>, detector: AnomalyDetector) -> Option<Arc<AnomalyDetector>> {
        self.publish(name.into(), Arc::new(detector))
    }

    fn publish(&self, name: String, detector: Arc<AnomalyDetector>) -> Option<Arc<AnomalyDetector>> {
        let previous = self.models.write().insert(name.clone(), detector);
        if previous.is_some() {
            info!("Replaced model {}", name);
        } else {
            info!("Registered model {}", name);
        }
        previous
    }

    pub fn get(&self, name: &str) -> Result<Arc<AnomalyDetector>> {
        self.models
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AnomalyDetectionError::ModelNotFound(name.to_string()))
    }

    pub fn remove(&self, name: &str) -> Result<Arc<AnomalyDetector>> {
        let removed = self
            .models
            .write()
            .remove(name)
            .ok_or_else(|| AnomalyDetectionError::ModelNotFound(name.to_string()))?;
        info!("Removed model {}", name);
        Ok(removed)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.read().contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }

    /// Train a detector and publish it. Training runs outside the lock.
    pub fn train_and_insert(
        &self,
        name: &str,
        transactions: &[Transaction],
        config: &AnomalyDetectionConfig,
    ) -> Result<Arc<AnomalyDetector>> {
        let detector = Arc::new(AnomalyDetector::train(transactions, config)?);
        self.publish(name.to_string(), Arc::clone(&detector));
        Ok(detector)
    }

    /// Load `name` from a snapshot store and publish it
    pub fn load_and_insert(&self, store: &dyn SnapshotStore, name: &str) -> Result<Arc<AnomalyDetector>> {
        let snapshot = store
            .get(name)?
            .ok_or_else(|| AnomalyDetectionError::ModelNotFound(name.to_string()))?;
        let detector = Arc::new(snapshot.restore()?);
        self.publish(name.to_string(), Arc::clone(&detector));
        Ok(detector)
    }

    /// Persist the registered detector `name` into a snapshot store
    pub fn save_to(&self, store: &dyn SnapshotStore, name: &str) -> Result<()> {
        let detector = self.get(name)?;
        store.put(name, &ModelSnapshot::capture(&detector))
    }
}
