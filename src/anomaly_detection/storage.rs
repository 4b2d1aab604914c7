//! Model snapshot storage
//!
//! A snapshot captures a trained detector (forest, scaler, training
//! frequencies and column order) as versioned JSON. Backends persist
//! snapshots by name.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::detector::AnomalyDetector;
use super::errors::{AnomalyDetectionError, Result};
use super::features::{FrequencyMap, FrequencyMode};
use super::model::IsolationForest;
use super::scaling::StandardScaler;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted form of a trained detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub version: u32,
    pub model: IsolationForest,
    pub scaler: StandardScaler,
    pub training_frequencies: FrequencyMap,
    pub frequency_mode: FrequencyMode,
    pub contamination: f64,
    pub feature_columns: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl ModelSnapshot {
    pub fn capture(detector: &AnomalyDetector) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            model: detector.model().clone(),
            scaler: detector.scaler().clone(),
            training_frequencies: detector.training_frequencies().clone(),
            frequency_mode: detector.frequency_mode(),
            contamination: detector.model().contamination(),
            feature_columns: detector.feature_columns().to_vec(),
            trained_at: detector.trained_at(),
            training_rows: detector.training_rows(),
        }
    }

    /// Rebuild the detector, checking version and column order
    pub fn restore(self) -> Result<AnomalyDetector> {
        if self.version != SNAPSHOT_VERSION {
            return Err(AnomalyDetectionError::UnsupportedSnapshotVersion(self.version));
        }
        AnomalyDetector::from_parts(
            self.model,
            self.scaler,
            self.training_frequencies,
            self.frequency_mode,
            self.feature_columns,
            self.trained_at,
            self.training_rows,
        )
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a snapshot. The version is checked before the body so that
    /// future formats fail with a clear error.
    pub fn from_json(json: &str) -> Result<Self> {
        let probe: VersionProbe = serde_json::from_str(json)?;
        if probe.version != SNAPSHOT_VERSION {
            return Err(AnomalyDetectionError::UnsupportedSnapshotVersion(probe.version));
        }
        Ok(serde_json::from_str(json)?)
    }
}

/// Save a detector to a file, replacing any existing one
pub fn save_detector(detector: &AnomalyDetector, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = ModelSnapshot::capture(detector).to_json()?;

    // Write next to the target then rename so readers never see a partial file
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;

    info!("Saved model snapshot to {}", path.display());
    Ok(())
}

/// Load a detector from a snapshot file
pub fn load_detector(path: impl AsRef<Path>) -> Result<AnomalyDetector> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    let detector = ModelSnapshot::from_json(&json)?.restore()?;
    info!(
        "Loaded model snapshot from {} ({} training rows)",
        path.display(),
        detector.training_rows()
    );
    Ok(detector)
}

/// Named snapshot storage backend
pub trait SnapshotStore: Send + Sync {
    fn put(&self, name: &str, snapshot: &ModelSnapshot) -> Result<()>;

    fn get(&self, name: &str) -> Result<Option<ModelSnapshot>>;

    fn delete(&self, name: &str) -> Result<()>;

    /// Stored names, sorted
    fn list(&self) -> Result<Vec<String>>;
}

/// In-memory store, holding serialized snapshots
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn put(&self, name: &str, snapshot: &ModelSnapshot) -> Result<()> {
        let json = snapshot.to_json()?;
        self.snapshots.write().insert(name.to_string(), json);
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<ModelSnapshot>> {
        let snapshots = self.snapshots.read();
        snapshots
            .get(name)
            .map(|json| ModelSnapshot::from_json(json))
            .transpose()
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.snapshots.write().remove(name);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.snapshots.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Directory of `<name>.json` snapshot files
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Open a store, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !name.starts_with('.');
        if !valid {
            return Err(AnomalyDetectionError::Configuration(format!(
                "Invalid model name: {:?}",
                name
            )));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn put(&self, name: &str, snapshot: &ModelSnapshot) -> Result<()> {
        let path = self.path_for(name)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, snapshot.to_json()?)?;
        std::fs::rename(&tmp, &path)?;
        debug!("Stored snapshot {} at {}", name, path.display());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<ModelSnapshot>> {
        let path = self.path_for(name)?;
        match std::fs::read_to_string(&path) {
            Ok(json) => ModelSnapshot::from_json(&json).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
