//! Outlier models
//!
//! `OutlierModel` is the contract the pipeline scores against. The shipped
//! implementation is an isolation forest: random axis-aligned partitions,
//! where anomalies are isolated in fewer splits than regular points.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::config::ModelConfig;
use super::errors::{AnomalyDetectionError, Result};
use super::features::{FeatureVector, FEATURE_COUNT};

/// Trait for outlier scoring models
///
/// `decision_function` follows the isolation-forest convention: lower is
/// more anomalous, negative values are outliers. Outputs are index-aligned
/// with the input and stable for a given trained state.
///
/// `fit` mutates the model; callers must not run it concurrently with
/// scoring on the same instance. Train a fresh instance and swap it in.
pub trait OutlierModel: Send + Sync {
    /// Short model identifier used in logs and snapshots
    fn name(&self) -> &'static str;

    /// Train on a feature matrix
    fn fit(&mut self, rows: &[FeatureVector]) -> Result<()>;

    /// Whether `fit` has completed
    fn is_fitted(&self) -> bool;

    /// Continuous anomaly score per row, lower = more anomalous
    fn decision_function(&self, rows: &[FeatureVector]) -> Result<Vec<f64>>;

    /// Binary label per row, true = anomalous
    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<bool>> {
        Ok(self
            .decision_function(rows)?
            .into_iter()
            .map(|score| score < 0.0)
            .collect())
    }
}

/// Euler–Mascheroni constant, for the harmonic number approximation
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// One isolation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn build(rows: &[&FeatureVector], max_depth: usize, rng: &mut StdRng) -> Self {
        Self {
            root: Self::grow(rows, 0, max_depth, rng),
        }
    }

    fn grow(rows: &[&FeatureVector], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
        if depth >= max_depth || rows.len() <= 1 {
            return Node::Leaf { size: rows.len() };
        }

        // Pick a random feature that still varies; give up after trying every column once.
        let start = rng.gen_range(0..FEATURE_COUNT);
        let mut split = None;
        for offset in 0..FEATURE_COUNT {
            let feature = (start + offset) % FEATURE_COUNT;
            let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                let v = r.as_slice()[feature];
                (lo.min(v), hi.max(v))
            });
            if min < max {
                split = Some((feature, min, max));
                break;
            }
        }

        let Some((feature, min, max)) = split else {
            return Node::Leaf { size: rows.len() };
        };

        let threshold = rng.gen_range(min..max);
        let (left, right): (Vec<&FeatureVector>, Vec<&FeatureVector>) = rows
            .iter()
            .copied()
            .partition(|r| r.as_slice()[feature] <= threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(Self::grow(&left, depth + 1, max_depth, rng)),
            right: Box::new(Self::grow(&right, depth + 1, max_depth, rng)),
        }
    }

    /// Depth at which `row` is isolated, adjusted for unsplit leaf size
    pub fn path_length(&self, row: &FeatureVector) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row.as_slice()[*feature] <= *threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Isolation forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    n_estimators: usize,
    max_samples: usize,
    contamination: f64,
    random_state: u64,
    trees: Vec<IsolationTree>,
    /// Subsample size actually used, min(max_samples, training rows)
    sample_size: usize,
    /// Score quantile at `contamination`; decision = score_samples - offset
    offset: f64,
}

impl IsolationForest {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            max_samples: config.max_samples,
            contamination: config.contamination,
            random_state: config.random_state,
            trees: Vec::new(),
            sample_size: 0,
            offset: 0.0,
        }
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    /// Decision threshold on raw scores
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Raw isolation score in [-1, 0): -2^(-E[h(x)] / c(ψ))
    pub fn score_samples(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(AnomalyDetectionError::ModelNotTrained);
        }

        let normalizer = average_path_length(self.sample_size).max(1.0);
        let n_trees = self.trees.len() as f64;

        Ok(rows
            .iter()
            .map(|row| {
                let mean_depth =
                    self.trees.iter().map(|t| t.path_length(row)).sum::<f64>() / n_trees;
                -(2f64).powf(-mean_depth / normalizer)
            })
            .collect())
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new(&ModelConfig::default())
    }
}

impl OutlierModel for IsolationForest {
    fn name(&self) -> &'static str {
        "isolation_forest"
    }

    fn fit(&mut self, rows: &[FeatureVector]) -> Result<()> {
        if rows.is_empty() {
            return Err(AnomalyDetectionError::EmptyBatch);
        }
        if self.n_estimators == 0 {
            return Err(AnomalyDetectionError::Configuration(
                "n_estimators must be greater than 0".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.random_state);
        let sample_size = self.max_samples.clamp(1, rows.len());
        let max_depth = (sample_size as f64).log2().ceil().max(1.0) as usize;

        self.trees = (0..self.n_estimators)
            .map(|_| {
                let picked: Vec<&FeatureVector> =
                    rand::seq::index::sample(&mut rng, rows.len(), sample_size)
                        .into_vec()
                        .into_iter()
                        .map(|i| &rows[i])
                        .collect();
                IsolationTree::build(&picked, max_depth, &mut rng)
            })
            .collect();
        self.sample_size = sample_size;

        let mut training_scores = self.score_samples(rows)?;
        training_scores.sort_by(f64::total_cmp);
        self.offset = percentile(&training_scores, self.contamination);

        Ok(())
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn decision_function(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        Ok(self
            .score_samples(rows)?
            .into_iter()
            .map(|s| s - self.offset)
            .collect())
    }
}

/// Linear-interpolated quantile `q` in [0, 1] of sorted values
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
