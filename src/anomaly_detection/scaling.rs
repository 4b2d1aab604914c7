//! Feature scaling
//!
//! Per-column standardisation fitted once on the training matrix and applied
//! unchanged to every inference batch.

use serde::{Deserialize, Serialize};

use super::errors::{AnomalyDetectionError, Result};
use super::features::{FeatureVector, FEATURE_COUNT};

/// Standard (z-score) scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    /// Fit column means and population standard deviations.
    ///
    /// Constant columns get a scale of 1.0 so they transform to 0.
    pub fn fit(rows: &[FeatureVector]) -> Result<Self> {
        if rows.is_empty() {
            return Err(AnomalyDetectionError::EmptyBatch);
        }
        let n = rows.len() as f64;

        let mut mean = [0.0; FEATURE_COUNT];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row.as_slice()) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut scale = [0.0; FEATURE_COUNT];
        for row in rows {
            for (col, v) in row.as_slice().iter().enumerate() {
                scale[col] += (v - mean[col]).powi(2);
            }
        }
        for s in scale.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std > f64::EPSILON && std.is_finite() { std } else { 1.0 };
        }

        Ok(Self { mean, scale })
    }

    /// Identity scaler, for models trained on raw features
    pub fn identity() -> Self {
        Self {
            mean: [0.0; FEATURE_COUNT],
            scale: [1.0; FEATURE_COUNT],
        }
    }

    pub fn transform_one(&self, row: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_COUNT];
        for (col, v) in row.as_slice().iter().enumerate() {
            out[col] = (v - self.mean[col]) / self.scale[col];
        }
        FeatureVector(out)
    }

    pub fn transform(&self, rows: &[FeatureVector]) -> Vec<FeatureVector> {
        rows.iter().map(|row| self.transform_one(row)).collect()
    }

    pub fn mean(&self) -> &[f64; FEATURE_COUNT] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64; FEATURE_COUNT] {
        &self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(first: f64, second: f64) -> FeatureVector {
        let mut values = [5.0; FEATURE_COUNT];
        values[0] = first;
        values[1] = second;
        FeatureVector(values)
    }

    #[test]
    fn test_fit_transform() {
        let rows = vec![row(1.0, 10.0), row(3.0, 10.0)];
        let scaler = StandardScaler::fit(&rows).unwrap();
        assert_eq!(scaler.mean()[0], 2.0);
        assert_eq!(scaler.scale()[0], 1.0);
        // constant columns keep unit scale
        assert_eq!(scaler.scale()[1], 1.0);

        let scaled = scaler.transform(&rows);
        assert_eq!(scaled[0].as_slice()[0], -1.0);
        assert_eq!(scaled[1].as_slice()[0], 1.0);
        assert_eq!(scaled[0].as_slice()[1], 0.0);
    }

    #[test]
    fn test_fit_empty() {
        assert!(matches!(
            StandardScaler::fit(&[]),
            Err(AnomalyDetectionError::EmptyBatch)
        ));
    }

    #[test]
    fn test_identity() {
        let r = row(7.0, 8.0);
        assert_eq!(StandardScaler::identity().transform_one(&r), r);
    }
}
