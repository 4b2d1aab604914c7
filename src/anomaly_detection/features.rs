//! Transaction feature builder
//!
//! Turns a batch of budget transactions into a fixed-width numeric matrix for
//! the outlier model. The column order below is shared by training and
//! inference; a snapshot stores it and refuses to load against a different
//! layout.

use std::collections::HashMap;

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

use super::errors::Result;
use super::transaction::Transaction;

/// Number of feature columns
pub const FEATURE_COUNT: usize = 8;

/// Feature column names, in matrix order
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "amount",
    "log_amount",
    "amount_zscore",
    "department_frequency",
    "vendor_frequency",
    "day_of_week",
    "hour_of_day",
    "amount_percentile",
];

/// Column names as owned strings, the form persisted in snapshots
pub fn feature_columns() -> Vec<String> {
    FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect()
}

/// One transaction's feature row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Raw values in column order
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Value of a named column
    pub fn get(&self, column: &str) -> Option<f64> {
        FEATURE_COLUMNS
            .iter()
            .position(|c| *c == column)
            .map(|i| self.0[i])
    }

    pub fn amount(&self) -> f64 {
        self.0[0]
    }

    pub fn amount_zscore(&self) -> f64 {
        self.0[2]
    }

    pub fn vendor_frequency(&self) -> f64 {
        self.0[4]
    }

    pub fn amount_percentile(&self) -> f64 {
        self.0[7]
    }
}

/// Transaction counts per vendor and per department
///
/// Vendor keys are trimmed and lower-cased, so spelling variants of the
/// same vendor share one count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyMap {
    pub vendors: HashMap<String, u64>,
    pub departments: HashMap<u32, u64>,
}

impl FrequencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every vendor and department in `transactions`, duplicates included.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut map = Self::new();
        for tx in transactions {
            map.record(tx);
        }
        map
    }

    /// Count one transaction
    pub fn record(&mut self, tx: &Transaction) {
        *self.vendors.entry(vendor_key(&tx.vendor_name)).or_insert(0) += 1;
        *self.departments.entry(tx.department_id).or_insert(0) += 1;
    }

    /// Add another map's counts into this one
    pub fn merge(&mut self, other: &FrequencyMap) {
        for (vendor, count) in &other.vendors {
            *self.vendors.entry(vendor_key(vendor)).or_insert(0) += count;
        }
        for (dept, count) in &other.departments {
            *self.departments.entry(*dept).or_insert(0) += count;
        }
    }

    pub fn vendor_count(&self, vendor: &str) -> u64 {
        self.vendors.get(&vendor_key(vendor)).copied().unwrap_or(0)
    }

    pub fn department_count(&self, department_id: u32) -> u64 {
        self.departments.get(&department_id).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty() && self.departments.is_empty()
    }
}

fn vendor_key(vendor: &str) -> String {
    vendor.trim().to_lowercase()
}

/// Where frequency features take their counts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyMode {
    /// Training-time counts plus the scored batch's own counts
    #[default]
    Historical,
    /// Counts from the scored batch only
    BatchRelative,
}

/// Feature builder
///
/// Stateless; `build` is a pure function of the batch and the optional
/// historical counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Column layout produced by `build`
    pub fn columns(&self) -> &'static [&'static str; FEATURE_COUNT] {
        &FEATURE_COLUMNS
    }

    /// Build one feature row per transaction, in input order.
    ///
    /// Fails with `InvalidTransaction` on the first non-finite or negative
    /// amount. When `historical` is given, batch counts are added to it.
    pub fn build(
        &self,
        transactions: &[Transaction],
        historical: Option<&FrequencyMap>,
    ) -> Result<Vec<FeatureVector>> {
        if transactions.is_empty() {
            return Ok(Vec::new());
        }

        for (index, tx) in transactions.iter().enumerate() {
            tx.validate_amount(index)?;
        }

        let mut frequencies = FrequencyMap::from_transactions(transactions);
        if let Some(hist) = historical {
            frequencies.merge(hist);
        }

        let amounts: Vec<f64> = transactions.iter().map(|tx| tx.amount).collect();
        let (mean, std) = mean_and_sample_std(&amounts);
        let percentiles = average_rank_percentiles(&amounts);

        let rows = transactions
            .iter()
            .zip(percentiles)
            .map(|(tx, percentile)| {
                let amount_zscore = if std > 0.0 { (tx.amount - mean) / std } else { 0.0 };
                FeatureVector([
                    tx.amount,
                    tx.amount.ln_1p(),
                    amount_zscore,
                    frequencies.department_count(tx.department_id) as f64,
                    frequencies.vendor_count(&tx.vendor_name) as f64,
                    tx.transaction_date.weekday().num_days_from_monday() as f64,
                    tx.transaction_date.hour() as f64,
                    percentile,
                ])
            })
            .collect();

        Ok(rows)
    }
}

/// Mean and sample (n - 1) standard deviation.
///
/// The deviation is 0.0 unless there are at least two distinct values.
fn mean_and_sample_std(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n as f64;

    let first = values[0];
    if n < 2 || values.iter().all(|v| *v == first) {
        return (mean, 0.0);
    }

    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std = variance.sqrt();
    if std.is_finite() {
        (mean, std)
    } else {
        (mean, 0.0)
    }
}

/// Percentile rank of each value, ties sharing the average of their ranks.
fn average_rank_percentiles(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1 ..= end
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = avg_rank / n as f64;
        }
        start = end;
    }
    ranks
}
