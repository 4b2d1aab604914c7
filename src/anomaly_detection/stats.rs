//! Descriptive statistics for a transaction batch

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::errors::{AnomalyDetectionError, Result};
use super::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionStatistics {
    pub total_transactions: usize,
    pub total_amount: f64,
    pub average_amount: f64,
    pub median_amount: f64,
    pub max_amount: f64,
    pub min_amount: f64,
    pub unique_vendors: usize,
    pub unique_departments: usize,
}

impl TransactionStatistics {
    /// Summarize a non-empty batch. Amounts must be finite.
    pub fn from_transactions(transactions: &[Transaction]) -> Result<Self> {
        if transactions.is_empty() {
            return Err(AnomalyDetectionError::EmptyBatch);
        }

        let mut amounts = Vec::with_capacity(transactions.len());
        for (index, tx) in transactions.iter().enumerate() {
            tx.validate_amount(index)?;
            amounts.push(tx.amount);
        }
        amounts.sort_by(|a, b| a.total_cmp(b));

        let n = amounts.len();
        let total: f64 = amounts.iter().sum();
        let median = if n % 2 == 0 {
            (amounts[n / 2 - 1] + amounts[n / 2]) / 2.0
        } else {
            amounts[n / 2]
        };

        let vendors: HashSet<&str> = transactions.iter().map(|t| t.vendor_name.as_str()).collect();
        let departments: HashSet<u32> = transactions.iter().map(|t| t.department_id).collect();

        Ok(Self {
            total_transactions: n,
            total_amount: total,
            average_amount: total / n as f64,
            median_amount: median,
            max_amount: amounts[n - 1],
            min_amount: amounts[0],
            unique_vendors: vendors.len(),
            unique_departments: departments.len(),
        })
    }
}
