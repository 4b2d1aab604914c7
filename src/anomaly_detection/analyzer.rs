//! Batch analyzer
//!
//! Scores a batch against a trained detector, explains every row and rolls
//! the results up into a risk tier and review recommendations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{info, warn};

use super::config::{AnalysisConfig, AnomalyDetectionConfig};
use super::detector::AnomalyDetector;
use super::errors::{AnomalyDetectionError, Result};
use super::model::OutlierModel;
use super::reasons::{Explanation, ReasonEngine};
use super::transaction::Transaction;

/// Batch risk classification by anomaly rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Classify an anomaly rate in [0, 1]. Both comparisons are strict.
    pub fn from_rate(rate: f64, config: &AnalysisConfig) -> Self {
        if rate > config.high_risk_rate {
            Self::High
        } else if rate > config.medium_risk_rate {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Fixed review guidance for this tier
    pub fn guidance(&self) -> &'static [&'static str] {
        match self {
            Self::High => &[
                "URGENT: Multiple suspicious transactions detected",
                "Conduct immediate manual review of all flagged transactions",
                "Consider implementing additional approval workflows",
                "Review vendor verification processes",
            ],
            Self::Medium => &[
                "WARNING: Some suspicious activity detected",
                "Review flagged transactions within 24 hours",
                "Consider additional monitoring for involved vendors",
                "Update transaction approval limits if needed",
            ],
            Self::Low => &[
                "LOW RISK: Transactions appear mostly normal",
                "Continue regular monitoring",
                "Review any flagged items as part of routine audit",
            ],
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        };
        f.write_str(s)
    }
}

/// Recommendations for a tier plus follow-ups when anything was flagged
pub fn recommendations(tier: RiskTier, anomalies: usize) -> Vec<String> {
    let mut out: Vec<String> = tier.guidance().iter().map(|s| s.to_string()).collect();
    if anomalies > 0 {
        out.push(format!("Focus review on {} flagged transaction(s)", anomalies));
        out.push("Consider updating anomaly detection thresholds if false positives".to_string());
    }
    out
}

/// Per-transaction result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionAnalysis {
    pub transaction_index: usize,
    pub anomaly_score: f64,
    pub is_anomaly: bool,
    pub reasons: Explanation,
    pub transaction_amount: f64,
    pub vendor_name: String,
    /// Set when the row failed validation and was not scored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransactionAnalysis {
    pub fn is_rejected(&self) -> bool {
        self.error.is_some()
    }
}

/// Condensed view of a flagged transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedTransaction {
    pub index: usize,
    pub amount: f64,
    pub vendor: String,
    /// |anomaly_score|
    pub risk_score: f64,
    pub primary_reason: String,
}

/// Batch-level aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_transactions: usize,
    pub scored_transactions: usize,
    pub rejected_transactions: usize,
    pub anomalies_detected: usize,
    /// anomalies / scored rows, as a percentage rounded to 2 decimals
    pub anomaly_rate_percent: f64,
    pub risk_level: RiskTier,
    /// Sum over scored rows
    pub total_amount_analyzed: f64,
    pub anomalous_amount: f64,
    /// anomalous / total amount as a percentage, 0 when the total is 0
    pub anomalous_percentage: f64,
}

/// Full batch analysis output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub summary: BatchSummary,
    pub recommendations: Vec<String>,
    pub individual_results: Vec<TransactionAnalysis>,
    pub flagged_transactions: Vec<FlaggedTransaction>,
}

/// One input row, either ready to score or already rejected
enum Row {
    Valid(Transaction),
    Rejected {
        amount: f64,
        vendor_name: String,
        error: AnomalyDetectionError,
    },
}

/// Batch analyzer
#[derive(Debug, Clone, Default)]
pub struct BatchAnalyzer {
    reasons: ReasonEngine,
    config: AnalysisConfig,
}

impl BatchAnalyzer {
    pub fn new(config: &AnomalyDetectionConfig) -> Self {
        Self {
            reasons: ReasonEngine::new(config.reasons.clone()),
            config: config.analysis.clone(),
        }
    }

    pub fn reason_engine(&self) -> &ReasonEngine {
        &self.reasons
    }

    /// Analyze a batch.
    ///
    /// Rows failing validation are reported in place and left out of scoring
    /// and aggregation. Fails with `EmptyBatch` when no row can be scored.
    pub fn analyze<M: OutlierModel>(
        &self,
        transactions: &[Transaction],
        detector: &AnomalyDetector<M>,
    ) -> Result<BatchReport> {
        let rows = transactions
            .iter()
            .enumerate()
            .map(|(index, tx)| match tx.validate(index) {
                Ok(()) => Row::Valid(tx.clone()),
                Err(error) => Row::Rejected {
                    amount: tx.amount,
                    vendor_name: tx.vendor_name.clone(),
                    error,
                },
            })
            .collect();
        self.analyze_rows(rows, detector)
    }

    /// Analyze raw JSON records.
    ///
    /// A record that does not parse as a transaction is rejected in place,
    /// exactly like one that fails validation.
    pub fn analyze_records<M: OutlierModel>(
        &self,
        records: &[Value],
        detector: &AnomalyDetector<M>,
    ) -> Result<BatchReport> {
        let rows = records
            .iter()
            .enumerate()
            .map(|(index, value)| {
                let parsed = Transaction::from_json_value(value, index)
                    .and_then(|tx| tx.validate(index).map(|()| tx));
                match parsed {
                    Ok(tx) => Row::Valid(tx),
                    Err(error) => Row::Rejected {
                        amount: value.get("amount").and_then(Value::as_f64).unwrap_or(0.0),
                        vendor_name: value
                            .get("vendor_name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        error,
                    },
                }
            })
            .collect();
        self.analyze_rows(rows, detector)
    }

    fn analyze_rows<M: OutlierModel>(
        &self,
        rows: Vec<Row>,
        detector: &AnomalyDetector<M>,
    ) -> Result<BatchReport> {
        let mut results: Vec<Option<TransactionAnalysis>> = vec![None; rows.len()];
        let mut valid = Vec::with_capacity(rows.len());
        let mut valid_indices = Vec::with_capacity(rows.len());

        for (index, row) in rows.into_iter().enumerate() {
            match row {
                Row::Valid(tx) => {
                    valid_indices.push(index);
                    valid.push(tx);
                }
                Row::Rejected {
                    amount,
                    vendor_name,
                    error,
                } => {
                    warn!("Skipping invalid transaction: {}", error);
                    results[index] = Some(TransactionAnalysis {
                        transaction_index: index,
                        anomaly_score: 0.0,
                        is_anomaly: false,
                        reasons: Explanation::single(format!("Transaction rejected: {}", error)),
                        transaction_amount: amount,
                        vendor_name,
                        error: Some(error.to_string()),
                    });
                }
            }
        }

        if valid.is_empty() {
            return Err(AnomalyDetectionError::EmptyBatch);
        }

        let scores = detector.score(&valid)?;
        for ((score, &index), tx) in scores.iter().zip(&valid_indices).zip(&valid) {
            results[index] = Some(TransactionAnalysis {
                transaction_index: index,
                anomaly_score: score.anomaly_score,
                is_anomaly: score.is_anomaly,
                reasons: self.reasons.explain(tx, score.anomaly_score, score.is_anomaly),
                transaction_amount: tx.amount,
                vendor_name: tx.vendor_name.clone(),
                error: None,
            });
        }
        let individual_results: Vec<TransactionAnalysis> = results.into_iter().flatten().collect();

        let summary = self.summarize(&individual_results);
        let recommendations = recommendations(summary.risk_level, summary.anomalies_detected);
        let flagged_transactions = individual_results
            .iter()
            .filter(|r| r.is_anomaly)
            .map(|r| FlaggedTransaction {
                index: r.transaction_index,
                amount: r.transaction_amount,
                vendor: r.vendor_name.clone(),
                risk_score: r.anomaly_score.abs(),
                primary_reason: r.reasons.primary().to_string(),
            })
            .collect();

        if summary.risk_level == RiskTier::High {
            warn!(
                "High risk batch: {} of {} transactions flagged",
                summary.anomalies_detected, summary.scored_transactions
            );
        } else {
            info!(
                "Batch analyzed: {} scored, {} rejected, {} flagged, risk {}",
                summary.scored_transactions,
                summary.rejected_transactions,
                summary.anomalies_detected,
                summary.risk_level
            );
        }

        Ok(BatchReport {
            summary,
            recommendations,
            individual_results,
            flagged_transactions,
        })
    }

    /// Aggregate per-row results. Rejected rows count toward the total only.
    pub fn summarize(&self, results: &[TransactionAnalysis]) -> BatchSummary {
        let scored: Vec<&TransactionAnalysis> = results.iter().filter(|r| !r.is_rejected()).collect();
        let anomalies = scored.iter().filter(|r| r.is_anomaly).count();

        let rate = if scored.is_empty() {
            0.0
        } else {
            anomalies as f64 / scored.len() as f64
        };

        let total_amount: f64 = scored.iter().map(|r| r.transaction_amount).sum();
        let anomalous_amount: f64 = scored
            .iter()
            .filter(|r| r.is_anomaly)
            .map(|r| r.transaction_amount)
            .sum();
        let anomalous_percentage = if total_amount > 0.0 {
            round2(anomalous_amount / total_amount * 100.0)
        } else {
            0.0
        };

        BatchSummary {
            total_transactions: results.len(),
            scored_transactions: scored.len(),
            rejected_transactions: results.len() - scored.len(),
            anomalies_detected: anomalies,
            anomaly_rate_percent: round2(rate * 100.0),
            risk_level: RiskTier::from_rate(rate, &self.config),
            total_amount_analyzed: total_amount,
            anomalous_amount,
            anomalous_percentage,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: usize, amount: f64, is_anomaly: bool) -> TransactionAnalysis {
        TransactionAnalysis {
            transaction_index: index,
            anomaly_score: if is_anomaly { -0.3 } else { 0.1 },
            is_anomaly,
            reasons: Explanation::single("r".to_string()),
            transaction_amount: amount,
            vendor_name: "V".to_string(),
            error: None,
        }
    }

    #[test]
    fn test_risk_tier_boundaries() {
        let cfg = AnalysisConfig::default();
        assert_eq!(RiskTier::from_rate(0.0, &cfg), RiskTier::Low);
        assert_eq!(RiskTier::from_rate(0.1, &cfg), RiskTier::Low);
        assert_eq!(RiskTier::from_rate(0.11, &cfg), RiskTier::Medium);
        assert_eq!(RiskTier::from_rate(0.3, &cfg), RiskTier::Medium);
        assert_eq!(RiskTier::from_rate(0.31, &cfg), RiskTier::High);
    }

    #[test]
    fn test_risk_tier_serialization() {
        assert_eq!(serde_json::to_string(&RiskTier::Medium).unwrap(), "\"MEDIUM\"");
        assert_eq!(RiskTier::High.to_string(), "HIGH");
    }

    #[test]
    fn test_recommendations() {
        let low = recommendations(RiskTier::Low, 0);
        assert_eq!(low.len(), 3);

        let high = recommendations(RiskTier::High, 4);
        assert_eq!(high.len(), 6);
        assert_eq!(high[4], "Focus review on 4 flagged transaction(s)");
        assert!(high[0].starts_with("URGENT"));
    }

    #[test]
    fn test_summarize_one_in_ten() {
        let analyzer = BatchAnalyzer::default();
        let mut results: Vec<_> = (0..10).map(|i| row(i, 100.0, false)).collect();
        results[4] = row(4, 400.0, true);

        let s = analyzer.summarize(&results);
        assert_eq!(s.anomalies_detected, 1);
        assert_eq!(s.anomaly_rate_percent, 10.0);
        assert_eq!(s.risk_level, RiskTier::Low);
        assert_eq!(s.total_amount_analyzed, 1300.0);
        assert_eq!(s.anomalous_amount, 400.0);
        assert_eq!(s.anomalous_percentage, 30.77);
    }

    #[test]
    fn test_summarize_zero_total_amount() {
        let analyzer = BatchAnalyzer::default();
        let results = vec![row(0, 0.0, true), row(1, 0.0, false)];
        let s = analyzer.summarize(&results);
        assert_eq!(s.total_amount_analyzed, 0.0);
        assert_eq!(s.anomalous_percentage, 0.0);
        assert_eq!(s.risk_level, RiskTier::High);
    }

    #[test]
    fn test_summarize_excludes_rejected() {
        let analyzer = BatchAnalyzer::default();
        let mut rejected = row(2, 999.0, false);
        rejected.error = Some("bad".into());
        let results = vec![row(0, 10.0, true), row(1, 10.0, false), rejected];

        let s = analyzer.summarize(&results);
        assert_eq!(s.total_transactions, 3);
        assert_eq!(s.scored_transactions, 2);
        assert_eq!(s.rejected_transactions, 1);
        assert_eq!(s.anomaly_rate_percent, 50.0);
        assert_eq!(s.total_amount_analyzed, 20.0);
    }
}
