//! Batch analyzer scenarios against a deterministic threshold model

use budget_anomaly::anomaly_detection::{
    AnomalyDetectionConfig, AnomalyDetectionError, AnomalyDetector, BatchAnalyzer, FeatureConfig,
    FeatureVector, OutlierModel, Result, RiskTier, Transaction,
};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use test_case::test_case;

/// Flags every row whose raw amount exceeds `limit`
struct ThresholdModel {
    limit: f64,
    fitted: bool,
}

impl ThresholdModel {
    fn new(limit: f64) -> Self {
        Self { limit, fitted: false }
    }
}

impl OutlierModel for ThresholdModel {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn fit(&mut self, _rows: &[FeatureVector]) -> Result<()> {
        self.fitted = true;
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }

    fn decision_function(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        Ok(rows
            .iter()
            .map(|r| if r.amount() > self.limit { -0.4 } else { 0.05 })
            .collect())
    }
}

// 2024-01-15 is a Monday
fn weekday(offset: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15 + offset % 5).unwrap()
}

fn tx(amount: f64) -> Transaction {
    Transaction::new(amount, 1, "Acme Office", weekday(0))
}

fn detector(limit: f64) -> AnomalyDetector<ThresholdModel> {
    let training: Vec<Transaction> = (0..20).map(|i| tx(100.0 + i as f64)).collect();
    let features = FeatureConfig {
        scale_features: false,
        ..FeatureConfig::default()
    };
    AnomalyDetector::train_with(ThresholdModel::new(limit), &training, &features).unwrap()
}

fn batch(anomalies: usize, total: usize) -> Vec<Transaction> {
    (0..total)
        .map(|i| {
            let amount = if i < anomalies { 9_000.0 } else { 200.0 };
            Transaction::new(amount, 1, "Acme Office", weekday(i as u32))
        })
        .collect()
}

#[test_case(0, 10, RiskTier::Low ; "none flagged")]
#[test_case(1, 10, RiskTier::Low ; "exactly ten percent")]
#[test_case(2, 10, RiskTier::Medium ; "twenty percent")]
#[test_case(3, 10, RiskTier::Medium ; "exactly thirty percent")]
#[test_case(4, 10, RiskTier::High ; "forty percent")]
fn test_risk_tier_by_rate(anomalies: usize, total: usize, expected: RiskTier) {
    let report = BatchAnalyzer::default()
        .analyze(&batch(anomalies, total), &detector(5_000.0))
        .unwrap();
    assert_eq!(report.summary.anomalies_detected, anomalies);
    assert_eq!(report.summary.risk_level, expected);
}

#[test]
fn test_one_in_ten_report() {
    let report = BatchAnalyzer::default()
        .analyze(&batch(1, 10), &detector(5_000.0))
        .unwrap();

    assert_eq!(report.summary.total_transactions, 10);
    assert_eq!(report.summary.scored_transactions, 10);
    assert_eq!(report.summary.anomaly_rate_percent, 10.0);
    assert_eq!(report.summary.total_amount_analyzed, 10_800.0);
    assert_eq!(report.summary.anomalous_amount, 9_000.0);
    assert_eq!(report.summary.anomalous_percentage, 83.33);

    assert_eq!(
        report.recommendations,
        vec![
            "LOW RISK: Transactions appear mostly normal".to_string(),
            "Continue regular monitoring".to_string(),
            "Review any flagged items as part of routine audit".to_string(),
            "Focus review on 1 flagged transaction(s)".to_string(),
            "Consider updating anomaly detection thresholds if false positives".to_string(),
        ]
    );

    assert_eq!(report.flagged_transactions.len(), 1);
    let flagged = &report.flagged_transactions[0];
    assert_eq!(flagged.index, 0);
    assert_eq!(flagged.amount, 9_000.0);
    assert_eq!(flagged.vendor, "Acme Office");
    assert_eq!(flagged.risk_score, 0.4);
    assert_eq!(flagged.primary_reason, "Moderately unusual transaction pattern");

    let normal = &report.individual_results[1];
    assert!(!normal.is_anomaly);
    assert_eq!(
        normal.reasons.reasons(),
        &[
            "Transaction pattern is very typical".to_string(),
            "Normal confidence: 0.050".to_string()
        ]
    );
}

#[test]
fn test_no_anomalies_has_no_follow_ups() {
    let report = BatchAnalyzer::default()
        .analyze(&batch(0, 4), &detector(5_000.0))
        .unwrap();
    assert_eq!(report.recommendations.len(), 3);
    assert!(report.flagged_transactions.is_empty());
    assert_eq!(report.summary.anomalous_percentage, 0.0);
}

#[test]
fn test_zero_total_amount() {
    let zeros: Vec<Transaction> = (0..3).map(|_| tx(0.0)).collect();
    let report = BatchAnalyzer::default()
        .analyze(&zeros, &detector(-1.0))
        .unwrap();
    assert_eq!(report.summary.anomalies_detected, 3);
    assert_eq!(report.summary.total_amount_analyzed, 0.0);
    assert_eq!(report.summary.anomalous_percentage, 0.0);
    assert_eq!(report.summary.risk_level, RiskTier::High);
    assert!(report.recommendations[0].starts_with("URGENT"));
}

#[test]
fn test_rejected_rows_stay_index_aligned() {
    let mut txs = batch(1, 5);
    txs[1].department_id = 0;
    txs[3].amount = -50.0;

    let report = BatchAnalyzer::default()
        .analyze(&txs, &detector(5_000.0))
        .unwrap();

    assert_eq!(report.individual_results.len(), 5);
    for (i, r) in report.individual_results.iter().enumerate() {
        assert_eq!(r.transaction_index, i);
    }

    let rejected = &report.individual_results[1];
    assert!(rejected.is_rejected());
    assert!(!rejected.is_anomaly);
    assert_eq!(rejected.anomaly_score, 0.0);
    assert_eq!(rejected.reasons.len(), 1);
    assert!(rejected.error.as_deref().unwrap().contains("department_id"));
    assert!(report.individual_results[3].error.as_deref().unwrap().contains("amount"));

    assert_eq!(report.summary.total_transactions, 5);
    assert_eq!(report.summary.scored_transactions, 3);
    assert_eq!(report.summary.rejected_transactions, 2);
    // 1 of 3 scored rows
    assert_eq!(report.summary.anomaly_rate_percent, 33.33);
    assert_eq!(report.summary.risk_level, RiskTier::High);
    assert_eq!(report.flagged_transactions[0].index, 0);
}

#[test]
fn test_empty_and_fully_rejected_batches() {
    let analyzer = BatchAnalyzer::default();
    let detector = detector(5_000.0);

    assert!(matches!(
        analyzer.analyze(&[], &detector),
        Err(AnomalyDetectionError::EmptyBatch)
    ));

    let mut bad = batch(0, 2);
    bad[0].vendor_name = "  ".to_string();
    bad[1].amount = f64::INFINITY;
    assert!(matches!(
        analyzer.analyze(&bad, &detector),
        Err(AnomalyDetectionError::EmptyBatch)
    ));
}

#[test]
fn test_custom_risk_rates() {
    let mut config = AnomalyDetectionConfig::default();
    config.analysis.medium_risk_rate = 0.0;
    config.analysis.high_risk_rate = 0.5;

    let report = BatchAnalyzer::new(&config)
        .analyze(&batch(1, 10), &detector(5_000.0))
        .unwrap();
    assert_eq!(report.summary.risk_level, RiskTier::Medium);
}

#[test]
fn test_report_json_shape() {
    let report = BatchAnalyzer::default()
        .analyze(&batch(1, 2), &detector(5_000.0))
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["summary"]["risk_level"], "HIGH");
    assert_eq!(json["summary"]["anomaly_rate_percent"], 50.0);
    assert!(json["individual_results"][0]["reasons"].is_array());
    assert!(json["individual_results"][0].get("error").is_none());
    assert_eq!(json["flagged_transactions"][0]["vendor"], "Acme Office");
}

#[test]
fn test_malformed_records_are_rejected_in_place() {
    let records: Vec<serde_json::Value> = serde_json::from_str(
        r#"[
            {"amount": 9000, "department_id": 1, "vendor_name": "Acme Office", "transaction_date": "2024-01-15"},
            {"amount": 200, "department_id": -2, "vendor_name": "Metro Print", "transaction_date": "2024-01-16"},
            {"amount": "abc", "department_id": 1, "vendor_name": "Acme Office", "transaction_date": "2024-01-16"},
            {"amount": 200, "department_id": 1, "vendor_name": "Acme Office", "transaction_date": "next tuesday"},
            "not a record",
            {"amount": 200, "department_id": 1, "vendor_name": "Acme Office", "transaction_date": "2024-01-17"}
        ]"#,
    )
    .unwrap();

    let report = BatchAnalyzer::default()
        .analyze_records(&records, &detector(5_000.0))
        .unwrap();

    assert_eq!(report.summary.total_transactions, 6);
    assert_eq!(report.summary.scored_transactions, 2);
    assert_eq!(report.summary.rejected_transactions, 4);
    assert_eq!(report.summary.anomalies_detected, 1);
    for (i, r) in report.individual_results.iter().enumerate() {
        assert_eq!(r.transaction_index, i);
    }

    let results = &report.individual_results;
    assert!(results[0].is_anomaly);
    assert!(results[1].error.as_deref().unwrap().contains("index 1: department_id"));
    assert_eq!(results[1].vendor_name, "Metro Print");
    assert_eq!(results[1].transaction_amount, 200.0);
    assert!(results[2].error.as_deref().unwrap().contains("index 2: amount"));
    assert_eq!(results[2].transaction_amount, 0.0);
    assert!(results[3].error.as_deref().unwrap().contains("index 3: transaction_date"));
    assert!(results[4].error.as_deref().unwrap().contains("index 4: record"));
    assert!(results[5].error.is_none());
    assert_eq!(report.flagged_transactions[0].index, 0);
}

#[test]
fn test_records_match_typed_analysis() {
    let txs = batch(2, 6);
    let records: Vec<serde_json::Value> = txs.iter().map(|tx| serde_json::to_value(tx).unwrap()).collect();
    let analyzer = BatchAnalyzer::default();
    let detector = detector(5_000.0);

    assert_eq!(
        analyzer.analyze_records(&records, &detector).unwrap(),
        analyzer.analyze(&txs, &detector).unwrap()
    );
}
