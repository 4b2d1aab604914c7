//! Reason engine
//!
//! Rule cascade that explains a scored transaction in plain language. Rules
//! run in a fixed priority order and every matching rule appends one reason.

use serde::{Deserialize, Serialize};

use super::errors::{AnomalyDetectionError, Result};
use super::transaction::Transaction;

/// Business thresholds for the reason cascade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonThresholds {
    /// Amount above which a transaction is "extremely high"
    pub extreme_amount: f64,
    /// Amount above which a transaction is "unusually high"
    pub high_amount: f64,
    /// Case-insensitive vendor name fragments that look suspicious
    pub suspicious_vendor_terms: Vec<String>,
    /// Score below which the pattern is "extremely unusual"
    pub extreme_score: f64,
    /// Score below which the pattern is "highly unusual"
    pub high_score: f64,
    /// Score below which the pattern is "moderately unusual"
    pub moderate_score: f64,
    /// Department ids above this are unusual
    pub max_regular_department_id: u32,
    /// |score| below which a normal transaction is "very typical"
    pub very_typical_confidence: f64,
    /// |score| below which a normal transaction is "standard"
    pub standard_confidence: f64,
}

impl Default for ReasonThresholds {
    fn default() -> Self {
        Self {
            extreme_amount: 50_000.0,
            high_amount: 10_000.0,
            suspicious_vendor_terms: ["suspicious", "unknown", "temp", "test", "fake"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            extreme_score: -0.8,
            high_score: -0.5,
            moderate_score: -0.2,
            max_regular_department_id: 10,
            very_typical_confidence: 0.1,
            standard_confidence: 0.3,
        }
    }
}

impl ReasonThresholds {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(AnomalyDetectionError::Configuration(msg.to_string()));

        if !(self.high_amount > 0.0 && self.extreme_amount >= self.high_amount) {
            return fail("Amount thresholds must satisfy 0 < high_amount <= extreme_amount");
        }
        if !(self.extreme_score <= self.high_score && self.high_score <= self.moderate_score) {
            return fail("Score bands must satisfy extreme <= high <= moderate");
        }
        if !(self.very_typical_confidence <= self.standard_confidence) {
            return fail("Confidence bands must satisfy very_typical <= standard");
        }
        if self.suspicious_vendor_terms.iter().any(|t| t.trim().is_empty()) {
            return fail("Suspicious vendor terms must not be blank");
        }
        Ok(())
    }
}

/// Ordered, non-empty list of reasons for one scored transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Explanation(Vec<String>);

impl Explanation {
    /// First (highest priority) reason
    pub fn primary(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("Unknown")
    }

    pub fn reasons(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, fragment: &str) -> bool {
        self.0.iter().any(|r| r.contains(fragment))
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    pub(crate) fn single(reason: String) -> Self {
        Self(vec![reason])
    }
}

/// Reason engine
#[derive(Debug, Clone)]
pub struct ReasonEngine {
    thresholds: ReasonThresholds,
    /// Lower-cased once so matching does not re-allocate per call
    suspicious_terms: Vec<String>,
}

impl ReasonEngine {
    pub fn new(thresholds: ReasonThresholds) -> Self {
        let suspicious_terms = thresholds
            .suspicious_vendor_terms
            .iter()
            .map(|t| t.to_lowercase())
            .collect();
        Self {
            thresholds,
            suspicious_terms,
        }
    }

    pub fn thresholds(&self) -> &ReasonThresholds {
        &self.thresholds
    }

    /// Explain one scored transaction.
    ///
    /// Normal transactions only get a confidence band and value; anomalous
    /// ones run the full cascade and always end with the confidence value.
    pub fn explain(&self, tx: &Transaction, score: f64, is_anomaly: bool) -> Explanation {
        let confidence = score.abs();
        let t = &self.thresholds;

        if !is_anomaly {
            let band = if confidence < t.very_typical_confidence {
                "Transaction pattern is very typical"
            } else if confidence < t.standard_confidence {
                "Transaction appears normal with standard patterns"
            } else {
                "Transaction is within normal ranges"
            };
            return Explanation(vec![
                band.to_string(),
                format!("Normal confidence: {:.3}", confidence),
            ]);
        }

        let mut reasons = Vec::new();

        // Rule 1: amount
        if tx.amount > t.extreme_amount {
            reasons.push(format!(
                "Extremely high transaction amount (>{})",
                format_amount(t.extreme_amount)
            ));
        } else if tx.amount > t.high_amount {
            reasons.push(format!(
                "Unusually high transaction amount (>{})",
                format_amount(t.high_amount)
            ));
        }

        // Rule 2: vendor name
        if self.is_suspicious_vendor(&tx.vendor_name) {
            reasons.push("Vendor name contains suspicious keywords".to_string());
        }

        // Rule 3: score band
        if score < t.extreme_score {
            reasons.push("Extremely unusual transaction pattern".to_string());
        } else if score < t.high_score {
            reasons.push("Highly unusual transaction pattern".to_string());
        } else if score < t.moderate_score {
            reasons.push("Moderately unusual transaction pattern".to_string());
        }

        // Rule 4: calendar
        if tx.is_weekend() {
            reasons.push("Transaction occurred on weekend".to_string());
        }

        // Rule 5: department
        if tx.department_id > t.max_regular_department_id {
            reasons.push("Unusual department ID".to_string());
        }

        reasons.push(format!("Anomaly confidence: {:.3}", confidence));
        Explanation(reasons)
    }

    fn is_suspicious_vendor(&self, vendor: &str) -> bool {
        let vendor = vendor.to_lowercase();
        self.suspicious_terms.iter().any(|term| vendor.contains(term.as_str()))
    }
}

impl Default for ReasonEngine {
    fn default() -> Self {
        Self::new(ReasonThresholds::default())
    }
}

/// `50000.0` -> `$50K`, `2500.0` -> `$2500`
fn format_amount(amount: f64) -> String {
    if amount >= 1000.0 && amount % 1000.0 == 0.0 {
        format!("${}K", amount / 1000.0)
    } else {
        format!("${}", amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tx(amount: f64, dept: u32, vendor: &str, day: u32) -> Transaction {
        Transaction::new(amount, dept, vendor, NaiveDate::from_ymd_opt(2024, 1, day).unwrap())
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(50_000.0), "$50K");
        assert_eq!(format_amount(10_000.0), "$10K");
        assert_eq!(format_amount(2_500.0), "$2500");
    }

    #[test]
    fn test_normal_bands() {
        let engine = ReasonEngine::default();
        let t = tx(100.0, 1, "Office Supplies Inc", 15);

        let e = engine.explain(&t, 0.05, false);
        assert_eq!(e.reasons()[0], "Transaction pattern is very typical");
        assert_eq!(e.reasons()[1], "Normal confidence: 0.050");

        let e = engine.explain(&t, 0.2, false);
        assert_eq!(e.primary(), "Transaction appears normal with standard patterns");

        let e = engine.explain(&t, -0.45, false);
        assert_eq!(e.primary(), "Transaction is within normal ranges");
        assert_eq!(e.reasons()[1], "Normal confidence: 0.450");
    }

    #[test]
    fn test_normal_skips_rule_checks() {
        let engine = ReasonEngine::default();
        // Saturday, huge amount, suspicious vendor, odd department: still only two reasons
        let e = engine.explain(&tx(75_000.0, 42, "Fake Co", 20), 0.02, false);
        assert_eq!(e.len(), 2);
        assert!(!e.contains("weekend"));
    }

    #[test]
    fn test_anomaly_cascade_order() {
        let engine = ReasonEngine::default();
        // 2024-01-20 is a Saturday
        let e = engine.explain(&tx(75_000.0, 1, "Suspicious Vendor LLC", 20), -0.6, true);
        assert_eq!(
            e.reasons(),
            &[
                "Extremely high transaction amount (>$50K)".to_string(),
                "Vendor name contains suspicious keywords".to_string(),
                "Highly unusual transaction pattern".to_string(),
                "Transaction occurred on weekend".to_string(),
                "Anomaly confidence: 0.600".to_string(),
            ]
        );
    }

    #[test]
    fn test_anomaly_minimal() {
        let engine = ReasonEngine::default();
        let e = engine.explain(&tx(500.0, 1, "Regular Services Co", 15), -0.1, true);
        assert_eq!(e.reasons(), &["Anomaly confidence: 0.100".to_string()]);
    }

    #[test]
    fn test_score_bands_and_department() {
        let engine = ReasonEngine::default();
        let e = engine.explain(&tx(20_000.0, 11, "Acme", 15), -0.9, true);
        assert!(e.contains("Unusually high transaction amount (>$10K)"));
        assert!(e.contains("Extremely unusual transaction pattern"));
        assert!(e.contains("Unusual department ID"));

        let e = engine.explain(&tx(100.0, 10, "Acme", 15), -0.3, true);
        assert!(e.contains("Moderately unusual transaction pattern"));
        assert!(!e.contains("Unusual department ID"));
    }

    #[test]
    fn test_custom_thresholds() {
        let engine = ReasonEngine::new(ReasonThresholds {
            high_amount: 500.0,
            extreme_amount: 2_500.0,
            suspicious_vendor_terms: vec!["SHELL".into()],
            ..ReasonThresholds::default()
        });
        let e = engine.explain(&tx(3_000.0, 1, "Seashell Holdings", 15), 0.0, true);
        assert_eq!(e.primary(), "Extremely high transaction amount (>$2500)");
        assert!(e.contains("suspicious keywords"));
    }
}
