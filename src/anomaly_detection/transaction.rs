//! Budget transaction record
//!
//! The unit of analysis. Records arrive as JSON from the front end and are
//! never mutated after construction.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use super::errors::{AnomalyDetectionError, Result};

/// A single budget transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Amount in currency units
    pub amount: f64,
    /// Owning department
    pub department_id: u32,
    /// Vendor as entered by the submitter
    pub vendor_name: String,
    /// Date, or date and time, of the transaction
    #[serde(with = "date_or_datetime")]
    pub transaction_date: NaiveDateTime,
    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Transaction {
    /// Create a transaction dated at midnight of `date`
    pub fn new(amount: f64, department_id: u32, vendor_name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            amount,
            department_id,
            vendor_name: vendor_name.into(),
            transaction_date: date.and_time(chrono::NaiveTime::MIN),
            description: None,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the timestamp (keeps everything else)
    pub fn at(mut self, timestamp: NaiveDateTime) -> Self {
        self.transaction_date = timestamp;
        self
    }

    /// Saturday or Sunday
    pub fn is_weekend(&self) -> bool {
        matches!(self.transaction_date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Check that the amount is usable as a feature.
    pub fn validate_amount(&self, index: usize) -> Result<()> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(AnomalyDetectionError::invalid(
                index,
                "amount",
                format!("must be finite and non-negative, got {}", self.amount),
            ));
        }
        Ok(())
    }

    /// Full record validation, `index` is the row position in its batch.
    pub fn validate(&self, index: usize) -> Result<()> {
        self.validate_amount(index)?;

        if self.department_id == 0 {
            return Err(AnomalyDetectionError::invalid(
                index,
                "department_id",
                "must be a positive integer",
            ));
        }

        if self.vendor_name.trim().is_empty() {
            return Err(AnomalyDetectionError::invalid(index, "vendor_name", "must not be empty"));
        }

        Ok(())
    }

    /// Parse one JSON record, `index` being its position in the input list.
    ///
    /// Type errors name the offending field. Range checks are left to
    /// `validate`.
    pub fn from_json_value(value: &serde_json::Value, index: usize) -> Result<Self> {
        let record = value
            .as_object()
            .ok_or_else(|| AnomalyDetectionError::invalid(index, "record", "must be a JSON object"))?;

        let amount = match record.get("amount") {
            Some(v) => v.as_f64().ok_or_else(|| {
                AnomalyDetectionError::invalid(index, "amount", format!("must be a number, got {}", v))
            })?,
            None => return Err(AnomalyDetectionError::invalid(index, "amount", "is missing")),
        };

        let department_id = match record.get("department_id") {
            Some(v) => v
                .as_u64()
                .and_then(|id| u32::try_from(id).ok())
                .ok_or_else(|| {
                    AnomalyDetectionError::invalid(
                        index,
                        "department_id",
                        format!("must be a positive integer, got {}", v),
                    )
                })?,
            None => return Err(AnomalyDetectionError::invalid(index, "department_id", "is missing")),
        };

        let vendor_name = match record.get("vendor_name") {
            Some(v) => v
                .as_str()
                .ok_or_else(|| {
                    AnomalyDetectionError::invalid(index, "vendor_name", format!("must be a string, got {}", v))
                })?
                .to_string(),
            None => return Err(AnomalyDetectionError::invalid(index, "vendor_name", "is missing")),
        };

        let transaction_date = match record.get("transaction_date") {
            Some(v) => v
                .as_str()
                .and_then(|raw| date_or_datetime::parse(raw.trim()))
                .ok_or_else(|| {
                    AnomalyDetectionError::invalid(
                        index,
                        "transaction_date",
                        format!("must be YYYY-MM-DD or an ISO-8601 date-time, got {}", v),
                    )
                })?,
            None => return Err(AnomalyDetectionError::invalid(index, "transaction_date", "is missing")),
        };

        let description = match record.get("description") {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => Some(
                v.as_str()
                    .ok_or_else(|| {
                        AnomalyDetectionError::invalid(index, "description", format!("must be a string, got {}", v))
                    })?
                    .to_string(),
            ),
        };

        Ok(Self {
            amount,
            department_id,
            vendor_name,
            transaction_date,
            description,
        })
    }
}

/// Accepts `YYYY-MM-DD` as well as full ISO-8601 date-times.
mod date_or_datetime {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format("%Y-%m-%dT%H:%M:%S").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(raw.trim())
            .ok_or_else(|| de::Error::custom(format!("invalid transaction_date: {:?}", raw)))
    }

    pub(super) fn parse(raw: &str) -> Option<NaiveDateTime> {
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(date.and_time(NaiveTime::MIN));
        }
        // Strip a trailing UTC designator; offsets are not interpreted.
        let raw = raw.strip_suffix('Z').unwrap_or(raw);
        DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    }
}
