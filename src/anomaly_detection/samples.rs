//! Bundled sample data
//!
//! A demo batch for trying the pipeline and a bootstrap training set used to
//! build a default model when no snapshot is supplied.

use chrono::{Duration, NaiveDate};

use super::transaction::Transaction;

const REGULAR_VENDORS: [&str; 6] = [
    "Office Supplies Inc",
    "Regular Services Co",
    "Coffee & Snacks Ltd",
    "Campus Facilities Group",
    "Metro Print Shop",
    "Northside IT Solutions",
];

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    // Literal calendar dates below are all valid.
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// Five-row demo batch: three routine purchases and two large ones
pub fn demo_transactions() -> Vec<Transaction> {
    vec![
        Transaction::new(1500.0, 1, "Office Supplies Inc", date(2024, 1, 15))
            .with_description("Monthly office supplies purchase"),
        Transaction::new(75_000.0, 1, "Suspicious Vendor LLC", date(2024, 1, 16))
            .with_description("Large equipment purchase - FLAGGED"),
        Transaction::new(800.0, 2, "Regular Services Co", date(2024, 1, 17))
            .with_description("Monthly maintenance service"),
        Transaction::new(250.0, 1, "Coffee & Snacks Ltd", date(2024, 1, 18))
            .with_description("Office refreshments"),
        Transaction::new(95_000.0, 3, "Unknown Contractor", date(2024, 1, 19))
            .with_description("Emergency construction work - REVIEW NEEDED"),
    ]
}

/// Deterministic bootstrap training set
///
/// Weekday, business-hours purchases between 100 and 1,980 across five
/// departments, plus three large off-hours payments.
pub fn training_transactions() -> Vec<Transaction> {
    // 2024-01-01 is a Monday
    let monday = date(2024, 1, 1);
    let mut txs: Vec<Transaction> = (0..45u32)
        .map(|i| {
            let day = monday + Duration::days(i64::from((i / 5) * 7 + i % 5));
            let hour = 9 + i % 8;
            let amount = 100.0 + f64::from((i * 37) % 48) * 40.0;
            let vendor = REGULAR_VENDORS[(i as usize) % REGULAR_VENDORS.len()];
            Transaction::new(amount, 1 + i % 5, vendor, day)
                .at(day.and_hms_opt(hour, 0, 0).unwrap_or_default())
        })
        .collect();

    let odd_hours = [
        (50_000.0, 3, "Overseas Consulting Group", date(2024, 2, 3), 23),
        (90_000.0, 3, "Rapid Temp Staffing", date(2024, 2, 11), 2),
        (42_000.0, 12, "Harbor Logistics", date(2024, 2, 17), 1),
    ];
    for (amount, dept, vendor, day, hour) in odd_hours {
        txs.push(
            Transaction::new(amount, dept, vendor, day)
                .at(day.and_hms_opt(hour, 0, 0).unwrap_or_default()),
        );
    }
    txs
}
