use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_budget-anomaly"))
        .args(args)
        .env("RUST_LOG", "warn")
        .env_remove("ANOMALY_MAX_BATCH_SIZE")
        .output()
        .expect("failed to spawn budget-anomaly")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

fn write_demo(dir: &Path) -> String {
    let demo = stdout_json(&run(&["demo"]));
    let path = dir.join("batch.json");
    std::fs::write(&path, demo.to_string()).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn demo_prints_five_transactions() {
    let demo = stdout_json(&run(&["demo"]));
    assert_eq!(demo.as_array().unwrap().len(), 5);
    assert_eq!(demo[1]["vendor_name"], "Suspicious Vendor LLC");
}

#[test]
fn train_then_analyze() {
    let dir = tempdir().unwrap();
    let batch = write_demo(dir.path());
    let model = dir.path().join("models").join("model.json");
    let model = model.to_string_lossy();

    let train = run(&["train", "--sample", "--output", &model]);
    assert!(train.status.success(), "{}", String::from_utf8_lossy(&train.stderr));

    let report = stdout_json(&run(&["analyze", "--model", &model, "--input", &batch]));
    assert_eq!(report["summary"]["total_transactions"], 5);
    assert_eq!(report["individual_results"].as_array().unwrap().len(), 5);
    assert!(report["recommendations"].as_array().unwrap().len() >= 3);
}

#[test]
fn analyze_without_model_uses_default() {
    let dir = tempdir().unwrap();
    let batch = write_demo(dir.path());
    let report = stdout_json(&run(&["analyze", "--input", &batch]));
    assert_eq!(report["summary"]["scored_transactions"], 5);
}

#[test]
fn stats_reports_totals() {
    let dir = tempdir().unwrap();
    let batch = write_demo(dir.path());
    let stats = stdout_json(&run(&["stats", "--input", &batch]));
    assert_eq!(stats["total_transactions"], 5);
    assert_eq!(stats["max_amount"], 95000.0);
}

#[test]
fn oversized_batch_is_refused() {
    let dir = tempdir().unwrap();
    let batch = write_demo(dir.path());
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"analysis": {"max_batch_size": 2}}"#).unwrap();

    let output = run(&["analyze", "--input", &batch, "--config", &config.to_string_lossy()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("exceeds the maximum of 2"));
}

#[test]
fn analyze_keeps_good_rows_around_malformed_ones() {
    let dir = tempdir().unwrap();
    let batch = dir.path().join("mixed.json");
    std::fs::write(
        &batch,
        r#"[
            {"amount": 1500.0, "department_id": 1, "vendor_name": "Office Supplies Inc", "transaction_date": "2024-01-15"},
            {"amount": 800.0, "department_id": -2, "vendor_name": "Regular Services Co", "transaction_date": "2024-01-17"},
            {"amount": "abc", "department_id": 1, "vendor_name": "Coffee & Snacks Ltd", "transaction_date": "2024-01-18"}
        ]"#,
    )
    .unwrap();

    let report = stdout_json(&run(&["analyze", "--input", &batch.to_string_lossy()]));
    assert_eq!(report["summary"]["total_transactions"], 3);
    assert_eq!(report["summary"]["scored_transactions"], 1);
    assert_eq!(report["summary"]["rejected_transactions"], 2);

    let results = report["individual_results"].as_array().unwrap();
    assert!(results[0].get("error").is_none());
    assert!(results[1]["error"].as_str().unwrap().contains("department_id"));
    assert!(results[2]["error"].as_str().unwrap().contains("amount"));
}

#[test]
fn analyze_refuses_non_array_input() {
    let dir = tempdir().unwrap();
    let batch = dir.path().join("object.json");
    std::fs::write(&batch, r#"{"amount": 1}"#).unwrap();

    let output = run(&["analyze", "--input", &batch.to_string_lossy()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("must contain a JSON array"));
}
