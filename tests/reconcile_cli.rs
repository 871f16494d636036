//! E2E tests for the reconcile, validate, pools, transactions and schema commands

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn lotrecon(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lotrecon"))
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn read_json(path: &Path) -> Value {
    let data = fs::read_to_string(path).expect("missing output file");
    serde_json::from_str(&data).expect("invalid JSON")
}

/// Test that a run writes all three record sets in both formats plus a manifest
#[test]
fn reconcile_writes_every_output() {
    let out = tempfile::tempdir().unwrap();
    let out_dir = out.path().to_str().unwrap();
    let output = lotrecon(&[
        "reconcile",
        "-f",
        "tests/data/feed_2022.csv",
        "--out-dir",
        out_dir,
        "--run-date",
        "2022-12-31",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    for name in [
        "disposals_2022-12-31.json",
        "open_purchases_2022-12-31.json",
        "disposed_purchases_2022-12-31.json",
        "disposals_2022-12-31.csv",
        "open_purchases_2022-12-31.csv",
        "disposed_purchases_2022-12-31.csv",
        "manifest_2022-12-31.json",
    ] {
        assert!(out.path().join(name).exists(), "missing {}", name);
    }

    let disposals = read_json(&out.path().join("disposals_2022-12-31.json"));
    assert_eq!(disposals[0]["txn_id"], "s1");
    assert_eq!(disposals[0]["status"], "Reconciled");
    assert_eq!(disposals[0]["quantity_reconciled"], 3.0);
    let lots = disposals[0]["associated_purchases"].as_array().unwrap();
    assert_eq!(lots.len(), 2);
    assert_eq!(lots[0]["txn_id"], "b1");
    assert_eq!(lots[1]["txn_id"], "b2");

    let disposed = read_json(&out.path().join("disposed_purchases_2022-12-31.json"));
    assert_eq!(disposed.as_array().unwrap().len(), 1);
    assert_eq!(disposed[0]["txn_id"], "b1");

    let manifest = read_json(&out.path().join("manifest_2022-12-31.json"));
    assert_eq!(manifest["run_date"], "2022-12-31");
    assert_eq!(manifest["summary"]["reconciled"], 1);
    assert_eq!(manifest["sha256"].as_str().unwrap().len(), 64);
    assert_eq!(manifest["inputs"].as_array().unwrap().len(), 1);
    assert_eq!(manifest["by_year"][0]["year"], 2022);
    assert_eq!(manifest["by_year"][0]["summary"]["disposal_count"], 1);

    let csv = fs::read_to_string(out.path().join("disposals_2022-12-31.csv")).unwrap();
    assert!(csv.starts_with("symbol,quantity,price,proceeds,cost_basis,realized_gain,date,txn_id"));
}

/// Test that open lots from one run fund the next period's disposals
#[test]
fn carry_forward_funds_next_period() {
    let out = tempfile::tempdir().unwrap();
    let first = out.path().join("2022");
    let second = out.path().join("2023");

    let output = lotrecon(&[
        "reconcile",
        "-f",
        "tests/data/feed_2022.csv",
        "--out-dir",
        first.to_str().unwrap(),
        "--run-date",
        "2022-12-31",
        "--format",
        "json",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(!first.join("disposals_2022-12-31.csv").exists());

    let carry = first.join("open_purchases_2022-12-31.json");
    let output = lotrecon(&[
        "reconcile",
        "-f",
        "tests/data/feed_2023.csv",
        "--carry-forward",
        carry.to_str().unwrap(),
        "--out-dir",
        second.to_str().unwrap(),
        "--run-date",
        "2023-12-31",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let disposals = read_json(&second.join("disposals_2023-12-31.json"));
    assert_eq!(disposals[0]["txn_id"], "s2");
    assert_eq!(disposals[0]["status"], "Reconciled");
    assert_eq!(disposals[0]["associated_purchases"][0]["txn_id"], "b2");
    assert_eq!(disposals[1]["txn_id"], "s3");
    assert_eq!(disposals[1]["status"], "Underfunded");

    let manifest = read_json(&second.join("manifest_2023-12-31.json"));
    assert_eq!(manifest["inputs"].as_array().unwrap().len(), 2);
    assert_eq!(manifest["warnings"][0]["type"], "UnderfundedDisposal");
}

/// Test that the year filter drops out-of-year purchases
#[test]
fn year_filter_excludes_other_years() {
    let out = tempfile::tempdir().unwrap();
    let output = lotrecon(&[
        "reconcile",
        "-f",
        "tests/data/feed_2022.csv",
        "-f",
        "tests/data/feed_2023.csv",
        "--year",
        "2023",
        "--out-dir",
        out.path().to_str().unwrap(),
        "--run-date",
        "2023-12-31",
        "--json",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let manifest: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(manifest["years"], serde_json::json!([2023]));
    assert_eq!(manifest["summary"]["disposal_count"], 2);
    assert_eq!(manifest["summary"]["underfunded"], 2);
    assert_eq!(manifest["summary"]["open_lots"], 0);
}

/// Test that a bad feed fails the run before any file is written
#[test]
fn duplicate_txn_id_fails_without_output() {
    let out = tempfile::tempdir().unwrap();
    let out_dir = out.path().join("reports");
    let output = lotrecon(&[
        "reconcile",
        "-f",
        "tests/data/feed_duplicate.csv",
        "--out-dir",
        out_dir.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("x1"), "unexpected stderr: {}", stderr);
    assert!(!out_dir.exists());
}

/// Test that validate flags a disposal dated before its only lot
#[test]
fn validate_flags_review_required() {
    let output = lotrecon(&["validate", "-f", "tests/data/feed_review.csv"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[ReviewRequired]"));
    assert!(stdout.contains("s1"));
}

/// Test that a disposal with no lots at all is labelled underfunded
#[test]
fn validate_labels_unfunded_disposal_underfunded() {
    let output = lotrecon(&["validate", "-f", "tests/data/feed_2023.csv"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[Underfunded]"));
}

#[test]
fn validate_clean_feed_succeeds() {
    let output = lotrecon(&["validate", "-f", "tests/data/feed_2022.csv", "--json"]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["issue_count"], 0);
    assert_eq!(json["years"], "All Years");
}

/// Test reading a raw exchange export through a source config
#[test]
fn pools_from_mapped_exchange_export() {
    let output = lotrecon(&[
        "pools",
        "-f",
        "tests/data/coinbase_fills.csv",
        "--source",
        "tests/data/coinbase_source.json",
        "--json",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    let lots = json["lots"].as_array().unwrap();
    assert_eq!(lots.len(), 1);
    assert_eq!(lots[0]["symbol"], "BTCUSD");
    assert_eq!(lots[0]["exchange"], "Coinbase Pro");
    assert_eq!(lots[0]["qty_disposed"], 0.2);
    assert_eq!(json["totals"][0]["lots"], 1);
}

#[test]
fn pools_disposed_filtered_by_symbol() {
    let output = lotrecon(&[
        "pools",
        "-f",
        "tests/data/feed_2022.csv",
        "--disposed",
        "--symbol",
        "BTCUSD",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DISPOSED LOTS"));
    assert!(stdout.contains("b1"));
    assert!(!stdout.contains("e1"));
}

#[test]
fn transactions_csv_in_fifo_order() {
    let output = lotrecon(&["transactions", "-f", "tests/data/feed_2022.csv", "--csv"]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let ids: Vec<&str> = stdout
        .lines()
        .skip(1)
        .map(|l| l.split(',').nth(8).unwrap())
        .collect();
    assert_eq!(ids, vec!["b1", "e1", "b2", "s1"]);
    assert!(stdout.starts_with(
        "date,kind,symbol,quantity,unit_cost,price,cost_basis,proceeds,txn_id,exchange"
    ));
}

#[test]
fn schema_csv_header() {
    let output = lotrecon(&["schema", "csv-header"]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "utc_time,symbol,side,price,quantity,txn_id,fee,exchange"
    );
}
