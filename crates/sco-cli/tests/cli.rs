//! Integration tests for the `sco` binary

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// One line, limit 100, reference flow 90, sensitivity 0.5 to a ±500 HVDC.
const SINGLE_LINE: &str = r#"{
  "sensi": {
    "branch": {
      "LINE_1": {
        "N": { "referenceCurrent": 90.0, "HVDC_1": 0.5 }
      }
    }
  },
  "quads": { "LINE_1": { "permanent_limit": 100.0 } },
  "elemVars": {
    "hvdc": { "HVDC_1": { "min": -500.0, "max": 500.0, "referenceSetpoint": 0.0 } }
  }
}"#;

fn write_document(dir: &Path) -> PathBuf {
    let path = dir.join("document.json");
    fs::write(&path, SINGLE_LINE).unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    let mut cmd = cargo_bin_cmd!("sco");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("optimize"))
        .stdout(predicate::str::contains("inspect"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_optimize_writes_outputs() {
    let dir = tempdir().unwrap();
    let input = write_document(dir.path());
    let out = dir.path().join("scenarios.json");
    let flows = dir.path().join("flows.json");
    let csv = dir.path().join("sweep.csv");

    let mut cmd = cargo_bin_cmd!("sco");
    cmd.args(["--log-level", "warn", "optimize"])
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .arg("--flows")
        .arg(&flows)
        .arg("--csv")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("all contingencies secured"))
        .stdout(predicate::str::contains("max_margin"));

    let scenarios: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    let margin = scenarios["max_margin"]["minimumMargin"].as_f64().unwrap();
    assert!((margin - 100.0).abs() < 1e-3, "margin {margin}");
    assert!(scenarios.get("min_HVDC_1").is_some());

    let flows: Value = serde_json::from_str(&fs::read_to_string(&flows).unwrap()).unwrap();
    let flow = flows["N"]["LINE_1"].as_f64().unwrap();
    assert!(flow.abs() < 1e-3, "flow {flow}");

    let table = fs::read_to_string(&csv).unwrap();
    assert!(table.starts_with("label,objective,minimum_margin,HVDC_1"));
}

#[test]
fn test_ist_margin_flag_scales_limits() {
    let dir = tempdir().unwrap();
    let input = write_document(dir.path());
    let out = dir.path().join("scenarios.json");

    let mut cmd = cargo_bin_cmd!("sco");
    cmd.args(["--log-level", "warn", "optimize"])
        .arg(&input)
        .args(["--ist-margin", "0.5", "--out"])
        .arg(&out)
        .assert()
        .success();

    let scenarios: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    let margin = scenarios["max_margin"]["minimumMargin"].as_f64().unwrap();
    assert!((margin - 50.0).abs() < 1e-3, "margin {margin}");
}

#[test]
fn test_restore_only_reports_outcome() {
    let dir = tempdir().unwrap();
    let input = write_document(dir.path());
    let report = dir.path().join("restoration.json");

    let mut cmd = cargo_bin_cmd!("sco");
    cmd.args(["--log-level", "warn", "optimize"])
        .arg(&input)
        .arg("--restore-only")
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("Outcome: Satisfied"));

    let json: Value = serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["outcome"], "satisfied");
}

#[test]
fn test_unknown_element_selection_fails() {
    let dir = tempdir().unwrap();
    let input = write_document(dir.path());

    let mut cmd = cargo_bin_cmd!("sco");
    cmd.args(["--log-level", "warn", "optimize"])
        .arg(&input)
        .args(["--hvdc", "HVDC_NOPE"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("HVDC_NOPE"));
}

#[test]
fn test_missing_document_names_the_path() {
    let mut cmd = cargo_bin_cmd!("sco");
    cmd.args(["optimize", "/nonexistent/document.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("document.json"));
}

#[test]
fn test_inspect_json() {
    let dir = tempdir().unwrap();
    let input = write_document(dir.path());

    let mut cmd = cargo_bin_cmd!("sco");
    let output = cmd
        .args(["--log-level", "warn", "inspect"])
        .arg(&input)
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["stats"]["hvdcs"], 1);
    assert_eq!(json["stats"]["sensitivity_entries"], 2);
    assert_eq!(json["constrained_pairs"], 1);
}

#[test]
fn test_inspect_plain_table() {
    let dir = tempdir().unwrap();
    let input = write_document(dir.path());

    let mut cmd = cargo_bin_cmd!("sco");
    cmd.arg("inspect")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("constrained pairs"));
}

#[test]
fn test_completions_to_file() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("completions").join("sco.bash");

    let mut cmd = cargo_bin_cmd!("sco");
    cmd.args(["completions", "bash", "--out"])
        .arg(&out)
        .assert()
        .success();
    assert!(fs::read_to_string(&out).unwrap().contains("sco"));
}

/// `HVDC_BAD` has its reference setpoint outside its own range.
const REJECTED_HVDC: &str = r#"{
  "sensi": { "L": { "N": { "referenceCurrent": 120.0, "HVDC_BAD": 0.5 } } },
  "quads": { "L": { "permanent_limit": 100.0 } },
  "elemVars": {
    "hvdc": { "HVDC_BAD": { "min": -500.0, "max": 500.0, "referenceSetpoint": 600.0 } }
  }
}"#;

#[test]
fn test_optimize_refuses_rejected_elements() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("document.json");
    fs::write(&input, REJECTED_HVDC).unwrap();
    let out = dir.path().join("scenarios.json");

    let mut cmd = cargo_bin_cmd!("sco");
    cmd.args(["--log-level", "warn", "optimize"])
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid definition"))
        .stderr(predicate::str::contains("HVDC_BAD"));
    assert!(!out.exists());
}

#[test]
fn test_inspect_reports_then_fails_on_rejected_elements() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("document.json");
    fs::write(&input, REJECTED_HVDC).unwrap();

    let mut cmd = cargo_bin_cmd!("sco");
    let output = cmd
        .args(["--log-level", "warn", "inspect"])
        .arg(&input)
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["stats"]["hvdcs"], 0);
    assert!(String::from_utf8_lossy(&output.stderr).contains("HVDC_BAD"));
}
