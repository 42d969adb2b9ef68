//! Integration tests for the abac-bench CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SMALL_ABAC_CONFIG: &str = r#"
[ycsb]
record_count = 40
payload_size = 8
load_concurrency = 2
user_count = 2

[run]
concurrency = 2
run_for_secs = 0
max_invocations = 5
seed = 1

[abac]
enabled = true
attribute_values = "public,secret"
strategy = "load_balanced"
"#;

/// Get the abac-bench binary
#[allow(deprecated)]
fn bench_cmd() -> Command {
    Command::cargo_bin("abac-bench").unwrap()
}

fn write_config(dir: &Path, content: &str) -> String {
    let path = dir.join("bench.toml");
    fs::write(&path, content).unwrap();
    path.display().to_string()
}

#[test]
fn test_help_command() {
    bench_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Attribute-based access control benchmark"))
        .stdout(predicate::str::contains("Usage: abac-bench"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("load"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_version_command() {
    bench_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("Version"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_run_help() {
    bench_cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--duration"))
        .stdout(predicate::str::contains("--concurrency"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_init_writes_loadable_config() {
    let temp = TempDir::new().unwrap();

    bench_cmd()
        .args(["init", "--abac"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("abac-bench.toml"));

    let content = fs::read_to_string(temp.path().join("abac-bench.toml")).unwrap();
    assert!(content.contains("[abac]"));
    assert!(content.contains("enabled = true"));
    assert!(content.contains("public,confidential,secret"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp = TempDir::new().unwrap();
    bench_cmd().arg("init").arg(temp.path()).assert().success();

    bench_cmd()
        .arg("init")
        .arg(temp.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("already exists"));

    bench_cmd().args(["init", "--force"]).arg(temp.path()).assert().success();
}

#[test]
fn test_load_prints_summary() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), SMALL_ABAC_CONFIG);

    bench_cmd()
        .args(["load", "--config", &config])
        .assert()
        .success()
        .stdout(predicate::str::contains("Records loaded"))
        .stdout(predicate::str::contains("40"))
        .stdout(predicate::str::contains("Provisioning"));
}

#[test]
fn test_run_prints_report() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), SMALL_ABAC_CONFIG);

    bench_cmd()
        .args(["run", "--config", &config])
        .assert()
        .success()
        .stdout(predicate::str::contains("==== Statistics Summary ===="))
        .stdout(predicate::str::contains("Succeeded operations: 10"))
        .stdout(predicate::str::contains("==== ABAC Authorization Summary ===="));
}

#[test]
fn test_run_json_output() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), SMALL_ABAC_CONFIG);

    let output = bench_cmd()
        .args(["run", "--json", "--concurrency", "1", "--config", &config])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["load"]["records_loaded"], 40);
    assert_eq!(json["report"]["succeeded"], 5);
    assert_eq!(json["report"]["workers"], 1);
    assert_eq!(json["report"]["abac"]["total_operations"], 10);
}

#[test]
fn test_run_missing_config() {
    let temp = TempDir::new().unwrap();

    bench_cmd()
        .args(["run", "--config"])
        .arg(temp.path().join("missing.toml"))
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_run_rejects_invalid_config() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "[ycsb]\nops_per_tx = 0\n");

    bench_cmd()
        .args(["run", "--config", &config])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("ops_per_tx"));
}

#[test]
fn test_run_rejects_invalid_override() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), SMALL_ABAC_CONFIG);

    bench_cmd()
        .args(["run", "--concurrency", "0", "--config", &config])
        .assert()
        .failure()
        .code(2);
}
