//! Integration tests for configuration parsing and handling.
//!
//! These tests verify that benchmark configurations load from disk, resolve
//! attribute catalogs and reject invalid settings.

use abac_bench::engine::*;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Test minimal configuration
#[test]
fn test_config_minimal() {
    let config = BenchConfig::from_toml_str("").expect("Failed to parse config");

    assert_eq!(config.ycsb.record_count, 1000);
    assert_eq!(config.ycsb.payload_size, 1000);
    assert_eq!(config.run.concurrency, 1);
    assert_eq!(config.run.run_for_secs, 60);
    assert!(!config.abac.enabled);
    assert_eq!(config.tag_column(), None);
    assert_eq!(config.table(), TableRef::new("ycsb", "usertable"));
}

/// Test full configuration with all options
#[test]
fn test_config_full() {
    let config_str = r#"
        [ycsb]
        record_count = 5000
        payload_size = 64
        load_concurrency = 4
        load_batch_size = 50
        ops_per_tx = 4
        user_count = 8
        namespace = "bench"
        table = "rows"

        [run]
        concurrency = 16
        run_for_secs = 30
        max_retries = 50
        allow_admin_fallback = true
        session_assignment = "worker_index"
        seed = 42

        [abac]
        enabled = true
        attribute_type = "compartment"
        attribute_values = "HR, Sales"
        strategy = "random"
        policy_name = "bench_policy"
        tag_column = "label"
        provision_order = "before_load"
        levels = ["public", "secret"]
        groups = ["team_a"]
    "#;

    let config = BenchConfig::from_toml_str(config_str).expect("Failed to parse config");

    assert_eq!(config.table(), TableRef::new("bench", "rows"));
    assert_eq!(config.effective_user_count(), 8);
    assert_eq!(config.run.retry_cap(), Some(50));
    assert_eq!(config.run.session_assignment, SessionAssignment::WorkerIndex);
    assert_eq!(config.abac.attribute_type, AttributeType::Compartment);
    assert_eq!(config.abac.provision_order, ProvisionOrder::BeforeLoad);
    assert_eq!(config.tag_column(), Some("label"));

    let catalog = config.abac.catalog();
    assert_eq!(catalog.levels, vec!["public", "secret"]);
    assert_eq!(catalog.compartments, vec!["hr", "sales"]);
    assert_eq!(catalog.groups, vec!["team_a"]);
}

/// Test per-type defaults when no values are configured
#[test]
fn test_config_default_catalog() {
    let config = BenchConfig::from_toml_str("[abac]\nenabled = true\nattribute_type = \"group\"\n").unwrap();
    let catalog = config.abac.catalog();

    assert_eq!(catalog.levels, vec!["public"]);
    assert!(catalog.compartments.is_empty());
    assert_eq!(catalog.groups, vec!["team_a", "team_b", "team_c"]);
}

/// Test that the file round trip preserves every section
#[test]
fn test_config_save_and_load() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bench.toml");

    let mut config = BenchConfig::default();
    config.ycsb.record_count = 77;
    config.run.max_invocations = Some(3);
    config.abac.enabled = true;
    config.abac.attribute_values = "public,secret".into();
    config.save(&path).unwrap();

    let loaded = BenchConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

/// Test rejected configurations
#[test]
fn test_config_invalid() {
    let cases = [
        "[ycsb]\nrecord_count = 0\n",
        "[ycsb]\nops_per_tx = 0\n",
        "[run]\nconcurrency = 0\n",
        "[run]\nrun_for_secs = 0\n",
        "[abac]\nenabled = true\nattribute_values = \"public,public\"\n",
        "[abac]\nenabled = true\nattribute_values = \"pu:blic\"\n",
        "[abac]\nenabled = true\nattribute_type = \"color\"\n",
        "[abac]\nstrategy = \"round_robin\"\n",
    ];

    for case in cases {
        let err = BenchConfig::from_toml_str(case).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration, "accepted: {}", case);
    }
}

/// Test a missing configuration file
#[test]
fn test_config_missing_file() {
    let temp = TempDir::new().unwrap();
    let err = BenchConfig::load(&temp.path().join("absent.toml")).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidConfiguration);
}
