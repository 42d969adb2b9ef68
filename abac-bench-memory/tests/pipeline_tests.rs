//! Load and workload phases against the in-memory store.

use std::sync::Arc;

use abac_bench_core::harness::is_setup_error;
use abac_bench_core::store::{Connector, Credentials, Principal, Privilege, TableRef};
use abac_bench_core::{BenchConfig, ErrorCode, Harness};
use abac_bench_memory::{MemoryConfig, MemoryStore};
use pretty_assertions::assert_eq;

const ABAC_CONFIG: &str = r#"
[ycsb]
record_count = 100
payload_size = 16
load_concurrency = 4
load_batch_size = 10
user_count = 4

[run]
concurrency = 4
run_for_secs = 0
max_invocations = 25
session_assignment = "worker_index"
seed = 7

[abac]
enabled = true
attribute_type = "level"
attribute_values = "public,secret"
strategy = "load_balanced"
"#;

fn table() -> TableRef {
    TableRef::new("ycsb", "usertable")
}

fn config(toml: &str) -> BenchConfig {
    BenchConfig::from_toml_str(toml).unwrap()
}

fn harness(store: &MemoryStore, config: BenchConfig) -> Harness {
    Harness::new(config, Arc::new(store.clone())).unwrap()
}

#[tokio::test]
async fn test_load_tags_rows_and_creates_users() {
    let store = MemoryStore::new();
    let summary = harness(&store, config(ABAC_CONFIG)).load().await.unwrap();

    assert_eq!(summary.records_loaded, 100);
    assert_eq!(summary.users, 4);
    assert_eq!(store.row_count(&table()), Some(100));
    assert_eq!(store.row(&table(), 10).unwrap().tag.as_deref(), Some("public::"));
    assert_eq!(store.row(&table(), 11).unwrap().tag.as_deref(), Some("secret::"));
    assert_eq!(store.row(&table(), 0).unwrap().payload.len(), 16);

    for i in 0..4 {
        let name = format!("user{}", i);
        assert!(store.has_user(&name));
        assert!(store.has_privilege(&name, &table(), Privilege::Read));
        assert!(store.has_privilege(&name, &table(), Privilege::Write));
    }

    let provision = summary.provision.unwrap();
    assert!(provision.policy_created);
    assert!(provision.table_policy_created);
    assert_eq!(provision.assignments.len(), 4);
    assert_eq!(provision.assignments[0].level, "public");
    assert_eq!(provision.assignments[1].level, "secret");
    assert!(store.is_enforced(&table()));
}

#[tokio::test]
async fn test_user_sessions_see_only_dominated_rows() {
    let store = MemoryStore::new();
    harness(&store, config(ABAC_CONFIG)).load().await.unwrap();

    let public = store.connect(&Credentials::simulated(0)).await.unwrap();
    let mut tx = public.begin().await.unwrap();
    assert!(tx.get(&table(), 10).await.unwrap().is_some());
    assert!(tx.get(&table(), 11).await.unwrap().is_none());
    tx.commit().await.unwrap();

    let secret = store.connect(&Credentials::simulated(1)).await.unwrap();
    let mut tx = secret.begin().await.unwrap();
    assert!(tx.get(&table(), 10).await.unwrap().is_some());
    assert!(tx.get(&table(), 11).await.unwrap().is_some());
    tx.commit().await.unwrap();

    let admin = store.admin_session().await.unwrap();
    let mut tx = admin.begin().await.unwrap();
    assert!(tx.get(&table(), 11).await.unwrap().is_some());
}

#[tokio::test]
async fn test_provisioning_is_idempotent() {
    let store = MemoryStore::new();
    let harness = harness(&store, config(ABAC_CONFIG));

    harness.load().await.unwrap();
    let counts = store.creation_counts();

    let second = harness.load().await.unwrap();
    let provision = second.provision.unwrap();
    assert!(!provision.policy_created);
    assert!(!provision.table_policy_created);
    assert_eq!(provision.attributes_created, 0);
    assert!(provision.failures.is_empty());
    assert_eq!(store.creation_counts(), counts);
    assert_eq!(store.row_count(&table()), Some(100));
}

#[tokio::test]
async fn test_provision_before_load_order() {
    let store = MemoryStore::new();
    let toml = format!("{}provision_order = \"before_load\"\n", ABAC_CONFIG);
    let summary = harness(&store, config(&toml)).load().await.unwrap();

    assert_eq!(summary.provision.unwrap().assignments.len(), 4);
    assert_eq!(store.user_label("ycsb_benchmark_policy", "user1").and_then(|l| l.level), Some("secret".to_string()));
}

#[tokio::test]
async fn test_workload_counts_every_read() {
    let store = MemoryStore::new();
    let run = harness(&store, config(ABAC_CONFIG)).run().await.unwrap();
    let report = run.report;

    assert_eq!(report.succeeded, 100);
    assert_eq!(report.failed, 0);
    assert_eq!(report.retries, 0);
    assert!(report.worker_failures.is_empty());

    let abac = report.abac.unwrap();
    assert_eq!(abac.user_count, 4);
    assert_eq!(abac.total_operations, 200);
    assert_eq!(abac.authorization_success + abac.authorization_failure, 200);
    assert!(abac.authorization_success > 0);
    assert!(abac.success_rate_percent.is_some());
}

#[tokio::test]
async fn test_workload_retries_injected_conflicts() {
    let store = MemoryStore::new();
    let harness = harness(&store, config(ABAC_CONFIG));
    harness.load().await.unwrap();

    store.inject_commit_conflicts(3);
    let report = harness.run_workload().await.unwrap();

    assert_eq!(report.retries, 3);
    assert_eq!(report.succeeded, 100);
    assert_eq!(store.stats().conflicts, 3);
}

#[tokio::test]
async fn test_retry_limit_fails_worker() {
    let store = MemoryStore::new();
    let toml = ABAC_CONFIG
        .replace("concurrency = 4", "concurrency = 1")
        .replace("seed = 7", "seed = 7\nmax_retries = 2");
    let harness = harness(&store, config(&toml));
    harness.load().await.unwrap();

    store.inject_commit_conflicts(10);
    let report = harness.run_workload().await.unwrap();

    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(report.retries, 2);
    assert_eq!(report.worker_failures.len(), 1);
    assert_eq!(report.worker_failures[0].code, ErrorCode::RetryLimitExceeded.code());
}

#[tokio::test]
async fn test_close_failure_surfaces_after_run() {
    let store = MemoryStore::new();
    let harness = harness(&store, config(ABAC_CONFIG));
    harness.load().await.unwrap();

    store.inject_close_failure(&Principal::User("user2".into()));
    let err = harness.run_workload().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::StorageError);

    let help = err.context.help.clone().unwrap();
    assert!(help.contains("succeeded"), "workload results missing: {}", help);
    assert!(err.display_full().contains("The workload finished before cleanup"));
}

#[tokio::test]
async fn test_missing_sessions_become_worker_failures() {
    let store = MemoryStore::new();
    let report = harness(&store, config(ABAC_CONFIG)).run_workload().await.unwrap();

    assert_eq!(report.succeeded, 0);
    assert_eq!(report.worker_failures.len(), 4);
    assert!(
        report
            .worker_failures
            .iter()
            .all(|f| f.code == ErrorCode::SessionUnavailable.code())
    );
}

#[tokio::test]
async fn test_missing_policy_admin_is_a_setup_error() {
    let store = MemoryStore::with_config(MemoryConfig::new().policy_admin(false));
    let err = harness(&store, config(ABAC_CONFIG)).load().await.unwrap_err();

    assert!(is_setup_error(&err));
    assert_eq!(err.code, ErrorCode::SetupFailed);
    assert_eq!(store.row_count(&table()), None);
}

#[tokio::test]
async fn test_plain_load_without_abac() {
    let store = MemoryStore::with_config(MemoryConfig::new().policy_admin(false));
    let toml = r#"
[ycsb]
record_count = 30
payload_size = 8

[run]
concurrency = 2
run_for_secs = 0
max_invocations = 5
"#;
    let run = harness(&store, config(toml)).run().await.unwrap();

    assert!(run.load.provision.is_none());
    assert_eq!(store.row(&table(), 3).unwrap().tag, None);
    assert_eq!(run.report.succeeded, 10);
    assert!(run.report.abac.is_none());
}
