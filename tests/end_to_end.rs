//! End-to-end tests: provisioning, tagged load and the read workload on the
//! in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use abac_bench::engine::metrics::{LatencyShard, MetricsSink, MetricsSnapshot};
use abac_bench::engine::session::worker_identity;
use abac_bench::engine::*;
use abac_bench::memory::{MemoryConfig, MemoryStore};
use pretty_assertions::assert_eq;

fn abac_config(strategy: &str) -> BenchConfig {
    BenchConfig::from_toml_str(&format!(
        r#"
        [ycsb]
        record_count = 100
        payload_size = 12
        load_concurrency = 4
        load_batch_size = 5
        user_count = 4

        [run]
        concurrency = 4
        run_for_secs = 0
        max_invocations = 20
        session_assignment = "worker_index"
        seed = 11

        [abac]
        enabled = true
        attribute_values = "public,secret"
        strategy = "{}"
        "#,
        strategy
    ))
    .unwrap()
}

fn table() -> TableRef {
    TableRef::new("ycsb", "usertable")
}

#[test]
fn test_worker_ranges_cover_the_table() {
    let ranges: Vec<KeyRange> = (0..4).map(|w| partition(w, 4, 100).unwrap()).collect();
    assert_eq!(
        ranges,
        vec![
            KeyRange::new(0, 24),
            KeyRange::new(25, 49),
            KeyRange::new(50, 74),
            KeyRange::new(75, 99),
        ]
    );
    assert_eq!(ranges.iter().map(KeyRange::len).sum::<u64>(), 100);
}

#[test]
fn test_session_assignment_is_stable() {
    let first: Vec<usize> = (0..8)
        .map(|w| session::assign_user(SessionAssignment::IdentityHash, w, 4).unwrap())
        .collect();
    let second: Vec<usize> = (0..8)
        .map(|w| session::assign_user(SessionAssignment::IdentityHash, w, 4).unwrap())
        .collect();
    assert_eq!(first, second);
    assert_eq!(first[3], (stable_hash(&worker_identity(3)) % 4) as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_pipeline_with_load_balanced_levels() {
    let store = MemoryStore::new();
    let harness = Harness::new(abac_config("load_balanced"), Arc::new(store.clone())).unwrap();
    let run = harness.run().await.unwrap();

    assert_eq!(run.load.records_loaded, 100);
    assert_eq!(store.row(&table(), 10).unwrap().tag.as_deref(), Some("public::"));
    assert_eq!(store.row(&table(), 11).unwrap().tag.as_deref(), Some("secret::"));

    let report = run.report;
    assert_eq!(report.workers, 4);
    assert_eq!(report.user_count, 4);
    assert_eq!(report.succeeded, 80);
    assert_eq!(report.failed, 0);
    assert_eq!(report.latency.count, 80);
    assert!(report.throughput > 0.0);

    let text = report.to_string();
    assert!(text.contains("==== Statistics Summary ===="));
    assert!(text.contains("==== ABAC Authorization Summary ===="));

    let abac = report.abac.unwrap();
    assert_eq!(abac.total_operations, 160);
    assert_eq!(abac.authorization_success + abac.authorization_failure, 160);
    assert!(abac.avg_processing_time_us.is_some());
}

#[tokio::test]
async fn test_random_strategy_tags_with_known_levels() {
    let store = MemoryStore::new();
    let harness = Harness::new(abac_config("random"), Arc::new(store.clone())).unwrap();
    harness.load().await.unwrap();

    for key in 0..100 {
        let tag = store.row(&table(), key).unwrap().tag.unwrap();
        let parsed = DataTag::parse(&tag).unwrap();
        assert!(parsed.level == "public" || parsed.level == "secret", "unexpected tag {}", tag);
        assert!(parsed.compartments.is_empty());
        assert!(parsed.groups.is_empty());
    }
}

#[tokio::test]
async fn test_public_user_reads_only_public_rows() {
    let store = MemoryStore::new();
    let mut config = abac_config("load_balanced");
    config.ycsb.user_count = 1;
    config.run.concurrency = 1;
    config.ycsb.ops_per_tx = 1;
    config.run.max_invocations = Some(200);

    let harness = Harness::new(config, Arc::new(store.clone())).unwrap();
    let report = harness.run().await.unwrap().report;

    // user0 holds the lowest level; even keys are public, odd keys secret.
    let abac = report.abac.unwrap();
    assert_eq!(abac.total_operations, 200);
    assert!(abac.authorization_success > 0);
    assert!(abac.authorization_failure > 0);
    let rate = abac.success_rate_percent.unwrap();
    assert!(rate > 20.0 && rate < 80.0, "rate {}", rate);
}

#[tokio::test]
async fn test_compartments_and_groups_restrict_reads() {
    let store = MemoryStore::new();
    let config = BenchConfig::from_toml_str(
        r#"
        [ycsb]
        record_count = 12
        payload_size = 4
        user_count = 3

        [run]
        concurrency = 3
        run_for_secs = 0
        max_invocations = 1

        [abac]
        enabled = true
        attribute_type = "compartment"
        attribute_values = "hr,sales,engineering"
        strategy = "load_balanced"
        groups = ["team_a"]
        "#,
    )
    .unwrap();
    let harness = Harness::new(config, Arc::new(store.clone())).unwrap();
    harness.load().await.unwrap();

    assert_eq!(store.row(&table(), 4).unwrap().tag.as_deref(), Some("public:sales:team_a"));

    let user1 = store.connect(&Credentials::simulated(1)).await.unwrap();
    let mut tx = user1.begin().await.unwrap();
    assert!(tx.get(&table(), 4).await.unwrap().is_some());
    assert!(tx.get(&table(), 3).await.unwrap().is_none());
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_conflicts_are_retried_and_counted() {
    let store = MemoryStore::new();
    let harness = Harness::new(abac_config("load_balanced"), Arc::new(store.clone())).unwrap();
    harness.load().await.unwrap();

    store.inject_commit_conflicts(5);
    let report = harness.run_workload().await.unwrap();

    assert_eq!(report.retries, 5);
    assert_eq!(report.succeeded, 80);
    assert_eq!(report.abac.unwrap().total_operations, 160);
}

#[tokio::test]
async fn test_duration_bounded_run_stops() {
    let store = MemoryStore::with_config(MemoryConfig::new().read_delay(Duration::from_millis(1)));
    let mut config = abac_config("load_balanced");
    config.run.run_for_secs = 1;
    config.run.max_invocations = None;

    let harness = Harness::new(config, Arc::new(store)).unwrap();
    let report = harness.run().await.unwrap().report;

    assert!(report.succeeded > 0);
    assert!(report.duration_secs >= 1.0);
    assert!(report.duration_secs < 10.0);
}

#[tokio::test]
async fn test_stop_handle_ends_the_workload() {
    let store = MemoryStore::with_config(MemoryConfig::new().read_delay(Duration::from_millis(1)));
    let mut config = abac_config("load_balanced");
    config.run.run_for_secs = 600;
    config.run.max_invocations = None;

    let harness = Harness::new(config, Arc::new(store)).unwrap();
    harness.load().await.unwrap();

    let stop = harness.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.store(true, Ordering::Release);
    });
    let report = tokio::time::timeout(Duration::from_secs(30), harness.run_workload())
        .await
        .unwrap()
        .unwrap();
    assert!(report.succeeded > 0);
    assert!(report.worker_failures.is_empty());
}

#[tokio::test]
async fn test_stop_requested_before_workload_is_honored() {
    let store = MemoryStore::with_config(MemoryConfig::new().read_delay(Duration::from_millis(1)));
    let mut config = abac_config("load_balanced");
    config.run.run_for_secs = 600;
    config.run.max_invocations = Some(5);

    let harness = Harness::new(config, Arc::new(store)).unwrap();
    harness.load().await.unwrap();

    let stop = harness.stop_handle();
    stop.store(true, Ordering::Release);
    let report = tokio::time::timeout(Duration::from_secs(10), harness.run_workload())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed, 0);
    assert!(!stop.load(Ordering::Acquire));

    // The flag is cleared once a workload finishes; the next run uses its budget.
    let report = harness.run_workload().await.unwrap();
    assert_eq!(report.succeeded, 20);
}

async fn load_tags(seed: u64, load_concurrency: usize) -> Vec<String> {
    let store = MemoryStore::new();
    let mut config = abac_config("random");
    config.ycsb.record_count = 2000;
    config.ycsb.load_concurrency = load_concurrency;
    config.run.seed = Some(seed);

    let harness = Harness::new(config, Arc::new(store.clone())).unwrap();
    harness.load().await.unwrap();
    (0..2000).map(|key| store.row(&table(), key).unwrap().tag.unwrap()).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_seeded_random_load_is_reproducible() {
    let first = load_tags(42, 4).await;
    let second = load_tags(42, 4).await;
    let serial = load_tags(42, 1).await;
    assert_eq!(first, second);
    assert_eq!(first, serial);

    let other = load_tags(43, 4).await;
    assert_ne!(first, other);
    assert!(first.iter().any(|t| t == "public::"));
    assert!(first.iter().any(|t| t == "secret::"));
}

#[tokio::test]
async fn test_workers_with_empty_ranges_do_not_run() {
    let store = MemoryStore::new();
    let mut config = abac_config("load_balanced");
    config.ycsb.record_count = 2;
    config.ycsb.load_concurrency = 1;
    config.run.max_invocations = Some(3);

    let harness = Harness::new(config, Arc::new(store)).unwrap();
    let report = harness.run().await.unwrap().report;

    // Four workers over two keys: only the last worker has a range.
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.worker_failures.len(), 3);
    assert!(
        report
            .worker_failures
            .iter()
            .all(|f| f.code == ErrorCode::InvalidArgument.code())
    );
}

#[derive(Default)]
struct CountingSink {
    commits: AtomicU64,
    retries: AtomicU64,
}

impl MetricsSink for CountingSink {
    fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn record_commit(&self, _successes: u64, _failures: u64, _elapsed: Duration) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failed_invocation(&self) {}

    fn merge_latencies(&self, _shard: &LatencyShard) {}

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            invocations: self.commits.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            ..MetricsSnapshot::default()
        }
    }
}

#[tokio::test]
async fn test_executor_with_custom_sink() {
    let store = MemoryStore::new();
    let config = abac_config("load_balanced");
    let harness = Harness::new(config.clone(), Arc::new(store.clone())).unwrap();
    harness.load().await.unwrap();

    let sink = Arc::new(CountingSink::default());
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let executor = WorkloadExecutor::new(WorkloadSettings::from_config(&config), sink.clone(), stop);

    let session = store.connect(&Credentials::simulated(2)).await.unwrap();
    let ctx = WorkerContext::new(2, 2, session, partition(2, 4, 100).unwrap(), Some(3)).unwrap();
    store.inject_commit_conflicts(2);
    let summary = executor.run_worker(ctx).await;

    assert_eq!(summary.invocations, 20);
    assert!(summary.error.is_none());
    assert_eq!(sink.snapshot().invocations, 20);
    assert_eq!(sink.snapshot().retries, 2);
}
