//! Benchmark orchestration.
//!
//! Phases run strictly in sequence:
//!
//! 1. load: table setup, provisioning and bulk insert on the admin session
//! 2. open one session per simulated user
//! 3. spawn one worker per `run.concurrency`, each with its own context
//! 4. stop on the deadline, an external stop request, or the invocation budget
//! 5. drain metrics, close sessions and build the report

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::BenchConfig;
use crate::error::{BenchError, BenchResult, ErrorCode};
use crate::loader::{LoadSummary, Loader};
use crate::metrics::{MetricsAggregator, MetricsSink};
use crate::partition::partition;
use crate::report::BenchReport;
use crate::session::{SessionPool, assign_user, unassigned_users, worker_identity};
use crate::store::{Connector, Credentials};
use crate::strategy::AssignmentStrategy;
use crate::workload::{WorkerContext, WorkerFailure, WorkloadExecutor, WorkloadSettings};

/// Results of a full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct BenchRun {
    /// Load phase outcome.
    pub load: LoadSummary,
    /// Workload report.
    pub report: BenchReport,
}

/// Drives the load and workload phases against a connector.
pub struct Harness {
    config: BenchConfig,
    connector: Arc<dyn Connector>,
    strategy: Arc<AssignmentStrategy>,
    stop: Arc<AtomicBool>,
}

impl Harness {
    /// Create a harness for a validated configuration.
    pub fn new(config: BenchConfig, connector: Arc<dyn Connector>) -> BenchResult<Self> {
        config.validate()?;
        let strategy = Arc::new(AssignmentStrategy::from_kind(config.abac.strategy, config.run.seed));
        Ok(Self {
            config,
            connector,
            strategy,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Flag that stops the workload when set.
    ///
    /// A stop requested before the workload starts ends it at once. The flag
    /// is cleared when a workload finishes so the harness can run again.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run the load phase.
    pub async fn load(&self) -> BenchResult<LoadSummary> {
        info!(backend = self.connector.name(), table = %self.config.table(), "Starting load phase");
        let admin = self.connector.admin_session().await?;
        let loader = Loader::new(
            self.config.clone(),
            self.connector.storage_admin(),
            self.connector.policy_admin(),
            Arc::clone(&admin),
            Arc::clone(&self.strategy),
        );

        let result = loader.run().await;
        if let Err(e) = admin.close().await {
            warn!(error = %e, "Failed to close admin session after load");
        }
        result
    }

    /// Run the workload phase against already loaded data.
    pub async fn run_workload(&self) -> BenchResult<BenchReport> {
        let user_count = self.config.effective_user_count();
        let workers = self.config.run.concurrency;
        let users = Credentials::simulated_users(user_count);
        let unassigned = unassigned_users(self.config.run.session_assignment, workers, user_count)?;
        if unassigned > 0 {
            warn!(users = user_count, workers, unassigned, "Some users have no worker and will not be exercised");
        }

        let pool = SessionPool::open(self.connector.as_ref(), &users, self.config.run.allow_admin_fallback).await?;

        let metrics = Arc::new(MetricsAggregator::new());
        let sink: Arc<dyn MetricsSink> = metrics.clone();
        let executor = WorkloadExecutor::new(WorkloadSettings::from_config(&self.config), sink, Arc::clone(&self.stop));

        let mut failures = Vec::new();
        let mut contexts = Vec::with_capacity(workers);
        for worker in 0..workers {
            match self.worker_context(&pool, worker) {
                Ok(ctx) => contexts.push(ctx),
                Err((user_index, e)) => {
                    warn!(worker = %worker_identity(worker), error = %e, "Worker not started");
                    failures.push(failure(worker_identity(worker), user_index, &e));
                }
            }
        }

        info!(
            workers = contexts.len(),
            users = user_count,
            duration_secs = self.config.run.run_for_secs,
            "Starting workload phase"
        );
        let started = Instant::now();

        let handles: Vec<_> = contexts
            .into_iter()
            .map(|ctx| {
                let executor = executor.clone();
                let name = ctx.name().to_string();
                let user_index = ctx.user_index();
                (name, user_index, tokio::spawn(async move { executor.run_worker(ctx).await }))
            })
            .collect();

        let timer = (self.config.run.run_for_secs > 0).then(|| {
            let stop = Arc::clone(&self.stop);
            let duration = self.config.run.duration();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                stop.store(true, Ordering::Release);
            })
        });

        for (name, user_index, handle) in handles {
            match handle.await {
                Ok(summary) => failures.extend(summary.failure()),
                Err(e) => {
                    let err = BenchError::internal(format!("Worker task failed: {}", e));
                    failures.push(failure(name, user_index, &err));
                }
            }
        }
        let elapsed = started.elapsed();
        if let Some(timer) = timer {
            timer.abort();
        }
        self.stop.store(false, Ordering::Release);

        let snapshot = metrics.snapshot();
        let report = BenchReport::new(
            &snapshot,
            elapsed,
            pool.user_count(),
            workers,
            failures,
            self.config.abac.enabled,
        );
        info!(
            throughput = %format!("{:.2}", report.throughput),
            succeeded = report.succeeded,
            failed = report.failed,
            retries = report.retries,
            "Workload complete"
        );

        if let Err(e) = pool.close_all().await {
            warn!(
                succeeded = report.succeeded,
                failed = report.failed,
                retries = report.retries,
                "Session cleanup failed after the workload"
            );
            return Err(e.with_help(format!(
                "The workload finished before cleanup: {} succeeded, {} failed, {} retries, {:.2} ops/s",
                report.succeeded, report.failed, report.retries, report.throughput
            )));
        }
        Ok(report)
    }

    /// Load, then run the workload.
    pub async fn run(&self) -> BenchResult<BenchRun> {
        let load = self.load().await?;
        let report = self.run_workload().await?;
        Ok(BenchRun { load, report })
    }

    fn worker_context(&self, pool: &SessionPool, worker: usize) -> Result<WorkerContext, (usize, BenchError)> {
        let user_index = assign_user(self.config.run.session_assignment, worker, pool.user_count())
            .map_err(|e| (0, e))?;
        let build = || {
            let session = pool.session_for(user_index)?;
            let range = partition(worker, self.config.run.concurrency, self.config.ycsb.record_count)?;
            if range.is_empty() {
                return Err(BenchError::invalid_argument(format!(
                    "Empty key range {}: {} records for {} workers",
                    range, self.config.ycsb.record_count, self.config.run.concurrency
                )));
            }
            WorkerContext::new(worker, user_index, session, range, self.config.run.seed)
        };
        build().map_err(|e| (user_index, e.with_context(format!("Building context for {}", worker_identity(worker)))))
    }
}

fn failure(worker: String, user_index: usize, e: &BenchError) -> WorkerFailure {
    WorkerFailure {
        worker,
        user_index,
        code: e.code.code(),
        message: e.message.clone(),
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("backend", &self.connector.name())
            .field("strategy", &self.strategy.kind())
            .field("stopped", &self.stop.load(Ordering::Relaxed))
            .finish()
    }
}

/// Whether an error came from the setup phase rather than the workload.
pub fn is_setup_error(e: &BenchError) -> bool {
    matches!(
        e.code,
        ErrorCode::SetupFailed | ErrorCode::PolicyAdminUnavailable | ErrorCode::InvalidConfiguration
    )
}
