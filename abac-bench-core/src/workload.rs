//! Read workload executor.
//!
//! Each invocation moves through:
//!
//! ```text
//! Begin -> Started -> ReadLoop -> CommitAttempt -> Committed
//!             ^                         |
//!             +------ ConflictRetry ----+----------> Fatal
//! ```
//!
//! Keys are chosen once at `Begin` and reused by every retry. A conflict from
//! a read or from commit aborts the transaction, bumps the retry counter and
//! restarts at `Started`. Any other error aborts and propagates. Authorization
//! outcomes are published only for the committed attempt, so
//! `success + failure == committed invocations * ops_per_tx` at all times.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::bench_debug;
use crate::config::BenchConfig;
use crate::error::{BenchError, BenchResult};
use crate::metrics::{LatencyShard, MetricsSink};
use crate::partition::KeyRange;
use crate::store::{Session, TableRef, Transaction};

/// Per-worker state built once before the run.
pub struct WorkerContext {
    worker_index: usize,
    name: String,
    user_index: usize,
    session: Arc<dyn Session>,
    key_range: KeyRange,
    latencies: LatencyShard,
    rng: StdRng,
}

impl WorkerContext {
    /// Bind a worker to its session and key range.
    ///
    /// With a seed, key selection is seeded from `seed + worker_index`.
    pub fn new(
        worker_index: usize,
        user_index: usize,
        session: Arc<dyn Session>,
        key_range: KeyRange,
        seed: Option<u64>,
    ) -> BenchResult<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(worker_index as u64)),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            worker_index,
            name: crate::session::worker_identity(worker_index),
            user_index,
            session,
            key_range,
            latencies: LatencyShard::new()?,
            rng,
        })
    }

    /// Worker index.
    pub fn worker_index(&self) -> usize {
        self.worker_index
    }

    /// Worker identity, `worker-<i>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the simulated user this worker runs as.
    pub fn user_index(&self) -> usize {
        self.user_index
    }

    /// The worker's session.
    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    /// The worker's key range.
    pub fn key_range(&self) -> KeyRange {
        self.key_range
    }

    /// Latencies recorded by this worker.
    pub fn latencies(&self) -> &LatencyShard {
        &self.latencies
    }
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("name", &self.name)
            .field("user_index", &self.user_index)
            .field("principal", self.session.principal())
            .field("key_range", &self.key_range)
            .field("samples", &self.latencies.len())
            .finish()
    }
}

/// Workload parameters shared by every worker.
#[derive(Debug, Clone)]
pub struct WorkloadSettings {
    /// Table the reads target.
    pub table: TableRef,
    /// Point reads per transaction.
    pub ops_per_tx: usize,
    /// Retry cap per invocation, `None` for unbounded.
    pub max_retries: Option<u32>,
    /// Whether a worker may run on the admin session.
    pub allow_admin_session: bool,
    /// Per-worker committed invocation budget.
    pub max_invocations: Option<u64>,
}

impl WorkloadSettings {
    /// Derive settings from a configuration.
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            table: config.table(),
            ops_per_tx: config.ycsb.ops_per_tx,
            max_retries: config.run.retry_cap(),
            allow_admin_session: config.run.allow_admin_fallback,
            max_invocations: config.run.max_invocations,
        }
    }
}

/// Result of one committed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationOutcome {
    /// Reads that returned a row.
    pub authorized: u64,
    /// Reads that returned nothing.
    pub denied: u64,
    /// Conflict retries before the commit.
    pub retries: u32,
    /// Time across all attempts.
    pub elapsed: Duration,
}

/// A worker that stopped on a workload-fatal error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerFailure {
    /// Worker identity.
    pub worker: String,
    /// User the worker ran as.
    pub user_index: usize,
    /// Error code, e.g. "B2005".
    pub code: String,
    /// Error message.
    pub message: String,
}

/// Final state of one worker.
#[derive(Debug)]
pub struct WorkerSummary {
    /// Worker identity.
    pub worker: String,
    /// User the worker ran as.
    pub user_index: usize,
    /// Committed invocations.
    pub invocations: u64,
    /// Fatal error that stopped the worker.
    pub error: Option<BenchError>,
}

impl WorkerSummary {
    /// Failure entry for reports, when the worker failed.
    pub fn failure(&self) -> Option<WorkerFailure> {
        self.error.as_ref().map(|e| WorkerFailure {
            worker: self.worker.clone(),
            user_index: self.user_index,
            code: e.code.code(),
            message: e.message.clone(),
        })
    }
}

/// Executes read invocations against a worker's session.
#[derive(Clone)]
pub struct WorkloadExecutor {
    settings: WorkloadSettings,
    metrics: Arc<dyn MetricsSink>,
    stop: Arc<AtomicBool>,
}

impl WorkloadExecutor {
    /// Create an executor reporting into `metrics` and honoring `stop`.
    pub fn new(settings: WorkloadSettings, metrics: Arc<dyn MetricsSink>, stop: Arc<AtomicBool>) -> Self {
        Self { settings, metrics, stop }
    }

    /// Settings in use.
    pub fn settings(&self) -> &WorkloadSettings {
        &self.settings
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Pick `ops_per_tx` keys uniformly, with replacement, from the worker's range.
    pub fn select_keys(&self, ctx: &mut WorkerContext) -> BenchResult<Vec<i64>> {
        let range = ctx.key_range;
        (0..self.settings.ops_per_tx)
            .map(|_| {
                range.sample(&mut ctx.rng).ok_or_else(|| {
                    BenchError::invalid_argument(format!("Worker {} has an empty key range {}", ctx.name, range))
                })
            })
            .collect()
    }

    /// Run one invocation to commit, retrying conflicts with the same keys.
    pub async fn execute(&self, ctx: &mut WorkerContext) -> BenchResult<InvocationOutcome> {
        if ctx.session.principal().is_admin() && !self.settings.allow_admin_session {
            return Err(BenchError::admin_session_forbidden().with_context(format!("Worker {}", ctx.name)));
        }

        let keys = self.select_keys(ctx)?;
        let started = Instant::now();
        let mut retries = 0u32;

        loop {
            match self.attempt(ctx.session.as_ref(), &keys).await {
                Ok((authorized, denied)) => {
                    let elapsed = started.elapsed();
                    ctx.latencies.record(elapsed);
                    self.metrics.record_commit(authorized, denied, elapsed);
                    return Ok(InvocationOutcome {
                        authorized,
                        denied,
                        retries,
                        elapsed,
                    });
                }
                Err(e) if e.is_conflict() => {
                    if self.settings.max_retries == Some(retries) {
                        return Err(BenchError::retry_limit_exceeded(retries).with_source(e));
                    }
                    retries += 1;
                    self.metrics.record_retry();
                    bench_debug!(worker = %ctx.name, retries, error = %e, "Retrying after conflict");

                    if self.is_stopped() {
                        return Err(BenchError::cancelled());
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, session: &dyn Session, keys: &[i64]) -> BenchResult<(u64, u64)> {
        let mut tx = session.begin().await?;
        let mut authorized = 0u64;
        let mut denied = 0u64;

        for &key in keys {
            match tx.get(&self.settings.table, key).await {
                Ok(Some(_)) => authorized += 1,
                Ok(None) => denied += 1,
                Err(e) => {
                    abort_quietly(tx.as_mut()).await;
                    return Err(e);
                }
            }
        }

        if let Err(e) = tx.commit().await {
            abort_quietly(tx.as_mut()).await;
            return Err(e);
        }
        Ok((authorized, denied))
    }

    /// Run invocations until stopped, the invocation budget is spent, or a
    /// workload-fatal error occurs. The worker's latencies are merged into the
    /// sink before returning.
    pub async fn run_worker(&self, mut ctx: WorkerContext) -> WorkerSummary {
        debug!(worker = %ctx.name, user = ctx.user_index, range = %ctx.key_range, "Worker started");
        let mut invocations = 0u64;
        let mut error = None;

        while !self.is_stopped() {
            if self.settings.max_invocations.is_some_and(|max| invocations >= max) {
                break;
            }
            match self.execute(&mut ctx).await {
                Ok(_) => invocations += 1,
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    warn!(worker = %ctx.name, error = %e, "Worker stopped on error");
                    self.metrics.record_failed_invocation();
                    error = Some(e);
                    break;
                }
            }
            tokio::task::yield_now().await;
        }

        self.metrics.merge_latencies(&ctx.latencies);
        debug!(worker = %ctx.name, invocations, "Worker finished");

        WorkerSummary {
            worker: ctx.name,
            user_index: ctx.user_index,
            invocations,
            error,
        }
    }
}

impl fmt::Debug for WorkloadExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadExecutor")
            .field("settings", &self.settings)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

async fn abort_quietly(tx: &mut dyn Transaction) {
    if let Err(e) = tx.abort().await {
        debug!(tx = tx.id(), error = %e, "Abort failed");
    }
}
