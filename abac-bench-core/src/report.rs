//! End-of-run report.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::{BenchError, BenchResult};
use crate::metrics::{LatencySummary, MetricsSnapshot};
use crate::workload::WorkerFailure;

/// Authorization statistics, present when ABAC is enabled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbacSummary {
    /// Simulated users.
    pub user_count: usize,
    /// Reads that returned a row.
    pub authorization_success: u64,
    /// Reads that returned nothing.
    pub authorization_failure: u64,
    /// Sum of both.
    pub total_operations: u64,
    /// Success percentage, absent without operations.
    pub success_rate_percent: Option<f64>,
    /// Average processing time per operation, absent when none was recorded.
    pub avg_processing_time_us: Option<u64>,
}

/// Summary of a workload run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchReport {
    /// Measured workload duration in seconds.
    pub duration_secs: f64,
    /// Committed invocations per second.
    pub throughput: f64,
    /// Committed invocations.
    pub succeeded: u64,
    /// Invocations ended by workload-fatal errors.
    pub failed: u64,
    /// Invocation latency.
    pub latency: LatencySummary,
    /// Conflict retries.
    pub retries: u64,
    /// Simulated users.
    pub user_count: usize,
    /// Workload workers.
    pub workers: usize,
    /// Workers that stopped on an error.
    pub worker_failures: Vec<WorkerFailure>,
    /// Authorization statistics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abac: Option<AbacSummary>,
}

impl BenchReport {
    /// Build a report from the final metrics.
    pub fn new(
        snapshot: &MetricsSnapshot,
        elapsed: Duration,
        user_count: usize,
        workers: usize,
        worker_failures: Vec<WorkerFailure>,
        abac_enabled: bool,
    ) -> Self {
        let duration_secs = elapsed.as_secs_f64();
        let throughput = if duration_secs > 0.0 {
            snapshot.invocations as f64 / duration_secs
        } else {
            0.0
        };

        let abac = abac_enabled.then(|| AbacSummary {
            user_count,
            authorization_success: snapshot.authorization_success,
            authorization_failure: snapshot.authorization_failure,
            total_operations: snapshot.total_operations(),
            success_rate_percent: snapshot.success_rate(),
            avg_processing_time_us: snapshot.avg_processing_time_us(),
        });

        Self {
            duration_secs,
            throughput,
            succeeded: snapshot.invocations,
            failed: snapshot.failed_invocations,
            latency: snapshot.latency,
            retries: snapshot.retries,
            user_count,
            workers,
            worker_failures,
            abac,
        }
    }

    /// Render as pretty JSON.
    pub fn to_json(&self) -> BenchResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BenchError::internal(format!("Failed to serialize report: {}", e)).with_source(e))
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "==== Statistics Summary ====")?;
        writeln!(f, "Throughput: {:.2} ops", self.throughput)?;
        writeln!(f, "Succeeded operations: {}", self.succeeded)?;
        writeln!(f, "Failed operations: {}", self.failed)?;
        writeln!(f, "Mean latency: {:.3} ms", self.latency.mean_ms)?;
        writeln!(f, "SD of latency: {:.3} ms", self.latency.stddev_ms)?;
        writeln!(f, "Max latency: {:.3} ms", self.latency.max_ms)?;
        writeln!(f, "Latency at 50 percentile: {:.3} ms", self.latency.p50_ms)?;
        writeln!(f, "Latency at 90 percentile: {:.3} ms", self.latency.p90_ms)?;
        writeln!(f, "Latency at 99 percentile: {:.3} ms", self.latency.p99_ms)?;
        write!(f, "Transaction retry count: {}", self.retries)?;

        for failure in &self.worker_failures {
            write!(f, "\nWorker {} (user{}) failed: [{}] {}", failure.worker, failure.user_index, failure.code, failure.message)?;
        }

        if let Some(abac) = &self.abac {
            writeln!(f)?;
            writeln!(f)?;
            writeln!(f, "==== ABAC Authorization Summary ====")?;
            writeln!(f, "User count: {}", abac.user_count)?;
            writeln!(f, "Authorization success count: {}", abac.authorization_success)?;
            writeln!(f, "Authorization failure count: {}", abac.authorization_failure)?;
            write!(f, "Total authorization operations: {}", abac.total_operations)?;
            if let Some(rate) = abac.success_rate_percent {
                write!(f, "\nAuthorization success rate: {:.2}%", rate)?;
            }
            if let Some(avg) = abac.avg_processing_time_us {
                write!(f, "\nAverage ABAC processing time: {} us", avg)?;
            }
        }
        Ok(())
    }
}
