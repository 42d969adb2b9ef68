//! Workload metrics.
//!
//! Workers report through a [`MetricsSink`] handle. The default sink,
//! [`MetricsAggregator`], keeps lock-free monotonic counters and a merged
//! latency histogram fed by per-worker [`LatencyShard`]s when each worker
//! finishes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use crate::error::{BenchError, BenchResult};

/// Significant figures kept by latency histograms.
const LATENCY_SIGFIG: u8 = 3;

/// Interface for recording workload outcomes.
pub trait MetricsSink: Send + Sync {
    /// A conflict forced the invocation to restart.
    fn record_retry(&self);

    /// An invocation committed. `successes`/`failures` are the authorization
    /// outcomes of its final attempt; `elapsed` covers all attempts.
    fn record_commit(&self, successes: u64, failures: u64, elapsed: Duration);

    /// An invocation ended with a workload-fatal error.
    fn record_failed_invocation(&self);

    /// Fold a worker's latency shard into the aggregate.
    fn merge_latencies(&self, shard: &LatencyShard);

    /// Read the current values.
    fn snapshot(&self) -> MetricsSnapshot;
}

/// Per-worker latency histogram, in microseconds.
#[derive(Debug, Clone)]
pub struct LatencyShard {
    histogram: Histogram<u64>,
}

impl LatencyShard {
    /// Create an empty auto-resizing shard.
    pub fn new() -> BenchResult<Self> {
        let histogram = Histogram::<u64>::new(LATENCY_SIGFIG)
            .map_err(|e| BenchError::internal(format!("Failed to create latency histogram: {}", e)))?;
        Ok(Self { histogram })
    }

    /// Record one invocation latency.
    pub fn record(&mut self, latency: Duration) {
        let micros = latency.as_micros().min(u64::MAX as u128) as u64;
        self.histogram.saturating_record(micros.max(1));
    }

    /// Number of recorded samples.
    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }

    /// Summarize the recorded samples.
    pub fn summary(&self) -> LatencySummary {
        LatencySummary::from_histogram(&self.histogram)
    }
}

/// Latency statistics in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    /// Sample count.
    pub count: u64,
    /// Mean.
    pub mean_ms: f64,
    /// Standard deviation.
    pub stddev_ms: f64,
    /// Maximum.
    pub max_ms: f64,
    /// 50th percentile.
    pub p50_ms: f64,
    /// 90th percentile.
    pub p90_ms: f64,
    /// 99th percentile.
    pub p99_ms: f64,
}

impl LatencySummary {
    fn from_histogram(histogram: &Histogram<u64>) -> Self {
        if histogram.len() == 0 {
            return Self::default();
        }
        let ms = |us: f64| us / 1000.0;
        Self {
            count: histogram.len(),
            mean_ms: ms(histogram.mean()),
            stddev_ms: ms(histogram.stdev()),
            max_ms: ms(histogram.max() as f64),
            p50_ms: ms(histogram.value_at_quantile(0.50) as f64),
            p90_ms: ms(histogram.value_at_quantile(0.90) as f64),
            p99_ms: ms(histogram.value_at_quantile(0.99) as f64),
        }
    }
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Conflict retries.
    pub retries: u64,
    /// Reads that returned a row.
    pub authorization_success: u64,
    /// Reads that returned nothing.
    pub authorization_failure: u64,
    /// Committed transactions.
    pub transactions: u64,
    /// Completed workload invocations.
    pub invocations: u64,
    /// Invocations that ended in a workload-fatal error.
    pub failed_invocations: u64,
    /// Summed invocation processing time in microseconds.
    pub processing_time_us: u64,
    /// Merged latency statistics.
    pub latency: LatencySummary,
}

impl MetricsSnapshot {
    /// Total authorization outcomes.
    pub fn total_operations(&self) -> u64 {
        self.authorization_success + self.authorization_failure
    }

    /// Authorization success rate as a percentage, `None` without operations.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.total_operations();
        if total == 0 {
            None
        } else {
            Some(self.authorization_success as f64 / total as f64 * 100.0)
        }
    }

    /// Average processing time per operation in microseconds, `None` when no
    /// time was recorded.
    pub fn avg_processing_time_us(&self) -> Option<u64> {
        if self.processing_time_us == 0 {
            None
        } else {
            Some(self.processing_time_us / self.total_operations().max(1))
        }
    }
}

/// Lock-free aggregate of all workers' metrics.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    retries: AtomicU64,
    authorization_success: AtomicU64,
    authorization_failure: AtomicU64,
    transactions: AtomicU64,
    invocations: AtomicU64,
    failed_invocations: AtomicU64,
    processing_time_us: AtomicU64,
    latencies: Mutex<Option<Histogram<u64>>>,
}

impl MetricsAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsSink for MetricsAggregator {
    fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn record_commit(&self, successes: u64, failures: u64, elapsed: Duration) {
        self.authorization_success.fetch_add(successes, Ordering::Relaxed);
        self.authorization_failure.fetch_add(failures, Ordering::Relaxed);
        self.processing_time_us
            .fetch_add(elapsed.as_micros().min(u64::MAX as u128) as u64, Ordering::Relaxed);
        self.transactions.fetch_add(1, Ordering::Relaxed);
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failed_invocation(&self) {
        self.failed_invocations.fetch_add(1, Ordering::Relaxed);
    }

    fn merge_latencies(&self, shard: &LatencyShard) {
        if shard.is_empty() {
            return;
        }
        let mut merged = self.latencies.lock();
        match merged.as_mut() {
            Some(histogram) => {
                if let Err(e) = histogram.add(&shard.histogram) {
                    warn!(error = %e, samples = shard.len(), "Dropping latency shard");
                }
            }
            None => *merged = Some(shard.histogram.clone()),
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let latency = self
            .latencies
            .lock()
            .as_ref()
            .map(LatencySummary::from_histogram)
            .unwrap_or_default();

        MetricsSnapshot {
            retries: self.retries.load(Ordering::Relaxed),
            authorization_success: self.authorization_success.load(Ordering::Relaxed),
            authorization_failure: self.authorization_failure.load(Ordering::Relaxed),
            transactions: self.transactions.load(Ordering::Relaxed),
            invocations: self.invocations.load(Ordering::Relaxed),
            failed_invocations: self.failed_invocations.load(Ordering::Relaxed),
            processing_time_us: self.processing_time_us.load(Ordering::Relaxed),
            latency,
        }
    }
}
