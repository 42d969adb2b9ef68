//! Keyspace partitioning across workers.
//!
//! Worker `i` of `n` owns `[i * size, (i + 1) * size - 1]` where
//! `size = total_keys / n`; the last worker also absorbs the remainder and
//! ends at `total_keys - 1`.
//!
//! When `total_keys < n` the per-worker size is zero. Every worker but the
//! last then receives the empty range `[0, -1]`, and the last one receives
//! `[0, total_keys - 1]` (itself empty when `total_keys == 0`). Callers must
//! check [`KeyRange::is_empty`] before sampling.
//!
//! ```rust
//! use abac_bench_core::partition::{partition, KeyRange};
//!
//! assert_eq!(partition(1, 4, 100).unwrap(), KeyRange::new(25, 49));
//! assert_eq!(partition(3, 4, 102).unwrap(), KeyRange::new(75, 101));
//! ```

use std::fmt;

use rand::Rng;
use serde::Serialize;

use crate::error::{BenchError, BenchResult};

/// An inclusive key range owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct KeyRange {
    /// First key (inclusive).
    pub start: i64,
    /// Last key (inclusive). Smaller than `start` for an empty range.
    pub end: i64,
}

impl KeyRange {
    /// Create a range from inclusive bounds.
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Number of keys in the range.
    pub fn len(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start) as u64 + 1
        }
    }

    /// Whether the range holds no key.
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Whether `key` falls inside the range.
    pub fn contains(&self, key: i64) -> bool {
        key >= self.start && key <= self.end
    }

    /// Pick a key uniformly at random, or `None` for an empty range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<i64> {
        if self.is_empty() {
            None
        } else {
            Some(rng.gen_range(self.start..=self.end))
        }
    }

    /// Iterate over every key in the range.
    pub fn keys(&self) -> impl Iterator<Item = i64> {
        self.start..=self.end
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Compute the range owned by `worker_id` out of `workers`.
///
/// # Errors
///
/// Returns an invalid-argument error when `workers == 0` or
/// `worker_id >= workers`.
pub fn partition(worker_id: usize, workers: usize, total_keys: u64) -> BenchResult<KeyRange> {
    if workers == 0 {
        return Err(BenchError::invalid_argument("Worker count must be greater than zero"));
    }
    if worker_id >= workers {
        return Err(BenchError::invalid_argument(format!(
            "Worker id {} must be less than worker count {}",
            worker_id, workers
        )));
    }

    let size = (total_keys / workers as u64) as i64;
    let start = worker_id as i64 * size;
    let end = if worker_id == workers - 1 {
        total_keys as i64 - 1
    } else {
        (worker_id as i64 + 1) * size - 1
    };

    Ok(KeyRange::new(start, end))
}

/// Compute the ranges of all `workers` in worker order.
pub fn split(workers: usize, total_keys: u64) -> BenchResult<Vec<KeyRange>> {
    (0..workers)
        .map(|worker_id| partition(worker_id, workers, total_keys))
        .collect()
}
