//! Fuzz target for key range partitioning.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_partition
//! ```

#![no_main]

use abac_bench_core::partition::split;
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    workers: u16,
    total_keys: u32,
}

fuzz_target!(|input: Input| {
    let workers = usize::from(input.workers);
    let total = u64::from(input.total_keys);
    let Ok(ranges) = split(workers, total) else {
        assert_eq!(workers, 0);
        return;
    };

    // Ranges are disjoint, ordered and cover every key exactly once.
    assert_eq!(ranges.iter().map(|r| r.len()).sum::<u64>(), total);
    let mut next = 0i64;
    for range in ranges.iter().filter(|r| !r.is_empty()) {
        assert_eq!(range.start, next);
        next = range.end + 1;
    }
});
