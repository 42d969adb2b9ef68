//! Benchmarks for attribute assignment, tag encoding and key partitioning.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use abac_bench::engine::strategy::AssignmentStrategy;
use abac_bench::engine::tag;
use abac_bench::{DataTag, partition};

/// Benchmark strategy picks.
fn bench_strategy(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategy");
    let candidates = ["public", "confidential", "secret"];

    group.bench_function("load_balanced", |b| {
        let strategy = AssignmentStrategy::LoadBalanced;
        let mut id = 0u64;
        b.iter(|| {
            id = id.wrapping_add(1);
            black_box(strategy.assign(id, &candidates).ok())
        })
    });

    group.bench_function("random_seeded", |b| {
        let strategy = AssignmentStrategy::random(Some(7));
        b.iter(|| black_box(strategy.assign(0, &candidates).ok()))
    });

    group.finish();
}

/// Benchmark data tag encoding and parsing.
fn bench_tags(c: &mut Criterion) {
    let mut group = c.benchmark_group("data_tag");

    group.bench_function("encode_level_only", |b| {
        b.iter(|| black_box(tag::encode("public", &[] as &[&str], &[] as &[&str])))
    });

    group.bench_function("encode_full", |b| {
        b.iter(|| black_box(tag::encode("secret", &["hr", "sales"], &["team_a"])))
    });

    group.bench_function("parse_full", |b| {
        b.iter(|| black_box(DataTag::parse("secret:hr,sales:team_a").ok()))
    });

    group.finish();
}

/// Benchmark key range partitioning for growing worker counts.
fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");

    for workers in [1usize, 16, 256] {
        group.throughput(Throughput::Elements(workers as u64));
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            b.iter(|| {
                for worker in 0..workers {
                    black_box(partition(worker, workers, 1_000_000).ok());
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_strategy, bench_tags, bench_partition);
criterion_main!(benches);
