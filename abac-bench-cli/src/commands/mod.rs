//! CLI command implementations.

pub mod init;
pub mod load;
pub mod run;
pub mod version;

use std::sync::Arc;

use abac_bench_core::{BenchConfig, Harness, LoadSummary};
use abac_bench_memory::MemoryStore;

use crate::error::CliResult;
use crate::output;

/// Build a harness over a fresh in-memory store.
pub(crate) fn memory_harness(config: BenchConfig) -> CliResult<Harness> {
    let store = MemoryStore::new();
    Ok(Harness::new(config, Arc::new(store))?)
}

/// Print a human-readable load summary.
pub(crate) fn print_load_summary(summary: &LoadSummary) {
    output::section("Load");
    output::kv("Records loaded", &summary.records_loaded.to_string());
    output::kv("Users", &summary.users.to_string());
    output::kv("Retries", &summary.retries.to_string());
    output::kv("Elapsed", &format!("{:.3}s", summary.elapsed.as_secs_f64()));
    output::kv("Records/sec", &format!("{:.0}", summary.records_per_sec()));

    if let Some(provision) = &summary.provision {
        output::newline();
        output::section("Provisioning");
        output::kv("Policy created", &provision.policy_created.to_string());
        output::kv("Attributes created", &provision.attributes_created.to_string());
        output::kv("Table policy", &provision.table_policy);
        output::kv("Users labeled", &provision.assignments.len().to_string());
        for failure in &provision.failures {
            output::warn(&format!("{}: {}", failure.username, failure.error));
        }
    }
}
