//! `abac-bench run` command - Load, run the workload and report.

use std::sync::atomic::Ordering;

use abac_bench_core::BenchRun;
use tracing::warn;

use crate::cli::RunArgs;
use crate::config::{apply_overrides, load_config};
use crate::error::CliResult;
use crate::output::{self, success};

use super::{memory_harness, print_load_summary};

/// Run the run command
pub async fn run(args: RunArgs) -> CliResult<()> {
    let config = apply_overrides(load_config(&args.config)?, &args)?;
    let harness = memory_harness(config)?;

    // Ctrl-C ends the workload early; the report still covers what ran.
    let stop = harness.stop_handle();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping workload");
            stop.store(true, Ordering::Release);
        }
    });

    if !args.json {
        let run = &harness.config().run;
        output::header("Run Benchmark");
        output::kv("Config", &args.config.display().to_string());
        output::kv("Workers", &run.concurrency.to_string());
        output::kv("Users", &harness.config().effective_user_count().to_string());
        match run.max_invocations {
            Some(max) if run.run_for_secs == 0 => output::kv("Budget", &format!("{} invocations per worker", max)),
            _ => output::kv("Duration", &format!("{}s", run.run_for_secs)),
        }
        output::newline();
        output::step(1, 2, "Loading...");
    }

    let load = harness.load().await?;
    if !args.json {
        output::step(2, 2, "Running workload...");
    }
    let report = harness.run_workload().await;
    signal.abort();
    let report = report?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&BenchRun { load, report })?);
        return Ok(());
    }

    output::newline();
    print_load_summary(&load);
    output::newline();
    output::plain(&report.to_string());
    output::newline();
    if report.worker_failures.is_empty() {
        success("Benchmark complete");
    } else {
        output::warn(&format!("Benchmark complete with {} worker failure(s)", report.worker_failures.len()));
    }
    output::dim("Set ABAC_BENCH_LOG_LEVEL=info for per-phase logs");
    Ok(())
}
