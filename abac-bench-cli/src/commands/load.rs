//! `abac-bench load` command - Provision and load the table.

use crate::cli::LoadArgs;
use crate::config::load_config;
use crate::error::CliResult;
use crate::output::{self, success};

use super::{memory_harness, print_load_summary};

/// Run the load command
pub async fn run(args: LoadArgs) -> CliResult<()> {
    let config = load_config(&args.config)?;
    let harness = memory_harness(config)?;

    if !args.json {
        output::header("Load Benchmark Data");
        output::kv("Config", &args.config.display().to_string());
        output::kv("Table", &harness.config().table().to_string());
        output::kv("ABAC", &harness.config().abac.enabled.to_string());
        output::newline();
    }

    let summary = harness.load().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_load_summary(&summary);
        output::newline();
        success("Load complete");
    }
    Ok(())
}
