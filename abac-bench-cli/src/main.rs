//! abac-bench CLI - Command-line runner for the ABAC benchmark harness.

use clap::Parser;

use abac_bench_cli::cli::{Cli, Command};
use abac_bench_cli::commands;
use abac_bench_cli::error::CliResult;
use abac_bench_cli::output;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        output::error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    abac_bench_core::logging::init_with_default(cli.log_level());

    match cli.command {
        Command::Init(args) => commands::init::run(args).await,
        Command::Load(args) => commands::load::run(args).await,
        Command::Run(args) => commands::run::run(args).await,
        Command::Version => commands::version::run().await,
    }
}
