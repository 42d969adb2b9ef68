//! CLI argument definitions using clap.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CONFIG_FILE_NAME;

/// abac-bench - Attribute-based access control benchmark harness
#[derive(Parser, Debug)]
#[command(name = "abac-bench")]
#[command(version)]
#[command(about = "abac-bench - Attribute-based access control benchmark harness", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Default log level for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a starter benchmark configuration
    Init(InitArgs),

    /// Provision access control and load the table
    Load(LoadArgs),

    /// Load, then run the read workload and print the report
    Run(RunArgs),

    /// Display version information
    Version,
}

// =============================================================================
// Init Command
// =============================================================================

/// Arguments for the `init` command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to write the configuration into
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Enable attribute-based access control in the generated config
    #[arg(long)]
    pub abac: bool,

    /// Overwrite an existing configuration
    #[arg(short, long)]
    pub force: bool,
}

// =============================================================================
// Load Command
// =============================================================================

/// Arguments for the `load` command
#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Path to the benchmark configuration
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Print the load summary as JSON
    #[arg(long)]
    pub json: bool,
}

// =============================================================================
// Run Command
// =============================================================================

/// Arguments for the `run` command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the benchmark configuration
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Print the load summary and report as JSON
    #[arg(long)]
    pub json: bool,

    /// Override `run.run_for_secs`
    #[arg(short, long, value_name = "SECS")]
    pub duration: Option<u64>,

    /// Override `run.concurrency`
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Override `run.max_invocations`
    #[arg(long, value_name = "N")]
    pub max_invocations: Option<u64>,

    /// Override `run.seed`
    #[arg(long)]
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_overrides_parse() {
        let cli = Cli::parse_from([
            "abac-bench",
            "-vv",
            "run",
            "--config",
            "bench.toml",
            "--duration",
            "5",
            "--concurrency",
            "8",
            "--json",
        ]);
        assert_eq!(cli.log_level(), "debug");

        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.config, PathBuf::from("bench.toml"));
        assert_eq!(args.duration, Some(5));
        assert_eq!(args.concurrency, Some(8));
        assert!(args.json);
        assert_eq!(args.max_invocations, None);
    }

    #[test]
    fn test_load_uses_default_config_path() {
        let cli = Cli::parse_from(["abac-bench", "load"]);
        let Command::Load(args) = cli.command else {
            panic!("expected load command");
        };
        assert_eq!(args.config, PathBuf::from(CONFIG_FILE_NAME));
    }
}
