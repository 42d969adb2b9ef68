//! `abac-bench init` command - Write a starter configuration.

use crate::cli::InitArgs;
use crate::config::{CONFIG_FILE_NAME, starter_config};
use crate::error::{CliError, CliResult};
use crate::output::{self, success};

/// Run the init command
pub async fn run(args: InitArgs) -> CliResult<()> {
    output::header("Initialize Benchmark Configuration");

    let config_path = args.path.join(CONFIG_FILE_NAME);
    if config_path.exists() && !args.force {
        return Err(CliError::Config(format!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        )));
    }

    output::step(1, 2, "Creating directory...");
    std::fs::create_dir_all(&args.path)?;

    output::step(2, 2, "Writing configuration...");
    let config = starter_config(args.abac);
    config.save(&config_path)?;

    output::newline();
    success(&format!("Wrote {}", config_path.display()));
    output::newline();

    output::section("Next steps");
    output::list_item(&format!("Edit {} to size the table and workload", CONFIG_FILE_NAME));
    if !args.abac {
        output::list_item("Set `abac.enabled = true` to benchmark with access control");
    }
    output::list_item("Run `abac-bench run` to load and benchmark");

    Ok(())
}
