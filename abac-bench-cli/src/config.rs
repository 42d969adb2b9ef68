//! CLI configuration handling.

use std::path::Path;

use abac_bench_core::BenchConfig;

use crate::cli::RunArgs;
use crate::error::{CliError, CliResult};

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "abac-bench.toml";

/// Values written by `abac-bench init --abac`.
const ABAC_LEVELS: &str = "public,confidential,secret";

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> CliResult<BenchConfig> {
    if !path.exists() {
        return Err(CliError::Config(format!(
            "Config file not found: {} (run `abac-bench init` to create one)",
            path.display()
        )));
    }
    Ok(BenchConfig::load(path)?)
}

/// Apply command-line overrides, then revalidate.
pub fn apply_overrides(mut config: BenchConfig, args: &RunArgs) -> CliResult<BenchConfig> {
    if let Some(duration) = args.duration {
        config.run.run_for_secs = duration;
    }
    if let Some(concurrency) = args.concurrency {
        config.run.concurrency = concurrency;
    }
    if let Some(max) = args.max_invocations {
        config.run.max_invocations = Some(max);
    }
    if let Some(seed) = args.seed {
        config.run.seed = Some(seed);
    }
    config.validate()?;
    Ok(config)
}

/// Configuration written by `abac-bench init`.
pub fn starter_config(abac: bool) -> BenchConfig {
    let mut config = BenchConfig::default();
    config.run.run_for_secs = 10;
    if abac {
        config.abac.enabled = true;
        config.abac.attribute_values = ABAC_LEVELS.to_string();
    }
    config
}
