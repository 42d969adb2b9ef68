//! CLI error types and result alias.

use abac_bench_core::harness::is_setup_error;
use abac_bench_core::{BenchError, ErrorCode};
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(abac_bench::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(abac_bench::config))]
    Config(String),

    /// Provisioning or load failure
    #[error("Setup error: {0}")]
    #[diagnostic(code(abac_bench::setup), help("Check that the store exposes policy administration"))]
    Setup(String),

    /// Workload failure
    #[error("Workload error: {0}")]
    #[diagnostic(code(abac_bench::workload))]
    Workload(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Setup(_) => 3,
            CliError::Io(_) | CliError::Workload(_) => 1,
        }
    }
}

impl From<BenchError> for CliError {
    fn from(err: BenchError) -> Self {
        let message = err.display_full().trim_end().to_string();
        if err.code == ErrorCode::InvalidConfiguration {
            CliError::Config(message)
        } else if is_setup_error(&err) {
            CliError::Setup(message)
        } else {
            CliError::Workload(message)
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Workload(format!("Failed to serialize output: {}", err))
    }
}
