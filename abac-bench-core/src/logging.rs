//! Logging setup for the benchmark harness.
//!
//! Output is controlled through environment variables:
//!
//! - `ABAC_BENCH_DEBUG=true` - Enable debug logging
//! - `ABAC_BENCH_LOG_LEVEL=debug|info|warn|error|trace` - Set a specific level
//! - `ABAC_BENCH_LOG_FORMAT=json|pretty|compact` - Set the output format (default: compact)
//!
//! Library code only emits `tracing` events. Installing a subscriber requires
//! the `tracing-subscriber` feature, which the CLI enables.
//!
//! ```rust,no_run
//! use abac_bench_core::logging;
//!
//! // Call once at startup; later calls are no-ops.
//! logging::init_with_default("info");
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `ABAC_BENCH_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("ABAC_BENCH_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Resolve the log level from `ABAC_BENCH_LOG_LEVEL`, falling back to `default`.
///
/// `ABAC_BENCH_DEBUG` forces "debug" when no explicit level is set.
pub fn get_log_level(default: &'static str) -> &'static str {
    match env::var("ABAC_BENCH_LOG_LEVEL") {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ if is_debug_enabled() => "debug",
            _ => default,
        },
        Err(_) if is_debug_enabled() => "debug",
        Err(_) => default,
    }
}

/// Get the configured log format from `ABAC_BENCH_LOG_FORMAT`.
pub fn get_log_format() -> &'static str {
    env::var("ABAC_BENCH_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "json" => "json",
            _ => "compact",
        })
        .unwrap_or("compact")
}

/// Initialize logging with "warn" as the default level.
pub fn init() {
    init_with_default("warn");
}

/// Initialize logging, using `default_level` when no environment override is set.
pub fn init_with_default(default_level: &'static str) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level(default_level);
            let filter = EnvFilter::try_new(format!(
                "abac_bench={},abac_bench_core={},abac_bench_memory={},abac_bench_cli={}",
                level, level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            let installed = match get_log_format() {
                "json" => registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init(),
                "pretty" => registry.with(fmt::layer().pretty().with_writer(std::io::stderr)).try_init(),
                _ => registry
                    .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
                    .try_init(),
            };

            if installed.is_ok() {
                tracing::debug!(level = level, format = get_log_format(), "Logging initialized");
            }
        }

        #[cfg(not(feature = "tracing-subscriber"))]
        {
            let _ = default_level;
        }
    });
}

/// Debug log that is only emitted when `ABAC_BENCH_DEBUG` is enabled at runtime.
#[macro_export]
macro_rules! bench_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_default() {
        // SAFETY: Test runs in isolation
        unsafe {
            env::remove_var("ABAC_BENCH_DEBUG");
            env::remove_var("ABAC_BENCH_LOG_LEVEL");
        }
        assert!(!is_debug_enabled());
        assert_eq!(get_log_level("info"), "info");
    }
}
