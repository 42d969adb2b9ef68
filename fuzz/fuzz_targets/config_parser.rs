//! Fuzz target for the benchmark config parser.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_config_parser
//! ```

#![no_main]

use abac_bench_core::BenchConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Accepted configs must survive a serialize/parse cycle.
        if let Ok(config) = BenchConfig::from_toml_str(input) {
            let rendered = config.to_toml_string().expect("accepted config serializes");
            let reparsed = BenchConfig::from_toml_str(&rendered).expect("rendered config parses");
            assert_eq!(reparsed, config);
        }
    }
});
