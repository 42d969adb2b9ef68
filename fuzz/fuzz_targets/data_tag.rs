//! Fuzz target for data tag parsing.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_data_tag
//! ```

#![no_main]

use abac_bench_core::DataTag;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(tag) = DataTag::parse(input) {
            let encoded = tag.encode();
            let reparsed = DataTag::parse(&encoded).expect("encoded tag parses");
            assert_eq!(reparsed, tag);
        }
    }
});
