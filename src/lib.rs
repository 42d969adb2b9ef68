//! # abac-bench
//!
//! A benchmark harness for attribute-based access control on transactional
//! key-value stores.
//!
//! abac-bench provides:
//! - Idempotent provisioning of label policies, levels, compartments and groups
//! - A bulk loader that tags every row with a data tag
//! - A concurrent read workload with optimistic-concurrency retries
//! - Throughput, latency and authorization reporting
//! - An in-memory store that enforces labels on the read path
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use abac_bench::prelude::*;
//! use abac_bench::memory::MemoryStore;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> BenchResult<()> {
//! let config = BenchConfig::from_toml_str(r#"
//!     [ycsb]
//!     record_count = 100
//!     payload_size = 10
//!
//!     [run]
//!     concurrency = 2
//!     run_for_secs = 0
//!     max_invocations = 10
//!
//!     [abac]
//!     enabled = true
//!     attribute_values = "public,secret"
//!     strategy = "load_balanced"
//! "#)?;
//!
//! let harness = Harness::new(config, Arc::new(MemoryStore::new()))?;
//! let run = harness.run().await?;
//! assert_eq!(run.report.succeeded, 20);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Provisioning, load and workload engine.
pub mod engine {
    pub use abac_bench_core::*;
}

/// In-memory reference store.
pub mod memory {
    pub use abac_bench_memory::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use abac_bench_core::prelude::*;
    pub use abac_bench_core::{BenchReport, BenchRun, LoadSummary};
}

// Re-export key types at the crate root
pub use abac_bench_core::{
    BenchConfig, BenchError, BenchReport, BenchResult, BenchRun, DataTag, ErrorCode, Harness, KeyRange,
    partition,
};
pub use abac_bench_memory::MemoryStore;
