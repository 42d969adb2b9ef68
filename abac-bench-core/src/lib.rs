//! # abac-bench-core
//!
//! Provisioning and workload engine for benchmarking attribute-based access
//! control on a transactional store.
//!
//! This crate provides:
//! - The store contract a backend implements (`store`)
//! - Idempotent policy provisioning (`provision`)
//! - Table setup and tagged bulk load (`loader`)
//! - A concurrent read workload with optimistic-concurrency retries (`workload`)
//! - Lock-free metrics and the end-of-run report (`metrics`, `report`)
//! - Orchestration of all phases (`harness`)
//!
//! ## Data Tags
//!
//! ```rust
//! use abac_bench_core::{DataTag, tag};
//!
//! assert_eq!(tag::encode("Public", &["HR", "Sales"], &[] as &[&str]), "public:hr,sales:");
//!
//! let parsed = DataTag::parse("secret::team_a").unwrap();
//! assert_eq!(parsed.level, "secret");
//! assert_eq!(parsed.groups, vec!["team_a"]);
//! ```
//!
//! ## Key Ranges
//!
//! ```rust
//! use abac_bench_core::{KeyRange, partition};
//!
//! let ranges: Vec<KeyRange> = (0..4).map(|w| partition(w, 4, 100).unwrap()).collect();
//! assert_eq!(ranges[0], KeyRange::new(0, 24));
//! assert_eq!(ranges[3], KeyRange::new(75, 99));
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use abac_bench_core::{BenchConfig, StrategyKind};
//!
//! let config = BenchConfig::from_toml_str(r#"
//!     [run]
//!     concurrency = 4
//!
//!     [abac]
//!     enabled = true
//!     strategy = "load_balanced"
//! "#).unwrap();
//!
//! assert_eq!(config.effective_user_count(), 4);
//! assert_eq!(config.abac.strategy, StrategyKind::LoadBalanced);
//! ```

pub mod config;
pub mod error;
pub mod harness;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod partition;
pub mod provision;
pub mod report;
pub mod session;
pub mod store;
pub mod strategy;
pub mod tag;
pub mod workload;

pub use config::{
    AbacConfig, AttributeCatalog, AttributeType, BenchConfig, ProvisionOrder, RunConfig, SessionAssignment,
    YcsbConfig,
};
pub use error::{BenchError, BenchResult, ErrorCode, ErrorContext};
pub use harness::{BenchRun, Harness};
pub use loader::{LoadSummary, Loader};
pub use metrics::{LatencyShard, LatencySummary, MetricsAggregator, MetricsSink, MetricsSnapshot};
pub use partition::{KeyRange, partition};
pub use provision::{PolicyProvisioner, ProvisionPlan, ProvisionSummary, UserAttributes};
pub use report::{AbacSummary, BenchReport};
pub use session::{SessionPool, stable_hash};
pub use store::{
    AccessMode, Connector, Credentials, MembershipGrant, PolicyAdmin, Principal, Privilege, Record, Session,
    StorageAdmin, TableRef, TableSchema, Transaction,
};
pub use strategy::{AssignmentStrategy, StrategyKind};
pub use tag::DataTag;
pub use workload::{InvocationOutcome, WorkerContext, WorkerFailure, WorkloadExecutor, WorkloadSettings};

// Re-export logging utilities
pub use logging::{get_log_format, get_log_level, init as init_logging, init_with_default, is_debug_enabled};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::BenchConfig;
    pub use crate::error::{BenchError, BenchResult};
    pub use crate::harness::Harness;
    pub use crate::store::{Connector, PolicyAdmin, Session, StorageAdmin, Transaction};
    pub use crate::strategy::{AssignmentStrategy, StrategyKind};
}
