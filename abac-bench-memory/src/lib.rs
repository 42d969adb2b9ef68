//! In-process transactional store for the ABAC benchmark harness.
//!
//! This crate implements the `abac-bench-core` store contract entirely in
//! memory, so the full load and run phases can execute without an external
//! database.
//!
//! # Features
//!
//! - Namespaces, tables, users and table privileges
//! - Label policies with levels, compartments and hierarchical groups
//! - Read enforcement of row data tags for user sessions
//! - Optimistic transactions validated at commit
//! - Fault injection for commit conflicts and session close failures
//!
//! # Example
//!
//! ```rust
//! use abac_bench_core::store::{Connector, StorageAdmin, TableRef, TableSchema};
//! use abac_bench_memory::MemoryStore;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! store.create_namespace("ycsb").await.unwrap();
//! store
//!     .create_table(&TableSchema::ycsb(TableRef::new("ycsb", "usertable"), None))
//!     .await
//!     .unwrap();
//!
//! let session = store.admin_session().await.unwrap();
//! assert!(session.principal().is_admin());
//! # });
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod policy;
pub mod session;

pub use config::MemoryConfig;
pub use engine::{MemoryStore, StoreStats};
pub use error::{MemoryError, MemoryResult};
pub use policy::{CreationCounts, PolicyRegistry, UserLabel};
pub use session::{MemorySession, MemoryTransaction};
