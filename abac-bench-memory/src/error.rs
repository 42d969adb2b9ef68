//! Error types for the in-memory store.

use abac_bench_core::error::{BenchError, ErrorCode};
use thiserror::Error;

/// Result type for in-memory store operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Error type for in-memory store operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// An object with this name already exists.
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// Object kind (namespace, table, user, policy, ...).
        kind: &'static str,
        /// Object name.
        name: String,
    },

    /// No object with this name exists.
    #[error("{kind} '{name}' does not exist")]
    NotFound {
        /// Object kind.
        kind: &'static str,
        /// Object name.
        name: String,
    },

    /// Username or password rejected.
    #[error("authentication failed for '{0}'")]
    Authentication(String),

    /// The session lacks a table privilege.
    #[error("user '{user}' lacks {privilege} privilege on {table}")]
    PermissionDenied {
        /// Username.
        user: String,
        /// Missing privilege.
        privilege: &'static str,
        /// Table.
        table: String,
    },

    /// An insert targeted an existing key.
    #[error("key {key} already exists in {table}")]
    DuplicateKey {
        /// Table.
        table: String,
        /// Key.
        key: i64,
    },

    /// Commit validation found a changed read or write set.
    #[error("transaction {0} conflicts with a concurrent commit")]
    Conflict(String),

    /// The transaction was already committed or aborted.
    #[error("transaction {0} is closed")]
    TransactionClosed(String),

    /// The session was closed.
    #[error("session for '{0}' is closed")]
    SessionClosed(String),

    /// Injected failure.
    #[error("injected failure: {0}")]
    Injected(String),
}

impl MemoryError {
    /// Create an already-exists error.
    pub fn exists(kind: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists { kind, name: name.into() }
    }

    /// Create a not-found error.
    pub fn missing(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound { kind, name: name.into() }
    }

    /// Check if this is a conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<MemoryError> for BenchError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::AlreadyExists { kind, name } => BenchError::already_exists(kind, name),
            MemoryError::NotFound { kind, name } => BenchError::not_found(kind, name),
            MemoryError::Authentication(user) => BenchError::authentication_failed(user),
            MemoryError::PermissionDenied { user, privilege, table } => {
                let mut e = BenchError::permission_denied(&user, table.clone());
                e.message = format!("User {} lacks {} privilege on {}", user, privilege, table);
                e
            }
            MemoryError::Conflict(tx) => BenchError::commit_conflict(tx),
            MemoryError::TransactionClosed(tx) => BenchError::transaction_closed(tx),
            MemoryError::SessionClosed(user) => {
                BenchError::new(ErrorCode::SessionUnavailable, format!("Session for {} is closed", user))
            }
            e @ MemoryError::DuplicateKey { .. } => BenchError::transaction(e.to_string()),
            e @ MemoryError::Injected(_) => BenchError::storage(e.to_string()),
        }
    }
}
