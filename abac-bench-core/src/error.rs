//! Error types for provisioning, loading and workload execution.
//!
//! Errors carry a stable [`ErrorCode`] so callers can classify failures
//! without string matching:
//!
//! - 1xxx: Provisioning (already exists, not found, setup failure)
//! - 2xxx: Transactions (conflicts, retry limit, cancellation)
//! - 3xxx: Sessions (authentication, missing session, admin misuse)
//! - 4xxx: Arguments and configuration
//! - 5xxx: Storage collaborator failures
//! - 9xxx: Internal errors
//!
//! ```rust
//! use abac_bench_core::{BenchError, ErrorCode};
//!
//! let err = BenchError::commit_conflict("tx-1");
//! assert!(err.is_conflict());
//! assert_eq!(err.code.code(), "B2002");
//!
//! let err = BenchError::already_exists("policy", "ycsb_benchmark_policy");
//! assert!(err.is_already_exists());
//! assert_eq!(err.code, ErrorCode::AlreadyExists);
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for harness operations.
pub type BenchResult<T> = Result<T, BenchError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Provisioning errors (1xxx)
    /// Object already exists or was already applied (B1001).
    AlreadyExists = 1001,
    /// Object does not exist (B1002).
    NotFound = 1002,
    /// Setup phase aborted (B1003).
    SetupFailed = 1003,
    /// The store does not expose policy administration (B1004).
    PolicyAdminUnavailable = 1004,

    // Transaction errors (2xxx)
    /// A read or write lost a race with a concurrent transaction (B2001).
    CrudConflict = 2001,
    /// Commit validation failed because of a concurrent writer (B2002).
    CommitConflict = 2002,
    /// Transaction failed for a non-conflict reason (B2003).
    TransactionFailed = 2003,
    /// Transaction already committed or aborted (B2004).
    TransactionClosed = 2004,
    /// Conflict retries exceeded the configured cap (B2005).
    RetryLimitExceeded = 2005,
    /// Stop was requested while an invocation was retrying (B2006).
    Cancelled = 2006,

    // Session errors (3xxx)
    /// Credentials were rejected (B3001).
    AuthenticationFailed = 3001,
    /// No session exists for the requested user (B3002).
    SessionUnavailable = 3002,
    /// The administrative session was about to be used for workload reads (B3003).
    AdminSessionForbidden = 3003,
    /// The session lacks a privilege on the target table (B3004).
    PermissionDenied = 3004,

    // Argument errors (4xxx)
    /// Invalid argument at the call site (B4001).
    InvalidArgument = 4001,
    /// Invalid configuration (B4002).
    InvalidConfiguration = 4002,

    // Storage errors (5xxx)
    /// Generic storage collaborator failure (B5001).
    StorageError = 5001,

    // Internal errors (9xxx)
    /// Internal error (B9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "B2002").
    pub fn code(&self) -> String {
        format!("B{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "Already exists",
            Self::NotFound => "Not found",
            Self::SetupFailed => "Setup failed",
            Self::PolicyAdminUnavailable => "Policy administration unavailable",
            Self::CrudConflict => "Read/write conflict",
            Self::CommitConflict => "Commit conflict",
            Self::TransactionFailed => "Transaction failed",
            Self::TransactionClosed => "Transaction already closed",
            Self::RetryLimitExceeded => "Retry limit exceeded",
            Self::Cancelled => "Cancelled",
            Self::AuthenticationFailed => "Authentication failed",
            Self::SessionUnavailable => "Session unavailable",
            Self::AdminSessionForbidden => "Admin session used for workload",
            Self::PermissionDenied => "Permission denied",
            Self::InvalidArgument => "Invalid argument",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::StorageError => "Storage error",
            Self::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The resource involved (policy, table, user, ...).
    pub resource: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors raised by the harness and by store implementations.
#[derive(Error, Debug)]
pub struct BenchError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl BenchError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Set the resource involved.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.context.resource = Some(resource.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(suggestion.into());
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create an already-exists error for a named object.
    pub fn already_exists(kind: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorCode::AlreadyExists, format!("The {} {} already exists", kind, name))
            .with_resource(name)
    }

    /// Create a not-found error for a named object.
    pub fn not_found(kind: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorCode::NotFound, format!("The {} {} does not exist", kind, name))
            .with_resource(name)
    }

    /// Wrap a provisioning or load failure into a setup failure.
    pub fn setup_failed(step: impl Into<String>, cause: BenchError) -> Self {
        let step = step.into();
        Self::new(ErrorCode::SetupFailed, format!("Setup failed during {}: {}", step, cause))
            .with_context(step)
            .with_source(cause)
    }

    /// Create an error for a store without policy administration.
    pub fn policy_admin_unavailable() -> Self {
        Self::new(
            ErrorCode::PolicyAdminUnavailable,
            "The store does not support attribute-based access control administration",
        )
        .with_suggestion("Disable ABAC with `abac.enabled = false`")
    }

    /// Create a read/write conflict error.
    pub fn crud_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CrudConflict, format!("Conflict: {}", message.into()))
    }

    /// Create a commit conflict error for the given transaction.
    pub fn commit_conflict(tx_id: impl Into<String>) -> Self {
        let tx_id = tx_id.into();
        Self::new(
            ErrorCode::CommitConflict,
            format!("Transaction {} conflicted with a concurrent writer", tx_id),
        )
        .with_resource(tx_id)
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransactionFailed, format!("Transaction error: {}", message.into()))
    }

    /// Create an error for an operation on a closed transaction.
    pub fn transaction_closed(tx_id: impl Into<String>) -> Self {
        let tx_id = tx_id.into();
        Self::new(
            ErrorCode::TransactionClosed,
            format!("Transaction {} is already committed or aborted", tx_id),
        )
        .with_resource(tx_id)
    }

    /// Create a retry-limit error.
    pub fn retry_limit_exceeded(max_retries: u32) -> Self {
        Self::new(
            ErrorCode::RetryLimitExceeded,
            format!("Gave up after {} conflict retries", max_retries),
        )
        .with_suggestion("Increase `run.max_retries` or reduce contention")
    }

    /// Create a cancellation error.
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, "Stop requested while retrying")
    }

    /// Create an authentication error.
    pub fn authentication_failed(username: impl Into<String>) -> Self {
        let username = username.into();
        Self::new(
            ErrorCode::AuthenticationFailed,
            format!("Authentication failed for user {}", username),
        )
        .with_resource(username)
        .with_suggestion("Run the load phase so simulated users are created")
    }

    /// Create an error for a missing per-user session.
    pub fn session_unavailable(user_index: usize) -> Self {
        Self::new(
            ErrorCode::SessionUnavailable,
            format!("No session is available for user index {}", user_index),
        )
        .with_help("Set `run.allow_admin_fallback = true` to fall back to the admin session")
    }

    /// Create an error for an administrative session reaching the workload path.
    pub fn admin_session_forbidden() -> Self {
        Self::new(
            ErrorCode::AdminSessionForbidden,
            "The administrative session must not execute workload transactions",
        )
    }

    /// Create a permission-denied error.
    pub fn permission_denied(username: &str, resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self::new(
            ErrorCode::PermissionDenied,
            format!("User {} lacks the privilege on {}", username, resource),
        )
        .with_resource(resource)
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    /// Create an invalid-configuration error.
    pub fn invalid_config(field: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidConfiguration,
            format!("Invalid configuration for {}: {}", field, message.into()),
        )
        .with_resource(field)
    }

    /// Create a general storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message.into()))
    }

    // ============== Error Checks ==============

    /// Check if this is an already-exists / already-applied error.
    pub fn is_already_exists(&self) -> bool {
        self.code == ErrorCode::AlreadyExists
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }

    /// Check if this is a conflict-class error that warrants a retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self.code, ErrorCode::CrudConflict | ErrorCode::CommitConflict)
    }

    /// Check if this error reports a cooperative stop.
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }

    /// Check if this error aborted the setup phase.
    pub fn is_setup_failure(&self) -> bool {
        self.code == ErrorCode::SetupFailed
    }

    /// Check if this error reports an exhausted retry budget.
    pub fn is_retry_limit(&self) -> bool {
        self.code == ErrorCode::RetryLimitExceeded
    }

    /// Display the error with its context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = format!("Error [{}]: {}\n", self.code.code(), self.message);

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref resource) = self.context.resource {
            output.push_str(&format!("  → Resource: {}\n", resource));
        }
        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }
        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output
    }
}
