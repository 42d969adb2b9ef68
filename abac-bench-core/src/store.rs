//! Collaborator contract for the transactional store.
//!
//! The harness never talks to a storage engine directly. It drives these
//! traits, which a backend implements:
//!
//! - [`StorageAdmin`]: namespaces, tables, users and privileges
//! - [`PolicyAdmin`]: policies, attribute hierarchy, table bindings, user bindings
//! - [`Session`] / [`Transaction`]: optimistic transactions on an authenticated session
//! - [`Connector`]: entry point handing out the administrative handles and sessions
//!
//! Conflict-class failures must be reported with [`ErrorCode::CrudConflict`] or
//! [`ErrorCode::CommitConflict`] so [`BenchError::is_conflict`] can tell them apart
//! from fatal errors.
//!
//! [`ErrorCode::CrudConflict`]: crate::error::ErrorCode::CrudConflict
//! [`ErrorCode::CommitConflict`]: crate::error::ErrorCode::CommitConflict
//! [`BenchError::is_conflict`]: crate::error::BenchError::is_conflict

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BenchResult;

/// Name of the primary key column.
pub const KEY_COLUMN: &str = "ycsb_key";

/// Name of the payload column.
pub const PAYLOAD_COLUMN: &str = "payload";

/// A fully qualified table reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    /// Namespace (keyspace / schema) name.
    pub namespace: String,
    /// Table name.
    pub table: String,
}

impl TableRef {
    /// Create a table reference.
    pub fn new(namespace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.table)
    }
}

/// Column types used by the benchmark schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// 64-bit integer.
    Int,
    /// UTF-8 text.
    Text,
}

/// One column of a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
    /// Whether this is the partition key.
    pub primary_key: bool,
}

impl Column {
    fn new(name: impl Into<String>, column_type: ColumnType, primary_key: bool) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key,
        }
    }
}

/// Table definition passed to [`StorageAdmin::create_table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Target table.
    pub table: TableRef,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
}

impl TableSchema {
    /// The benchmark table: integer key, text payload and, when given, a text tag column.
    pub fn ycsb(table: TableRef, tag_column: Option<&str>) -> Self {
        let mut columns = vec![
            Column::new(KEY_COLUMN, ColumnType::Int, true),
            Column::new(PAYLOAD_COLUMN, ColumnType::Text, false),
        ];
        if let Some(tag_column) = tag_column {
            columns.push(Column::new(tag_column, ColumnType::Text, false));
        }
        Self { table, columns }
    }

    /// Name of the tag column, if the schema carries one.
    pub fn tag_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .skip(2)
            .find(|c| c.column_type == ColumnType::Text)
            .map(|c| c.name.as_str())
    }
}

/// A stored benchmark row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Partition key.
    pub key: i64,
    /// Opaque payload.
    pub payload: String,
    /// Encoded data tag, when the table is tagged.
    pub tag: Option<String>,
}

impl Record {
    /// Create an untagged record.
    pub fn new(key: i64, payload: impl Into<String>) -> Self {
        Self {
            key,
            payload: payload.into(),
            tag: None,
        }
    }

    /// Attach an encoded data tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Username and password of a store user.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Credentials of simulated user `index`: `user<i>` / `password<i>`.
    pub fn simulated(index: usize) -> Self {
        Self::new(format!("user{}", index), format!("password{}", index))
    }

    /// Credentials of the first `count` simulated users.
    pub fn simulated_users(count: usize) -> Vec<Self> {
        (0..count).map(Self::simulated).collect()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Table privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Privilege {
    /// Point reads.
    Read,
    /// Inserts and upserts.
    Write,
}

/// Owner of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Principal {
    /// The administrative identity used for setup.
    Admin,
    /// A simulated user.
    User(String),
}

impl Principal {
    /// Whether this is the administrative identity.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// The username, or "admin".
    pub fn name(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::User(name) => name,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A policy as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyInfo {
    /// Policy name.
    pub name: String,
    /// Column holding the data tag.
    pub tag_column: String,
    /// Whether the policy is enforced.
    pub enabled: bool,
}

/// A sensitivity level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelInfo {
    /// Short name (matches the tag value).
    pub short_name: String,
    /// Display name.
    pub long_name: String,
    /// 1-based rank, higher is more sensitive.
    pub rank: u32,
}

/// A compartment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompartmentInfo {
    /// Short name.
    pub short_name: String,
    /// Display name.
    pub long_name: String,
}

/// A group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    /// Short name.
    pub short_name: String,
    /// Display name.
    pub long_name: String,
    /// Parent group short name.
    pub parent: Option<String>,
}

/// Binding of a policy to a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePolicyInfo {
    /// Binding name, `<policy>_<namespace>_<table>`.
    pub name: String,
    /// Bound policy.
    pub policy: String,
    /// Bound table.
    pub table: TableRef,
    /// Whether the binding is enforced.
    pub enabled: bool,
}

impl TablePolicyInfo {
    /// Standard binding name for `policy` on `table`.
    pub fn binding_name(policy: &str, table: &TableRef) -> String {
        format!("{}_{}_{}", policy, table.namespace, table.table)
    }
}

/// Access mode granted with a compartment or group membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Read only.
    Read,
    /// Read and write.
    #[default]
    ReadWrite,
}

/// Options of a compartment or group membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipGrant {
    /// Granted access mode.
    pub access: AccessMode,
    /// Part of the user's default session attributes.
    pub default_grant: bool,
    /// Applied to rows the user writes.
    pub row_grant: bool,
}

impl Default for MembershipGrant {
    fn default() -> Self {
        Self {
            access: AccessMode::ReadWrite,
            default_grant: true,
            row_grant: true,
        }
    }
}

/// Namespace, table and user administration.
#[async_trait]
pub trait StorageAdmin: Send + Sync {
    /// Create a namespace. Fails with already-exists when present.
    async fn create_namespace(&self, namespace: &str) -> BenchResult<()>;

    /// Drop a namespace and everything in it.
    async fn drop_namespace(&self, namespace: &str) -> BenchResult<()>;

    /// Create a table. Fails with already-exists when present.
    async fn create_table(&self, schema: &TableSchema) -> BenchResult<()>;

    /// Drop a table. Fails with not-found when absent.
    async fn drop_table(&self, table: &TableRef) -> BenchResult<()>;

    /// Create a user. Fails with already-exists when present.
    async fn create_user(&self, credentials: &Credentials) -> BenchResult<()>;

    /// Drop a user.
    async fn drop_user(&self, username: &str) -> BenchResult<()>;

    /// Grant table privileges to a user.
    async fn grant(&self, username: &str, table: &TableRef, privileges: &[Privilege]) -> BenchResult<()>;
}

/// Attribute-based access control administration.
///
/// `create_*` calls fail with already-exists for duplicates; `get_*` calls
/// return `Ok(None)` for missing objects.
#[async_trait]
pub trait PolicyAdmin: Send + Sync {
    /// Look up a policy.
    async fn get_policy(&self, name: &str) -> BenchResult<Option<PolicyInfo>>;

    /// Create a disabled policy.
    async fn create_policy(&self, name: &str, tag_column: &str) -> BenchResult<()>;

    /// Enable a policy. Enabling an enabled policy succeeds.
    async fn enable_policy(&self, name: &str) -> BenchResult<()>;

    /// Look up a level.
    async fn get_level(&self, policy: &str, short_name: &str) -> BenchResult<Option<LevelInfo>>;

    /// Create a level.
    async fn create_level(&self, policy: &str, level: &LevelInfo) -> BenchResult<()>;

    /// Look up a compartment.
    async fn get_compartment(&self, policy: &str, short_name: &str) -> BenchResult<Option<CompartmentInfo>>;

    /// Create a compartment.
    async fn create_compartment(&self, policy: &str, compartment: &CompartmentInfo) -> BenchResult<()>;

    /// Look up a group.
    async fn get_group(&self, policy: &str, short_name: &str) -> BenchResult<Option<GroupInfo>>;

    /// Create a group.
    async fn create_group(&self, policy: &str, group: &GroupInfo) -> BenchResult<()>;

    /// Look up a table binding.
    async fn get_table_policy(&self, name: &str) -> BenchResult<Option<TablePolicyInfo>>;

    /// Create a disabled table binding.
    async fn create_table_policy(&self, name: &str, policy: &str, table: &TableRef) -> BenchResult<()>;

    /// Enable a table binding.
    async fn enable_table_policy(&self, name: &str) -> BenchResult<()>;

    /// Set (overwrite) a user's level.
    async fn set_user_level(&self, policy: &str, username: &str, level: &str) -> BenchResult<()>;

    /// Add a compartment membership.
    async fn add_user_compartment(
        &self,
        policy: &str,
        username: &str,
        compartment: &str,
        grant: MembershipGrant,
    ) -> BenchResult<()>;

    /// Remove a compartment membership. Fails with not-found when absent.
    async fn remove_user_compartment(&self, policy: &str, username: &str, compartment: &str) -> BenchResult<()>;

    /// Add a group membership.
    async fn add_user_group(
        &self,
        policy: &str,
        username: &str,
        group: &str,
        grant: MembershipGrant,
    ) -> BenchResult<()>;

    /// Remove a group membership. Fails with not-found when absent.
    async fn remove_user_group(&self, policy: &str, username: &str, group: &str) -> BenchResult<()>;
}

/// An optimistic transaction.
///
/// After `commit` or `abort` every further call fails with transaction-closed.
#[async_trait]
pub trait Transaction: Send {
    /// Transaction identifier for logs.
    fn id(&self) -> &str;

    /// Point read by partition key. `Ok(None)` when absent or not visible.
    async fn get(&mut self, table: &TableRef, key: i64) -> BenchResult<Option<Record>>;

    /// Insert a new row. Fails when the key exists.
    async fn insert(&mut self, table: &TableRef, record: Record) -> BenchResult<()>;

    /// Insert or overwrite a row.
    async fn upsert(&mut self, table: &TableRef, record: Record) -> BenchResult<()>;

    /// Validate and apply. Conflicts surface as conflict-class errors.
    async fn commit(&mut self) -> BenchResult<()>;

    /// Discard buffered writes.
    async fn abort(&mut self) -> BenchResult<()>;
}

/// An authenticated session that starts transactions.
#[async_trait]
pub trait Session: Send + Sync {
    /// Identity the session is bound to.
    fn principal(&self) -> &Principal;

    /// Start a transaction.
    async fn begin(&self) -> BenchResult<Box<dyn Transaction>>;

    /// Close the session. Later `begin` calls fail.
    async fn close(&self) -> BenchResult<()>;
}

/// Entry point into a backend.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Backend name for logs and reports.
    fn name(&self) -> &str;

    /// Administrative handle.
    fn storage_admin(&self) -> Arc<dyn StorageAdmin>;

    /// Policy administration, or `None` when the backend has none.
    fn policy_admin(&self) -> Option<Arc<dyn PolicyAdmin>>;

    /// Open the administrative session.
    async fn admin_session(&self) -> BenchResult<Arc<dyn Session>>;

    /// Open a session authenticated as `credentials`.
    async fn connect(&self, credentials: &Credentials) -> BenchResult<Arc<dyn Session>>;
}
