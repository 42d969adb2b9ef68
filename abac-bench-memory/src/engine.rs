//! In-memory store engine.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use abac_bench_core::error::BenchResult;
use abac_bench_core::store::{
    CompartmentInfo, Connector, Credentials, GroupInfo, LevelInfo, MembershipGrant, PolicyAdmin, PolicyInfo,
    Principal, Privilege, Record, Session, StorageAdmin, TablePolicyInfo, TableRef, TableSchema,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::MemoryConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::policy::{CreationCounts, PolicyRegistry, UserLabel};
use crate::session::MemorySession;

/// A stored row and the commit version that wrote it.
#[derive(Debug, Clone)]
pub(crate) struct VersionedRecord {
    pub(crate) record: Record,
    pub(crate) version: u64,
}

#[derive(Debug)]
pub(crate) struct Table {
    pub(crate) schema: TableSchema,
    pub(crate) rows: BTreeMap<i64, VersionedRecord>,
}

#[derive(Debug)]
struct UserEntry {
    password: String,
    privileges: HashMap<TableRef, HashSet<Privilege>>,
}

#[derive(Debug, Default)]
pub(crate) struct State {
    namespaces: HashMap<String, HashMap<String, Table>>,
    users: HashMap<String, UserEntry>,
    pub(crate) policies: PolicyRegistry,
    next_version: u64,
}

impl State {
    pub(crate) fn table(&self, table: &TableRef) -> MemoryResult<&Table> {
        self.namespaces
            .get(&table.namespace)
            .and_then(|tables| tables.get(&table.table))
            .ok_or_else(|| MemoryError::missing("table", table.to_string()))
    }

    pub(crate) fn table_mut(&mut self, table: &TableRef) -> MemoryResult<&mut Table> {
        self.namespaces
            .get_mut(&table.namespace)
            .and_then(|tables| tables.get_mut(&table.table))
            .ok_or_else(|| MemoryError::missing("table", table.to_string()))
    }

    pub(crate) fn next_version(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    pub(crate) fn check_privilege(&self, principal: &Principal, table: &TableRef, privilege: Privilege) -> MemoryResult<()> {
        let Principal::User(username) = principal else {
            return Ok(());
        };
        let granted = self
            .users
            .get(username)
            .and_then(|user| user.privileges.get(table))
            .is_some_and(|privileges| privileges.contains(&privilege));
        if granted {
            Ok(())
        } else {
            Err(MemoryError::PermissionDenied {
                user: username.clone(),
                privilege: match privilege {
                    Privilege::Read => "read",
                    Privilege::Write => "write",
                },
                table: table.to_string(),
            })
        }
    }
}

/// Transaction statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Successful commits.
    pub commits: u64,
    /// Commits rejected by validation or injection.
    pub conflicts: u64,
    /// Explicit aborts of active transactions.
    pub aborts: u64,
}

pub(crate) struct Inner {
    pub(crate) config: MemoryConfig,
    pub(crate) state: RwLock<State>,
    injected_conflicts: AtomicU64,
    close_failures: Mutex<HashSet<String>>,
    pub(crate) commits: AtomicU64,
    pub(crate) conflicts: AtomicU64,
    pub(crate) aborts: AtomicU64,
}

impl Inner {
    /// Consume one injected conflict, if any are pending.
    pub(crate) fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    pub(crate) fn take_close_failure(&self, name: &str) -> bool {
        self.close_failures.lock().remove(name)
    }
}

/// An in-process transactional store with label-based read enforcement.
///
/// Cloning is cheap and every clone shares the same data.
///
/// ```rust
/// use abac_bench_memory::MemoryStore;
///
/// let store = MemoryStore::new();
/// store.inject_commit_conflicts(2);
/// assert_eq!(store.stats().commits, 0);
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store with default configuration.
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    /// Create an empty store.
    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: RwLock::new(State::default()),
                injected_conflicts: AtomicU64::new(0),
                close_failures: Mutex::new(HashSet::new()),
                commits: AtomicU64::new(0),
                conflicts: AtomicU64::new(0),
                aborts: AtomicU64::new(0),
            }),
        }
    }

    /// The store configuration.
    pub fn config(&self) -> &MemoryConfig {
        &self.inner.config
    }

    /// Force the next `count` commits to fail with a conflict.
    pub fn inject_commit_conflicts(&self, count: u64) {
        self.inner.injected_conflicts.fetch_add(count, Ordering::AcqRel);
    }

    /// Make the next close of `principal`'s session fail.
    pub fn inject_close_failure(&self, principal: &Principal) {
        self.inner.close_failures.lock().insert(principal.name().to_string());
    }

    /// Transaction statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            commits: self.inner.commits.load(Ordering::Relaxed),
            conflicts: self.inner.conflicts.load(Ordering::Relaxed),
            aborts: self.inner.aborts.load(Ordering::Relaxed),
        }
    }

    /// Policy object creation counters.
    pub fn creation_counts(&self) -> CreationCounts {
        self.inner.state.read().policies.counts()
    }

    /// A user's label under `policy`.
    pub fn user_label(&self, policy: &str, username: &str) -> Option<UserLabel> {
        self.inner.state.read().policies.user_label(policy, username)
    }

    /// Whether reads of `table` are currently enforced.
    pub fn is_enforced(&self, table: &TableRef) -> bool {
        self.inner.state.read().policies.is_enforced(table)
    }

    /// Number of rows in `table`, or `None` when it does not exist.
    pub fn row_count(&self, table: &TableRef) -> Option<usize> {
        self.inner.state.read().table(table).ok().map(|t| t.rows.len())
    }

    /// Committed row without enforcement.
    pub fn row(&self, table: &TableRef, key: i64) -> Option<Record> {
        let state = self.inner.state.read();
        state.table(table).ok()?.rows.get(&key).map(|v| v.record.clone())
    }

    /// Schema of `table`.
    pub fn schema(&self, table: &TableRef) -> Option<TableSchema> {
        self.inner.state.read().table(table).ok().map(|t| t.schema.clone())
    }

    /// Whether a user exists.
    pub fn has_user(&self, username: &str) -> bool {
        self.inner.state.read().users.contains_key(username)
    }

    /// Whether `username` holds `privilege` on `table`.
    pub fn has_privilege(&self, username: &str, table: &TableRef, privilege: Privilege) -> bool {
        self.inner
            .state
            .read()
            .check_privilege(&Principal::User(username.to_string()), table, privilege)
            .is_ok()
    }

    fn open_session(&self, principal: Principal) -> Arc<dyn Session> {
        Arc::new(MemorySession::new(Arc::clone(&self.inner), principal))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("MemoryStore")
            .field("namespaces", &state.namespaces.len())
            .field("users", &state.users.len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[async_trait]
impl StorageAdmin for MemoryStore {
    async fn create_namespace(&self, namespace: &str) -> BenchResult<()> {
        let mut state = self.inner.state.write();
        if state.namespaces.contains_key(namespace) {
            return Err(MemoryError::exists("namespace", namespace).into());
        }
        state.namespaces.insert(namespace.to_string(), HashMap::new());
        debug!(namespace, "Namespace created");
        Ok(())
    }

    async fn drop_namespace(&self, namespace: &str) -> BenchResult<()> {
        let mut state = self.inner.state.write();
        state
            .namespaces
            .remove(namespace)
            .map(|_| ())
            .ok_or_else(|| MemoryError::missing("namespace", namespace).into())
    }

    async fn create_table(&self, schema: &TableSchema) -> BenchResult<()> {
        let mut state = self.inner.state.write();
        let table = &schema.table;
        let tables = state
            .namespaces
            .get_mut(&table.namespace)
            .ok_or_else(|| MemoryError::missing("namespace", &table.namespace))?;
        if tables.contains_key(&table.table) {
            return Err(MemoryError::exists("table", table.to_string()).into());
        }
        tables.insert(
            table.table.clone(),
            Table {
                schema: schema.clone(),
                rows: BTreeMap::new(),
            },
        );
        info!(table = %table, columns = schema.columns.len(), "Table created");
        Ok(())
    }

    async fn drop_table(&self, table: &TableRef) -> BenchResult<()> {
        let mut state = self.inner.state.write();
        state
            .namespaces
            .get_mut(&table.namespace)
            .and_then(|tables| tables.remove(&table.table))
            .map(|_| ())
            .ok_or_else(|| MemoryError::missing("table", table.to_string()).into())
    }

    async fn create_user(&self, credentials: &Credentials) -> BenchResult<()> {
        let mut state = self.inner.state.write();
        if credentials.username == self.inner.config.admin_username || state.users.contains_key(&credentials.username) {
            return Err(MemoryError::exists("user", &credentials.username).into());
        }
        state.users.insert(
            credentials.username.clone(),
            UserEntry {
                password: credentials.password.clone(),
                privileges: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn drop_user(&self, username: &str) -> BenchResult<()> {
        let mut state = self.inner.state.write();
        state
            .users
            .remove(username)
            .map(|_| ())
            .ok_or_else(|| MemoryError::missing("user", username).into())
    }

    async fn grant(&self, username: &str, table: &TableRef, privileges: &[Privilege]) -> BenchResult<()> {
        let mut state = self.inner.state.write();
        state.table(table)?;
        let user = state
            .users
            .get_mut(username)
            .ok_or_else(|| MemoryError::missing("user", username))?;
        user.privileges
            .entry(table.clone())
            .or_default()
            .extend(privileges.iter().copied());
        Ok(())
    }
}

#[async_trait]
impl PolicyAdmin for MemoryStore {
    async fn get_policy(&self, name: &str) -> BenchResult<Option<PolicyInfo>> {
        Ok(self.inner.state.read().policies.get_policy(name))
    }

    async fn create_policy(&self, name: &str, tag_column: &str) -> BenchResult<()> {
        Ok(self.inner.state.write().policies.create_policy(name, tag_column)?)
    }

    async fn enable_policy(&self, name: &str) -> BenchResult<()> {
        Ok(self.inner.state.write().policies.enable_policy(name)?)
    }

    async fn get_level(&self, policy: &str, short_name: &str) -> BenchResult<Option<LevelInfo>> {
        Ok(self.inner.state.read().policies.get_level(policy, short_name)?)
    }

    async fn create_level(&self, policy: &str, level: &LevelInfo) -> BenchResult<()> {
        Ok(self.inner.state.write().policies.create_level(policy, level)?)
    }

    async fn get_compartment(&self, policy: &str, short_name: &str) -> BenchResult<Option<CompartmentInfo>> {
        Ok(self.inner.state.read().policies.get_compartment(policy, short_name)?)
    }

    async fn create_compartment(&self, policy: &str, compartment: &CompartmentInfo) -> BenchResult<()> {
        Ok(self.inner.state.write().policies.create_compartment(policy, compartment)?)
    }

    async fn get_group(&self, policy: &str, short_name: &str) -> BenchResult<Option<GroupInfo>> {
        Ok(self.inner.state.read().policies.get_group(policy, short_name)?)
    }

    async fn create_group(&self, policy: &str, group: &GroupInfo) -> BenchResult<()> {
        Ok(self.inner.state.write().policies.create_group(policy, group)?)
    }

    async fn get_table_policy(&self, name: &str) -> BenchResult<Option<TablePolicyInfo>> {
        Ok(self.inner.state.read().policies.get_table_policy(name))
    }

    async fn create_table_policy(&self, name: &str, policy: &str, table: &TableRef) -> BenchResult<()> {
        Ok(self.inner.state.write().policies.create_table_policy(name, policy, table)?)
    }

    async fn enable_table_policy(&self, name: &str) -> BenchResult<()> {
        Ok(self.inner.state.write().policies.enable_table_policy(name)?)
    }

    async fn set_user_level(&self, policy: &str, username: &str, level: &str) -> BenchResult<()> {
        Ok(self.inner.state.write().policies.set_user_level(policy, username, level)?)
    }

    async fn add_user_compartment(
        &self,
        policy: &str,
        username: &str,
        compartment: &str,
        grant: MembershipGrant,
    ) -> BenchResult<()> {
        Ok(self
            .inner
            .state
            .write()
            .policies
            .add_user_compartment(policy, username, compartment, grant)?)
    }

    async fn remove_user_compartment(&self, policy: &str, username: &str, compartment: &str) -> BenchResult<()> {
        Ok(self
            .inner
            .state
            .write()
            .policies
            .remove_user_compartment(policy, username, compartment)?)
    }

    async fn add_user_group(&self, policy: &str, username: &str, group: &str, grant: MembershipGrant) -> BenchResult<()> {
        Ok(self.inner.state.write().policies.add_user_group(policy, username, group, grant)?)
    }

    async fn remove_user_group(&self, policy: &str, username: &str, group: &str) -> BenchResult<()> {
        Ok(self.inner.state.write().policies.remove_user_group(policy, username, group)?)
    }
}

#[async_trait]
impl Connector for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn storage_admin(&self) -> Arc<dyn StorageAdmin> {
        Arc::new(self.clone())
    }

    fn policy_admin(&self) -> Option<Arc<dyn PolicyAdmin>> {
        if self.inner.config.policy_admin {
            Some(Arc::new(self.clone()))
        } else {
            None
        }
    }

    async fn admin_session(&self) -> BenchResult<Arc<dyn Session>> {
        Ok(self.open_session(Principal::Admin))
    }

    async fn connect(&self, credentials: &Credentials) -> BenchResult<Arc<dyn Session>> {
        let authenticated = self
            .inner
            .state
            .read()
            .users
            .get(&credentials.username)
            .is_some_and(|user| user.password == credentials.password);
        if !authenticated {
            return Err(MemoryError::Authentication(credentials.username.clone()).into());
        }
        Ok(self.open_session(Principal::User(credentials.username.clone())))
    }
}
