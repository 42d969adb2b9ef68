//! Sessions and optimistic transactions over the in-memory store.
//!
//! Reads record the version they observed. Writes are buffered until commit,
//! which validates every observed version under the write lock and applies the
//! buffer atomically. A changed version fails the commit with a conflict, and
//! the transaction is left aborted.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use abac_bench_core::error::BenchResult;
use abac_bench_core::store::{Principal, Privilege, Record, Session, TableRef, Transaction};
use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::trace;

use crate::engine::{Inner, VersionedRecord};
use crate::error::{MemoryError, MemoryResult};

/// A session bound to one principal.
pub struct MemorySession {
    inner: Arc<Inner>,
    principal: Principal,
    closed: AtomicBool,
}

impl MemorySession {
    pub(crate) fn new(inner: Arc<Inner>, principal: Principal) -> Self {
        Self {
            inner,
            principal,
            closed: AtomicBool::new(false),
        }
    }

    /// Whether [`Session::close`] has succeeded.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Session for MemorySession {
    fn principal(&self) -> &Principal {
        &self.principal
    }

    async fn begin(&self) -> BenchResult<Box<dyn Transaction>> {
        if self.is_closed() {
            return Err(MemoryError::SessionClosed(self.principal.name().to_string()).into());
        }
        Ok(Box::new(MemoryTransaction::new(
            Arc::clone(&self.inner),
            self.principal.clone(),
        )))
    }

    async fn close(&self) -> BenchResult<()> {
        if self.inner.take_close_failure(self.principal.name()) {
            return Err(MemoryError::Injected(format!("close of session for {}", self.principal)).into());
        }
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Active,
    Committed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Insert,
    Upsert,
}

#[derive(Debug)]
struct PendingWrite {
    kind: WriteKind,
    record: Record,
}

type RowId = (TableRef, i64);

/// An optimistic transaction.
pub struct MemoryTransaction {
    id: String,
    inner: Arc<Inner>,
    principal: Principal,
    state: TxState,
    // Version 0 marks a key that was absent when read.
    reads: HashMap<RowId, u64>,
    writes: IndexMap<RowId, PendingWrite>,
}

impl MemoryTransaction {
    fn new(inner: Arc<Inner>, principal: Principal) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            inner,
            principal,
            state: TxState::Active,
            reads: HashMap::new(),
            writes: IndexMap::new(),
        }
    }

    fn ensure_active(&self) -> MemoryResult<()> {
        match self.state {
            TxState::Active => Ok(()),
            TxState::Committed | TxState::Aborted => Err(MemoryError::TransactionClosed(self.id.clone())),
        }
    }

    fn read_row(&mut self, table: &TableRef, key: i64) -> MemoryResult<Option<Record>> {
        let state = self.inner.state.read();
        state.check_privilege(&self.principal, table, Privilege::Read)?;

        let row_id = (table.clone(), key);
        if let Some(write) = self.writes.get(&row_id) {
            return Ok(Some(write.record.clone()));
        }

        let stored = state.table(table)?.rows.get(&key);
        self.reads
            .entry(row_id)
            .or_insert_with(|| stored.map_or(0, |row| row.version));

        let Some(row) = stored else {
            return Ok(None);
        };
        let visible = match &self.principal {
            Principal::Admin => true,
            Principal::User(username) => state.policies.can_read(table, username, row.record.tag.as_deref()),
        };
        Ok(visible.then(|| row.record.clone()))
    }

    fn buffer_write(&mut self, table: &TableRef, record: Record, kind: WriteKind) -> MemoryResult<()> {
        let state = self.inner.state.read();
        state.check_privilege(&self.principal, table, Privilege::Write)?;
        let stored = state.table(table)?;

        let row_id = (table.clone(), record.key);
        if kind == WriteKind::Insert {
            let pending_insert = self
                .writes
                .get(&row_id)
                .is_some_and(|write| write.kind == WriteKind::Insert);
            if pending_insert || stored.rows.contains_key(&record.key) {
                return Err(MemoryError::DuplicateKey {
                    table: table.to_string(),
                    key: record.key,
                });
            }
        }
        drop(state);

        self.writes.insert(row_id, PendingWrite { kind, record });
        Ok(())
    }

    fn apply(&self) -> MemoryResult<usize> {
        if self.inner.take_injected_conflict() {
            return Err(MemoryError::Conflict(self.id.clone()));
        }

        let mut state = self.inner.state.write();
        for ((table, key), observed) in &self.reads {
            let current = state
                .table(table)
                .ok()
                .and_then(|t| t.rows.get(key))
                .map_or(0, |row| row.version);
            if current != *observed {
                return Err(MemoryError::Conflict(self.id.clone()));
            }
        }
        for ((table, key), write) in &self.writes {
            let exists = state.table(table)?.rows.contains_key(key);
            if write.kind == WriteKind::Insert && exists {
                return Err(MemoryError::Conflict(self.id.clone()));
            }
        }

        let version = state.next_version();
        for ((table, key), write) in &self.writes {
            state.table_mut(table)?.rows.insert(
                *key,
                VersionedRecord {
                    record: write.record.clone(),
                    version,
                },
            );
        }
        Ok(self.writes.len())
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get(&mut self, table: &TableRef, key: i64) -> BenchResult<Option<Record>> {
        self.ensure_active()?;
        if let Some(delay) = self.inner.config.read_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.read_row(table, key)?)
    }

    async fn insert(&mut self, table: &TableRef, record: Record) -> BenchResult<()> {
        self.ensure_active()?;
        Ok(self.buffer_write(table, record, WriteKind::Insert)?)
    }

    async fn upsert(&mut self, table: &TableRef, record: Record) -> BenchResult<()> {
        self.ensure_active()?;
        Ok(self.buffer_write(table, record, WriteKind::Upsert)?)
    }

    async fn commit(&mut self) -> BenchResult<()> {
        self.ensure_active()?;
        if let Some(delay) = self.inner.config.commit_delay {
            tokio::time::sleep(delay).await;
        }
        match self.apply() {
            Ok(written) => {
                self.state = TxState::Committed;
                self.inner.commits.fetch_add(1, Ordering::Relaxed);
                trace!(tx = %self.id, reads = self.reads.len(), written, "Committed");
                Ok(())
            }
            Err(e) => {
                self.state = TxState::Aborted;
                self.writes.clear();
                if e.is_conflict() {
                    self.inner.conflicts.fetch_add(1, Ordering::Relaxed);
                }
                Err(e.into())
            }
        }
    }

    async fn abort(&mut self) -> BenchResult<()> {
        match self.state {
            TxState::Active => {
                self.state = TxState::Aborted;
                self.writes.clear();
                self.inner.aborts.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            TxState::Aborted => Ok(()),
            TxState::Committed => Err(MemoryError::TransactionClosed(self.id.clone()).into()),
        }
    }
}
