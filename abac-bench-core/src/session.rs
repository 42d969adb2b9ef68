//! Per-user session pool.
//!
//! One authenticated session is opened per simulated user before the workload
//! starts and reused for the whole run. The administrative session is kept
//! separately and is only handed to a worker when admin fallback is enabled.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SessionAssignment;
use crate::error::{BenchError, BenchResult};
use crate::store::{Connector, Credentials, Session};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stable 64-bit FNV-1a hash.
///
/// Unlike `std::hash` this is identical across processes and platforms, so a
/// worker always lands on the same user between runs.
pub fn stable_hash(identity: &str) -> u64 {
    identity.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Identity string of workload worker `index`.
pub fn worker_identity(index: usize) -> String {
    format!("worker-{}", index)
}

/// Pick the user index that worker `worker_index` runs as.
pub fn assign_user(assignment: SessionAssignment, worker_index: usize, user_count: usize) -> BenchResult<usize> {
    if user_count == 0 {
        return Err(BenchError::invalid_argument("User count must be greater than zero"));
    }
    let index = match assignment {
        SessionAssignment::IdentityHash => {
            (stable_hash(&worker_identity(worker_index)) % user_count as u64) as usize
        }
        SessionAssignment::WorkerIndex => worker_index % user_count,
    };
    Ok(index)
}

/// Number of users that no worker maps to.
///
/// Hashing `n` workers onto `n` users leaves some users without a worker;
/// the harness logs the count before the workload starts.
pub fn unassigned_users(assignment: SessionAssignment, workers: usize, user_count: usize) -> BenchResult<usize> {
    let mut assigned = vec![false; user_count];
    for worker in 0..workers {
        assigned[assign_user(assignment, worker, user_count)?] = true;
    }
    Ok(assigned.iter().filter(|a| !**a).count())
}

/// Sessions for every simulated user plus the administrative session.
pub struct SessionPool {
    admin: Arc<dyn Session>,
    sessions: Vec<Option<Arc<dyn Session>>>,
    allow_admin_fallback: bool,
}

impl SessionPool {
    /// Open the admin session and one session per user.
    ///
    /// A user whose session cannot be opened is logged and left without a
    /// session; only the admin session failing is fatal.
    pub async fn open(
        connector: &dyn Connector,
        users: &[Credentials],
        allow_admin_fallback: bool,
    ) -> BenchResult<Self> {
        let admin = connector.admin_session().await?;
        let mut sessions = Vec::with_capacity(users.len());

        for user in users {
            match connector.connect(user).await {
                Ok(session) => {
                    debug!(user = %user.username, "Session opened");
                    sessions.push(Some(session));
                }
                Err(e) => {
                    warn!(user = %user.username, error = %e, "Failed to open user session");
                    sessions.push(None);
                }
            }
        }

        let pool = Self {
            admin,
            sessions,
            allow_admin_fallback,
        };
        info!(users = pool.user_count(), opened = pool.opened_count(), "Session pool ready");
        Ok(pool)
    }

    /// Number of users the pool was opened for.
    pub fn user_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of users with an open session.
    pub fn opened_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_some()).count()
    }

    /// The administrative session.
    pub fn admin(&self) -> &Arc<dyn Session> {
        &self.admin
    }

    /// Session of user `user_index`.
    ///
    /// # Errors
    ///
    /// Fails with session-unavailable when the user has no session, unless
    /// admin fallback is enabled.
    pub fn session_for(&self, user_index: usize) -> BenchResult<Arc<dyn Session>> {
        let slot = self.sessions.get(user_index).ok_or_else(|| {
            BenchError::invalid_argument(format!(
                "User index {} out of range for {} users",
                user_index,
                self.sessions.len()
            ))
        })?;

        match slot {
            Some(session) => Ok(Arc::clone(session)),
            None if self.allow_admin_fallback => {
                warn!(user_index, "No user session, falling back to the admin session");
                Ok(Arc::clone(&self.admin))
            }
            None => Err(BenchError::session_unavailable(user_index)),
        }
    }

    /// Close every user session and then the admin session.
    ///
    /// Every close is attempted. The first failure is returned once all have run.
    pub async fn close_all(&self) -> BenchResult<()> {
        let mut first_error = None;

        let user_sessions = self.sessions.iter().flatten();
        for session in user_sessions.chain(std::iter::once(&self.admin)) {
            if let Err(e) = session.close().await {
                warn!(principal = %session.principal(), error = %e, "Failed to close session");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPool")
            .field("users", &self.user_count())
            .field("opened", &self.opened_count())
            .field("allow_admin_fallback", &self.allow_admin_fallback)
            .finish()
    }
}
