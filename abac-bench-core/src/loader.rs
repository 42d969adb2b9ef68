//! Table setup and bulk load.
//!
//! The load sequence is:
//!
//! 1. drop the table (missing table ignored)
//! 2. create the namespace (existing namespace ignored)
//! 3. create the table, with the tag column when ABAC is enabled
//! 4. provision access control (`provision_order = "after_schema"`)
//! 5. create every simulated user and grant read/write on the table
//! 6. provision access control (`provision_order = "before_load"`)
//! 7. insert `record_count` rows across `load_concurrency` tasks
//!
//! Any failure is reported as a setup failure naming the step.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{AttributeCatalog, BenchConfig, ProvisionOrder};
use crate::error::{BenchError, BenchResult};
use crate::partition::{KeyRange, split};
use crate::provision::{PolicyProvisioner, ProvisionPlan, ProvisionSummary};
use crate::store::{Credentials, PolicyAdmin, Privilege, Record, Session, StorageAdmin, TableRef, TableSchema, Transaction};
use crate::strategy::{AssignmentStrategy, DRAW_COMPARTMENT, DRAW_GROUP, DRAW_LEVEL};
use crate::tag;

/// Records between progress log lines, per load task.
pub const PROGRESS_INTERVAL: u64 = 10_000;

/// Generate a printable-ASCII payload of `size` characters.
pub fn random_payload<R: Rng + ?Sized>(rng: &mut R, size: usize) -> String {
    (0..size).map(|_| char::from(rng.gen_range(b' '..=b'~'))).collect()
}

/// Resolve the data tag of record `key`.
pub fn record_tag(strategy: &AssignmentStrategy, key: i64, catalog: &AttributeCatalog) -> BenchResult<String> {
    let id = key as u64;
    let level = strategy.assign_nth(id, DRAW_LEVEL, &catalog.levels)?;
    let compartments = pick_optional(strategy, id, DRAW_COMPARTMENT, &catalog.compartments)?;
    let groups = pick_optional(strategy, id, DRAW_GROUP, &catalog.groups)?;
    Ok(tag::encode(level, &compartments, &groups))
}

fn pick_optional<'a>(
    strategy: &AssignmentStrategy,
    id: u64,
    draw: u64,
    candidates: &'a [String],
) -> BenchResult<Vec<&'a str>> {
    if candidates.is_empty() {
        Ok(Vec::new())
    } else {
        Ok(vec![strategy.assign_nth(id, draw, candidates)?])
    }
}

/// Outcome of the load phase.
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    /// Rows written.
    pub records_loaded: u64,
    /// Users created or already present.
    pub users: usize,
    /// Conflict retries during the load.
    pub retries: u64,
    /// Wall time of the whole phase.
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    /// Provisioning outcome when ABAC is enabled.
    pub provision: Option<ProvisionSummary>,
}

impl LoadSummary {
    /// Rows per second over the whole phase.
    pub fn records_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.records_loaded as f64 / secs } else { 0.0 }
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

/// Prepares the table and users and loads the dataset.
pub struct Loader {
    config: BenchConfig,
    storage: Arc<dyn StorageAdmin>,
    policy: Option<Arc<dyn PolicyAdmin>>,
    session: Arc<dyn Session>,
    strategy: Arc<AssignmentStrategy>,
}

impl Loader {
    /// Create a loader writing through the administrative `session`.
    pub fn new(
        config: BenchConfig,
        storage: Arc<dyn StorageAdmin>,
        policy: Option<Arc<dyn PolicyAdmin>>,
        session: Arc<dyn Session>,
        strategy: Arc<AssignmentStrategy>,
    ) -> Self {
        Self {
            config,
            storage,
            policy,
            session,
            strategy,
        }
    }

    /// Run the full load sequence.
    pub async fn run(&self) -> BenchResult<LoadSummary> {
        let started = Instant::now();
        let table = self.config.table();
        let abac = self.config.abac.enabled;

        // Resolve the policy handle before touching the store.
        let provisioner = if abac {
            let admin = self
                .policy
                .clone()
                .ok_or_else(|| BenchError::setup_failed("policy provisioning", BenchError::policy_admin_unavailable()))?;
            Some(PolicyProvisioner::new(admin))
        } else {
            None
        };

        self.prepare_table(&table).await?;

        let order = self.config.abac.provision_order;
        let mut provision = None;
        if let Some(provisioner) = provisioner.as_ref().filter(|_| order == ProvisionOrder::AfterSchema) {
            provision = Some(self.provision(provisioner).await?);
        }

        let users = self.create_users(&table).await?;

        if let Some(provisioner) = provisioner.as_ref().filter(|_| order == ProvisionOrder::BeforeLoad) {
            provision = Some(self.provision(provisioner).await?);
        }

        let (records_loaded, retries) = self.bulk_insert(&table).await?;

        let summary = LoadSummary {
            records_loaded,
            users,
            retries,
            elapsed: started.elapsed(),
            provision,
        };
        info!(
            records = summary.records_loaded,
            users = summary.users,
            retries = summary.retries,
            records_per_sec = %format!("{:.0}", summary.records_per_sec()),
            "Load complete"
        );
        Ok(summary)
    }

    async fn prepare_table(&self, table: &TableRef) -> BenchResult<()> {
        match self.storage.drop_table(table).await {
            Ok(()) => debug!(table = %table, "Dropped existing table"),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(BenchError::setup_failed("table drop", e)),
        }

        match self.storage.create_namespace(&table.namespace).await {
            Ok(()) => info!(namespace = %table.namespace, "Namespace created"),
            Err(e) if e.is_already_exists() => debug!(namespace = %table.namespace, "Namespace already exists"),
            Err(e) => return Err(BenchError::setup_failed("namespace creation", e)),
        }

        let schema = TableSchema::ycsb(table.clone(), self.config.tag_column());
        self.storage
            .create_table(&schema)
            .await
            .map_err(|e| BenchError::setup_failed("table creation", e))?;
        info!(table = %table, tagged = schema.tag_column().is_some(), "Table created");
        Ok(())
    }

    async fn provision(&self, provisioner: &PolicyProvisioner) -> BenchResult<ProvisionSummary> {
        let plan = ProvisionPlan::from_config(&self.config);
        provisioner.provision(&plan, &self.strategy).await
    }

    async fn create_users(&self, table: &TableRef) -> BenchResult<usize> {
        let users = Credentials::simulated_users(self.config.effective_user_count());
        for user in &users {
            match self.storage.create_user(user).await {
                Ok(()) => debug!(user = %user.username, "User created"),
                Err(e) if e.is_already_exists() => debug!(user = %user.username, "User already exists"),
                Err(e) => return Err(BenchError::setup_failed("user creation", e)),
            }
            self.storage
                .grant(&user.username, table, &[Privilege::Read, Privilege::Write])
                .await
                .map_err(|e| BenchError::setup_failed("privilege grant", e))?;
        }
        info!(users = users.len(), table = %table, "Users created and granted");
        Ok(users.len())
    }

    async fn bulk_insert(&self, table: &TableRef) -> BenchResult<(u64, u64)> {
        let ranges = split(self.config.ycsb.load_concurrency, self.config.ycsb.record_count)?;
        let catalog = Arc::new(self.config.abac.catalog());

        let mut handles = Vec::with_capacity(ranges.len());
        for (worker, range) in ranges.into_iter().enumerate() {
            let task = LoadTask {
                worker,
                range,
                table: table.clone(),
                session: Arc::clone(&self.session),
                strategy: Arc::clone(&self.strategy),
                catalog: self.config.abac.enabled.then(|| Arc::clone(&catalog)),
                payload_size: self.config.ycsb.payload_size,
                batch_size: self.config.ycsb.load_batch_size,
                max_retries: self.config.run.retry_cap(),
                seed: self.config.run.seed.map(|s| s.wrapping_add(worker as u64)),
            };
            handles.push(tokio::spawn(task.run()));
        }

        let mut loaded = 0;
        let mut retries = 0;
        let mut first_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok((records, task_retries))) => {
                    loaded += records;
                    retries += task_retries;
                }
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(BenchError::internal(format!("Load task panicked: {}", e)));
                }
            }
        }

        match first_error {
            Some(e) => Err(BenchError::setup_failed("bulk insert", e)),
            None => Ok((loaded, retries)),
        }
    }
}

struct LoadTask {
    worker: usize,
    range: KeyRange,
    table: TableRef,
    session: Arc<dyn Session>,
    strategy: Arc<AssignmentStrategy>,
    catalog: Option<Arc<AttributeCatalog>>,
    payload_size: usize,
    batch_size: usize,
    max_retries: Option<u32>,
    seed: Option<u64>,
}

impl LoadTask {
    async fn run(self) -> BenchResult<(u64, u64)> {
        if self.range.is_empty() {
            return Ok((0, 0));
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let started = Instant::now();
        let mut loaded = 0u64;
        let mut retries = 0u64;
        let mut next_report = PROGRESS_INTERVAL;

        let mut start = self.range.start;
        while start <= self.range.end {
            let end = self.range.end.min(start + self.batch_size as i64 - 1);
            let mut batch = Vec::with_capacity((end - start + 1) as usize);
            for key in start..=end {
                let mut record = Record::new(key, random_payload(&mut rng, self.payload_size));
                if let Some(catalog) = &self.catalog {
                    record = record.with_tag(record_tag(&self.strategy, key, catalog)?);
                }
                batch.push(record);
            }

            retries += u64::from(self.write_batch(&batch).await?);
            loaded += batch.len() as u64;
            start = end + 1;

            if loaded >= next_report {
                let secs = started.elapsed().as_secs_f64().max(f64::EPSILON);
                info!(
                    worker = self.worker,
                    records = loaded,
                    records_per_sec = %format!("{:.0}", loaded as f64 / secs),
                    "Load progress"
                );
                next_report += PROGRESS_INTERVAL;
            }
        }

        debug!(worker = self.worker, range = %self.range, records = loaded, "Load task finished");
        Ok((loaded, retries))
    }

    async fn write_batch(&self, batch: &[Record]) -> BenchResult<u32> {
        let mut retries = 0u32;
        loop {
            let mut tx = self.session.begin().await?;
            let result = match apply(tx.as_mut(), &self.table, batch, self.catalog.is_some()).await {
                Ok(()) => tx.commit().await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => return Ok(retries),
                Err(e) => {
                    if let Err(abort_err) = tx.abort().await {
                        debug!(tx = tx.id(), error = %abort_err, "Abort failed");
                    }
                    if !e.is_conflict() {
                        return Err(e);
                    }
                    if self.max_retries == Some(retries) {
                        return Err(BenchError::retry_limit_exceeded(retries).with_source(e));
                    }
                    retries += 1;
                }
            }
        }
    }
}

async fn apply(tx: &mut dyn Transaction, table: &TableRef, batch: &[Record], tagged: bool) -> BenchResult<()> {
    for record in batch {
        if tagged {
            tx.insert(table, record.clone()).await?;
        } else {
            tx.upsert(table, record.clone()).await?;
        }
    }
    Ok(())
}
