//! Idempotent access control provisioning.
//!
//! The provisioner runs in a fixed order:
//!
//! 1. policy (created disabled, then enabled)
//! 2. attribute hierarchy: levels, compartments, groups
//! 3. table binding `<policy>_<namespace>_<table>` (created, then enabled)
//! 4. per-user attribute assignment
//!
//! Every object is looked up before it is created, and an already-exists
//! error from a create is treated as success. Running the provisioner twice
//! therefore leaves exactly one of each object. Any other failure in steps 1-3
//! aborts with a setup failure. Failures in step 4 are logged per user and
//! skipped.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{AttributeCatalog, AttributeType, BenchConfig};
use crate::error::{BenchError, BenchResult};
use crate::store::{
    CompartmentInfo, GroupInfo, LevelInfo, MembershipGrant, PolicyAdmin, TablePolicyInfo, TableRef,
};
use crate::strategy::{AssignmentStrategy, DRAW_COMPARTMENT, DRAW_GROUP, DRAW_LEVEL};

/// Everything the provisioner needs to know.
#[derive(Debug, Clone)]
pub struct ProvisionPlan {
    /// Policy name.
    pub policy_name: String,
    /// Tag column the policy reads.
    pub tag_column: String,
    /// Table to bind.
    pub table: TableRef,
    /// Candidate attribute values.
    pub catalog: AttributeCatalog,
    /// Usernames to assign attributes to, in user-index order.
    pub users: Vec<String>,
}

impl ProvisionPlan {
    /// Build the plan described by a configuration.
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            policy_name: config.abac.policy_name.clone(),
            tag_column: config.abac.tag_column.clone(),
            table: config.table(),
            catalog: config.abac.catalog(),
            users: (0..config.effective_user_count()).map(|i| format!("user{}", i)).collect(),
        }
    }
}

/// Attributes given to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAttributes {
    /// Username.
    pub username: String,
    /// Assigned level.
    pub level: String,
    /// Assigned compartments.
    pub compartments: Vec<String>,
    /// Assigned groups.
    pub groups: Vec<String>,
}

/// A user whose assignment failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentFailure {
    /// Username.
    pub username: String,
    /// Error code and message.
    pub error: String,
}

/// Outcome of a provisioning run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionSummary {
    /// Whether the policy was created by this run.
    pub policy_created: bool,
    /// Number of levels, compartments and groups created by this run.
    pub attributes_created: usize,
    /// Table binding name.
    pub table_policy: String,
    /// Whether the table binding was created by this run.
    pub table_policy_created: bool,
    /// Successful user assignments.
    pub assignments: Vec<UserAttributes>,
    /// Skipped users.
    pub failures: Vec<AssignmentFailure>,
}

/// Creates and binds the access control configuration.
pub struct PolicyProvisioner {
    admin: Arc<dyn PolicyAdmin>,
}

impl PolicyProvisioner {
    /// Create a provisioner on a policy administration handle.
    pub fn new(admin: Arc<dyn PolicyAdmin>) -> Self {
        Self { admin }
    }

    /// Run every step of `plan`.
    pub async fn provision(&self, plan: &ProvisionPlan, strategy: &AssignmentStrategy) -> BenchResult<ProvisionSummary> {
        info!(policy = %plan.policy_name, table = %plan.table, "Provisioning access control");

        let policy_created = self.ensure_policy(&plan.policy_name, &plan.tag_column).await?;
        let attributes_created = self.ensure_catalog(&plan.policy_name, &plan.catalog).await?;
        let (table_policy, table_policy_created) = self.ensure_table_policy(&plan.policy_name, &plan.table).await?;
        let (assignments, failures) = self
            .assign_users(&plan.policy_name, &plan.users, strategy, &plan.catalog)
            .await;

        info!(
            policy = %plan.policy_name,
            attributes_created,
            assigned = assignments.len(),
            skipped = failures.len(),
            "Provisioning complete"
        );

        Ok(ProvisionSummary {
            policy_created,
            attributes_created,
            table_policy,
            table_policy_created,
            assignments,
            failures,
        })
    }

    /// Look up or create the policy, then enable it. Returns whether it was created.
    pub async fn ensure_policy(&self, name: &str, tag_column: &str) -> BenchResult<bool> {
        let step = "policy creation";
        let created = match self.admin.get_policy(name).await.map_err(|e| setup(step, e))? {
            Some(_) => {
                debug!(policy = name, "Policy already present");
                false
            }
            None => created_or_existing(self.admin.create_policy(name, tag_column).await, "policy", name)
                .map_err(|e| setup(step, e))?,
        };

        tolerate_applied(self.admin.enable_policy(name).await).map_err(|e| setup("policy enablement", e))?;
        Ok(created)
    }

    /// Ensure every value of one attribute type exists. Returns how many were created.
    ///
    /// Levels get a 1-based rank equal to their position in `values`.
    pub async fn ensure_attributes(&self, policy: &str, attribute_type: AttributeType, values: &[String]) -> BenchResult<usize> {
        let mut created = 0;
        for (position, value) in values.iter().enumerate() {
            let made = self
                .ensure_attribute(policy, attribute_type, value, position)
                .await
                .map_err(|e| setup(&format!("{} creation", attribute_type), e))?;
            if made {
                created += 1;
            }
        }
        Ok(created)
    }

    async fn ensure_attribute(
        &self,
        policy: &str,
        attribute_type: AttributeType,
        value: &str,
        position: usize,
    ) -> BenchResult<bool> {
        let kind = attribute_type.as_str();
        match attribute_type {
            AttributeType::Level => {
                if self.admin.get_level(policy, value).await?.is_some() {
                    debug!(level = value, "Level already present");
                    return Ok(false);
                }
                let level = LevelInfo {
                    short_name: value.to_string(),
                    long_name: format!("Level {}", value),
                    rank: position as u32 + 1,
                };
                created_or_existing(self.admin.create_level(policy, &level).await, kind, value)
            }
            AttributeType::Compartment => {
                if self.admin.get_compartment(policy, value).await?.is_some() {
                    debug!(compartment = value, "Compartment already present");
                    return Ok(false);
                }
                let compartment = CompartmentInfo {
                    short_name: value.to_string(),
                    long_name: format!("Compartment {}", value),
                };
                created_or_existing(self.admin.create_compartment(policy, &compartment).await, kind, value)
            }
            AttributeType::Group => {
                if self.admin.get_group(policy, value).await?.is_some() {
                    debug!(group = value, "Group already present");
                    return Ok(false);
                }
                let group = GroupInfo {
                    short_name: value.to_string(),
                    long_name: format!("Group {}", value),
                    parent: None,
                };
                created_or_existing(self.admin.create_group(policy, &group).await, kind, value)
            }
        }
    }

    /// Ensure all three attribute types of `catalog`.
    pub async fn ensure_catalog(&self, policy: &str, catalog: &AttributeCatalog) -> BenchResult<usize> {
        let mut created = 0;
        for attribute_type in [AttributeType::Level, AttributeType::Compartment, AttributeType::Group] {
            created += self
                .ensure_attributes(policy, attribute_type, catalog.values(attribute_type))
                .await?;
        }
        Ok(created)
    }

    /// Look up or create the table binding, then enable it.
    pub async fn ensure_table_policy(&self, policy: &str, table: &TableRef) -> BenchResult<(String, bool)> {
        let step = "table policy creation";
        let name = TablePolicyInfo::binding_name(policy, table);

        let created = match self.admin.get_table_policy(&name).await.map_err(|e| setup(step, e))? {
            Some(_) => {
                debug!(table_policy = %name, "Table policy already present");
                false
            }
            None => created_or_existing(
                self.admin.create_table_policy(&name, policy, table).await,
                "table policy",
                &name,
            )
            .map_err(|e| setup(step, e))?,
        };

        tolerate_applied(self.admin.enable_table_policy(&name).await)
            .map_err(|e| setup("table policy enablement", e))?;
        Ok((name, created))
    }

    /// Assign attributes to every user. Failed users are logged and skipped.
    pub async fn assign_users(
        &self,
        policy: &str,
        users: &[String],
        strategy: &AssignmentStrategy,
        catalog: &AttributeCatalog,
    ) -> (Vec<UserAttributes>, Vec<AssignmentFailure>) {
        let mut assignments = Vec::with_capacity(users.len());
        let mut failures = Vec::new();

        for (index, username) in users.iter().enumerate() {
            match self.assign_user(policy, index as u64, username, strategy, catalog).await {
                Ok(attributes) => {
                    debug!(user = %username, level = %attributes.level, "User attributes assigned");
                    assignments.push(attributes);
                }
                Err(e) => {
                    warn!(user = %username, error = %e, "Failed to assign user attributes, skipping");
                    failures.push(AssignmentFailure {
                        username: username.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        (assignments, failures)
    }

    /// Overwrite one user's level and reset their memberships.
    pub async fn assign_user(
        &self,
        policy: &str,
        index: u64,
        username: &str,
        strategy: &AssignmentStrategy,
        catalog: &AttributeCatalog,
    ) -> BenchResult<UserAttributes> {
        let level = strategy.assign_nth(index, DRAW_LEVEL, &catalog.levels)?.to_string();
        self.admin.set_user_level(policy, username, &level).await?;

        for compartment in &catalog.compartments {
            ignore_missing(self.admin.remove_user_compartment(policy, username, compartment).await)?;
        }
        let mut compartments = Vec::new();
        if !catalog.compartments.is_empty() {
            let compartment = strategy.assign_nth(index, DRAW_COMPARTMENT, &catalog.compartments)?;
            self.admin
                .add_user_compartment(policy, username, compartment, MembershipGrant::default())
                .await?;
            compartments.push(compartment.to_string());
        }

        for group in &catalog.groups {
            ignore_missing(self.admin.remove_user_group(policy, username, group).await)?;
        }
        let mut groups = Vec::new();
        if !catalog.groups.is_empty() {
            let group = strategy.assign_nth(index, DRAW_GROUP, &catalog.groups)?;
            self.admin
                .add_user_group(policy, username, group, MembershipGrant::default())
                .await?;
            groups.push(group.to_string());
        }

        Ok(UserAttributes {
            username: username.to_string(),
            level,
            compartments,
            groups,
        })
    }
}

fn setup(step: &str, e: BenchError) -> BenchError {
    if e.is_setup_failure() { e } else { BenchError::setup_failed(step, e) }
}

fn created_or_existing(result: BenchResult<()>, kind: &str, name: &str) -> BenchResult<bool> {
    match result {
        Ok(()) => {
            info!(kind, name, "Created");
            Ok(true)
        }
        Err(e) if e.is_already_exists() => {
            info!(kind, name, "Already exists");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn tolerate_applied(result: BenchResult<()>) -> BenchResult<()> {
    match result {
        Err(e) if e.is_already_exists() => {
            debug!(error = %e, "Already applied");
            Ok(())
        }
        other => other,
    }
}

fn ignore_missing(result: BenchResult<()>) -> BenchResult<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
