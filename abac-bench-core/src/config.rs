//! Benchmark configuration.
//!
//! Every field is defaulted, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! [ycsb]
//! record_count = 1000
//! ops_per_tx = 2
//!
//! [run]
//! concurrency = 4
//! run_for_secs = 30
//!
//! [abac]
//! enabled = true
//! attribute_type = "level"
//! attribute_values = "public,confidential,secret"
//! strategy = "load_balanced"
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult, ErrorCode};
use crate::store::TableRef;
use crate::strategy::StrategyKind;
use crate::tag::{SEGMENT_SEPARATOR, VALUE_SEPARATOR};

/// Default level candidates.
pub const DEFAULT_LEVELS: [&str; 3] = ["public", "confidential", "secret"];

/// Default compartment candidates.
pub const DEFAULT_COMPARTMENTS: [&str; 3] = ["hr", "sales", "engineering"];

/// Default group candidates.
pub const DEFAULT_GROUPS: [&str; 3] = ["team_a", "team_b", "team_c"];

/// Default retry cap per invocation.
pub const DEFAULT_MAX_RETRIES: u32 = 1000;

/// Complete benchmark configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Dataset and transaction shape.
    pub ycsb: YcsbConfig,
    /// Workload run settings.
    pub run: RunConfig,
    /// Access control settings.
    pub abac: AbacConfig,
}

impl BenchConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> BenchResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BenchError::new(
                ErrorCode::InvalidConfiguration,
                format!("Failed to read {}: {}", path.display(), e),
            )
            .with_resource(path.display().to_string())
            .with_source(e)
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> BenchResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            BenchError::new(ErrorCode::InvalidConfiguration, format!("Invalid TOML: {}", e.message()))
                .with_source(e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Render as pretty TOML.
    pub fn to_toml_string(&self) -> BenchResult<String> {
        toml::to_string_pretty(self).map_err(|e| {
            BenchError::internal(format!("Failed to serialize configuration: {}", e)).with_source(e)
        })
    }

    /// Write the configuration to `path`.
    pub fn save(&self, path: &Path) -> BenchResult<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| {
            BenchError::new(
                ErrorCode::InvalidConfiguration,
                format!("Failed to write {}: {}", path.display(), e),
            )
            .with_source(e)
        })
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> BenchResult<()> {
        if self.ycsb.record_count == 0 {
            return Err(BenchError::invalid_config("ycsb.record_count", "must be greater than zero"));
        }
        if self.ycsb.ops_per_tx == 0 {
            return Err(BenchError::invalid_config("ycsb.ops_per_tx", "must be greater than zero"));
        }
        if self.ycsb.load_concurrency == 0 {
            return Err(BenchError::invalid_config("ycsb.load_concurrency", "must be greater than zero"));
        }
        if self.ycsb.load_batch_size == 0 {
            return Err(BenchError::invalid_config("ycsb.load_batch_size", "must be greater than zero"));
        }
        if self.ycsb.namespace.is_empty() || self.ycsb.table.is_empty() {
            return Err(BenchError::invalid_config("ycsb.table", "namespace and table must be set"));
        }
        if self.run.concurrency == 0 {
            return Err(BenchError::invalid_config("run.concurrency", "must be greater than zero"));
        }
        if self.run.run_for_secs == 0 && self.run.max_invocations.is_none() {
            return Err(BenchError::invalid_config(
                "run.run_for_secs",
                "must be greater than zero unless run.max_invocations is set",
            )
            .with_suggestion("Set `run.max_invocations` for a count-bounded run"));
        }

        if self.abac.enabled {
            if self.abac.policy_name.is_empty() {
                return Err(BenchError::invalid_config("abac.policy_name", "cannot be empty"));
            }
            if self.abac.tag_column.is_empty() {
                return Err(BenchError::invalid_config("abac.tag_column", "cannot be empty"));
            }
            let catalog = self.abac.catalog();
            if catalog.values(self.abac.attribute_type).is_empty() {
                return Err(BenchError::invalid_config(
                    "abac.attribute_values",
                    format!("no {} values configured", self.abac.attribute_type),
                ));
            }
            if catalog.levels.is_empty() {
                return Err(BenchError::invalid_config("abac.levels", "at least one level is required"));
            }
            for (field, values) in [
                ("abac.levels", &catalog.levels),
                ("abac.compartments", &catalog.compartments),
                ("abac.groups", &catalog.groups),
            ] {
                validate_values(field, values)?;
            }
        }

        Ok(())
    }

    /// Number of simulated users; zero falls back to the run concurrency.
    pub fn effective_user_count(&self) -> usize {
        if self.ycsb.user_count == 0 {
            self.run.concurrency
        } else {
            self.ycsb.user_count
        }
    }

    /// The benchmark table.
    pub fn table(&self) -> TableRef {
        TableRef::new(&self.ycsb.namespace, &self.ycsb.table)
    }

    /// Tag column name when ABAC is active.
    pub fn tag_column(&self) -> Option<&str> {
        self.abac.enabled.then_some(self.abac.tag_column.as_str())
    }
}

fn validate_values(field: &str, values: &[String]) -> BenchResult<()> {
    for (i, value) in values.iter().enumerate() {
        if value.contains(SEGMENT_SEPARATOR) || value.contains(VALUE_SEPARATOR) {
            return Err(BenchError::invalid_config(
                field,
                format!("value '{}' cannot contain '{}' or '{}'", value, SEGMENT_SEPARATOR, VALUE_SEPARATOR),
            ));
        }
        if values[..i].contains(value) {
            return Err(BenchError::invalid_config(field, format!("duplicate value '{}'", value)));
        }
    }
    Ok(())
}

/// Dataset and transaction shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct YcsbConfig {
    /// Number of records loaded and addressed by the workload.
    pub record_count: u64,
    /// Payload length in characters.
    pub payload_size: usize,
    /// Loader task count.
    pub load_concurrency: usize,
    /// Records per load transaction.
    pub load_batch_size: usize,
    /// Point reads per workload transaction.
    pub ops_per_tx: usize,
    /// Simulated users; zero means `run.concurrency`.
    pub user_count: usize,
    /// Namespace holding the benchmark table.
    pub namespace: String,
    /// Benchmark table name.
    pub table: String,
}

impl Default for YcsbConfig {
    fn default() -> Self {
        Self {
            record_count: 1000,
            payload_size: 1000,
            load_concurrency: 1,
            load_batch_size: 1,
            ops_per_tx: 2,
            user_count: 0,
            namespace: "ycsb".to_string(),
            table: "usertable".to_string(),
        }
    }
}

/// How workers are mapped onto user sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAssignment {
    /// `stable_hash(worker identity) mod user_count`.
    #[default]
    IdentityHash,
    /// `worker index mod user_count`.
    WorkerIndex,
}

/// Workload run settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Workload worker count.
    pub concurrency: usize,
    /// Run duration in seconds.
    pub run_for_secs: u64,
    /// Stop each worker after this many committed invocations.
    pub max_invocations: Option<u64>,
    /// Conflict retries allowed per invocation; zero disables the cap.
    pub max_retries: u32,
    /// Use the admin session when a user session is missing.
    pub allow_admin_fallback: bool,
    /// Worker to session mapping.
    pub session_assignment: SessionAssignment,
    /// Seed for the random strategy and key selection.
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            run_for_secs: 60,
            max_invocations: None,
            max_retries: DEFAULT_MAX_RETRIES,
            allow_admin_fallback: false,
            session_assignment: SessionAssignment::default(),
            seed: None,
        }
    }
}

impl RunConfig {
    /// Run duration.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.run_for_secs)
    }

    /// Retry cap, `None` when unbounded.
    pub fn retry_cap(&self) -> Option<u32> {
        (self.max_retries > 0).then_some(self.max_retries)
    }
}

/// Attribute dimension the benchmark varies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    /// Sensitivity levels.
    #[default]
    Level,
    /// Compartments.
    Compartment,
    /// Groups.
    Group,
}

impl AttributeType {
    /// Built-in candidates for this type.
    pub fn default_values(&self) -> Vec<String> {
        let values: &[&str] = match self {
            Self::Level => &DEFAULT_LEVELS,
            Self::Compartment => &DEFAULT_COMPARTMENTS,
            Self::Group => &DEFAULT_GROUPS,
        };
        values.iter().map(|v| v.to_string()).collect()
    }

    /// Configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Level => "level",
            Self::Compartment => "compartment",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When the provisioner runs relative to the load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionOrder {
    /// After the table exists, before users are created.
    #[default]
    AfterSchema,
    /// After users are created and granted, right before the bulk insert.
    BeforeLoad,
}

/// Access control settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbacConfig {
    /// Provision a policy and tag records.
    pub enabled: bool,
    /// Dimension driven by `attribute_values`.
    pub attribute_type: AttributeType,
    /// Comma-separated candidates; empty means the type defaults.
    pub attribute_values: String,
    /// Assignment strategy for users and records.
    pub strategy: StrategyKind,
    /// Policy name.
    pub policy_name: String,
    /// Tag column name.
    pub tag_column: String,
    /// Provisioning position in the load sequence.
    pub provision_order: ProvisionOrder,
    /// Explicit level candidates when `attribute_type` is not `level`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<Vec<String>>,
    /// Explicit compartment candidates when `attribute_type` is not `compartment`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compartments: Option<Vec<String>>,
    /// Explicit group candidates when `attribute_type` is not `group`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

impl Default for AbacConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            attribute_type: AttributeType::Level,
            attribute_values: String::new(),
            strategy: StrategyKind::Random,
            policy_name: "ycsb_benchmark_policy".to_string(),
            tag_column: "data_tag".to_string(),
            provision_order: ProvisionOrder::AfterSchema,
            levels: None,
            compartments: None,
            groups: None,
        }
    }
}

impl AbacConfig {
    /// Parsed `attribute_values`, or the active type's defaults.
    pub fn active_values(&self) -> Vec<String> {
        let parsed = parse_values(&self.attribute_values);
        if parsed.is_empty() {
            self.attribute_type.default_values()
        } else {
            parsed
        }
    }

    /// Resolve the candidate lists for every attribute type.
    pub fn catalog(&self) -> AttributeCatalog {
        let explicit = |list: &Option<Vec<String>>| {
            list.as_ref()
                .map(|values| {
                    values
                        .iter()
                        .map(|v| v.trim().to_lowercase())
                        .filter(|v| !v.is_empty())
                        .collect::<Vec<String>>()
                })
        };

        let mut catalog = AttributeCatalog {
            levels: explicit(&self.levels).unwrap_or_else(|| vec![DEFAULT_LEVELS[0].to_string()]),
            compartments: explicit(&self.compartments).unwrap_or_default(),
            groups: explicit(&self.groups).unwrap_or_default(),
        };
        *catalog.values_mut(self.attribute_type) = self.active_values();
        catalog
    }
}

/// Split a comma-separated list, trimming and lowercasing each entry.
pub fn parse_values(raw: &str) -> Vec<String> {
    raw.split(VALUE_SEPARATOR)
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Candidate values for each attribute type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttributeCatalog {
    /// Levels in rank order.
    pub levels: Vec<String>,
    /// Compartments.
    pub compartments: Vec<String>,
    /// Groups.
    pub groups: Vec<String>,
}

impl AttributeCatalog {
    /// Candidates of one type.
    pub fn values(&self, attribute_type: AttributeType) -> &[String] {
        match attribute_type {
            AttributeType::Level => &self.levels,
            AttributeType::Compartment => &self.compartments,
            AttributeType::Group => &self.groups,
        }
    }

    fn values_mut(&mut self, attribute_type: AttributeType) -> &mut Vec<String> {
        match attribute_type {
            AttributeType::Level => &mut self.levels,
            AttributeType::Compartment => &mut self.compartments,
            AttributeType::Group => &mut self.groups,
        }
    }
}
