//! Policy registry and read-path label enforcement.
//!
//! A row is visible to a user under an enabled policy bound (and enabled) on
//! the row's table iff:
//!
//! - the user's level rank is at least the row's level rank
//! - every row compartment is one of the user's compartments
//! - the row has no groups, or the user belongs to one of them or to an ancestor
//!
//! Rows of tables without an enforcing binding are always visible.

use std::collections::{BTreeMap, HashMap};

use abac_bench_core::store::{CompartmentInfo, GroupInfo, LevelInfo, MembershipGrant, PolicyInfo, TablePolicyInfo, TableRef};
use abac_bench_core::tag::DataTag;
use indexmap::IndexMap;

use crate::error::{MemoryError, MemoryResult};

/// Attributes bound to one user under one policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserLabel {
    /// Level short name.
    pub level: Option<String>,
    /// Compartment memberships.
    pub compartments: BTreeMap<String, MembershipGrant>,
    /// Group memberships.
    pub groups: BTreeMap<String, MembershipGrant>,
}

/// Number of objects created, per kind. Duplicate creations are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreationCounts {
    /// Policies.
    pub policies: u64,
    /// Levels.
    pub levels: u64,
    /// Compartments.
    pub compartments: u64,
    /// Groups.
    pub groups: u64,
    /// Table bindings.
    pub table_policies: u64,
}

#[derive(Debug)]
struct PolicyState {
    info: PolicyInfo,
    levels: IndexMap<String, LevelInfo>,
    compartments: IndexMap<String, CompartmentInfo>,
    groups: IndexMap<String, GroupInfo>,
    users: HashMap<String, UserLabel>,
}

impl PolicyState {
    fn new(name: &str, tag_column: &str) -> Self {
        Self {
            info: PolicyInfo {
                name: name.to_string(),
                tag_column: tag_column.to_string(),
                enabled: false,
            },
            levels: IndexMap::new(),
            compartments: IndexMap::new(),
            groups: IndexMap::new(),
            users: HashMap::new(),
        }
    }

    fn label_mut(&mut self, username: &str) -> &mut UserLabel {
        self.users.entry(username.to_string()).or_default()
    }

    fn level_rank(&self, level: &str) -> Option<u32> {
        self.levels.get(level).map(|l| l.rank)
    }

    fn in_group_or_ancestor(&self, label: &UserLabel, group: &str) -> bool {
        let mut current = Some(group);
        // Bounded by the group count in case of a cycle.
        for _ in 0..=self.groups.len() {
            let Some(name) = current else { break };
            if label.groups.contains_key(name) {
                return true;
            }
            current = self.groups.get(name).and_then(|g| g.parent.as_deref());
        }
        false
    }

    fn dominates(&self, username: &str, tag: &DataTag) -> bool {
        let empty = UserLabel::default();
        let label = self.users.get(username).unwrap_or(&empty);

        let row_rank = if tag.level.is_empty() {
            0
        } else {
            match self.level_rank(&tag.level) {
                Some(rank) => rank,
                None => return false,
            }
        };
        let user_rank = label.level.as_deref().and_then(|l| self.level_rank(l)).unwrap_or(0);

        user_rank >= row_rank
            && tag.compartments.iter().all(|c| label.compartments.contains_key(c))
            && (tag.groups.is_empty() || tag.groups.iter().any(|g| self.in_group_or_ancestor(label, g)))
    }
}

/// All policies, table bindings and user labels of a store.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, PolicyState>,
    table_policies: HashMap<String, TablePolicyInfo>,
    counts: CreationCounts,
}

impl PolicyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn policy(&self, name: &str) -> MemoryResult<&PolicyState> {
        self.policies.get(name).ok_or_else(|| MemoryError::missing("policy", name))
    }

    fn policy_mut(&mut self, name: &str) -> MemoryResult<&mut PolicyState> {
        self.policies.get_mut(name).ok_or_else(|| MemoryError::missing("policy", name))
    }

    /// Creation counters.
    pub fn counts(&self) -> CreationCounts {
        self.counts
    }

    /// Look up a policy.
    pub fn get_policy(&self, name: &str) -> Option<PolicyInfo> {
        self.policies.get(name).map(|p| p.info.clone())
    }

    /// Create a disabled policy.
    pub fn create_policy(&mut self, name: &str, tag_column: &str) -> MemoryResult<()> {
        if self.policies.contains_key(name) {
            return Err(MemoryError::exists("policy", name));
        }
        self.policies.insert(name.to_string(), PolicyState::new(name, tag_column));
        self.counts.policies += 1;
        Ok(())
    }

    /// Enable a policy.
    pub fn enable_policy(&mut self, name: &str) -> MemoryResult<()> {
        self.policy_mut(name)?.info.enabled = true;
        Ok(())
    }

    /// Look up a level.
    pub fn get_level(&self, policy: &str, short_name: &str) -> MemoryResult<Option<LevelInfo>> {
        Ok(self.policy(policy)?.levels.get(short_name).cloned())
    }

    /// Create a level.
    pub fn create_level(&mut self, policy: &str, level: &LevelInfo) -> MemoryResult<()> {
        let state = self.policy_mut(policy)?;
        if state.levels.contains_key(&level.short_name) {
            return Err(MemoryError::exists("level", &level.short_name));
        }
        state.levels.insert(level.short_name.clone(), level.clone());
        self.counts.levels += 1;
        Ok(())
    }

    /// Look up a compartment.
    pub fn get_compartment(&self, policy: &str, short_name: &str) -> MemoryResult<Option<CompartmentInfo>> {
        Ok(self.policy(policy)?.compartments.get(short_name).cloned())
    }

    /// Create a compartment.
    pub fn create_compartment(&mut self, policy: &str, compartment: &CompartmentInfo) -> MemoryResult<()> {
        let state = self.policy_mut(policy)?;
        if state.compartments.contains_key(&compartment.short_name) {
            return Err(MemoryError::exists("compartment", &compartment.short_name));
        }
        state.compartments.insert(compartment.short_name.clone(), compartment.clone());
        self.counts.compartments += 1;
        Ok(())
    }

    /// Look up a group.
    pub fn get_group(&self, policy: &str, short_name: &str) -> MemoryResult<Option<GroupInfo>> {
        Ok(self.policy(policy)?.groups.get(short_name).cloned())
    }

    /// Create a group. A parent must already exist.
    pub fn create_group(&mut self, policy: &str, group: &GroupInfo) -> MemoryResult<()> {
        let state = self.policy_mut(policy)?;
        if state.groups.contains_key(&group.short_name) {
            return Err(MemoryError::exists("group", &group.short_name));
        }
        if let Some(parent) = &group.parent {
            if !state.groups.contains_key(parent) {
                return Err(MemoryError::missing("group", parent));
            }
        }
        state.groups.insert(group.short_name.clone(), group.clone());
        self.counts.groups += 1;
        Ok(())
    }

    /// Look up a table binding.
    pub fn get_table_policy(&self, name: &str) -> Option<TablePolicyInfo> {
        self.table_policies.get(name).cloned()
    }

    /// Create a disabled table binding.
    pub fn create_table_policy(&mut self, name: &str, policy: &str, table: &TableRef) -> MemoryResult<()> {
        self.policy(policy)?;
        if self.table_policies.contains_key(name) {
            return Err(MemoryError::exists("table policy", name));
        }
        self.table_policies.insert(
            name.to_string(),
            TablePolicyInfo {
                name: name.to_string(),
                policy: policy.to_string(),
                table: table.clone(),
                enabled: false,
            },
        );
        self.counts.table_policies += 1;
        Ok(())
    }

    /// Enable a table binding.
    pub fn enable_table_policy(&mut self, name: &str) -> MemoryResult<()> {
        let binding = self
            .table_policies
            .get_mut(name)
            .ok_or_else(|| MemoryError::missing("table policy", name))?;
        binding.enabled = true;
        Ok(())
    }

    /// Overwrite a user's level.
    pub fn set_user_level(&mut self, policy: &str, username: &str, level: &str) -> MemoryResult<()> {
        let state = self.policy_mut(policy)?;
        if !state.levels.contains_key(level) {
            return Err(MemoryError::missing("level", level));
        }
        state.label_mut(username).level = Some(level.to_string());
        Ok(())
    }

    /// Add a compartment membership.
    pub fn add_user_compartment(
        &mut self,
        policy: &str,
        username: &str,
        compartment: &str,
        grant: MembershipGrant,
    ) -> MemoryResult<()> {
        let state = self.policy_mut(policy)?;
        if !state.compartments.contains_key(compartment) {
            return Err(MemoryError::missing("compartment", compartment));
        }
        state.label_mut(username).compartments.insert(compartment.to_string(), grant);
        Ok(())
    }

    /// Remove a compartment membership.
    pub fn remove_user_compartment(&mut self, policy: &str, username: &str, compartment: &str) -> MemoryResult<()> {
        self.policy_mut(policy)?
            .label_mut(username)
            .compartments
            .remove(compartment)
            .map(|_| ())
            .ok_or_else(|| MemoryError::missing("compartment membership", format!("{}/{}", username, compartment)))
    }

    /// Add a group membership.
    pub fn add_user_group(&mut self, policy: &str, username: &str, group: &str, grant: MembershipGrant) -> MemoryResult<()> {
        let state = self.policy_mut(policy)?;
        if !state.groups.contains_key(group) {
            return Err(MemoryError::missing("group", group));
        }
        state.label_mut(username).groups.insert(group.to_string(), grant);
        Ok(())
    }

    /// Remove a group membership.
    pub fn remove_user_group(&mut self, policy: &str, username: &str, group: &str) -> MemoryResult<()> {
        self.policy_mut(policy)?
            .label_mut(username)
            .groups
            .remove(group)
            .map(|_| ())
            .ok_or_else(|| MemoryError::missing("group membership", format!("{}/{}", username, group)))
    }

    /// A user's label under a policy.
    pub fn user_label(&self, policy: &str, username: &str) -> Option<UserLabel> {
        self.policies.get(policy)?.users.get(username).cloned()
    }

    /// Short names of a policy's levels in creation order.
    pub fn level_names(&self, policy: &str) -> Vec<String> {
        self.policies
            .get(policy)
            .map(|p| p.levels.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether any enabled binding on `table` points at an enabled policy.
    pub fn is_enforced(&self, table: &TableRef) -> bool {
        self.enforcing_policies(table).next().is_some()
    }

    fn enforcing_policies<'a>(&'a self, table: &'a TableRef) -> impl Iterator<Item = &'a PolicyState> + 'a {
        self.table_policies
            .values()
            .filter(move |binding| binding.enabled && binding.table == *table)
            .filter_map(|binding| self.policies.get(&binding.policy))
            .filter(|policy| policy.info.enabled)
    }

    /// Whether `username` may see a row of `table` carrying `tag`.
    ///
    /// Untagged rows are visible. Rows with a malformed tag are hidden while
    /// the table is enforced.
    pub fn can_read(&self, table: &TableRef, username: &str, tag: Option<&str>) -> bool {
        let mut policies = self.enforcing_policies(table).peekable();
        if policies.peek().is_none() {
            return true;
        }
        let Some(tag) = tag else {
            return true;
        };
        let Ok(tag) = DataTag::parse(tag) else {
            return false;
        };
        policies.all(|policy| policy.dominates(username, &tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = "p";

    fn table() -> TableRef {
        TableRef::new("ycsb", "usertable")
    }

    fn registry() -> PolicyRegistry {
        let mut registry = PolicyRegistry::new();
        registry.create_policy(POLICY, "data_tag").unwrap();
        for (rank, name) in ["public", "confidential", "secret"].iter().enumerate() {
            registry
                .create_level(
                    POLICY,
                    &LevelInfo {
                        short_name: name.to_string(),
                        long_name: format!("Level {}", name),
                        rank: rank as u32 + 1,
                    },
                )
                .unwrap();
        }
        for name in ["hr", "sales"] {
            registry
                .create_compartment(POLICY, &CompartmentInfo { short_name: name.into(), long_name: name.into() })
                .unwrap();
        }
        registry
            .create_group(POLICY, &GroupInfo { short_name: "org".into(), long_name: "Org".into(), parent: None })
            .unwrap();
        registry
            .create_group(
                POLICY,
                &GroupInfo { short_name: "team_a".into(), long_name: "Team A".into(), parent: Some("org".into()) },
            )
            .unwrap();
        registry.create_table_policy("tp", POLICY, &table()).unwrap();
        registry
    }

    fn enforce(registry: &mut PolicyRegistry) {
        registry.enable_policy(POLICY).unwrap();
        registry.enable_table_policy("tp").unwrap();
    }

    #[test]
    fn test_duplicate_creation_rejected() {
        let mut registry = registry();
        assert!(matches!(
            registry.create_policy(POLICY, "data_tag"),
            Err(MemoryError::AlreadyExists { .. })
        ));
        let counts = registry.counts();
        assert_eq!(counts.policies, 1);
        assert_eq!(counts.levels, 3);
        assert_eq!(counts.groups, 2);
        assert_eq!(counts.table_policies, 1);
    }

    #[test]
    fn test_not_enforced_until_both_enabled() {
        let mut registry = registry();
        registry.set_user_level(POLICY, "u", "public").unwrap();
        assert!(registry.can_read(&table(), "u", Some("secret::")));

        registry.enable_policy(POLICY).unwrap();
        assert!(!registry.is_enforced(&table()));
        assert!(registry.can_read(&table(), "u", Some("secret::")));

        registry.enable_table_policy("tp").unwrap();
        assert!(registry.is_enforced(&table()));
        assert!(!registry.can_read(&table(), "u", Some("secret::")));
    }

    #[test]
    fn test_level_dominance() {
        let mut registry = registry();
        enforce(&mut registry);
        registry.set_user_level(POLICY, "u", "confidential").unwrap();

        assert!(registry.can_read(&table(), "u", Some("public::")));
        assert!(registry.can_read(&table(), "u", Some("confidential::")));
        assert!(!registry.can_read(&table(), "u", Some("secret::")));
        assert!(!registry.can_read(&table(), "u", Some("unknown::")));
        assert!(registry.can_read(&table(), "u", Some("::")));
    }

    #[test]
    fn test_compartments_must_be_subset() {
        let mut registry = registry();
        enforce(&mut registry);
        registry.set_user_level(POLICY, "u", "public").unwrap();
        registry.add_user_compartment(POLICY, "u", "hr", MembershipGrant::default()).unwrap();

        assert!(registry.can_read(&table(), "u", Some("public:hr:")));
        assert!(!registry.can_read(&table(), "u", Some("public:hr,sales:")));

        registry.remove_user_compartment(POLICY, "u", "hr").unwrap();
        assert!(!registry.can_read(&table(), "u", Some("public:hr:")));
        assert!(matches!(
            registry.remove_user_compartment(POLICY, "u", "hr"),
            Err(MemoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_group_membership_and_ancestry() {
        let mut registry = registry();
        enforce(&mut registry);
        registry.set_user_level(POLICY, "member", "public").unwrap();
        registry.add_user_group(POLICY, "member", "team_a", MembershipGrant::default()).unwrap();
        registry.set_user_level(POLICY, "parent", "public").unwrap();
        registry.add_user_group(POLICY, "parent", "org", MembershipGrant::default()).unwrap();
        registry.set_user_level(POLICY, "outsider", "public").unwrap();

        assert!(registry.can_read(&table(), "member", Some("public::team_a")));
        assert!(registry.can_read(&table(), "parent", Some("public::team_a")));
        assert!(!registry.can_read(&table(), "outsider", Some("public::team_a")));
        assert!(!registry.can_read(&table(), "member", Some("public::org")));
    }

    #[test]
    fn test_malformed_tag_hidden_untagged_visible() {
        let mut registry = registry();
        enforce(&mut registry);
        registry.set_user_level(POLICY, "u", "secret").unwrap();
        assert!(!registry.can_read(&table(), "u", Some("secret")));
        assert!(registry.can_read(&table(), "u", None));
    }

    #[test]
    fn test_unknown_objects_rejected() {
        let mut registry = registry();
        assert!(registry.set_user_level(POLICY, "u", "top").is_err());
        assert!(registry.add_user_group(POLICY, "u", "nope", MembershipGrant::default()).is_err());
        assert!(registry.create_table_policy("tp2", "missing", &table()).is_err());
        assert!(registry.get_level("missing", "public").is_err());
    }
}
