//! In-memory store configuration.

use std::time::Duration;

/// Default administrative username.
pub const DEFAULT_ADMIN_USER: &str = "admin";

/// Default administrative password.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// In-memory store configuration.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Administrative username.
    pub admin_username: String,
    /// Administrative password.
    pub admin_password: String,
    /// Expose policy administration through the connector.
    pub policy_admin: bool,
    /// Artificial delay added to every point read.
    pub read_delay: Option<Duration>,
    /// Artificial delay added to every commit.
    pub commit_delay: Option<Duration>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            admin_username: DEFAULT_ADMIN_USER.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            policy_admin: true,
            read_delay: None,
            commit_delay: None,
        }
    }
}

impl MemoryConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the administrative credentials.
    pub fn admin(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.admin_username = username.into();
        self.admin_password = password.into();
        self
    }

    /// Enable or disable policy administration.
    pub fn policy_admin(mut self, enabled: bool) -> Self {
        self.policy_admin = enabled;
        self
    }

    /// Delay every point read.
    pub fn read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Delay every commit.
    pub fn commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = Some(delay);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = MemoryConfig::new()
            .admin("root", "secret")
            .policy_admin(false)
            .read_delay(Duration::from_micros(50));

        assert_eq!(config.admin_username, "root");
        assert!(!config.policy_admin);
        assert_eq!(config.read_delay, Some(Duration::from_micros(50)));
        assert_eq!(config.commit_delay, None);
    }
}
