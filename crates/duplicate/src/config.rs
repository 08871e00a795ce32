//! Duplicator configuration
//!
//! Defaults match the documented behavior; [`DuplicatorConfig::from_env`]
//! overrides them from `ELIF_DUPLICATE_*` environment variables.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DuplicateError, DuplicateResult};
use crate::transaction::{IsolationLevel, TransactionConfig};

pub const ENV_RELATION_UNIQUE_SCOPE: &str = "ELIF_DUPLICATE_RELATION_UNIQUE_SCOPE";
pub const ENV_MAX_UNIQUE_ATTEMPTS: &str = "ELIF_DUPLICATE_MAX_UNIQUE_ATTEMPTS";
pub const ENV_ISOLATION_LEVEL: &str = "ELIF_DUPLICATE_ISOLATION_LEVEL";

/// Which rows a relation's unique columns are checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationUniqueScope {
    /// Rows already attached to the new root through the same relation
    #[default]
    Parent,
    /// Every row of the related table
    Table,
}

impl FromStr for RelationUniqueScope {
    type Err = DuplicateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "parent" => Ok(RelationUniqueScope::Parent),
            "table" => Ok(RelationUniqueScope::Table),
            other => Err(DuplicateError::Configuration(format!(
                "Invalid value '{}' for {}, expected parent or table",
                other, ENV_RELATION_UNIQUE_SCOPE
            ))),
        }
    }
}

/// Configuration of a [`crate::Duplicator`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicatorConfig {
    pub relation_unique_scope: RelationUniqueScope,
    /// Upper bound on suffixed candidates per unique column; `None` is unbounded
    pub max_unique_attempts: Option<u32>,
    pub transaction: TransactionConfig,
}

impl DuplicatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> DuplicateResult<Self> {
        let mut config = Self::default();

        if let Some(scope) = read_env(ENV_RELATION_UNIQUE_SCOPE) {
            config.relation_unique_scope = scope.parse()?;
        }

        if let Some(attempts) = read_env(ENV_MAX_UNIQUE_ATTEMPTS) {
            let attempts = attempts.parse::<u32>().map_err(|_| {
                DuplicateError::Configuration(format!(
                    "Invalid value '{}' for {}, expected a positive integer",
                    attempts, ENV_MAX_UNIQUE_ATTEMPTS
                ))
            })?;
            config.max_unique_attempts = Some(attempts);
        }

        if let Some(level) = read_env(ENV_ISOLATION_LEVEL) {
            config.transaction.isolation_level = Some(level.parse::<IsolationLevel>()?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_relation_unique_scope(mut self, scope: RelationUniqueScope) -> Self {
        self.relation_unique_scope = scope;
        self
    }

    pub fn with_max_unique_attempts(mut self, attempts: u32) -> Self {
        self.max_unique_attempts = Some(attempts);
        self
    }

    pub fn with_transaction(mut self, transaction: TransactionConfig) -> Self {
        self.transaction = transaction;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> DuplicateResult<()> {
        if self.max_unique_attempts == Some(0) {
            return Err(DuplicateError::Configuration(
                "max_unique_attempts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        env::remove_var(ENV_RELATION_UNIQUE_SCOPE);
        env::remove_var(ENV_MAX_UNIQUE_ATTEMPTS);
        env::remove_var(ENV_ISOLATION_LEVEL);
    }

    #[test]
    fn test_default_config() {
        let config = DuplicatorConfig::default();
        assert_eq!(config.relation_unique_scope, RelationUniqueScope::Parent);
        assert!(config.max_unique_attempts.is_none());
        assert!(config.transaction.isolation_level.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_is_invalid() {
        let config = DuplicatorConfig::new().with_max_unique_attempts(0);
        assert!(matches!(
            config.validate(),
            Err(DuplicateError::Configuration(_))
        ));
    }

    #[test]
    #[serial]
    fn test_from_env_without_variables() {
        clear_env();
        assert_eq!(DuplicatorConfig::from_env().unwrap(), DuplicatorConfig::default());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_overrides() {
        clear_env();
        env::set_var(ENV_RELATION_UNIQUE_SCOPE, "table");
        env::set_var(ENV_MAX_UNIQUE_ATTEMPTS, "50");
        env::set_var(ENV_ISOLATION_LEVEL, "serializable");

        let config = DuplicatorConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.relation_unique_scope, RelationUniqueScope::Table);
        assert_eq!(config.max_unique_attempts, Some(50));
        assert_eq!(
            config.transaction.isolation_level,
            Some(IsolationLevel::Serializable)
        );
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_values() {
        clear_env();
        env::set_var(ENV_MAX_UNIQUE_ATTEMPTS, "many");
        assert!(DuplicatorConfig::from_env().is_err());

        clear_env();
        env::set_var(ENV_RELATION_UNIQUE_SCOPE, "everywhere");
        assert!(DuplicatorConfig::from_env().is_err());

        clear_env();
        env::set_var(ENV_MAX_UNIQUE_ATTEMPTS, "0");
        assert!(DuplicatorConfig::from_env().is_err());
        clear_env();
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: DuplicatorConfig =
            serde_yaml::from_str("relation_unique_scope: table\n").unwrap();
        assert_eq!(config.relation_unique_scope, RelationUniqueScope::Table);
        assert!(config.max_unique_attempts.is_none());
    }
}
