//! Transaction configuration for the duplication unit of work

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DuplicateError;

/// Isolation level requested when a duplication opens its transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    /// Makes concurrent duplications of the same root fail instead of racing on unique values
    Serializable,
}

impl IsolationLevel {
    /// Keyword for `SET TRANSACTION ISOLATION LEVEL`
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl FromStr for IsolationLevel {
    type Err = DuplicateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "read_uncommitted" => Ok(IsolationLevel::ReadUncommitted),
            "read_committed" => Ok(IsolationLevel::ReadCommitted),
            "repeatable_read" => Ok(IsolationLevel::RepeatableRead),
            "serializable" => Ok(IsolationLevel::Serializable),
            other => Err(DuplicateError::Configuration(format!(
                "Unknown isolation level '{}', expected read_uncommitted, read_committed, repeatable_read or serializable",
                other
            ))),
        }
    }
}

/// How a store opens the transaction of one duplication
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Transaction isolation level; `None` keeps the backend default
    pub isolation_level: Option<IsolationLevel>,
}

impl TransactionConfig {
    pub fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_level_renders_sql_keyword() {
        for (input, sql) in [
            ("read_uncommitted", "READ UNCOMMITTED"),
            ("READ COMMITTED", "READ COMMITTED"),
            ("repeatable-read", "REPEATABLE READ"),
            ("Serializable", "SERIALIZABLE"),
        ] {
            assert_eq!(input.parse::<IsolationLevel>().unwrap().as_sql(), sql);
        }
    }

    #[test]
    fn test_isolation_level_parsing() {
        assert_eq!(
            "serializable".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::Serializable
        );
        assert_eq!(
            "Repeatable Read".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::RepeatableRead
        );
        assert_eq!(
            "read-committed".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadCommitted
        );
        assert!("snapshot".parse::<IsolationLevel>().is_err());
    }

    #[test]
    fn test_backend_default_unless_requested() {
        assert_eq!(TransactionConfig::default().isolation_level, None);

        let serializable = TransactionConfig::default().with_isolation_level(IsolationLevel::Serializable);
        assert_eq!(serializable.isolation_level, Some(IsolationLevel::Serializable));
    }
}
