//! Error types for model duplication
//!
//! A vetoed duplication is not an error; it is reported through
//! [`crate::Duplication::Vetoed`].

use thiserror::Error;

/// Result type alias for duplication operations
pub type DuplicateResult<T> = Result<T, DuplicateError>;

/// Error types for duplication operations
#[derive(Debug, Clone, Error)]
pub enum DuplicateError {
    /// Unknown option name or inconsistent model/relation configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An insert, attach or lookup against the store failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Beginning, committing or rolling back the transaction failed
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// The record being duplicated has no primary key value
    #[error("Record in table '{table}' has no primary key value")]
    MissingPrimaryKey { table: String },

    /// No row with the given primary key exists
    #[error("Record not found in table '{table}' for key {key}")]
    NotFound { table: String, key: String },

    /// A relation could not be resolved against the store
    #[error("Relationship error: {0}")]
    Relationship(String),

    /// Converting between a typed model and a record failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No free value was found for a unique column within the configured attempts
    #[error("Could not find a unique value for column '{column}' after {attempts} attempts")]
    UniqueExhausted { column: String, attempts: u32 },
}

impl DuplicateError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction(message.into())
    }

    /// True for errors raised by the backing store
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Transaction(_))
    }
}

impl From<serde_json::Error> for DuplicateError {
    fn from(err: serde_json::Error) -> Self {
        DuplicateError::Serialization(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for DuplicateError {
    fn from(err: sqlx::Error) -> Self {
        DuplicateError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DuplicateError::configuration("The option \"foo\" does not exist");
        assert_eq!(
            err.to_string(),
            "Configuration error: The option \"foo\" does not exist"
        );

        let err = DuplicateError::MissingPrimaryKey {
            table: "posts".to_string(),
        };
        assert!(err.to_string().contains("posts"));

        let err = DuplicateError::NotFound {
            table: "posts".to_string(),
            key: "42".to_string(),
        };
        assert_eq!(err.to_string(), "Record not found in table 'posts' for key 42");

        let err = DuplicateError::UniqueExhausted {
            column: "title".to_string(),
            attempts: 3,
        };
        assert!(err.to_string().contains("title"));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_storage_failure_detection() {
        assert!(DuplicateError::persistence("insert failed").is_storage_failure());
        assert!(DuplicateError::transaction("commit failed").is_storage_failure());
        assert!(!DuplicateError::configuration("bad option").is_storage_failure());
    }

    #[test]
    fn test_conversion_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: DuplicateError = json_err.into();

        match err {
            DuplicateError::Serialization(_) => {}
            _ => panic!("Expected serialization error"),
        }
    }
}
