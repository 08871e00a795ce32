//! Model definitions - static description of a duplicable model
//!
//! A [`ModelDefinition`] names the table, primary key, timestamp columns and the
//! ordered list of relations a model declares. Typed models expose theirs
//! through [`Duplicable`].

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::DuplicateResult;
use crate::options::DuplicateOptions;
use crate::relationships::RelationshipMetadata;

/// Names of the `created_at` / `updated_at` columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampColumns {
    pub created_at: String,
    pub updated_at: String,
}

impl TimestampColumns {
    pub fn new(created_at: impl Into<String>, updated_at: impl Into<String>) -> Self {
        Self {
            created_at: created_at.into(),
            updated_at: updated_at.into(),
        }
    }

    pub fn columns(&self) -> [&str; 2] {
        [&self.created_at, &self.updated_at]
    }
}

impl Default for TimestampColumns {
    fn default() -> Self {
        Self::new("created_at", "updated_at")
    }
}

/// Static metadata for one model type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Model name, used to key hooks and the relationship registry
    pub name: String,
    /// Table name for this model
    pub table: String,
    /// Primary key column
    pub primary_key: String,
    /// Timestamp columns, if the model uses timestamps
    pub timestamps: Option<TimestampColumns>,
    /// Soft-delete column, if the model supports soft deletes.
    ///
    /// Informational: uniqueness checks look at every row, soft-deleted ones included.
    pub soft_delete_column: Option<String>,
    /// Declared relations, in declaration order
    pub relations: Vec<RelationshipMetadata>,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: "id".to_string(),
            timestamps: None,
            soft_delete_column: None,
            relations: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    /// Use the default `created_at` / `updated_at` columns
    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = Some(TimestampColumns::default());
        self
    }

    pub fn with_timestamp_columns(mut self, timestamps: TimestampColumns) -> Self {
        self.timestamps = Some(timestamps);
        self
    }

    pub fn with_soft_deletes(mut self, column: impl Into<String>) -> Self {
        self.soft_delete_column = Some(column.into());
        self
    }

    /// Declare a relation; order of declaration is the order of duplication
    pub fn relation(mut self, relation: RelationshipMetadata) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn uses_timestamps(&self) -> bool {
        self.timestamps.is_some()
    }

    pub fn find_relation(&self, name: &str) -> Option<&RelationshipMetadata> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    /// Validate every declared relation
    pub fn validate(&self) -> DuplicateResult<()> {
        for relation in &self.relations {
            relation.validate()?;
        }
        Ok(())
    }
}

/// A typed model that can be duplicated.
///
/// Its primary key is read through serde and the duplicate is returned the
/// same way, so serialized field names must match column names. The columns
/// copied are those of the stored row, not of the struct.
pub trait Duplicable: Serialize + DeserializeOwned + Send + Sync {
    /// Static metadata for this model
    fn model_definition() -> ModelDefinition;

    /// Options used when this model is duplicated without explicit options
    fn duplicate_options(&self) -> DuplicateOptions {
        DuplicateOptions::new()
    }
}
