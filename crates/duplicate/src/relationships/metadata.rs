//! Declared relations of a model: kind, keys and pivot table

use serde::{Deserialize, Serialize};

use crate::error::{DuplicateError, DuplicateResult};
use crate::model::TimestampColumns;

/// Kind of a declared relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    /// A single related row holds the foreign key
    HasOne,
    /// Any number of related rows hold the foreign key
    HasMany,
    /// The foreign key is on this model
    BelongsTo,
    /// Linked through association rows in a pivot table
    ManyToMany,
    MorphOne,
    MorphMany,
    MorphTo,
    /// Rows reached through an intermediate table
    HasManyThrough,
}

impl RelationshipType {
    /// More than one related row may be attached
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            Self::HasMany | Self::ManyToMany | Self::MorphMany | Self::HasManyThrough
        )
    }

    /// Only resolvable through a [`PivotConfig`]
    pub fn requires_pivot(self) -> bool {
        matches!(self, Self::ManyToMany)
    }
}

/// Everything the duplicator needs to know about one declared relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMetadata {
    pub relationship_type: RelationshipType,

    /// Relation name, as used in the relation-level options
    pub name: String,

    pub related_table: String,

    /// Primary key column of the related table
    pub related_primary_key: String,

    /// Timestamp columns of the related table, if it tracks them
    pub related_timestamps: Option<TimestampColumns>,

    pub foreign_key: ForeignKeyConfig,

    /// Column of this model the foreign key points at, `"id"` unless overridden
    pub local_key: String,

    pub pivot_config: Option<PivotConfig>,
}

impl RelationshipMetadata {
    pub fn new(
        relationship_type: RelationshipType,
        name: impl Into<String>,
        related_table: impl Into<String>,
        foreign_key: ForeignKeyConfig,
    ) -> Self {
        Self {
            relationship_type,
            name: name.into(),
            related_table: related_table.into(),
            related_primary_key: "id".to_string(),
            related_timestamps: None,
            foreign_key,
            local_key: "id".to_string(),
            pivot_config: None,
        }
    }

    /// `name` is a hasOne relation to `related_table`, keyed by `foreign_key` on the related row
    pub fn has_one(
        name: impl Into<String>,
        related_table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        let related_table = related_table.into();
        let foreign_key = ForeignKeyConfig::simple(foreign_key, related_table.clone());
        Self::new(RelationshipType::HasOne, name, related_table, foreign_key)
    }

    /// `name` is a hasMany relation to `related_table`, keyed by `foreign_key` on the related rows
    pub fn has_many(
        name: impl Into<String>,
        related_table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        let related_table = related_table.into();
        let foreign_key = ForeignKeyConfig::simple(foreign_key, related_table.clone());
        Self::new(RelationshipType::HasMany, name, related_table, foreign_key)
    }

    /// `name` is a belongsTo relation; `foreign_key` lives on this model's table
    pub fn belongs_to(
        name: impl Into<String>,
        related_table: impl Into<String>,
        foreign_key: impl Into<String>,
        local_table: impl Into<String>,
    ) -> Self {
        let foreign_key = ForeignKeyConfig::simple(foreign_key, local_table);
        Self::new(RelationshipType::BelongsTo, name, related_table, foreign_key)
    }

    /// `name` is a many-to-many relation to `related_table` through `pivot`
    pub fn many_to_many(
        name: impl Into<String>,
        related_table: impl Into<String>,
        pivot: PivotConfig,
    ) -> Self {
        let foreign_key = ForeignKeyConfig::simple(pivot.local_key.clone(), pivot.table.clone());
        Self::new(RelationshipType::ManyToMany, name, related_table, foreign_key).with_pivot(pivot)
    }

    /// Point the foreign key at a column other than `id`
    pub fn with_local_key(mut self, local_key: impl Into<String>) -> Self {
        self.local_key = local_key.into();
        self
    }

    /// Set the related table's primary key column
    pub fn with_related_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.related_primary_key = primary_key.into();
        self
    }

    /// The related table tracks `created_at`/`updated_at`
    pub fn with_related_timestamps(mut self, timestamps: TimestampColumns) -> Self {
        self.related_timestamps = Some(timestamps);
        self
    }

    pub fn with_pivot(mut self, pivot_config: PivotConfig) -> Self {
        self.pivot_config = Some(pivot_config);
        self
    }

    /// Checked when a model is registered
    pub fn validate(&self) -> DuplicateResult<()> {
        if self.name.is_empty() {
            return Err(DuplicateError::configuration(
                "Relationship name cannot be empty",
            ));
        }

        if self.relationship_type.requires_pivot() && self.pivot_config.is_none() {
            return Err(DuplicateError::Configuration(format!(
                "Relationship '{}' of type {:?} requires pivot configuration",
                self.name, self.relationship_type
            )));
        }

        self.foreign_key.validate()?;

        if let Some(ref pivot) = self.pivot_config {
            pivot.validate()?;
        }

        Ok(())
    }
}

/// Column holding the parent key, and the table it lives in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyConfig {
    pub column: String,
    pub table: String,
}

impl ForeignKeyConfig {
    pub fn simple(column: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            table: table.into(),
        }
    }

    pub fn validate(&self) -> DuplicateResult<()> {
        if self.column.is_empty() {
            return Err(DuplicateError::configuration(
                "Foreign key configuration must name a column",
            ));
        }

        if self.table.is_empty() {
            return Err(DuplicateError::configuration(
                "Foreign key configuration must specify a table",
            ));
        }

        Ok(())
    }
}

/// Association table of a many-to-many relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotConfig {
    pub table: String,

    /// Column referencing the model that declares the relation
    pub local_key: String,

    /// Column referencing the related row
    pub foreign_key: String,

    /// The pivot table's own primary key column, if it has one
    pub primary_key: Option<String>,

    /// Set when association rows carry `created_at`/`updated_at`
    pub timestamps: Option<TimestampColumns>,
}

impl PivotConfig {
    pub fn new(
        table: impl Into<String>,
        local_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            local_key: local_key.into(),
            foreign_key: foreign_key.into(),
            primary_key: None,
            timestamps: None,
        }
    }

    /// The pivot table has its own surrogate key
    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = Some(primary_key.into());
        self
    }

    /// Association rows use the default timestamp columns
    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = Some(TimestampColumns::default());
        self
    }

    /// Columns of the pivot row that are never carried over to a new association
    pub fn reserved_columns(&self) -> Vec<&str> {
        let mut columns = vec![self.local_key.as_str(), self.foreign_key.as_str()];
        if let Some(ref primary_key) = self.primary_key {
            columns.push(primary_key);
        }
        if let Some(ref timestamps) = self.timestamps {
            columns.push(&timestamps.created_at);
            columns.push(&timestamps.updated_at);
        }
        columns
    }

    pub fn validate(&self) -> DuplicateResult<()> {
        if self.table.is_empty() {
            return Err(DuplicateError::configuration(
                "Pivot table name cannot be empty",
            ));
        }

        if self.local_key.is_empty() {
            return Err(DuplicateError::configuration(
                "Pivot local key cannot be empty",
            ));
        }

        if self.foreign_key.is_empty() {
            return Err(DuplicateError::configuration(
                "Pivot foreign key cannot be empty",
            ));
        }

        if self.local_key == self.foreign_key {
            return Err(DuplicateError::configuration(
                "Pivot local key and foreign key must be different",
            ));
        }

        Ok(())
    }
}
