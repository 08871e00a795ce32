//! Persistence seam used by the duplicator
//!
//! A [`DuplicationStore`] hands out one [`StoreTransaction`] per duplication.
//! Every read and write of a duplication goes through that transaction, which
//! is then committed or rolled back as a whole.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::DuplicateResult;
use crate::record::Record;
use crate::relationships::{PivotConfig, RelationshipMetadata};
use crate::transaction::TransactionConfig;
use crate::unique::UniqueCheck;
use crate::value::DatabaseValue;

/// Rows an existence check looks at
#[derive(Debug, Clone, PartialEq)]
pub enum ExistsScope {
    /// Every row of the table, soft-deleted rows included
    Table,
    /// Rows whose `foreign_key` column holds `parent`
    Parent {
        foreign_key: String,
        parent: DatabaseValue,
    },
}

/// A record reached through a relation
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedRecord {
    pub record: Record,
    /// The association row, for relations that go through a pivot table
    pub pivot: Option<Record>,
}

impl RelatedRecord {
    pub fn child(record: Record) -> Self {
        Self {
            record,
            pivot: None,
        }
    }

    pub fn pivoted(record: Record, pivot: Record) -> Self {
        Self {
            record,
            pivot: Some(pivot),
        }
    }
}

#[async_trait]
pub trait DuplicationStore: Send + Sync {
    /// Open the unit of work for one duplication
    async fn begin(&self, config: &TransactionConfig) -> DuplicateResult<Box<dyn StoreTransaction>>;
}

#[async_trait]
pub trait StoreTransaction: Send {
    /// Records currently attached through `relation` to the parent whose
    /// local key holds `parent_key`, in store order.
    async fn fetch_related(
        &mut self,
        relation: &RelationshipMetadata,
        parent_key: &DatabaseValue,
    ) -> DuplicateResult<Vec<RelatedRecord>>;

    /// The row of `table` whose `primary_key` column holds `key`
    async fn fetch(
        &mut self,
        table: &str,
        primary_key: &str,
        key: &DatabaseValue,
    ) -> DuplicateResult<Option<Record>>;

    /// Insert `record` into its table and return the stored row, with the
    /// generated primary key and column defaults filled in.
    async fn insert(&mut self, record: Record, primary_key: Option<&str>) -> DuplicateResult<Record>;

    /// Create an association row linking `local` to `related`
    async fn attach(
        &mut self,
        pivot: &PivotConfig,
        local: &DatabaseValue,
        related: &DatabaseValue,
        attributes: HashMap<String, DatabaseValue>,
    ) -> DuplicateResult<()>;

    /// Whether a row in `scope` holds `value` in `column`.
    ///
    /// Values compare by their textual form.
    async fn exists(
        &mut self,
        table: &str,
        column: &str,
        value: &str,
        scope: &ExistsScope,
    ) -> DuplicateResult<bool>;

    async fn commit(self: Box<Self>) -> DuplicateResult<()>;

    async fn rollback(self: Box<Self>) -> DuplicateResult<()>;
}

/// [`UniqueCheck`] answered by a store transaction
pub struct StoreUniqueCheck<'a> {
    transaction: &'a mut dyn StoreTransaction,
    table: &'a str,
    scope: &'a ExistsScope,
}

impl<'a> StoreUniqueCheck<'a> {
    pub fn new(
        transaction: &'a mut dyn StoreTransaction,
        table: &'a str,
        scope: &'a ExistsScope,
    ) -> Self {
        Self {
            transaction,
            table,
            scope,
        }
    }
}

#[async_trait]
impl UniqueCheck for StoreUniqueCheck<'_> {
    async fn exists(&mut self, column: &str, value: &str) -> DuplicateResult<bool> {
        self.transaction
            .exists(self.table, column, value, self.scope)
            .await
    }
}
