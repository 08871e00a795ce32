//! In-memory store for development and testing
//!
//! Tables are ordered lists of [`Record`]s. A transaction works on a private
//! copy of every table and publishes it on commit; a commit fails if another
//! transaction (or a direct write) committed in between.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{DuplicateError, DuplicateResult};
use crate::record::Record;
use crate::relationships::{PivotConfig, RelationshipMetadata};
use crate::store::{DuplicationStore, ExistsScope, RelatedRecord, StoreTransaction};
use crate::transaction::TransactionConfig;
use crate::value::DatabaseValue;

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    rows: Vec<Record>,
    defaults: HashMap<String, DatabaseValue>,
    unique_columns: Vec<String>,
    last_id: i64,
}

impl MemoryTable {
    fn insert(&mut self, mut record: Record, primary_key: Option<&str>) -> DuplicateResult<Record> {
        if let Some(primary_key) = primary_key {
            match record.primary_key(primary_key).cloned() {
                Some(id) => {
                    if self.find(primary_key, &id).is_some() {
                        return Err(DuplicateError::persistence(format!(
                            "duplicate key value violates primary key '{}' of '{}': {}",
                            primary_key,
                            record.table(),
                            id
                        )));
                    }
                    if let Some(id) = id.as_i64() {
                        self.last_id = self.last_id.max(id);
                    }
                }
                None => {
                    self.last_id += 1;
                    record.set(primary_key, self.last_id);
                }
            }
        }

        for (column, default) in &self.defaults {
            if !record.contains(column) {
                record.set(column.clone(), default.clone());
            }
        }

        for column in &self.unique_columns {
            if let Some(value) = record.get(column).filter(|value| !value.is_null()) {
                if self.find(column, value).is_some() {
                    return Err(DuplicateError::persistence(format!(
                        "duplicate key value violates unique constraint on '{}.{}': {}",
                        record.table(),
                        column,
                        value
                    )));
                }
            }
        }

        self.rows.push(record.clone());
        Ok(record)
    }

    fn find(&self, column: &str, value: &DatabaseValue) -> Option<&Record> {
        self.rows
            .iter()
            .find(|row| row.get(column).map(|v| v.matches(value)).unwrap_or(false))
    }

    fn where_eq(&self, column: &str, value: &DatabaseValue) -> Vec<Record> {
        self.rows
            .iter()
            .filter(|row| row.get(column).map(|v| v.matches(value)).unwrap_or(false))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    tables: HashMap<String, MemoryTable>,
}

impl Tables {
    fn table_mut(&mut self, name: &str) -> &mut MemoryTable {
        self.tables.entry(name.to_string()).or_default()
    }

    fn rows(&self, name: &str) -> &[Record] {
        self.tables
            .get(name)
            .map(|table| table.rows.as_slice())
            .unwrap_or(&[])
    }

    fn where_eq(&self, name: &str, column: &str, value: &DatabaseValue) -> Vec<Record> {
        self.tables
            .get(name)
            .map(|table| table.where_eq(column, value))
            .unwrap_or_default()
    }

    fn insert(&mut self, record: Record, primary_key: Option<&str>) -> DuplicateResult<Record> {
        let table = record.table().to_string();
        self.table_mut(&table).insert(record, primary_key)
    }

    fn fetch_related(
        &self,
        relation: &RelationshipMetadata,
        parent_key: &DatabaseValue,
    ) -> Vec<RelatedRecord> {
        match &relation.pivot_config {
            None => self
                .where_eq(&relation.related_table, &relation.foreign_key.column, parent_key)
                .into_iter()
                .map(RelatedRecord::child)
                .collect(),
            Some(pivot) => self
                .where_eq(&pivot.table, &pivot.local_key, parent_key)
                .into_iter()
                .filter_map(|pivot_row| {
                    let related_key = pivot_row.get(&pivot.foreign_key)?.clone();
                    let related = self
                        .where_eq(
                            &relation.related_table,
                            &relation.related_primary_key,
                            &related_key,
                        )
                        .into_iter()
                        .next()?;
                    Some(RelatedRecord::pivoted(related, pivot_row))
                })
                .collect(),
        }
    }

    fn exists(&self, table: &str, column: &str, value: &str, scope: &ExistsScope) -> bool {
        self.rows(table).iter().any(|row| {
            let in_scope = match scope {
                ExistsScope::Table => true,
                ExistsScope::Parent {
                    foreign_key,
                    parent,
                } => row
                    .get(foreign_key)
                    .map(|key| key.matches(parent))
                    .unwrap_or(false),
            };

            in_scope
                && row
                    .get(column)
                    .and_then(|current| current.to_unique_string())
                    .map(|current| current == value)
                    .unwrap_or(false)
        })
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: Tables,
    version: u64,
}

/// In-memory [`DuplicationStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table and the values its columns take when an insert omits them
    pub fn define_table<I, K>(&self, table: &str, defaults: I)
    where
        I: IntoIterator<Item = (K, DatabaseValue)>,
        K: Into<String>,
    {
        let mut state = self.state.write();
        let definition = state.tables.table_mut(table);
        definition.defaults = defaults
            .into_iter()
            .map(|(column, value)| (column.into(), value))
            .collect();
        state.version += 1;
    }

    /// Reject inserts that repeat an existing non-null value of `column`
    pub fn add_unique_constraint(&self, table: &str, column: &str) {
        let mut state = self.state.write();
        state
            .tables
            .table_mut(table)
            .unique_columns
            .push(column.to_string());
        state.version += 1;
    }

    /// Insert outside of any transaction
    pub fn insert(&self, record: Record, primary_key: Option<&str>) -> DuplicateResult<Record> {
        let mut state = self.state.write();
        let stored = state.tables.insert(record, primary_key)?;
        state.version += 1;
        Ok(stored)
    }

    /// All rows of `table`, in insertion order
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.state.read().tables.rows(table).to_vec()
    }

    pub fn count(&self, table: &str) -> usize {
        self.state.read().tables.rows(table).len()
    }

    /// Rows of `table` whose `column` holds `value`
    pub fn where_eq(
        &self,
        table: &str,
        column: &str,
        value: impl Into<DatabaseValue>,
    ) -> Vec<Record> {
        self.state.read().tables.where_eq(table, column, &value.into())
    }

    /// First row of `table` whose `column` holds `value`
    pub fn find(
        &self,
        table: &str,
        column: &str,
        value: impl Into<DatabaseValue>,
    ) -> Option<Record> {
        self.where_eq(table, column, value).into_iter().next()
    }
}

#[async_trait]
impl DuplicationStore for MemoryStore {
    async fn begin(&self, _config: &TransactionConfig) -> DuplicateResult<Box<dyn StoreTransaction>> {
        let state = self.state.read();
        Ok(Box::new(MemoryTransaction {
            store: self.state.clone(),
            working: state.tables.clone(),
            base_version: state.version,
        }))
    }
}

/// Working copy of a [`MemoryStore`]
pub struct MemoryTransaction {
    store: Arc<RwLock<MemoryState>>,
    working: Tables,
    base_version: u64,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn fetch_related(
        &mut self,
        relation: &RelationshipMetadata,
        parent_key: &DatabaseValue,
    ) -> DuplicateResult<Vec<RelatedRecord>> {
        Ok(self.working.fetch_related(relation, parent_key))
    }

    async fn fetch(
        &mut self,
        table: &str,
        primary_key: &str,
        key: &DatabaseValue,
    ) -> DuplicateResult<Option<Record>> {
        Ok(self.working.where_eq(table, primary_key, key).into_iter().next())
    }

    async fn insert(&mut self, record: Record, primary_key: Option<&str>) -> DuplicateResult<Record> {
        self.working.insert(record, primary_key)
    }

    async fn attach(
        &mut self,
        pivot: &PivotConfig,
        local: &DatabaseValue,
        related: &DatabaseValue,
        attributes: HashMap<String, DatabaseValue>,
    ) -> DuplicateResult<()> {
        let row = Record::with_attributes(pivot.table.clone(), attributes)
            .with(pivot.local_key.clone(), local.clone())
            .with(pivot.foreign_key.clone(), related.clone());
        self.working.insert(row, pivot.primary_key.as_deref())?;
        Ok(())
    }

    async fn exists(
        &mut self,
        table: &str,
        column: &str,
        value: &str,
        scope: &ExistsScope,
    ) -> DuplicateResult<bool> {
        Ok(self.working.exists(table, column, value, scope))
    }

    async fn commit(self: Box<Self>) -> DuplicateResult<()> {
        let MemoryTransaction {
            store,
            working,
            base_version,
        } = *self;

        let mut state = store.write();
        if state.version != base_version {
            return Err(DuplicateError::transaction(
                "could not serialize access due to concurrent update",
            ));
        }
        state.tables = working;
        state.version += 1;
        debug!("Memory transaction committed at version {}", state.version);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DuplicateResult<()> {
        debug!("Memory transaction rolled back");
        Ok(())
    }
}
