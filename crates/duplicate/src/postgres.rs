//! PostgreSQL store backed by sqlx

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row, Transaction};
use tracing::debug;

use crate::error::{DuplicateError, DuplicateResult};
use crate::record::Record;
use crate::relationships::{PivotConfig, RelationshipMetadata};
use crate::store::{DuplicationStore, ExistsScope, RelatedRecord, StoreTransaction};
use crate::transaction::TransactionConfig;
use crate::value::DatabaseValue;

/// [`DuplicationStore`] over a PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DuplicationStore for PostgresStore {
    async fn begin(&self, config: &TransactionConfig) -> DuplicateResult<Box<dyn StoreTransaction>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DuplicateError::transaction(format!("Failed to begin transaction: {}", e)))?;

        if let Some(level) = config.isolation_level {
            let sql = format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql());
            sqlx::query(&sql).execute(&mut *tx).await.map_err(|e| {
                DuplicateError::transaction(format!("Failed to set isolation level: {}", e))
            })?;
            debug!("Transaction started with isolation level {}", level.as_sql());
        }

        Ok(Box::new(PostgresTransaction { tx }))
    }
}

pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn fetch_records(
        &mut self,
        table: &str,
        sql: &str,
        key: &DatabaseValue,
    ) -> DuplicateResult<Vec<Record>> {
        let rows = bind_database_value(sqlx::query(sql), key)?
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter().map(|row| row_to_record(table, row)).collect()
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn fetch_related(
        &mut self,
        relation: &RelationshipMetadata,
        parent_key: &DatabaseValue,
    ) -> DuplicateResult<Vec<RelatedRecord>> {
        match &relation.pivot_config {
            None => {
                let sql = select_by_sql(
                    &relation.related_table,
                    &relation.foreign_key.column,
                    &relation.related_primary_key,
                );
                let records = self
                    .fetch_records(&relation.related_table, &sql, parent_key)
                    .await?;
                Ok(records.into_iter().map(RelatedRecord::child).collect())
            }
            Some(pivot) => {
                let pivot_sql = select_by_sql(&pivot.table, &pivot.local_key, &pivot.foreign_key);
                let pivot_rows = self.fetch_records(&pivot.table, &pivot_sql, parent_key).await?;

                let related_sql = select_by_sql(
                    &relation.related_table,
                    &relation.related_primary_key,
                    &relation.related_primary_key,
                );

                let mut related = Vec::with_capacity(pivot_rows.len());
                for pivot_row in pivot_rows {
                    let Some(related_key) = pivot_row.primary_key(&pivot.foreign_key).cloned() else {
                        continue;
                    };
                    let record = self
                        .fetch_records(&relation.related_table, &related_sql, &related_key)
                        .await?
                        .into_iter()
                        .next();
                    if let Some(record) = record {
                        related.push(RelatedRecord::pivoted(record, pivot_row));
                    }
                }
                Ok(related)
            }
        }
    }

    async fn fetch(
        &mut self,
        table: &str,
        primary_key: &str,
        key: &DatabaseValue,
    ) -> DuplicateResult<Option<Record>> {
        let sql = select_by_sql(table, primary_key, primary_key);
        Ok(self.fetch_records(table, &sql, key).await?.into_iter().next())
    }

    async fn insert(&mut self, record: Record, primary_key: Option<&str>) -> DuplicateResult<Record> {
        let table = record.table().to_string();

        // A null primary key is left to the sequence.
        let mut columns: Vec<(String, DatabaseValue)> = record
            .into_attributes()
            .into_iter()
            .filter(|(column, value)| !(value.is_null() && Some(column.as_str()) == primary_key))
            .collect();
        columns.sort_by(|a, b| a.0.cmp(&b.0));

        let shape: Vec<(&str, bool)> = columns
            .iter()
            .map(|(column, value)| (column.as_str(), value.is_null()))
            .collect();
        let sql = insert_sql(&table, &shape);

        // NULL is written as a literal, so only non-null values are bound.
        let mut query = sqlx::query(&sql);
        for (_, value) in columns.iter().filter(|(_, value)| !value.is_null()) {
            query = bind_database_value(query, value)?;
        }

        let row = query.fetch_one(&mut *self.tx).await?;
        row_to_record(&table, &row)
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
        StoreTransaction::insert(self, row, pivot.primary_key.as_deref()).await?;
        Ok(())
    }

    async fn exists(
        &mut self,
        table: &str,
        column: &str,
        value: &str,
        scope: &ExistsScope,
    ) -> DuplicateResult<bool> {
        let parent_column = match scope {
            ExistsScope::Table => None,
            ExistsScope::Parent { foreign_key, .. } => Some(foreign_key.as_str()),
        };
        let sql = exists_sql(table, column, parent_column);

        let mut query = sqlx::query(&sql).bind(value.to_string());
        if let ExistsScope::Parent { parent, .. } = scope {
            query = bind_database_value(query, parent)?;
        }

        let row = query.fetch_one(&mut *self.tx).await?;
        Ok(row.try_get::<bool, _>(0)?)
    }

    async fn commit(self: Box<Self>) -> DuplicateResult<()> {
        let PostgresTransaction { tx } = *self;
        tx.commit()
            .await
            .map_err(|e| DuplicateError::transaction(format!("Failed to commit transaction: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> DuplicateResult<()> {
        let PostgresTransaction { tx } = *self;
        tx.rollback()
            .await
            .map_err(|e| DuplicateError::transaction(format!("Failed to rollback transaction: {}", e)))
    }
}

fn quote_ident(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn select_by_sql(table: &str, column: &str, order_by: &str) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = $1 ORDER BY {}",
        quote_ident(table),
        quote_ident(column),
        quote_ident(order_by)
    )
}

/// `columns` pairs each column name with whether its value is NULL.
///
/// A NULL value becomes the untyped literal `NULL`, typed by the target
/// column, instead of a parameter. Non-null values take `$1`, `$2`, ... in order.
fn insert_sql(table: &str, columns: &[(&str, bool)]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES RETURNING *", quote_ident(table));
    }

    let names: Vec<String> = columns.iter().map(|(column, _)| quote_ident(column)).collect();

    let mut parameter = 0;
    let values: Vec<String> = columns
        .iter()
        .map(|(_, is_null)| {
            if *is_null {
                "NULL".to_string()
            } else {
                parameter += 1;
                format!("${}", parameter)
            }
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        quote_ident(table),
        names.join(", "),
        values.join(", ")
    )
}

// Compared as text so that a suffixed candidate matches any column type.
// Postgres renders timestamptz as `2024-01-01 00:00:00+00`, not RFC 3339, so
// a unique timestamp column never reports a collision here.
fn exists_sql(table: &str, column: &str, parent_column: Option<&str>) -> String {
    let mut sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE CAST({} AS TEXT) = $1",
        quote_ident(table),
        quote_ident(column)
    );
    if let Some(parent_column) = parent_column {
        sql.push_str(&format!(" AND {} = $2", quote_ident(parent_column)));
    }
    sql.push(')');
    sql
}

fn bind_database_value<'a>(
    query: Query<'a, Postgres, PgArguments>,
    value: &DatabaseValue,
) -> DuplicateResult<Query<'a, Postgres, PgArguments>> {
    let query = match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int32(i) => query.bind(*i),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float32(f) => query.bind(*f),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Bytes(b) => query.bind(b.clone()),
        DatabaseValue::Uuid(u) => query.bind(*u),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
        DatabaseValue::Date(d) => query.bind(*d),
        DatabaseValue::Time(t) => query.bind(*t),
        DatabaseValue::Json(j) => query.bind(j.clone()),
    };
    Ok(query)
}

fn row_to_record(table: &str, row: &PgRow) -> DuplicateResult<Record> {
    use sqlx::Column;

    let mut record = Record::new(table);
    for (index, column) in row.columns().iter().enumerate() {
        record.set(column.name(), postgres_value_to_database_value(row, index)?);
    }
    Ok(record)
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> DuplicateResult<DatabaseValue> {
    use sqlx::{Column, TypeInfo, ValueRef};

    if row.try_get_raw(index)?.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let column = &row.columns()[index];
    let value = match column.type_info().name() {
        "BOOL" => DatabaseValue::Bool(row.try_get(index)?),
        "INT2" => DatabaseValue::Int32(i32::from(row.try_get::<i16, _>(index)?)),
        "INT4" => DatabaseValue::Int32(row.try_get(index)?),
        "INT8" => DatabaseValue::Int64(row.try_get(index)?),
        "FLOAT4" => DatabaseValue::Float32(row.try_get(index)?),
        "FLOAT8" => DatabaseValue::Float64(row.try_get(index)?),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => DatabaseValue::String(row.try_get(index)?),
        "BYTEA" => DatabaseValue::Bytes(row.try_get(index)?),
        "UUID" => DatabaseValue::Uuid(row.try_get(index)?),
        "TIMESTAMPTZ" => DatabaseValue::DateTime(row.try_get(index)?),
        "TIMESTAMP" => {
            DatabaseValue::DateTime(row.try_get::<chrono::NaiveDateTime, _>(index)?.and_utc())
        }
        "DATE" => DatabaseValue::Date(row.try_get(index)?),
        "TIME" => DatabaseValue::Time(row.try_get(index)?),
        "JSON" | "JSONB" => DatabaseValue::Json(row.try_get(index)?),
        other => {
            return Err(DuplicateError::persistence(format!(
                "Unsupported PostgreSQL type '{}' for column '{}'",
                other,
                column.name()
            )))
        }
    };
    Ok(value)
}
