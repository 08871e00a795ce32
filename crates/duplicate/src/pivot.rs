//! Pivot attribute extraction for many-to-many relations

use std::collections::HashMap;

use crate::record::Record;
use crate::relationships::PivotConfig;
use crate::value::DatabaseValue;

/// Extra columns stored on an association row.
///
/// Everything except the pivot's own primary key, its two foreign keys and its
/// timestamp columns is carried over to the new association.
pub fn extract_pivot_attributes(
    pivot_row: &Record,
    pivot: &PivotConfig,
) -> HashMap<String, DatabaseValue> {
    let reserved = pivot.reserved_columns();

    pivot_row
        .attributes()
        .iter()
        .filter(|(column, _)| !reserved.contains(&column.as_str()))
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect()
}
