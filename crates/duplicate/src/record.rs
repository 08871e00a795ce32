//! Records - a single row of a model's table, as a column map

use std::collections::HashMap;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{DuplicateError, DuplicateResult};
use crate::value::DatabaseValue;

/// A single row: the table it lives in and its column values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    table: String,
    attributes: HashMap<String, DatabaseValue>,
}

impl Record {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attributes(
        table: impl Into<String>,
        attributes: HashMap<String, DatabaseValue>,
    ) -> Self {
        Self {
            table: table.into(),
            attributes,
        }
    }

    /// Builder-style setter
    pub fn with(mut self, column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.set(column, value);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn attributes(&self) -> &HashMap<String, DatabaseValue> {
        &self.attributes
    }

    pub fn into_attributes(self) -> HashMap<String, DatabaseValue> {
        self.attributes
    }

    pub fn get(&self, column: &str) -> Option<&DatabaseValue> {
        self.attributes.get(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<DatabaseValue>) {
        self.attributes.insert(column.into(), value.into());
    }

    pub fn remove(&mut self, column: &str) -> Option<DatabaseValue> {
        self.attributes.remove(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.attributes.contains_key(column)
    }

    /// Value of the given primary key column, if set and non-null
    pub fn primary_key(&self, column: &str) -> Option<&DatabaseValue> {
        self.attributes.get(column).filter(|value| !value.is_null())
    }

    /// Copy of this record without the given columns
    pub fn replicate<'a, I>(&self, except: I) -> Record
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut copy = self.clone();
        for column in except {
            copy.attributes.remove(column);
        }
        copy
    }

    /// Build a record from a JSON object
    pub fn from_json_object(table: impl Into<String>, json: JsonValue) -> DuplicateResult<Self> {
        match json {
            JsonValue::Object(map) => Ok(Self {
                table: table.into(),
                attributes: map
                    .into_iter()
                    .map(|(column, value)| (column, DatabaseValue::from_json(value)))
                    .collect(),
            }),
            other => Err(DuplicateError::Serialization(format!(
                "Expected a JSON object for a record, got {}",
                other
            ))),
        }
    }

    pub fn to_json_object(&self) -> JsonValue {
        JsonValue::Object(
            self.attributes
                .iter()
                .map(|(column, value)| (column.clone(), value.to_json()))
                .collect(),
        )
    }

    /// Serialize a typed model into a record
    pub fn from_model<T: Serialize>(table: impl Into<String>, model: &T) -> DuplicateResult<Self> {
        Self::from_json_object(table, serde_json::to_value(model)?)
    }

    /// Deserialize this record into a typed model
    pub fn into_model<T: DeserializeOwned>(&self) -> DuplicateResult<T> {
        Ok(serde_json::from_value(self.to_json_object())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Tag {
        id: Option<i64>,
        name: String,
    }

    #[test]
    fn test_replicate_skips_columns() {
        let record = Record::new("posts")
            .with("id", 1_i64)
            .with("title", "Hello")
            .with("views", 100_i64);

        let copy = record.replicate(["id", "views"]);

        assert_eq!(copy.table(), "posts");
        assert!(!copy.contains("id"));
        assert!(!copy.contains("views"));
        assert_eq!(copy.get("title"), Some(&DatabaseValue::from("Hello")));
        // original untouched
        assert!(record.contains("id"));
    }

    #[test]
    fn test_primary_key_ignores_null() {
        let record = Record::new("posts").with("id", DatabaseValue::Null);
        assert!(record.primary_key("id").is_none());

        let record = Record::new("posts").with("id", 4_i64);
        assert_eq!(record.primary_key("id"), Some(&DatabaseValue::Int64(4)));
    }

    #[test]
    fn test_typed_model_round_trip() {
        let tag = Tag {
            id: Some(2),
            name: "rust".to_string(),
        };

        let record = Record::from_model("tags", &tag).unwrap();
        assert_eq!(record.get("name"), Some(&DatabaseValue::from("rust")));

        let back: Tag = record.into_model().unwrap();
        assert_eq!(back, tag);
    }

    #[test]
    fn test_non_object_json_is_rejected() {
        let result = Record::from_json_object("tags", json!([1, 2]));
        assert!(matches!(result, Err(DuplicateError::Serialization(_))));
    }
}
