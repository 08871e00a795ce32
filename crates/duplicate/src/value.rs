//! Column values
//!
//! [`DatabaseValue`] is the scalar stored in one column of a [`crate::Record`].

use std::fmt;

use serde_json::Value as JsonValue;

/// Value of one column, as read from or written to a store
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    DateTime(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    Json(JsonValue),
}

impl DatabaseValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Integer view of the value, used for key comparisons
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int32(i) => Some(i64::from(*i)),
            DatabaseValue::Int64(i) => Some(*i),
            DatabaseValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// String form used when a column is made unique.
    ///
    /// Every non-null value is coerced to its textual form; `Null` has none.
    pub fn to_unique_string(&self) -> Option<String> {
        match self {
            DatabaseValue::Null => None,
            DatabaseValue::String(s) => Some(s.clone()),
            DatabaseValue::Json(JsonValue::String(s)) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Loose equality: integers of different widths and a string holding the
    /// same text compare equal, as they would in a SQL `WHERE column = value`.
    pub fn matches(&self, other: &DatabaseValue) -> bool {
        if self == other {
            return true;
        }

        match (self.as_i64(), other.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => match (self.to_unique_string(), other.to_unique_string()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            DatabaseValue::Null => JsonValue::Null,
            DatabaseValue::Bool(b) => JsonValue::Bool(*b),
            DatabaseValue::Int32(i) => JsonValue::Number(serde_json::Number::from(*i)),
            DatabaseValue::Int64(i) => JsonValue::Number(serde_json::Number::from(*i)),
            DatabaseValue::Float32(f) => serde_json::Number::from_f64(f64::from(*f))
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::String(s) => JsonValue::String(s.clone()),
            DatabaseValue::Bytes(b) => JsonValue::Array(
                b.iter()
                    .map(|&x| JsonValue::Number(serde_json::Number::from(x)))
                    .collect(),
            ),
            DatabaseValue::Uuid(u) => JsonValue::String(u.to_string()),
            DatabaseValue::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            DatabaseValue::Date(d) => JsonValue::String(d.to_string()),
            DatabaseValue::Time(t) => JsonValue::String(t.to_string()),
            DatabaseValue::Json(j) => j.clone(),
        }
    }

    /// Create from JSON value
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => DatabaseValue::Null,
            JsonValue::Bool(b) => DatabaseValue::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    DatabaseValue::Int64(i)
                } else if let Some(f) = n.as_f64() {
                    DatabaseValue::Float64(f)
                } else {
                    DatabaseValue::Json(JsonValue::Number(n))
                }
            }
            JsonValue::String(s) => DatabaseValue::String(s),
            other => DatabaseValue::Json(other),
        }
    }
}

impl fmt::Display for DatabaseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseValue::Null => write!(f, "NULL"),
            DatabaseValue::Bool(b) => write!(f, "{}", b),
            DatabaseValue::Int32(i) => write!(f, "{}", i),
            DatabaseValue::Int64(i) => write!(f, "{}", i),
            DatabaseValue::Float32(v) => write!(f, "{}", v),
            DatabaseValue::Float64(v) => write!(f, "{}", v),
            DatabaseValue::String(s) => write!(f, "{}", s),
            DatabaseValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            DatabaseValue::Uuid(u) => write!(f, "{}", u),
            DatabaseValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            DatabaseValue::Date(d) => write!(f, "{}", d),
            DatabaseValue::Time(t) => write!(f, "{}", t),
            DatabaseValue::Json(j) => write!(f, "{}", j),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<uuid::Uuid> for DatabaseValue {
    fn from(value: uuid::Uuid) -> Self {
        DatabaseValue::Uuid(value)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DatabaseValue {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(DatabaseValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unique_string_coercion() {
        assert_eq!(
            DatabaseValue::from("Post test title").to_unique_string(),
            Some("Post test title".to_string())
        );
        assert_eq!(DatabaseValue::Int64(100).to_unique_string(), Some("100".to_string()));
        assert_eq!(DatabaseValue::Bool(true).to_unique_string(), Some("true".to_string()));
        assert_eq!(DatabaseValue::Null.to_unique_string(), None);
    }

    #[test]
    fn test_loose_matching() {
        assert!(DatabaseValue::Int32(7).matches(&DatabaseValue::Int64(7)));
        assert!(DatabaseValue::String("7".to_string()).matches(&DatabaseValue::Int64(7)));
        assert!(DatabaseValue::from("a").matches(&DatabaseValue::from("a")));
        assert!(!DatabaseValue::from("a").matches(&DatabaseValue::from("b")));
        assert!(!DatabaseValue::Null.matches(&DatabaseValue::from("NULL")));
    }

    #[test]
    fn test_json_bridge() {
        assert_eq!(DatabaseValue::from_json(json!(5)), DatabaseValue::Int64(5));
        assert_eq!(DatabaseValue::from_json(json!(1.5)), DatabaseValue::Float64(1.5));
        assert_eq!(DatabaseValue::from_json(json!(null)), DatabaseValue::Null);
        assert_eq!(
            DatabaseValue::from_json(json!({"role": "editor"})),
            DatabaseValue::Json(json!({"role": "editor"}))
        );
        assert_eq!(DatabaseValue::from("x").to_json(), json!("x"));
    }

    #[test]
    fn test_option_conversion() {
        let none: Option<i64> = None;
        assert!(DatabaseValue::from(none).is_null());
        assert_eq!(DatabaseValue::from(Some(3_i64)), DatabaseValue::Int64(3));
    }
}
