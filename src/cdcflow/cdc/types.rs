//! Core record types.
//!
//! This module contains the value and record types shared by every stage:
//! - [`FieldValue`] - a single column value decoded from a change event
//! - [`Row`] - a named set of values plus the event time used by the join

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A value in a record field
///
/// Change events carry JSON column values; this enum keeps the scalar kinds
/// the pipeline cares about and falls back to JSON text for nested values.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Boolean value (true/false)
    Boolean(bool),
    /// SQL NULL value
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl FieldValue {
    /// Returns true if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Canonical text form used for join keys and text projections.
    ///
    /// Returns `None` for NULL. Integers and strings with the same digits map
    /// to the same text, so `Integer(100)` joins with `String("100")`.
    pub fn to_key_string(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::String(s) => Some(s.clone()),
            FieldValue::Float(v) if v.fract() == 0.0 && v.is_finite() => {
                Some(format!("{}", *v as i64))
            }
            other => Some(other.to_string()),
        }
    }

    /// Interpret the value as an integer, parsing strings when needed
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            FieldValue::Float(v) => Some(*v as i64),
            FieldValue::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => n
                    .as_f64()
                    .map(FieldValue::Float)
                    .unwrap_or_else(|| FieldValue::String(n.to_string())),
            },
            serde_json::Value::String(s) => FieldValue::String(s),
            // Nested values keep their JSON text, like a map<string,string> column would
            nested => FieldValue::String(nested.to_string()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Integer(i) => serializer.serialize_i64(*i),
            FieldValue::Float(v) => serializer.serialize_f64(*v),
            FieldValue::String(s) => serializer.serialize_str(s),
            FieldValue::Boolean(b) => serializer.serialize_bool(*b),
            FieldValue::Null => serializer.serialize_none(),
        }
    }
}

/// A projected record flowing between the filter, join and sink stages
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Projected field data, keyed by output alias
    pub fields: HashMap<String, FieldValue>,
    /// Event time of the originating change event (milliseconds since epoch)
    pub event_time: i64,
}

impl Row {
    /// Create a new row with the given fields and event time
    pub fn new(fields: HashMap<String, FieldValue>, event_time: i64) -> Self {
        Self { fields, event_time }
    }

    /// Get a field, treating a missing field as NULL
    pub fn get(&self, name: &str) -> &FieldValue {
        self.fields.get(name).unwrap_or(&FieldValue::Null)
    }

    /// Builder-style field insertion
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

/// A sink-bound record with a fixed column order
///
/// Serializes as a JSON object whose keys follow the declared column order.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub columns: Vec<(String, FieldValue)>,
}

impl OutputRow {
    pub fn new(columns: Vec<(String, FieldValue)>) -> Self {
        Self { columns }
    }

    /// Get a column by name, NULL when absent
    pub fn get(&self, name: &str) -> &FieldValue {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
            .unwrap_or(&FieldValue::Null)
    }

    /// Column names in output order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }
}

impl Serialize for OutputRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
