//! Change-data-capture event decoding
//!
//! Events arrive as JSON text in the layout written by binlog CDC tools:
//!
//! ```json
//! {"database":"gmall","table":"order_detail","type":"insert","ts":1700000000,
//!  "xid":1234,"commit":true,"data":{"id":1,"order_id":100},"old":null}
//! ```

use crate::cdcflow::cdc::types::FieldValue;
use crate::cdcflow::kafka::deserializer::SerializationError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Operation kind carried in the `type` tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationType {
    Insert,
    Update,
    Delete,
    /// Snapshot markers (`bootstrap-start`, `bootstrap-insert`, ...) and
    /// anything else the capture tool emits
    Other(String),
}

impl OperationType {
    pub fn parse(s: &str) -> Self {
        match s {
            "insert" => OperationType::Insert,
            "update" => OperationType::Update,
            "delete" => OperationType::Delete,
            other => OperationType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OperationType::Insert => "insert",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
            OperationType::Other(s) => s,
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OperationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(OperationType::parse(&raw))
    }
}

impl Serialize for OperationType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Unit of the `ts` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampUnit {
    /// Unix epoch seconds (binlog CDC default)
    #[default]
    Seconds,
    /// Unix epoch milliseconds
    Millis,
}

impl TimestampUnit {
    /// Convert a raw `ts` value into milliseconds since epoch
    pub fn to_millis(&self, ts: i64) -> i64 {
        match self {
            TimestampUnit::Seconds => ts.saturating_mul(1000),
            TimestampUnit::Millis => ts,
        }
    }
}

/// Errors raised while decoding a change event
#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("malformed change event JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("change event is missing required tag '{0}'")]
    MissingTag(&'static str),

    #[error("undecodable message payload: {0}")]
    Payload(#[from] SerializationError),
}

#[derive(Debug, Deserialize)]
struct RawChangeEvent {
    database: Option<String>,
    table: Option<String>,
    #[serde(rename = "type")]
    op: Option<OperationType>,
    #[serde(default)]
    ts: Option<i64>,
    #[serde(default)]
    xid: Option<i64>,
    #[serde(default)]
    commit: Option<bool>,
    #[serde(default)]
    data: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    old: Option<HashMap<String, serde_json::Value>>,
}

/// A row-level change captured from a source database table
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Source database name
    pub database: String,
    /// Source table name
    pub table: String,
    /// Operation kind
    pub op: OperationType,
    /// Column name to value, after the change
    pub data: HashMap<String, FieldValue>,
    /// Previous values of the changed columns (updates only)
    pub old: HashMap<String, FieldValue>,
    /// Raw event timestamp, unit given by configuration
    pub ts: i64,
    /// Source transaction id, when the capture tool reports one
    pub xid: Option<i64>,
    /// True on the last event of a source transaction
    pub commit: bool,
}

impl ChangeEvent {
    /// Decode a change event from its JSON text form
    ///
    /// `database`, `table` and `type` are required. A missing `ts` decodes as 0
    /// and missing `data` as an empty map, so a row with absent columns still
    /// flows through projection as NULLs.
    pub fn from_json(text: &str) -> Result<Self, EventDecodeError> {
        let raw: RawChangeEvent = serde_json::from_str(text)?;

        let database = raw.database.ok_or(EventDecodeError::MissingTag("database"))?;
        let table = raw.table.ok_or(EventDecodeError::MissingTag("table"))?;
        let op = raw.op.ok_or(EventDecodeError::MissingTag("type"))?;

        Ok(Self {
            database,
            table,
            op,
            data: convert_columns(raw.data),
            old: convert_columns(raw.old),
            ts: raw.ts.unwrap_or(0),
            xid: raw.xid,
            commit: raw.commit.unwrap_or(false),
        })
    }

    /// Value of a `data` column, NULL when absent
    pub fn data_value(&self, column: &str) -> FieldValue {
        self.data.get(column).cloned().unwrap_or(FieldValue::Null)
    }

    /// Value of an `old` column, NULL when absent
    pub fn old_value(&self, column: &str) -> FieldValue {
        self.old.get(column).cloned().unwrap_or(FieldValue::Null)
    }

    /// Event time in milliseconds since epoch
    pub fn event_time_ms(&self, unit: TimestampUnit) -> i64 {
        unit.to_millis(self.ts)
    }
}

fn convert_columns(columns: Option<HashMap<String, serde_json::Value>>) -> HashMap<String, FieldValue> {
    columns
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, FieldValue::from(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_insert() {
        let event = ChangeEvent::from_json(
            r#"{"database":"gmall","table":"order_detail","type":"insert","ts":1700000000,
                "xid":7,"commit":true,"data":{"id":1,"order_id":"100"}}"#,
        )
        .unwrap();

        assert_eq!(event.database, "gmall");
        assert_eq!(event.table, "order_detail");
        assert_eq!(event.op, OperationType::Insert);
        assert_eq!(event.data_value("id"), FieldValue::Integer(1));
        assert_eq!(event.data_value("order_id"), FieldValue::String("100".into()));
        assert!(event.data_value("sku_id").is_null());
        assert_eq!(event.xid, Some(7));
        assert!(event.commit);
        assert_eq!(event.event_time_ms(TimestampUnit::Seconds), 1_700_000_000_000);
    }

    #[test]
    fn test_decode_update_keeps_old_values() {
        let event = ChangeEvent::from_json(
            r#"{"database":"gmall","table":"order_info","type":"update","ts":1,
                "data":{"id":1,"status":"1002"},"old":{"status":"1001"}}"#,
        )
        .unwrap();
        assert_eq!(event.op, OperationType::Update);
        assert_eq!(event.old_value("status"), FieldValue::String("1001".into()));
    }

    #[test]
    fn test_bootstrap_kinds_are_preserved() {
        let event = ChangeEvent::from_json(
            r#"{"database":"gmall","table":"order_detail","type":"bootstrap-insert","ts":1,"data":{}}"#,
        )
        .unwrap();
        assert_eq!(event.op, OperationType::Other("bootstrap-insert".into()));
        assert_eq!(event.op.as_str(), "bootstrap-insert");
    }

    #[test]
    fn test_missing_tag_is_an_error() {
        let err = ChangeEvent::from_json(r#"{"database":"gmall","type":"insert"}"#).unwrap_err();
        assert!(matches!(err, EventDecodeError::MissingTag("table")));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(
            ChangeEvent::from_json("not json"),
            Err(EventDecodeError::Json(_))
        ));
    }

    #[test]
    fn test_millis_unit() {
        assert_eq!(TimestampUnit::Millis.to_millis(1500), 1500);
        assert_eq!(TimestampUnit::Seconds.to_millis(2), 2000);
    }
}
