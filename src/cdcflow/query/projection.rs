use crate::cdcflow::cdc::{ChangeEvent, FieldValue};
use std::collections::HashMap;
use std::fmt;

/// Where a projected column reads its value from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// `data[name]`
    Data(String),
    /// `old[name]`
    Old(String),
    /// The raw event timestamp
    Ts,
    /// The source database tag
    Database,
    /// The source table tag
    Table,
}

impl ColumnRef {
    pub fn data(name: impl Into<String>) -> Self {
        ColumnRef::Data(name.into())
    }

    /// Read the value from an event; absent columns read as NULL
    pub fn read(&self, event: &ChangeEvent) -> FieldValue {
        match self {
            ColumnRef::Data(name) => event.data_value(name),
            ColumnRef::Old(name) => event.old_value(name),
            ColumnRef::Ts => FieldValue::Integer(event.ts),
            ColumnRef::Database => FieldValue::String(event.database.clone()),
            ColumnRef::Table => FieldValue::String(event.table.clone()),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Data(name) => write!(f, "data['{}']", name),
            ColumnRef::Old(name) => write!(f, "old['{}']", name),
            ColumnRef::Ts => write!(f, "ts"),
            ColumnRef::Database => write!(f, "database"),
            ColumnRef::Table => write!(f, "table"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedColumn {
    pub source: ColumnRef,
    pub alias: String,
}

/// Ordered list of output columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    columns: Vec<ProjectedColumn>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column under an alias
    pub fn column(mut self, source: ColumnRef, alias: impl Into<String>) -> Self {
        self.columns.push(ProjectedColumn {
            source,
            alias: alias.into(),
        });
        self
    }

    /// Add `data[name]` under its own name
    pub fn data_column(self, name: &str) -> Self {
        self.column(ColumnRef::data(name), name)
    }

    pub fn columns(&self) -> &[ProjectedColumn] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// First alias that appears more than once
    pub fn duplicate_alias(&self) -> Option<&str> {
        self.columns.iter().enumerate().find_map(|(i, column)| {
            self.columns[..i]
                .iter()
                .any(|earlier| earlier.alias == column.alias)
                .then_some(column.alias.as_str())
        })
    }

    pub fn apply(&self, event: &ChangeEvent) -> HashMap<String, FieldValue> {
        self.columns
            .iter()
            .map(|column| (column.alias.clone(), column.source.read(event)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChangeEvent {
        ChangeEvent::from_json(
            r#"{"database":"gmall","table":"order_detail","type":"update","ts":1700000000,
                "data":{"id":1,"order_id":100,"sku_num":"3"},"old":{"sku_num":"2"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_projects_declared_columns_only() {
        let projection = Projection::new()
            .data_column("id")
            .data_column("order_id")
            .column(ColumnRef::Ts, "ts");

        let fields = projection.apply(&sample());

        assert_eq!(fields.len(), 3);
        assert_eq!(fields["id"], FieldValue::Integer(1));
        assert_eq!(fields["order_id"], FieldValue::Integer(100));
        assert_eq!(fields["ts"], FieldValue::Integer(1_700_000_000));
        assert!(!fields.contains_key("sku_num"));
    }

    #[test]
    fn test_missing_column_projects_null() {
        let projection = Projection::new()
            .data_column("coupon_id")
            .column(ColumnRef::Old("order_id".into()), "old_order_id");

        let fields = projection.apply(&sample());
        assert!(fields["coupon_id"].is_null());
        assert!(fields["old_order_id"].is_null());
    }

    #[test]
    fn test_old_and_tag_columns() {
        let projection = Projection::new()
            .column(ColumnRef::Old("sku_num".into()), "prev")
            .column(ColumnRef::Table, "tbl");

        let fields = projection.apply(&sample());
        assert_eq!(fields["prev"], FieldValue::String("2".into()));
        assert_eq!(fields["tbl"], FieldValue::String("order_detail".into()));
    }

    #[test]
    fn test_duplicate_alias_detection() {
        let projection = Projection::new()
            .data_column("id")
            .column(ColumnRef::Ts, "id");
        assert_eq!(projection.duplicate_alias(), Some("id"));
        assert_eq!(Projection::new().data_column("id").duplicate_alias(), None);
    }
}
