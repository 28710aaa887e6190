use crate::cdcflow::cdc::{ChangeEvent, OperationType};
use std::fmt;

/// Selects change events by their `(database, table, type)` tags
#[derive(Debug, Clone, PartialEq)]
pub struct EventPredicate {
    pub database: String,
    pub table: String,
    pub op: OperationType,
}

impl EventPredicate {
    pub fn new(database: impl Into<String>, table: impl Into<String>, op: OperationType) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            op,
        }
    }

    /// Predicate for rows inserted into `database.table`
    pub fn inserts_into(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self::new(database, table, OperationType::Insert)
    }

    /// Pure function of the three tag fields
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.database == self.database && event.table == self.table && event.op == self.op
    }
}

impl fmt::Display for EventPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "database = '{}' AND table = '{}' AND type = '{}'",
            self.database, self.table, self.op
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(database: &str, table: &str, op: &str) -> ChangeEvent {
        ChangeEvent::from_json(&format!(
            r#"{{"database":"{}","table":"{}","type":"{}","ts":1,"data":{{}}}}"#,
            database, table, op
        ))
        .unwrap()
    }

    #[test]
    fn test_matches_all_three_tags() {
        let predicate = EventPredicate::inserts_into("gmall", "order_detail");

        assert!(predicate.matches(&event("gmall", "order_detail", "insert")));
        assert!(!predicate.matches(&event("gmall", "order_detail", "update")));
        assert!(!predicate.matches(&event("gmall", "order_info", "insert")));
        assert!(!predicate.matches(&event("other", "order_detail", "insert")));
        assert!(!predicate.matches(&event("gmall", "order_detail", "bootstrap-insert")));
    }

    #[test]
    fn test_display() {
        let predicate = EventPredicate::inserts_into("gmall", "order_detail");
        assert_eq!(
            predicate.to_string(),
            "database = 'gmall' AND table = 'order_detail' AND type = 'insert'"
        );
    }
}
