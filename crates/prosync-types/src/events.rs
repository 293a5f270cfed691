use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::Filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row change delivered by the realtime change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// New row image. `null` for deletes.
    #[serde(default)]
    pub record: Value,
    /// Previous row image. May only carry the primary key, depending on
    /// the backend's replica identity.
    #[serde(default)]
    pub old_record: Value,
    #[serde(default)]
    pub commit_timestamp: Option<DateTime<Utc>>,
}

impl ChangeEvent {
    pub fn insert(table: impl Into<String>, record: Value) -> Self {
        Self {
            table: table.into(),
            kind: ChangeKind::Insert,
            record,
            old_record: Value::Null,
            commit_timestamp: Some(Utc::now()),
        }
    }

    pub fn update(table: impl Into<String>, old_record: Value, record: Value) -> Self {
        Self {
            table: table.into(),
            kind: ChangeKind::Update,
            record,
            old_record,
            commit_timestamp: Some(Utc::now()),
        }
    }

    pub fn delete(table: impl Into<String>, old_record: Value) -> Self {
        Self {
            table: table.into(),
            kind: ChangeKind::Delete,
            record: Value::Null,
            old_record,
            commit_timestamp: Some(Utc::now()),
        }
    }

    /// The row image that identifies the affected record: the new row for
    /// inserts and updates, the old row for deletes.
    pub fn subject(&self) -> &Value {
        match self.kind {
            ChangeKind::Delete => &self.old_record,
            _ => &self.record,
        }
    }

    /// Raw `id` column of the affected row.
    pub fn record_id(&self) -> Option<&str> {
        self.subject().get("id").and_then(|v| v.as_str())
    }
}

/// What a realtime subscription listens to: one table, optionally narrowed
/// by a single filter on the scope column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub table: String,
    pub filter: Option<Filter>,
}

impl ChannelSpec {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
        }
    }

    pub fn scoped(table: impl Into<String>, column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            table: table.into(),
            filter: Some(Filter::eq(column, value)),
        }
    }

    /// Whether an event belongs to this subscription.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table {
            return false;
        }
        match &self.filter {
            Some(filter) => filter.matches(event.subject()),
            None => true,
        }
    }

    /// Stable human-readable label, used for channel topics and logs.
    pub fn label(&self) -> String {
        match &self.filter {
            Some(f) => format!("{}:{}", self.table, f.to_realtime()),
            None => format!("{}:*", self.table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scoped_spec_matches_on_subject() {
        let spec = ChannelSpec::scoped("chat_messages", "channel_id", "c1");

        let ins = ChangeEvent::insert("chat_messages", json!({"id": "m1", "channel_id": "c1"}));
        assert!(spec.matches(&ins));

        let other = ChangeEvent::insert("chat_messages", json!({"id": "m2", "channel_id": "c2"}));
        assert!(!spec.matches(&other));

        let del = ChangeEvent::delete("chat_messages", json!({"id": "m1", "channel_id": "c1"}));
        assert!(spec.matches(&del));
        assert_eq!(del.record_id(), Some("m1"));

        let wrong_table = ChangeEvent::insert("tickets", json!({"id": "t1", "channel_id": "c1"}));
        assert!(!spec.matches(&wrong_table));
    }

    #[test]
    fn wire_shape_uses_uppercase_type() {
        let raw = json!({
            "table": "tasks",
            "type": "UPDATE",
            "record": {"id": "t1"},
            "old_record": {"id": "t1"},
            "commit_timestamp": "2026-04-02T10:00:00Z"
        });
        let event: ChangeEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.record_id(), Some("t1"));
    }

    #[test]
    fn labels() {
        assert_eq!(ChannelSpec::table("tickets").label(), "tickets:*");
        assert_eq!(
            ChannelSpec::scoped("tasks", "board_id", "b1").label(),
            "tasks:board_id=eq.b1"
        );
    }
}
