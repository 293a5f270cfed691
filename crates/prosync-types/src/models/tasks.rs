use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{Record, nullable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub description: String,
    /// Prefix of task keys on this board, e.g. `WEB` for `WEB-12`.
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub key_prefix: String,
    pub created_at: DateTime<Utc>,
}

impl Record for Board {
    const TABLE: &'static str = "boards";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Board {
    /// Key prefix to use for new tasks. Falls back to the initials of the
    /// board name when the column is empty.
    pub fn effective_prefix(&self) -> String {
        if !self.key_prefix.trim().is_empty() {
            return self.key_prefix.trim().to_uppercase();
        }
        let initials: String = self
            .name
            .split_whitespace()
            .filter_map(|w| w.chars().find(|c| c.is_alphanumeric()))
            .take(4)
            .collect::<String>()
            .to_uppercase();
        if initials.is_empty() {
            "TASK".to_string()
        } else {
            initials
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewBoard {
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub key_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub board_id: Uuid,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub number: i64,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub key: String,
    pub title: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub priority: Priority,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub position: f64,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub labels: Vec<String>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Task {
    const TABLE: &'static str = "tasks";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Fields a caller supplies when creating a task. Number and key are
/// assigned by the task service.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTask {
    pub board_id: Uuid,
    pub number: i64,
    pub key: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub position: f64,
    pub labels: Vec<String>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// `Some(None)` clears the assignee.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.assignee_id.is_none()
            && self.due_date.is_none()
            && self.position.is_none()
            && self.labels.is_none()
    }
}
