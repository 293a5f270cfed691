use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{Record, nullable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub project: String,
    #[serde(default)]
    pub task_id: Option<Uuid>,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub description: String,
    pub started_at: DateTime<Utc>,
    /// `None` while the timer is running.
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub duration_seconds: i64,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub billable: bool,
    pub created_at: DateTime<Utc>,
}

impl Record for TimeEntry {
    const TABLE: &'static str = "time_entries";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl TimeEntry {
    pub fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Elapsed seconds, measuring running timers up to `now`.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        match self.ended_at {
            Some(_) => self.duration_seconds,
            None => (now - self.started_at).num_seconds().max(0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTimeEntry {
    pub user_id: Uuid,
    pub project: String,
    pub task_id: Option<Uuid>,
    pub description: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub billable: bool,
}
