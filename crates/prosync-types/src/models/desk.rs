use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tasks::Priority;
use crate::record::{Record, nullable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    Pending,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Pending => "pending",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub number: i64,
    pub subject: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub status: TicketStatus,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub priority: Priority,
    pub requester_id: Uuid,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub category: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Ticket {
    const TABLE: &'static str = "tickets";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Ticket {
    /// Display reference such as `#1042`.
    pub fn reference(&self) -> String {
        format!("#{}", self.number)
    }
}

/// Caller-supplied ticket fields; the number and requester are filled by
/// the service desk service.
#[derive(Debug, Clone, Default)]
pub struct TicketDraft {
    pub subject: String,
    pub description: String,
    pub priority: Priority,
    pub category: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTicket {
    pub number: i64,
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: Priority,
    pub requester_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketComment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub body: String,
    /// Visible to agents only.
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub internal: bool,
    pub created_at: DateTime<Utc>,
}

impl Record for TicketComment {
    const TABLE: &'static str = "ticket_comments";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTicketComment {
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub internal: bool,
}
