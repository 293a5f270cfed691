use std::sync::Arc;

use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use prosync_remote::{RemoteClient, Subscription};
use prosync_types::Query;
use prosync_types::models::desk::{
    NewTicket, NewTicketComment, Ticket, TicketComment, TicketDraft, TicketStatus,
};

use crate::ServiceError;
use crate::rows::{self, current_user, required};

pub struct ServiceDeskService<R> {
    remote: Arc<R>,
}

impl<R> Clone for ServiceDeskService<R> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
        }
    }
}

impl<R: RemoteClient> ServiceDeskService<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self { remote }
    }

    /// Tickets, newest number first, optionally with one status.
    pub async fn list_tickets(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>, ServiceError> {
        let mut query = Query::table("tickets");
        if let Some(status) = status {
            query = query.eq("status", status.as_str());
        }
        rows::fetch_all(&*self.remote, query.order_by("number", false))
            .await
            .inspect_err(|e| error!("Failed to list tickets: {}", e))
    }

    pub async fn get_ticket(&self, id: Uuid) -> Result<Ticket, ServiceError> {
        rows::fetch_one(&*self.remote, id)
            .await
            .inspect_err(|e| error!("Failed to load ticket {}: {}", id, e))
    }

    /// Open a ticket for the current user, numbered one past the highest
    /// existing ticket. Two concurrent creates can pick the same number.
    pub async fn create_ticket(&self, draft: TicketDraft) -> Result<Ticket, ServiceError> {
        let requester_id = current_user(&*self.remote)?;
        let subject = required("Subject", &draft.subject)?;

        let result: Result<Ticket, ServiceError> = async {
            let last: Option<Ticket> =
                rows::fetch_first(&*self.remote, Query::table("tickets").order_by("number", false)).await?;
            let payload = NewTicket {
                number: last.map_or(0, |t| t.number) + 1,
                subject,
                description: draft.description.trim().to_string(),
                status: TicketStatus::Open,
                priority: draft.priority,
                requester_id,
                assignee_id: None,
                category: draft.category.trim().to_string(),
            };
            rows::insert(&*self.remote, &payload).await
        }
        .await;

        let ticket = result.inspect_err(|e| error!("Failed to create ticket: {}", e))?;
        info!("Opened ticket {}", ticket.reference());
        Ok(ticket)
    }

    pub async fn update_status(&self, id: Uuid, status: TicketStatus) -> Result<Ticket, ServiceError> {
        let ticket: Ticket = rows::update(&*self.remote, id, json!({ "status": status }))
            .await
            .inspect_err(|e| error!("Failed to update status of ticket {}: {}", id, e))?;
        info!("Ticket {} is now {}", ticket.reference(), status.as_str());
        Ok(ticket)
    }

    /// Assign a ticket, or unassign it with `None`.
    pub async fn assign(&self, id: Uuid, assignee_id: Option<Uuid>) -> Result<Ticket, ServiceError> {
        rows::update(&*self.remote, id, json!({ "assignee_id": assignee_id }))
            .await
            .inspect_err(|e| error!("Failed to assign ticket {}: {}", id, e))
    }

    pub async fn add_comment(&self, ticket_id: Uuid, body: &str, internal: bool) -> Result<TicketComment, ServiceError> {
        let author_id = current_user(&*self.remote)?;
        let payload = NewTicketComment {
            ticket_id,
            author_id,
            body: required("Comment", body)?,
            internal,
        };
        rows::insert(&*self.remote, &payload)
            .await
            .inspect_err(|e| error!("Failed to comment on ticket {}: {}", ticket_id, e))
    }

    /// Comments of a ticket, oldest first.
    pub async fn list_comments(&self, ticket_id: Uuid) -> Result<Vec<TicketComment>, ServiceError> {
        let query = Query::table("ticket_comments")
            .eq("ticket_id", ticket_id.to_string())
            .order_by("created_at", true);
        rows::fetch_all(&*self.remote, query)
            .await
            .inspect_err(|e| error!("Failed to load comments of ticket {}: {}", ticket_id, e))
    }

    pub async fn subscribe_tickets(&self) -> Result<Subscription, ServiceError> {
        rows::subscribe::<Ticket, _>(&*self.remote, None)
            .await
            .inspect_err(|e| error!("Failed to subscribe to tickets: {}", e))
    }

    pub async fn subscribe_comments(&self, ticket_id: Uuid) -> Result<Subscription, ServiceError> {
        rows::subscribe::<TicketComment, _>(&*self.remote, Some(("ticket_id", ticket_id)))
            .await
            .inspect_err(|e| error!("Failed to subscribe to comments of {}: {}", ticket_id, e))
    }
}
