//! Scopes the views keep live.

use uuid::Uuid;

use prosync_remote::{RemoteClient, Subscription};
use prosync_services::{ChatService, ServiceDeskService, ServiceError, TaskService};
use prosync_sync::Source;
use prosync_types::models::chat::ChatMessage;
use prosync_types::models::desk::{Ticket, TicketStatus};
use prosync_types::models::tasks::Task;

/// Top-level messages of one channel. Thread replies stay out of the
/// list.
pub struct ChannelMessages<R> {
    pub chat: ChatService<R>,
    pub channel_id: Uuid,
}

impl<R: RemoteClient> Source for ChannelMessages<R> {
    type Item = ChatMessage;

    fn label(&self) -> String {
        format!("messages of channel {}", self.channel_id)
    }

    async fn fetch(&self) -> Result<Vec<ChatMessage>, ServiceError> {
        self.chat.get_messages(self.channel_id).await
    }

    async fn subscribe(&self) -> Result<Subscription, ServiceError> {
        self.chat.subscribe_messages(self.channel_id).await
    }

    fn keep(&self, message: &ChatMessage) -> bool {
        message.channel_id == self.channel_id && message.parent_id.is_none()
    }
}

pub struct BoardTasks<R> {
    pub tasks: TaskService<R>,
    pub board_id: Uuid,
}

impl<R: RemoteClient> Source for BoardTasks<R> {
    type Item = Task;

    fn label(&self) -> String {
        format!("tasks of board {}", self.board_id)
    }

    async fn fetch(&self) -> Result<Vec<Task>, ServiceError> {
        self.tasks.get_tasks(self.board_id).await
    }

    async fn subscribe(&self) -> Result<Subscription, ServiceError> {
        self.tasks.subscribe_tasks(self.board_id).await
    }
}

/// All tickets, or the tickets in one status. The ticket feed is not
/// scoped, so status filtering happens on arrival.
pub struct TicketList<R> {
    pub desk: ServiceDeskService<R>,
    pub status: Option<TicketStatus>,
}

impl<R: RemoteClient> Source for TicketList<R> {
    type Item = Ticket;

    fn label(&self) -> String {
        match self.status {
            Some(status) => format!("{} tickets", status.as_str()),
            None => "tickets".to_string(),
        }
    }

    async fn fetch(&self) -> Result<Vec<Ticket>, ServiceError> {
        self.desk.list_tickets(self.status).await
    }

    async fn subscribe(&self) -> Result<Subscription, ServiceError> {
        self.desk.subscribe_tickets().await
    }

    fn keep(&self, ticket: &Ticket) -> bool {
        self.status.is_none_or(|status| ticket.status == status)
    }
}
