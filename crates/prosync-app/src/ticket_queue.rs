use uuid::Uuid;

use prosync_remote::RemoteClient;
use prosync_services::ServiceDeskService;
use prosync_sync::{DeletePolicy, Notifier, SyncView};
use prosync_types::models::desk::{Ticket, TicketDraft, TicketStatus};

use crate::sources::TicketList;

/// The live ticket queue, optionally narrowed to one status.
pub struct TicketQueue<R: RemoteClient> {
    desk: ServiceDeskService<R>,
    status: Option<TicketStatus>,
    view: SyncView<TicketList<R>>,
}

impl<R: RemoteClient> TicketQueue<R> {
    pub fn open(desk: ServiceDeskService<R>, status: Option<TicketStatus>, notifier: Notifier) -> Self {
        let source = TicketList {
            desk: desk.clone(),
            status,
        };
        Self {
            view: SyncView::open(source, DeletePolicy::Remove, notifier),
            desk,
            status,
        }
    }

    pub fn status_filter(&self) -> Option<TicketStatus> {
        self.status
    }

    pub fn view(&self) -> &SyncView<TicketList<R>> {
        &self.view
    }

    /// Tickets, newest number first.
    pub fn tickets(&self) -> Vec<Ticket> {
        let mut tickets = self.view.items();
        tickets.sort_by(|a, b| b.number.cmp(&a.number));
        tickets
    }

    pub async fn create(&self, draft: TicketDraft) -> Option<Ticket> {
        match self.desk.create_ticket(draft).await {
            Ok(ticket) => {
                self.view.merge(ticket.clone());
                Some(ticket)
            }
            Err(e) => {
                self.view
                    .notifier()
                    .error(format!("Could not create ticket: {}", e.user_message()));
                None
            }
        }
    }

    /// Change a ticket's status. A ticket that leaves the queue's status
    /// drops out of the list.
    pub async fn set_status(&self, id: Uuid, status: TicketStatus) -> Option<Ticket> {
        match self.desk.update_status(id, status).await {
            Ok(ticket) => {
                self.view.merge(ticket.clone());
                Some(ticket)
            }
            Err(e) => {
                self.view
                    .notifier()
                    .error(format!("Could not update ticket: {}", e.user_message()));
                None
            }
        }
    }

    pub async fn filter(&mut self, status: Option<TicketStatus>) {
        if status == self.status {
            return;
        }
        self.status = status;
        let source = TicketList {
            desk: self.desk.clone(),
            status,
        };
        self.view.rescope(source).await;
    }
}
