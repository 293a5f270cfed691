//! Per-module service objects.
//!
//! Each service wraps a shared [`RemoteClient`](prosync_remote::RemoteClient)
//! and turns typed calls into table operations. Failures are logged and
//! returned as [`ServiceError`].

pub mod budget;
pub mod chat;
pub mod desk;
pub mod error;
pub mod files;
pub mod knowledge;
mod rows;
pub mod tasks;
pub mod time;

use std::sync::Arc;

use prosync_remote::RemoteClient;

pub use budget::{BudgetService, Utilization, utilization};
pub use chat::ChatService;
pub use desk::ServiceDeskService;
pub use error::ServiceError;
pub use files::FileVaultService;
pub use knowledge::KnowledgeBaseService;
pub use tasks::TaskService;
pub use time::{TimeSummary, TimeTrackingService, summarize};

/// Every service over one client.
pub struct Services<R> {
    pub tasks: TaskService<R>,
    pub chat: ChatService<R>,
    pub files: FileVaultService<R>,
    pub time: TimeTrackingService<R>,
    pub desk: ServiceDeskService<R>,
    pub knowledge: KnowledgeBaseService<R>,
    pub budget: BudgetService<R>,
}

impl<R: RemoteClient> Services<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self {
            tasks: TaskService::new(remote.clone()),
            chat: ChatService::new(remote.clone()),
            files: FileVaultService::new(remote.clone()),
            time: TimeTrackingService::new(remote.clone()),
            desk: ServiceDeskService::new(remote.clone()),
            knowledge: KnowledgeBaseService::new(remote.clone()),
            budget: BudgetService::new(remote),
        }
    }
}
