use uuid::Uuid;

use prosync_remote::RemoteClient;
use prosync_services::TaskService;
use prosync_sync::{DeletePolicy, Notifier, SyncView};
use prosync_types::models::tasks::{Task, TaskDraft, TaskStatus};

use crate::sources::BoardTasks;

/// A board's live task list.
pub struct TaskBoard<R: RemoteClient> {
    tasks: TaskService<R>,
    board_id: Uuid,
    view: SyncView<BoardTasks<R>>,
}

impl<R: RemoteClient> TaskBoard<R> {
    pub fn open(tasks: TaskService<R>, board_id: Uuid, notifier: Notifier) -> Self {
        let source = BoardTasks {
            tasks: tasks.clone(),
            board_id,
        };
        Self {
            view: SyncView::open(source, DeletePolicy::Remove, notifier),
            tasks,
            board_id,
        }
    }

    pub fn board_id(&self) -> Uuid {
        self.board_id
    }

    pub fn view(&self) -> &SyncView<BoardTasks<R>> {
        &self.view
    }

    /// Tasks in list order: the loaded order, then arrivals.
    pub fn tasks(&self) -> Vec<Task> {
        self.view.items()
    }

    /// One kanban column, by position.
    pub fn column(&self, status: TaskStatus) -> Vec<Task> {
        let mut column: Vec<Task> = self
            .view
            .items()
            .into_iter()
            .filter(|t| t.status == status)
            .collect();
        column.sort_by(|a, b| a.position.total_cmp(&b.position));
        column
    }

    pub async fn create_task(&self, draft: TaskDraft) -> Option<Task> {
        match self.tasks.create_task(self.board_id, draft).await {
            Ok(task) => {
                self.view.merge(task.clone());
                Some(task)
            }
            Err(e) => {
                self.view
                    .notifier()
                    .error(format!("Could not create task: {}", e.user_message()));
                None
            }
        }
    }

    /// Drop a card into a column at a position.
    pub async fn move_task(&self, id: Uuid, status: TaskStatus, position: f64) -> Option<Task> {
        match self.tasks.move_task(id, status, position).await {
            Ok(task) => {
                self.view.merge(task.clone());
                Some(task)
            }
            Err(e) => {
                self.view
                    .notifier()
                    .error(format!("Could not move task: {}", e.user_message()));
                None
            }
        }
    }
}
