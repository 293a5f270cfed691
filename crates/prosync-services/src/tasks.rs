use std::sync::Arc;

use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use prosync_remote::{RemoteClient, Subscription};
use prosync_types::Query;
use prosync_types::models::tasks::{Board, NewBoard, NewTask, Task, TaskDraft, TaskPatch, TaskStatus};

use crate::ServiceError;
use crate::rows::{self, current_user, required};

/// Boards and their tasks.
pub struct TaskService<R> {
    remote: Arc<R>,
}

impl<R> Clone for TaskService<R> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
        }
    }
}

impl<R: RemoteClient> TaskService<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self { remote }
    }

    pub async fn list_boards(&self) -> Result<Vec<Board>, ServiceError> {
        rows::fetch_all(&*self.remote, Query::table("boards").order_by("created_at", true))
            .await
            .inspect_err(|e| error!("Failed to list boards: {}", e))
    }

    pub async fn get_board(&self, id: Uuid) -> Result<Board, ServiceError> {
        rows::fetch_one(&*self.remote, id)
            .await
            .inspect_err(|e| error!("Failed to load board {}: {}", id, e))
    }

    pub async fn create_board(&self, name: &str, description: &str, key_prefix: &str) -> Result<Board, ServiceError> {
        let owner_id = current_user(&*self.remote)?;
        let payload = NewBoard {
            owner_id,
            name: required("Board name", name)?,
            description: description.trim().to_string(),
            key_prefix: key_prefix.trim().to_uppercase(),
        };

        let board: Board = rows::insert(&*self.remote, &payload)
            .await
            .inspect_err(|e| error!("Failed to create board: {}", e))?;
        info!("Created board {} ({})", board.name, board.id);
        Ok(board)
    }

    /// Tasks of a board, by position then creation.
    pub async fn get_tasks(&self, board_id: Uuid) -> Result<Vec<Task>, ServiceError> {
        let query = Query::table("tasks")
            .eq("board_id", board_id.to_string())
            .order_by("position", true)
            .order_by("created_at", true);
        rows::fetch_all(&*self.remote, query)
            .await
            .inspect_err(|e| error!("Failed to load tasks of board {}: {}", board_id, e))
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Task, ServiceError> {
        rows::fetch_one(&*self.remote, id)
            .await
            .inspect_err(|e| error!("Failed to load task {}: {}", id, e))
    }

    /// Create a task keyed `{PREFIX}-{n}`, `n` one past the highest
    /// number on the board. The initial position is the task number.
    pub async fn create_task(&self, board_id: Uuid, draft: TaskDraft) -> Result<Task, ServiceError> {
        let created_by = current_user(&*self.remote)?;
        let title = required("Title", &draft.title)?;

        let result: Result<Task, ServiceError> = async {
            let board = self.get_board(board_id).await?;
            let last: Option<Task> = rows::fetch_first(
                &*self.remote,
                Query::table("tasks")
                    .eq("board_id", board_id.to_string())
                    .order_by("number", false),
            )
            .await?;
            let number = last.map_or(0, |t| t.number) + 1;

            let payload = NewTask {
                board_id,
                number,
                key: format!("{}-{}", board.effective_prefix(), number),
                title,
                description: draft.description.trim().to_string(),
                status: draft.status,
                priority: draft.priority,
                assignee_id: draft.assignee_id,
                due_date: draft.due_date,
                position: number as f64,
                labels: draft.labels,
                created_by,
            };
            rows::insert(&*self.remote, &payload).await
        }
        .await;

        let task = result.inspect_err(|e| error!("Failed to create task on board {}: {}", board_id, e))?;
        info!("Created task {}", task.key);
        Ok(task)
    }

    pub async fn update_task(&self, id: Uuid, patch: TaskPatch) -> Result<Task, ServiceError> {
        if patch.is_empty() {
            return Err(ServiceError::validation("Nothing to update"));
        }
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServiceError::validation("Title is required"));
        }

        let patch = serde_json::to_value(&patch)?;
        rows::update(&*self.remote, id, patch)
            .await
            .inspect_err(|e| error!("Failed to update task {}: {}", id, e))
    }

    /// Move a task to another column and/or position.
    pub async fn move_task(&self, id: Uuid, status: TaskStatus, position: f64) -> Result<Task, ServiceError> {
        rows::update(&*self.remote, id, json!({ "status": status, "position": position }))
            .await
            .inspect_err(|e| error!("Failed to move task {}: {}", id, e))
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<(), ServiceError> {
        rows::delete::<Task, _>(&*self.remote, id)
            .await
            .inspect_err(|e| error!("Failed to delete task {}: {}", id, e))?;
        info!("Deleted task {}", id);
        Ok(())
    }

    pub async fn subscribe_tasks(&self, board_id: Uuid) -> Result<Subscription, ServiceError> {
        rows::subscribe::<Task, _>(&*self.remote, Some(("board_id", board_id)))
            .await
            .inspect_err(|e| error!("Failed to subscribe to tasks of board {}: {}", board_id, e))
    }
}
