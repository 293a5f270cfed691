use uuid::Uuid;

use prosync_remote::RemoteError;
use prosync_types::DecodeError;

/// Failure of a service call.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("not signed in")]
    NotSignedIn,
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Remote(RemoteError::Serialization(err))
    }
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    /// Short text suitable for a user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Remote(RemoteError::Unauthorized(_)) | ServiceError::NotSignedIn => {
                "You need to sign in again.".to_string()
            }
            ServiceError::Remote(RemoteError::Transport(_)) => {
                "Could not reach the server. Check your connection.".to_string()
            }
            ServiceError::Validation(message) => message.clone(),
            ServiceError::NotFound { entity, .. } => {
                format!("That {} no longer exists.", entity_label(entity))
            }
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

fn entity_label(table: &str) -> &str {
    match table {
        "boards" => "board",
        "tasks" => "task",
        "chat_channels" => "channel",
        "chat_messages" => "message",
        "vault_files" => "file",
        "vault_file_versions" => "file version",
        "time_entries" => "time entry",
        "tickets" => "ticket",
        "ticket_comments" => "comment",
        "kb_articles" => "article",
        "budgets" => "budget",
        "expenses" => "expense",
        other => other,
    }
}
