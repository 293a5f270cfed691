use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info};
use uuid::Uuid;

use prosync_remote::{RemoteClient, Subscription};
use prosync_types::Query;
use prosync_types::models::chat::{ChatChannel, ChatMessage, NewChannel, NewMessage, ReactionMap};

use crate::ServiceError;
use crate::rows::{self, current_user, required};

pub struct ChatService<R> {
    remote: Arc<R>,
}

impl<R> Clone for ChatService<R> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
        }
    }
}

impl<R: RemoteClient> ChatService<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self { remote }
    }

    pub async fn list_channels(&self) -> Result<Vec<ChatChannel>, ServiceError> {
        rows::fetch_all(&*self.remote, Query::table("chat_channels").order_by("name", true))
            .await
            .inspect_err(|e| error!("Failed to list channels: {}", e))
    }

    pub async fn create_channel(&self, name: &str, description: &str, is_private: bool) -> Result<ChatChannel, ServiceError> {
        let created_by = current_user(&*self.remote)?;
        let payload = NewChannel {
            name: required("Channel name", name)?,
            description: description.trim().to_string(),
            is_private,
            created_by,
        };

        let channel: ChatChannel = rows::insert(&*self.remote, &payload)
            .await
            .inspect_err(|e| error!("Failed to create channel: {}", e))?;
        info!("Created channel #{}", channel.name);
        Ok(channel)
    }

    /// Top-level messages of a channel, oldest first. Thread replies are
    /// loaded separately with [`ChatService::get_thread`].
    pub async fn get_messages(&self, channel_id: Uuid) -> Result<Vec<ChatMessage>, ServiceError> {
        let query = Query::table("chat_messages")
            .eq("channel_id", channel_id.to_string())
            .is_null("parent_id")
            .order_by("created_at", true);
        rows::fetch_all(&*self.remote, query)
            .await
            .inspect_err(|e| error!("Failed to load messages of channel {}: {}", channel_id, e))
    }

    pub async fn get_thread(&self, parent_id: Uuid) -> Result<Vec<ChatMessage>, ServiceError> {
        let query = Query::table("chat_messages")
            .eq("parent_id", parent_id.to_string())
            .order_by("created_at", true);
        rows::fetch_all(&*self.remote, query)
            .await
            .inspect_err(|e| error!("Failed to load thread {}: {}", parent_id, e))
    }

    /// Post a message as the current user. Bodies that are empty after
    /// trimming are rejected without a backend call.
    pub async fn send_message(
        &self,
        channel_id: Uuid,
        body: &str,
        parent_id: Option<Uuid>,
    ) -> Result<ChatMessage, ServiceError> {
        let body = required("Message", body)?;
        let author_id = current_user(&*self.remote)?;
        let payload = NewMessage {
            channel_id,
            author_id,
            body,
            parent_id,
            reactions: ReactionMap::new(),
            pinned: false,
        };

        let message: ChatMessage = rows::insert(&*self.remote, &payload)
            .await
            .inspect_err(|e| error!("Failed to send message to {}: {}", channel_id, e))?;
        debug!("Sent message {} to {}", message.id, channel_id);
        Ok(message)
    }

    pub async fn edit_message(&self, id: Uuid, body: &str) -> Result<ChatMessage, ServiceError> {
        let body = required("Message", body)?;
        rows::update(&*self.remote, id, json!({ "body": body, "edited": true }))
            .await
            .inspect_err(|e| error!("Failed to edit message {}: {}", id, e))
    }

    pub async fn delete_message(&self, id: Uuid) -> Result<(), ServiceError> {
        rows::delete::<ChatMessage, _>(&*self.remote, id)
            .await
            .inspect_err(|e| error!("Failed to delete message {}: {}", id, e))
    }

    /// Add or remove the current user's `emoji` reaction. Read-modify-write
    /// of the whole reaction map; concurrent toggles by different users
    /// can overwrite each other.
    pub async fn toggle_reaction(&self, id: Uuid, emoji: &str) -> Result<ChatMessage, ServiceError> {
        let emoji = required("Reaction", emoji)?;
        let user_id = current_user(&*self.remote)?;

        let result: Result<ChatMessage, ServiceError> = async {
            let message: ChatMessage = rows::fetch_one(&*self.remote, id).await?;
            let reactions = message.toggled_reactions(&emoji, user_id);
            rows::update(&*self.remote, id, json!({ "reactions": reactions })).await
        }
        .await;
        result.inspect_err(|e| error!("Failed to toggle reaction on {}: {}", id, e))
    }

    pub async fn set_pinned(&self, id: Uuid, pinned: bool) -> Result<ChatMessage, ServiceError> {
        rows::update(&*self.remote, id, json!({ "pinned": pinned }))
            .await
            .inspect_err(|e| error!("Failed to pin message {}: {}", id, e))
    }

    pub async fn list_pinned(&self, channel_id: Uuid) -> Result<Vec<ChatMessage>, ServiceError> {
        let query = Query::table("chat_messages")
            .eq("channel_id", channel_id.to_string())
            .eq("pinned", true)
            .order_by("created_at", true);
        rows::fetch_all(&*self.remote, query)
            .await
            .inspect_err(|e| error!("Failed to load pinned messages of {}: {}", channel_id, e))
    }

    pub async fn subscribe_messages(&self, channel_id: Uuid) -> Result<Subscription, ServiceError> {
        rows::subscribe::<ChatMessage, _>(&*self.remote, Some(("channel_id", channel_id)))
            .await
            .inspect_err(|e| error!("Failed to subscribe to channel {}: {}", channel_id, e))
    }
}
