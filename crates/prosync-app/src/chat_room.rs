use uuid::Uuid;

use prosync_remote::RemoteClient;
use prosync_services::ChatService;
use prosync_sync::{DeletePolicy, Notifier, SyncView};
use prosync_types::models::chat::ChatMessage;

use crate::sources::ChannelMessages;

/// A channel's live message list plus the composer.
pub struct ChatRoom<R: RemoteClient> {
    chat: ChatService<R>,
    channel_id: Uuid,
    view: SyncView<ChannelMessages<R>>,
    draft: String,
}

impl<R: RemoteClient> ChatRoom<R> {
    pub fn open(chat: ChatService<R>, channel_id: Uuid, notifier: Notifier) -> Self {
        let source = ChannelMessages {
            chat: chat.clone(),
            channel_id,
        };
        Self {
            view: SyncView::open(source, DeletePolicy::Remove, notifier),
            chat,
            channel_id,
            draft: String::new(),
        }
    }

    pub fn channel_id(&self) -> Uuid {
        self.channel_id
    }

    pub fn view(&self) -> &SyncView<ChannelMessages<R>> {
        &self.view
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.view.items()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Send the trimmed draft. A blank draft is dropped without calling
    /// the chat service. On success the draft is cleared and the message
    /// listed; on failure the draft is kept and an error notice is sent.
    pub async fn send(&mut self) -> Option<ChatMessage> {
        let body = self.draft.trim();
        if body.is_empty() {
            return None;
        }

        match self.chat.send_message(self.channel_id, body, None).await {
            Ok(message) => {
                self.view.merge(message.clone());
                self.draft.clear();
                Some(message)
            }
            Err(e) => {
                self.view
                    .notifier()
                    .error(format!("Could not send message: {}", e.user_message()));
                None
            }
        }
    }

    /// Follow another channel. The draft carries over.
    pub async fn switch_channel(&mut self, channel_id: Uuid) {
        if channel_id == self.channel_id {
            return;
        }
        self.channel_id = channel_id;
        let source = ChannelMessages {
            chat: self.chat.clone(),
            channel_id,
        };
        self.view.rescope(source).await;
    }
}
