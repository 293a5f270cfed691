use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{Record, nullable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChannel {
    pub id: Uuid,
    pub name: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub is_private: bool,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Record for ChatChannel {
    const TABLE: &'static str = "chat_channels";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewChannel {
    pub name: String,
    pub description: String,
    pub is_private: bool,
    pub created_by: Uuid,
}

/// Emoji -> ids of the users who reacted with it.
pub type ReactionMap = BTreeMap<String, Vec<Uuid>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub author_id: Uuid,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub body: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub reactions: ReactionMap,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub pinned: bool,
    /// Thread root this message replies to.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub edited: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for ChatMessage {
    const TABLE: &'static str = "chat_messages";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl ChatMessage {
    /// Reaction map with `user_id`'s `emoji` toggled. Empty emoji entries
    /// are dropped so the map never carries zero-count reactions.
    pub fn toggled_reactions(&self, emoji: &str, user_id: Uuid) -> ReactionMap {
        let mut reactions = self.reactions.clone();
        let users = reactions.entry(emoji.to_string()).or_default();
        if let Some(pos) = users.iter().position(|u| *u == user_id) {
            users.remove(pos);
        } else {
            users.push(user_id);
        }
        reactions.retain(|_, users| !users.is_empty());
        reactions
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub channel_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub parent_id: Option<Uuid>,
    pub reactions: ReactionMap,
    pub pinned: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_reactions() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut msg = ChatMessage {
            id: Uuid::new_v4(),
            channel_id: Uuid::new_v4(),
            author_id: alice,
            body: "standup in 5".into(),
            reactions: ReactionMap::new(),
            pinned: false,
            parent_id: None,
            edited: false,
            created_at: Utc::now(),
            updated_at: None,
        };

        msg.reactions = msg.toggled_reactions("👍", alice);
        msg.reactions = msg.toggled_reactions("👍", bob);
        assert_eq!(msg.reactions["👍"], vec![alice, bob]);

        msg.reactions = msg.toggled_reactions("👍", alice);
        assert_eq!(msg.reactions["👍"], vec![bob]);

        msg.reactions = msg.toggled_reactions("👍", bob);
        assert!(msg.reactions.is_empty());
    }
}
