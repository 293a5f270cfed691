//! Phoenix channel frames spoken by the hosted realtime service.
//!
//! Every frame is a JSON object `{topic, event, payload, ref}`. A client
//! joins one topic per subscription with a `postgres_changes` config and
//! receives `postgres_changes` frames carrying the changed row.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::events::{ChangeEvent, ChannelSpec};

pub const PHX_JOIN: &str = "phx_join";
pub const PHX_LEAVE: &str = "phx_leave";
pub const PHX_REPLY: &str = "phx_reply";
pub const PHX_ERROR: &str = "phx_error";
pub const PHX_CLOSE: &str = "phx_close";
pub const HEARTBEAT: &str = "heartbeat";
pub const POSTGRES_CHANGES: &str = "postgres_changes";
pub const PHOENIX_TOPIC: &str = "phoenix";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl PhoenixMessage {
    /// Join frame for one subscription.
    pub fn join(topic: &str, spec: &ChannelSpec, access_token: Option<&str>, reference: String) -> Self {
        let mut change = json!({
            "event": "*",
            "schema": "public",
            "table": spec.table,
        });
        if let Some(filter) = &spec.filter {
            change["filter"] = Value::String(filter.to_realtime());
        }

        let mut payload = json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [change],
            }
        });
        if let Some(token) = access_token {
            payload["access_token"] = Value::String(token.to_string());
        }

        Self {
            topic: topic.to_string(),
            event: PHX_JOIN.to_string(),
            payload,
            reference: Some(reference),
        }
    }

    pub fn leave(topic: &str, reference: String) -> Self {
        Self {
            topic: topic.to_string(),
            event: PHX_LEAVE.to_string(),
            payload: json!({}),
            reference: Some(reference),
        }
    }

    pub fn heartbeat(reference: String) -> Self {
        Self {
            topic: PHOENIX_TOPIC.to_string(),
            event: HEARTBEAT.to_string(),
            payload: json!({}),
            reference: Some(reference),
        }
    }

    /// Reply status of a `phx_reply` frame (`"ok"` or `"error"`).
    pub fn reply_status(&self) -> Option<&str> {
        if self.event != PHX_REPLY {
            return None;
        }
        self.payload.get("status").and_then(|s| s.as_str())
    }

    /// Extract the row change from a `postgres_changes` frame.
    pub fn change_event(&self) -> Option<ChangeEvent> {
        if self.event != POSTGRES_CHANGES {
            return None;
        }
        let data = self.payload.get("data")?;
        serde_json::from_value(data.clone()).ok()
    }
}

/// Topic name for a subscription. The sequence number keeps two
/// subscriptions with the same spec on distinct topics.
pub fn topic_for(spec: &ChannelSpec, seq: u64) -> String {
    format!("realtime:{}:{}", spec.label(), seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeKind;

    #[test]
    fn join_frame_carries_filter_and_token() {
        let spec = ChannelSpec::scoped("chat_messages", "channel_id", "c1");
        let topic = topic_for(&spec, 7);
        let frame = PhoenixMessage::join(&topic, &spec, Some("jwt"), "3".into());

        let text = serde_json::to_value(&frame).unwrap();
        assert_eq!(text["topic"], "realtime:chat_messages:channel_id=eq.c1:7");
        assert_eq!(text["event"], "phx_join");
        assert_eq!(text["ref"], "3");
        assert_eq!(text["payload"]["access_token"], "jwt");
        let change = &text["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["table"], "chat_messages");
        assert_eq!(change["filter"], "channel_id=eq.c1");
    }

    #[test]
    fn postgres_changes_frame_decodes() {
        let raw = r#"{
            "topic": "realtime:tickets:*:1",
            "event": "postgres_changes",
            "payload": {
                "ids": [12],
                "data": {
                    "schema": "public",
                    "table": "tickets",
                    "type": "INSERT",
                    "commit_timestamp": "2026-05-01T08:30:00Z",
                    "record": {"id": "t1", "subject": "Printer jammed"},
                    "old_record": null,
                    "columns": []
                }
            },
            "ref": null
        }"#;

        let frame: PhoenixMessage = serde_json::from_str(raw).unwrap();
        let event = frame.change_event().unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.table, "tickets");
        assert_eq!(event.record_id(), Some("t1"));
    }

    #[test]
    fn reply_status() {
        let frame = PhoenixMessage {
            topic: "realtime:x".into(),
            event: PHX_REPLY.into(),
            payload: json!({"status": "error", "response": {"reason": "denied"}}),
            reference: Some("1".into()),
        };
        assert_eq!(frame.reply_status(), Some("error"));
        assert!(frame.change_event().is_none());
    }
}
