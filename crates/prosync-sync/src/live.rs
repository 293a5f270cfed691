use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use prosync_types::{ChangeEvent, ChangeKind, Record, decode};

/// What a delete event does to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Keep the record until the next full reload.
    #[default]
    Ignore,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
    Removed,
    /// Nothing changed: a duplicate insert, an update or delete for an
    /// unknown id, or an ignored delete.
    Unchanged,
    /// The event was not applied: another table, outside the list's
    /// filter, or a row that failed to decode.
    Skipped,
}

impl MergeOutcome {
    pub fn changed(self) -> bool {
        matches!(self, Self::Inserted | Self::Replaced | Self::Removed)
    }
}

type Keep<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Records of one view, merged by id.
#[derive(Clone)]
pub struct LiveList<T> {
    items: Vec<T>,
    policy: DeletePolicy,
    keep: Option<Keep<T>>,
}

impl<T: fmt::Debug> fmt::Debug for LiveList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveList")
            .field("items", &self.items)
            .field("policy", &self.policy)
            .field("filtered", &self.keep.is_some())
            .finish()
    }
}

impl<T: Record> Default for LiveList<T> {
    fn default() -> Self {
        Self::new(DeletePolicy::default())
    }
}

impl<T: Record> LiveList<T> {
    pub fn new(policy: DeletePolicy) -> Self {
        Self {
            items: Vec::new(),
            policy,
            keep: None,
        }
    }

    /// Only hold records for which `keep` is true. Applies to snapshots,
    /// inserts and merged records; an update that fails it removes the
    /// record.
    pub fn retaining(mut self, keep: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.keep = Some(Arc::new(keep));
        self
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    fn kept(&self, item: &T) -> bool {
        self.keep.as_ref().is_none_or(|keep| keep(item))
    }

    /// Replace the whole list with a fresh snapshot, in snapshot order.
    pub fn replace(&mut self, snapshot: Vec<T>) {
        self.items = snapshot;
        if let Some(keep) = &self.keep {
            self.items.retain(|item| keep(item));
        }
    }

    /// Merge a record returned by a write: replaced in place when its id
    /// is present, appended otherwise.
    pub fn merge_record(&mut self, record: T) -> MergeOutcome {
        if !self.kept(&record) {
            return self.evict(record.id());
        }
        match self.items.iter_mut().find(|item| item.id() == record.id()) {
            Some(existing) => {
                *existing = record;
                MergeOutcome::Replaced
            }
            None => {
                self.items.push(record);
                MergeOutcome::Inserted
            }
        }
    }

    /// Apply one change event.
    pub fn apply(&mut self, event: &ChangeEvent) -> MergeOutcome {
        if event.table != T::TABLE {
            return MergeOutcome::Skipped;
        }

        match event.kind {
            ChangeKind::Insert => {
                let Some(record) = self.decode_event(event) else {
                    return MergeOutcome::Skipped;
                };
                if !self.kept(&record) {
                    return MergeOutcome::Skipped;
                }
                if self.contains(record.id()) {
                    return MergeOutcome::Unchanged;
                }
                self.items.push(record);
                MergeOutcome::Inserted
            }
            ChangeKind::Update => {
                let Some(record) = self.decode_event(event) else {
                    return MergeOutcome::Skipped;
                };
                if !self.kept(&record) {
                    return self.evict(record.id());
                }
                match self.items.iter_mut().find(|item| item.id() == record.id()) {
                    Some(existing) => {
                        *existing = record;
                        MergeOutcome::Replaced
                    }
                    None => MergeOutcome::Unchanged,
                }
            }
            ChangeKind::Delete => {
                if self.policy == DeletePolicy::Ignore {
                    return MergeOutcome::Unchanged;
                }
                let Some(id) = event.record_id().and_then(|raw| Uuid::parse_str(raw).ok()) else {
                    debug!("Delete on {} without a usable id", T::TABLE);
                    return MergeOutcome::Skipped;
                };
                match self.evict(id) {
                    MergeOutcome::Removed => MergeOutcome::Removed,
                    _ => MergeOutcome::Unchanged,
                }
            }
        }
    }

    /// Remove a record that left the list's filter. Skipped when it was
    /// never listed.
    fn evict(&mut self, id: Uuid) -> MergeOutcome {
        let before = self.items.len();
        self.items.retain(|item| item.id() != id);
        if self.items.len() < before {
            MergeOutcome::Removed
        } else {
            MergeOutcome::Skipped
        }
    }

    fn decode_event(&self, event: &ChangeEvent) -> Option<T> {
        match decode::<T>(event.record.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping {:?} event: {}", event.kind, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prosync_types::models::chat::ChatMessage;
    use serde_json::{Value, json};

    fn row(id: u128, body: &str, parent: Option<u128>) -> Value {
        json!({
            "id": Uuid::from_u128(id),
            "channel_id": Uuid::from_u128(100),
            "author_id": Uuid::from_u128(200),
            "body": body,
            "parent_id": parent.map(Uuid::from_u128),
            "created_at": "2026-05-04T12:00:00Z",
        })
    }

    fn message(id: u128, body: &str) -> ChatMessage {
        decode(row(id, body, None)).unwrap()
    }

    fn bodies(list: &LiveList<ChatMessage>) -> Vec<&str> {
        list.items().iter().map(|m| m.body.as_str()).collect()
    }

    #[test]
    fn duplicate_insert_is_deduped() {
        let mut list = LiveList::<ChatMessage>::default();
        let event = ChangeEvent::insert("chat_messages", row(1, "hi", None));

        assert_eq!(list.apply(&event), MergeOutcome::Inserted);
        assert_eq!(list.apply(&event), MergeOutcome::Unchanged);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn update_for_unknown_id_is_a_noop() {
        let mut list = LiveList::<ChatMessage>::default();
        list.replace(vec![message(1, "a")]);

        let event = ChangeEvent::update("chat_messages", json!({}), row(2, "b", None));
        assert_eq!(list.apply(&event), MergeOutcome::Unchanged);
        assert_eq!(bodies(&list), ["a"]);

        let event = ChangeEvent::update("chat_messages", json!({}), row(1, "a2", None));
        assert_eq!(list.apply(&event), MergeOutcome::Replaced);
        assert_eq!(bodies(&list), ["a2"]);
    }

    #[test]
    fn deletes_follow_policy() {
        let delete = ChangeEvent::delete("chat_messages", json!({ "id": Uuid::from_u128(1) }));

        let mut ignoring = LiveList::<ChatMessage>::default();
        ignoring.replace(vec![message(1, "a")]);
        assert_eq!(ignoring.apply(&delete), MergeOutcome::Unchanged);
        assert_eq!(ignoring.len(), 1);

        let mut removing = LiveList::<ChatMessage>::new(DeletePolicy::Remove);
        removing.replace(vec![message(1, "a"), message(2, "b")]);
        assert_eq!(removing.apply(&delete), MergeOutcome::Removed);
        assert_eq!(bodies(&removing), ["b"]);
        assert_eq!(removing.apply(&delete), MergeOutcome::Unchanged);
    }

    #[test]
    fn malformed_and_foreign_rows_are_skipped() {
        let mut list = LiveList::<ChatMessage>::default();

        let missing_scope = ChangeEvent::insert("chat_messages", json!({ "id": Uuid::from_u128(1), "body": "x" }));
        assert_eq!(list.apply(&missing_scope), MergeOutcome::Skipped);

        let foreign = ChangeEvent::insert("tickets", row(2, "x", None));
        assert_eq!(list.apply(&foreign), MergeOutcome::Skipped);
        assert!(list.is_empty());
    }

    #[test]
    fn filter_applies_to_every_path() {
        fn top_level(m: &ChatMessage) -> bool {
            m.parent_id.is_none()
        }
        let mut list = LiveList::<ChatMessage>::default().retaining(top_level);

        let reply: ChatMessage = decode(row(2, "reply", Some(1))).unwrap();
        list.replace(vec![message(1, "root"), reply.clone()]);
        assert_eq!(bodies(&list), ["root"]);

        let event = ChangeEvent::insert("chat_messages", row(3, "reply 2", Some(1)));
        assert_eq!(list.apply(&event), MergeOutcome::Skipped);
        assert_eq!(list.merge_record(reply), MergeOutcome::Skipped);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn update_leaving_the_filter_evicts() {
        let mut list = LiveList::<ChatMessage>::default().retaining(|m: &ChatMessage| !m.pinned);
        list.replace(vec![message(1, "a"), message(2, "b")]);

        let mut pinned = row(1, "a", None);
        pinned["pinned"] = json!(true);
        let event = ChangeEvent::update("chat_messages", json!({}), pinned);
        assert_eq!(list.apply(&event), MergeOutcome::Removed);
        assert_eq!(bodies(&list), ["b"]);
        assert_eq!(list.apply(&event), MergeOutcome::Skipped);
    }

    #[test]
    fn merge_record_then_echo_keeps_one_copy() {
        let mut list = LiveList::<ChatMessage>::default();
        assert_eq!(list.merge_record(message(1, "sent")), MergeOutcome::Inserted);

        let echo = ChangeEvent::insert("chat_messages", row(1, "sent", None));
        assert_eq!(list.apply(&echo), MergeOutcome::Unchanged);
        assert_eq!(list.merge_record(message(1, "sent")), MergeOutcome::Replaced);
        assert_eq!(list.len(), 1);
    }
}
