use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use prosync_remote::Subscription;
use prosync_types::{ChangeEvent, ChannelSpec};

/// In-process change feed. Every committed write is published here and
/// fanned out to the subscriptions whose spec matches it.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
}

#[derive(Default)]
struct FeedInner {
    next_id: AtomicU64,
    /// subscription id -> (spec, sender)
    subscribers: RwLock<HashMap<u64, (ChannelSpec, mpsc::UnboundedSender<ChangeEvent>)>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription. Dropping the returned handle unregisters it.
    pub fn subscribe(&self, spec: ChannelSpec) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let label = spec.label();
        let (tx, rx) = mpsc::unbounded_channel();

        if let Ok(mut subs) = self.inner.subscribers.write() {
            subs.insert(id, (spec, tx));
        }
        debug!("Feed subscription {} opened on {}", id, label);

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(label, rx, move || {
            if let Some(inner) = inner.upgrade() {
                if let Ok(mut subs) = inner.subscribers.write() {
                    subs.remove(&id);
                }
            }
        })
    }

    /// Deliver an event to every matching subscription.
    pub fn publish(&self, event: ChangeEvent) {
        let mut closed = Vec::new();
        if let Ok(subs) = self.inner.subscribers.read() {
            for (id, (spec, tx)) in subs.iter() {
                if spec.matches(&event) && tx.send(event.clone()).is_err() {
                    closed.push(*id);
                }
            }
        }
        trace!("Published {:?} on {}", event.kind, event.table);

        if closed.is_empty() {
            return;
        }
        if let Ok(mut subs) = self.inner.subscribers.write() {
            for id in closed {
                subs.remove(&id);
            }
        }
    }

    pub fn active_subscriptions(&self) -> usize {
        self.inner.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Labels of the open subscriptions, sorted.
    pub fn active_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .inner
            .subscribers
            .read()
            .map(|s| s.values().map(|(spec, _)| spec.label()).collect())
            .unwrap_or_default();
        labels.sort();
        labels
    }
}
