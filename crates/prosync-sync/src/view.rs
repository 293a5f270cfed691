use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use prosync_types::{ChangeEvent, Record};

use crate::live::{DeletePolicy, LiveList, MergeOutcome};
use crate::notify::Notifier;
use crate::source::{ScopedSubscription, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStatus {
    /// Bulk read in flight.
    Loading,
    /// Snapshot loaded and realtime subscription open.
    Live,
    /// The bulk read failed. Realtime events are still merged.
    Failed,
    /// Snapshot loaded but no realtime stream, either because subscribing
    /// failed or because the stream ended.
    Disconnected,
}

struct Shared<T> {
    list: Mutex<LiveList<T>>,
    items: watch::Sender<Vec<T>>,
    policy: DeletePolicy,
    status: watch::Sender<ViewStatus>,
}

impl<T: Record> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, LiveList<T>> {
        self.list.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, list: &LiveList<T>) {
        self.items.send_replace(list.items().to_vec());
    }

    /// Install a snapshot, then replay the events buffered while it was
    /// being read.
    fn load(&self, snapshot: Vec<T>, buffered: &[ChangeEvent]) {
        let mut list = self.lock();
        list.replace(snapshot);
        for event in buffered {
            list.apply(event);
        }
        self.publish(&list);
    }

    fn apply(&self, event: &ChangeEvent) -> MergeOutcome {
        let mut list = self.lock();
        let outcome = list.apply(event);
        if outcome.changed() {
            self.publish(&list);
        }
        outcome
    }

    fn merge(&self, record: T) -> MergeOutcome {
        let mut list = self.lock();
        let outcome = list.merge_record(record);
        if outcome.changed() {
            self.publish(&list);
        }
        outcome
    }

    /// Start over with an empty list filtered for a new scope.
    fn reset(&self, keep: impl Fn(&T) -> bool + Send + Sync + 'static) {
        let mut list = self.lock();
        *list = LiveList::new(self.policy).retaining(keep);
        self.publish(&list);
        self.status.send_replace(ViewStatus::Loading);
    }
}

/// A live list over one [`Source`].
///
/// Opening the view subscribes first and then reads the snapshot, so no
/// change between the two is lost. Events that arrive during the read are
/// replayed onto the snapshot. The merge task is aborted when the view is
/// dropped or rescoped, which releases its subscription.
pub struct SyncView<S: Source> {
    shared: Arc<Shared<S::Item>>,
    notifier: Notifier,
    label: String,
    task: JoinHandle<()>,
}

impl<S: Source> SyncView<S> {
    /// Open the view and start loading. Must be called inside a tokio
    /// runtime.
    pub fn open(source: S, policy: DeletePolicy, notifier: Notifier) -> Self {
        let source = Arc::new(source);
        let (items, _) = watch::channel(Vec::new());
        let (status, _) = watch::channel(ViewStatus::Loading);
        let shared = Arc::new(Shared {
            list: Mutex::new(LiveList::new(policy).retaining(keeper(source.clone()))),
            items,
            policy,
            status,
        });

        let label = source.label();
        let task = tokio::spawn(run(source, shared.clone(), notifier.clone()));
        Self {
            shared,
            notifier,
            label,
            task,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Current records, in list order.
    pub fn items(&self) -> Vec<S::Item> {
        self.shared.lock().items().to_vec()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: Uuid) -> Option<S::Item> {
        self.shared.lock().get(id).cloned()
    }

    /// Receiver of every published list state.
    pub fn watch(&self) -> watch::Receiver<Vec<S::Item>> {
        self.shared.items.subscribe()
    }

    pub fn status(&self) -> ViewStatus {
        *self.shared.status.borrow()
    }

    /// Wait until the first load has finished, successfully or not.
    pub async fn ready(&self) -> ViewStatus {
        let mut status = self.shared.status.subscribe();
        match status.wait_for(|s| *s != ViewStatus::Loading).await {
            Ok(current) => *current,
            Err(_) => self.status(),
        }
    }

    /// Merge a record returned by a write on this view's behalf. Its
    /// realtime echo later dedupes against it.
    pub fn merge(&self, record: S::Item) -> MergeOutcome {
        self.shared.merge(record)
    }

    /// Point the view at another scope. The old subscription is released
    /// before the new one is opened, and the list restarts empty.
    pub async fn rescope(&mut self, source: S) {
        self.task.abort();
        let _ = (&mut self.task).await;

        let source = Arc::new(source);
        self.shared.reset(keeper(source.clone()));
        self.label = source.label();
        info!("View switched to {}", self.label);
        self.task = tokio::spawn(run(source, self.shared.clone(), self.notifier.clone()));
    }
}

impl<S: Source> Drop for SyncView<S> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn keeper<S: Source>(source: Arc<S>) -> impl Fn(&S::Item) -> bool + Send + Sync + 'static {
    move |item| source.keep(item)
}

async fn next_event<T: Record>(subscription: &mut Option<ScopedSubscription<T>>) -> Option<ChangeEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

async fn run<S: Source>(source: Arc<S>, shared: Arc<Shared<S::Item>>, notifier: Notifier) {
    let label = source.label();

    let mut subscription = match ScopedSubscription::open(&*source).await {
        Ok(subscription) => Some(subscription),
        Err(e) => {
            notifier.error(format!("Live updates for {} are unavailable: {}", label, e.user_message()));
            None
        }
    };

    let mut buffered = Vec::new();
    let fetched = {
        let fetch = source.fetch();
        tokio::pin!(fetch);
        loop {
            tokio::select! {
                result = &mut fetch => break result,
                event = next_event(&mut subscription) => match event {
                    Some(event) => buffered.push(event),
                    None => {
                        warn!("Realtime stream for {} ended during load", label);
                        subscription = None;
                    }
                },
            }
        }
    };

    match fetched {
        Ok(snapshot) => {
            debug!(
                "Loaded {} records for {} ({} events buffered)",
                snapshot.len(),
                label,
                buffered.len()
            );
            shared.load(snapshot, &buffered);
            let status = if subscription.is_some() {
                ViewStatus::Live
            } else {
                ViewStatus::Disconnected
            };
            shared.status.send_replace(status);
        }
        Err(e) => {
            notifier.error(format!("Could not load {}: {}", label, e.user_message()));
            for event in &buffered {
                shared.apply(event);
            }
            shared.status.send_replace(ViewStatus::Failed);
        }
    }

    let Some(mut subscription) = subscription else {
        return;
    };
    while let Some(event) = subscription.next().await {
        let outcome = shared.apply(&event);
        debug!("{:?} on {}: {:?}", event.kind, label, outcome);
    }

    warn!("Realtime stream for {} ended", label);
    shared.status.send_if_modified(|status| {
        if *status == ViewStatus::Live {
            *status = ViewStatus::Disconnected;
            true
        } else {
            false
        }
    });
}
