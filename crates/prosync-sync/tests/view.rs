//! Subscribe-fetch-merge against the embedded backend.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc};
use uuid::Uuid;

use prosync_db::{LocalBackend, LocalClient};
use prosync_remote::Subscription;
use prosync_services::{ServiceError, TaskService};
use prosync_sync::{DeletePolicy, Notifier, Source, SyncView, ViewStatus};
use prosync_types::ChangeEvent;
use prosync_types::models::tasks::{Task, TaskDraft, TaskPatch};

struct BoardTasks {
    tasks: TaskService<LocalClient>,
    board_id: Uuid,
    /// Holds the bulk read until notified.
    gate: Option<Arc<Notify>>,
    fail_fetch: bool,
}

impl BoardTasks {
    fn new(tasks: &TaskService<LocalClient>, board_id: Uuid) -> Self {
        Self {
            tasks: tasks.clone(),
            board_id,
            gate: None,
            fail_fetch: false,
        }
    }
}

impl Source for BoardTasks {
    type Item = Task;

    fn label(&self) -> String {
        format!("tasks of board {}", self.board_id)
    }

    async fn fetch(&self) -> Result<Vec<Task>, ServiceError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_fetch {
            return Err(ServiceError::validation("backend unavailable"));
        }
        self.tasks.get_tasks(self.board_id).await
    }

    async fn subscribe(&self) -> Result<Subscription, ServiceError> {
        self.tasks.subscribe_tasks(self.board_id).await
    }
}

/// Board tasks whose change stream is fed by hand.
struct HandFed {
    tasks: TaskService<LocalClient>,
    board_id: Uuid,
    events: std::sync::Mutex<Option<mpsc::UnboundedReceiver<ChangeEvent>>>,
}

impl Source for HandFed {
    type Item = Task;

    fn label(&self) -> String {
        format!("hand-fed tasks of board {}", self.board_id)
    }

    async fn fetch(&self) -> Result<Vec<Task>, ServiceError> {
        self.tasks.get_tasks(self.board_id).await
    }

    async fn subscribe(&self) -> Result<Subscription, ServiceError> {
        let events = self.events.lock().unwrap().take();
        match events {
            Some(events) => Ok(Subscription::new("tasks", events, || {})),
            None => Err(ServiceError::validation("already subscribed")),
        }
    }
}

fn setup() -> (LocalBackend, TaskService<LocalClient>) {
    let backend = LocalBackend::in_memory().unwrap();
    let client = Arc::new(backend.client_for("ada@example.com").unwrap());
    (backend, TaskService::new(client))
}

fn draft(title: &str) -> TaskDraft {
    TaskDraft {
        title: title.into(),
        ..Default::default()
    }
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn loads_snapshot_then_follows_changes() {
    let (_backend, tasks) = setup();
    let board = tasks.create_board("Launch", "", "LCH").await.unwrap();
    tasks.create_task(board.id, draft("Write copy")).await.unwrap();
    tasks.create_task(board.id, draft("Ship it")).await.unwrap();

    let (notifier, _notices) = Notifier::channel();
    let view = SyncView::open(BoardTasks::new(&tasks, board.id), DeletePolicy::default(), notifier);
    assert_eq!(view.ready().await, ViewStatus::Live);

    let titles: Vec<String> = view.items().into_iter().map(|t| t.title).collect();
    assert_eq!(titles, ["Write copy", "Ship it"]);

    let mut updates = view.watch();
    let third = tasks.create_task(board.id, draft("Celebrate")).await.unwrap();
    let list = updates.wait_for(|items| items.len() == 3).await.unwrap().clone();
    assert_eq!(list[2].id, third.id);

    let rename = TaskPatch {
        title: Some("Celebrate loudly".into()),
        ..Default::default()
    };
    tasks.update_task(third.id, rename).await.unwrap();
    eventually(|| view.get(third.id).is_some_and(|t| t.title == "Celebrate loudly")).await;

    // Deletes are ignored by default.
    tasks.delete_task(third.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(view.len(), 3);
}

#[tokio::test]
async fn remove_policy_drops_deleted_records() {
    let (_backend, tasks) = setup();
    let board = tasks.create_board("Ops", "", "").await.unwrap();
    let task = tasks.create_task(board.id, draft("Rotate keys")).await.unwrap();

    let (notifier, _notices) = Notifier::channel();
    let view = SyncView::open(BoardTasks::new(&tasks, board.id), DeletePolicy::Remove, notifier);
    view.ready().await;
    assert_eq!(view.len(), 1);

    tasks.delete_task(task.id).await.unwrap();
    eventually(|| view.is_empty()).await;
}

#[tokio::test]
async fn events_during_load_are_replayed_once() {
    let (backend, tasks) = setup();
    let board = tasks.create_board("Launch", "", "").await.unwrap();

    let gate = Arc::new(Notify::new());
    let mut source = BoardTasks::new(&tasks, board.id);
    source.gate = Some(gate.clone());

    let (notifier, _notices) = Notifier::channel();
    let view = SyncView::open(source, DeletePolicy::default(), notifier);

    // Subscribed, bulk read still held.
    eventually(|| backend.feed().active_subscriptions() == 1).await;
    let early = tasks.create_task(board.id, draft("Created during load")).await.unwrap();
    assert_eq!(view.status(), ViewStatus::Loading);

    gate.notify_one();
    assert_eq!(view.ready().await, ViewStatus::Live);

    // In both the snapshot and the buffer, listed once.
    let items = view.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, early.id);
}

#[tokio::test]
async fn failed_load_notifies_once_and_leaves_list_empty() {
    let (_backend, tasks) = setup();
    let board = tasks.create_board("Launch", "", "").await.unwrap();
    tasks.create_task(board.id, draft("Existing")).await.unwrap();

    let mut source = BoardTasks::new(&tasks, board.id);
    source.fail_fetch = true;
    let (notifier, mut notices) = Notifier::channel();
    let view = SyncView::open(source, DeletePolicy::default(), notifier);

    assert_eq!(view.ready().await, ViewStatus::Failed);
    assert!(view.is_empty());

    let notice = notices.recv().await.unwrap();
    assert!(notice.is_error());
    assert!(notice.message.contains("backend unavailable"));
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn rescope_releases_old_subscription_first() {
    let (backend, tasks) = setup();
    let first = tasks.create_board("First", "", "").await.unwrap();
    let second = tasks.create_board("Second", "", "").await.unwrap();
    tasks.create_task(first.id, draft("a")).await.unwrap();
    tasks.create_task(second.id, draft("b")).await.unwrap();
    tasks.create_task(second.id, draft("c")).await.unwrap();

    let (notifier, _notices) = Notifier::channel();
    let mut view = SyncView::open(BoardTasks::new(&tasks, first.id), DeletePolicy::default(), notifier);
    view.ready().await;
    assert_eq!(view.len(), 1);
    assert_eq!(
        backend.feed().active_labels(),
        [format!("tasks:board_id=eq.{}", first.id)]
    );

    view.rescope(BoardTasks::new(&tasks, second.id)).await;
    view.ready().await;
    assert_eq!(view.len(), 2);
    assert_eq!(
        backend.feed().active_labels(),
        [format!("tasks:board_id=eq.{}", second.id)]
    );

    // The old scope no longer reaches the view.
    tasks.create_task(first.id, draft("late")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(view.len(), 2);
}

#[tokio::test]
async fn dropping_the_view_releases_its_subscription() {
    let (backend, tasks) = setup();
    let board = tasks.create_board("Launch", "", "").await.unwrap();

    let (notifier, _notices) = Notifier::channel();
    let view = SyncView::open(BoardTasks::new(&tasks, board.id), DeletePolicy::default(), notifier);
    view.ready().await;
    assert_eq!(backend.feed().active_subscriptions(), 1);

    drop(view);
    eventually(|| backend.feed().active_subscriptions() == 0).await;
}

#[tokio::test]
async fn ended_stream_leaves_view_disconnected() {
    let (_backend, tasks) = setup();
    let board = tasks.create_board("Launch", "", "").await.unwrap();
    let other = tasks.create_board("Elsewhere", "", "").await.unwrap();
    tasks.create_task(board.id, draft("Write copy")).await.unwrap();
    let late = tasks.create_task(other.id, draft("Arrives by hand")).await.unwrap();

    let (tx, rx) = mpsc::unbounded_channel();
    let source = HandFed {
        tasks: tasks.clone(),
        board_id: board.id,
        events: std::sync::Mutex::new(Some(rx)),
    };
    let (notifier, _notices) = Notifier::channel();
    let view = SyncView::open(source, DeletePolicy::default(), notifier);
    assert_eq!(view.ready().await, ViewStatus::Live);
    assert_eq!(view.len(), 1);

    tx.send(ChangeEvent::insert("tasks", serde_json::to_value(&late).unwrap()))
        .unwrap();
    eventually(|| view.get(late.id).is_some()).await;
    assert_eq!(view.status(), ViewStatus::Live);

    drop(tx);
    eventually(|| view.status() == ViewStatus::Disconnected).await;
    assert_eq!(view.len(), 2);
}
