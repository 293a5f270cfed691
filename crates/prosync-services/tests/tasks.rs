mod common;

use std::sync::Arc;

use prosync_services::{ServiceError, TaskService};
use prosync_types::models::tasks::{Priority, TaskDraft, TaskPatch, TaskStatus};

fn draft(title: &str) -> TaskDraft {
    TaskDraft {
        title: title.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn tasks_are_keyed_per_board() {
    let (_backend, client) = common::signed_in("pm@example.com");
    let tasks = TaskService::new(client);

    let web = tasks.create_board("Website Relaunch", "", "").await.unwrap();
    let ops = tasks.create_board("Ops", "", "ops").await.unwrap();
    assert_eq!(ops.key_prefix, "OPS");

    let t1 = tasks.create_task(web.id, draft("Wireframes")).await.unwrap();
    let t2 = tasks.create_task(web.id, draft("Copy")).await.unwrap();
    let o1 = tasks.create_task(ops.id, draft("Rotate keys")).await.unwrap();

    assert_eq!(t1.key, "WR-1");
    assert_eq!(t2.key, "WR-2");
    assert_eq!(o1.key, "OPS-1");
    assert_eq!(t2.number, 2);

    let boards = tasks.list_boards().await.unwrap();
    assert_eq!(boards.len(), 2);
}

#[tokio::test]
async fn board_tasks_in_position_order() {
    let (_backend, client) = common::signed_in("pm@example.com");
    let tasks = TaskService::new(client);
    let board = tasks.create_board("B1", "", "B").await.unwrap();

    let first = tasks.create_task(board.id, draft("First")).await.unwrap();
    let second = tasks.create_task(board.id, draft("Second")).await.unwrap();

    let listed = tasks.get_tasks(board.id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, first.id);
    assert_eq!(listed[1].id, second.id);

    // Move the first below the second
    let moved = tasks.move_task(first.id, TaskStatus::Review, 10.0).await.unwrap();
    assert_eq!(moved.status, TaskStatus::Review);
    let listed = tasks.get_tasks(board.id).await.unwrap();
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);
}

#[tokio::test]
async fn update_and_delete() {
    let (_backend, client) = common::signed_in("pm@example.com");
    let tasks = TaskService::new(client);
    let board = tasks.create_board("Launch", "", "").await.unwrap();
    let task = tasks.create_task(board.id, draft("Press kit")).await.unwrap();

    let patch = TaskPatch {
        priority: Some(Priority::Urgent),
        labels: Some(vec!["marketing".into()]),
        ..Default::default()
    };
    let updated = tasks.update_task(task.id, patch).await.unwrap();
    assert_eq!(updated.priority, Priority::Urgent);
    assert_eq!(updated.labels, ["marketing"]);
    assert_eq!(updated.title, "Press kit");

    let empty = tasks.update_task(task.id, TaskPatch::default()).await;
    assert!(matches!(empty, Err(ServiceError::Validation(_))));

    tasks.delete_task(task.id).await.unwrap();
    let gone = tasks.get_task(task.id).await;
    assert!(matches!(gone, Err(ServiceError::NotFound { entity: "tasks", .. })));
}

#[tokio::test]
async fn creating_needs_a_session_and_a_title() {
    let backend = prosync_db::LocalBackend::in_memory().unwrap();
    let tasks = TaskService::new(Arc::new(backend.client()));

    let err = tasks.create_board("Anything", "", "").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotSignedIn));

    let (_backend, client) = common::signed_in("pm@example.com");
    let tasks = TaskService::new(client);
    let board = tasks.create_board("Launch", "", "").await.unwrap();
    let err = tasks.create_task(board.id, draft("   ")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let err = tasks.create_task(uuid::Uuid::new_v4(), draft("Orphan")).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "boards", .. }));
}
