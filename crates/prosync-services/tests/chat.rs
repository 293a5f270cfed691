mod common;

use std::sync::Arc;

use prosync_remote::RemoteClient;
use prosync_services::{ChatService, ServiceError};
use prosync_types::ChangeKind;

#[tokio::test]
async fn messages_threads_and_pins() {
    let (_backend, client) = common::signed_in("ada@example.com");
    let chat = ChatService::new(client);

    let general = chat.create_channel("general", "Company-wide", false).await.unwrap();
    let random = chat.create_channel("random", "", false).await.unwrap();
    let names: Vec<String> = chat.list_channels().await.unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(names, ["general", "random"]);

    let hello = chat.send_message(general.id, "  hello team  ", None).await.unwrap();
    assert_eq!(hello.body, "hello team");
    let reply = chat.send_message(general.id, "hi!", Some(hello.id)).await.unwrap();
    chat.send_message(random.id, "elsewhere", None).await.unwrap();

    let top = chat.get_messages(general.id).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].id, hello.id);

    let thread = chat.get_thread(hello.id).await.unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].id, reply.id);

    chat.set_pinned(hello.id, true).await.unwrap();
    let pinned = chat.list_pinned(general.id).await.unwrap();
    assert_eq!(pinned.len(), 1);
    assert!(pinned[0].pinned);

    let edited = chat.edit_message(hello.id, "hello everyone").await.unwrap();
    assert!(edited.edited);
    assert_eq!(edited.body, "hello everyone");

    chat.delete_message(reply.id).await.unwrap();
    assert!(chat.get_thread(hello.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn blank_messages_are_rejected() {
    let (backend, client) = common::signed_in("ada@example.com");
    let chat = ChatService::new(client);
    let channel = chat.create_channel("general", "", false).await.unwrap();

    let err = chat.send_message(channel.id, " \n\t ", None).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(backend.database().count_rows("chat_messages").unwrap(), 0);
}

#[tokio::test]
async fn reactions_toggle_per_user() {
    let (backend, ada) = common::signed_in("ada@example.com");
    let bob = Arc::new(backend.client_for("bob@example.com").unwrap());
    let ada_id = ada.session().unwrap().user.id;
    let bob_id = bob.session().unwrap().user.id;

    let ada_chat = ChatService::new(ada);
    let bob_chat = ChatService::new(bob);

    let channel = ada_chat.create_channel("general", "", false).await.unwrap();
    let msg = ada_chat.send_message(channel.id, "ship it?", None).await.unwrap();

    ada_chat.toggle_reaction(msg.id, "👍").await.unwrap();
    let msg = bob_chat.toggle_reaction(msg.id, "👍").await.unwrap();
    assert_eq!(msg.reactions["👍"], vec![ada_id, bob_id]);

    let msg = ada_chat.toggle_reaction(msg.id, "👍").await.unwrap();
    assert_eq!(msg.reactions["👍"], vec![bob_id]);
}

#[tokio::test]
async fn subscription_is_scoped_to_the_channel() {
    let (backend, client) = common::signed_in("ada@example.com");
    let chat = ChatService::new(client);
    let general = chat.create_channel("general", "", false).await.unwrap();
    let random = chat.create_channel("random", "", false).await.unwrap();

    let mut sub = chat.subscribe_messages(general.id).await.unwrap();
    assert_eq!(backend.feed().active_subscriptions(), 1);

    chat.send_message(random.id, "not for you", None).await.unwrap();
    let sent = chat.send_message(general.id, "for you", None).await.unwrap();

    let event = sub.recv().await.unwrap();
    assert_eq!(event.kind, ChangeKind::Insert);
    assert_eq!(event.record_id(), Some(sent.id.to_string().as_str()));
    assert!(sub.try_recv().is_none());

    drop(sub);
    assert_eq!(backend.feed().active_subscriptions(), 0);
}
