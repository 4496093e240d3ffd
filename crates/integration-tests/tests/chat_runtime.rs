//! Full chat runtime against the mock backend: polling, durable unread
//! counters, and mark-read on return to the foreground.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::path::Path;
use std::time::Duration;

use support_chat_client::{
    ChatEvent, ChatHandle, ChatSnapshot, ClientConfig, Command, JsonFileStorage, NoticeLevel,
    UnreadStorage,
};
use support_chat_core::AdminId;
use support_chat_integration_tests::{MockBackend, USER_ID, admin_json, user_token};

const WAIT: Duration = Duration::from_secs(10);

fn config(mock: &MockBackend, unread_path: &Path) -> ClientConfig {
    let base_url = mock.base_url();
    let token = user_token(USER_ID);
    let unread = unread_path.to_string_lossy().into_owned();
    ClientConfig::from_lookup(|key| match key {
        "SUPPORT_CHAT_API_URL" => Some(base_url.clone()),
        "SUPPORT_CHAT_TOKEN" => Some(token.clone()),
        "SUPPORT_CHAT_UNREAD_PATH" => Some(unread.clone()),
        "SUPPORT_CHAT_MESSAGE_POLL_SECS" => Some("1".to_string()),
        _ => None,
    })
    .unwrap()
}

async fn mock_with_admins() -> MockBackend {
    let mock = MockBackend::start().await;
    mock.state.set_admins(vec![
        admin_json("a1", "Linh", "linh@support.example"),
        admin_json("a2", "Minh", "minh@support.example"),
    ]);
    mock
}

async fn wait_for(handle: &mut ChatHandle, predicate: impl FnMut(&ChatSnapshot) -> bool) -> ChatSnapshot {
    tokio::time::timeout(WAIT, handle.snapshots.wait_for(predicate))
        .await
        .unwrap()
        .unwrap()
        .clone()
}

async fn next_event(handle: &mut ChatHandle) -> ChatEvent {
    tokio::time::timeout(WAIT, handle.events.recv())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_hidden_reply_is_counted_persisted_and_cleared_on_return() {
    let mock = mock_with_admins().await;
    let dir = tempfile::tempdir().unwrap();
    let unread_path = dir.path().join("unread_messages.json");
    let mut handle = support_chat_client::connect(&config(&mock, &unread_path)).unwrap();

    wait_for(&mut handle, |s| s.rows.len() == 2).await;
    handle.commands.send(Command::SetVisibility(false)).unwrap();
    handle
        .commands
        .send(Command::SelectAdmin(AdminId::new("a1")))
        .unwrap();
    wait_for(&mut handle, |s| s.selected.is_some() && !s.loading).await;

    mock.state.push_admin_message("m1", "a1", "We are looking into it");

    let ChatEvent::Notice(notice) = next_event(&mut handle).await else {
        panic!("expected a notice");
    };
    assert_eq!(notice.level, NoticeLevel::Info);
    assert_eq!(notice.text, "You have 1 new message from Linh");

    let snapshot = wait_for(&mut handle, |s| s.messages.len() == 1).await;
    assert_eq!(snapshot.unread.get(&AdminId::new("a1")), 1);
    let stored = JsonFileStorage::new(&unread_path).load().unwrap();
    assert_eq!(stored.get(&AdminId::new("a1")), 1);
    assert!(mock.state.read_calls().is_empty());

    handle.commands.send(Command::SetVisibility(true)).unwrap();
    wait_for(&mut handle, |s| s.unread.is_empty()).await;
    let stored = JsonFileStorage::new(&unread_path).load().unwrap();
    assert!(stored.is_empty());

    tokio::time::timeout(WAIT, async {
        while mock.state.read_calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(mock.state.read_calls(), vec!["a1".to_string()]);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_send_round_trip() {
    let mock = mock_with_admins().await;
    let dir = tempfile::tempdir().unwrap();
    let mut handle =
        support_chat_client::connect(&config(&mock, &dir.path().join("unread.json"))).unwrap();

    handle
        .commands
        .send(Command::SelectAdmin(AdminId::new("a2")))
        .unwrap();
    wait_for(&mut handle, |s| s.selected.is_some() && !s.loading).await;

    handle
        .commands
        .send(Command::SetDraft("Where is my parcel?".to_string()))
        .unwrap();
    handle.commands.send(Command::Send).unwrap();

    assert_eq!(next_event(&mut handle).await, ChatEvent::ScrollToLatest);
    let snapshot = wait_for(&mut handle, |s| s.messages.len() == 1 && s.draft.is_empty()).await;
    assert_eq!(snapshot.messages[0].content, "Where is my parcel?");
    assert_eq!(snapshot.rows[1].last_message.as_ref().unwrap().content, "Where is my parcel?");
    assert_eq!(mock.state.sent().len(), 1);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stored_counters_survive_restart() {
    let mock = mock_with_admins().await;
    let dir = tempfile::tempdir().unwrap();
    let unread_path = dir.path().join("unread.json");
    mock.state.set_unread("a2", 4);
    mock.state.set_unread("gone", 9);

    let mut handle = support_chat_client::connect(&config(&mock, &unread_path)).unwrap();
    wait_for(&mut handle, |s| s.unread.get(&AdminId::new("a2")) == 4).await;
    handle.shutdown().await.unwrap();

    mock.state.fail_with(500);
    let mut handle = support_chat_client::connect(&config(&mock, &unread_path)).unwrap();
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.unread.get(&AdminId::new("a2")), 4);

    // A failing backend surfaces a notice but leaves stored counters alone.
    let ChatEvent::Notice(notice) = next_event(&mut handle).await else {
        panic!("expected a notice");
    };
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(handle.snapshot().unread.get(&AdminId::new("a2")), 4);
    handle.shutdown().await.unwrap();
}
