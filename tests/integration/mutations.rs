//! Integration tests for the four task mutations end to end.
//!
//! Covers create/toggle/edit/delete through the gateway against an
//! in-process store, client-side blank-text rejection, acknowledgment
//! flow, and the delete-unknown no-op.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use termtodo::client::{ConnectTimeouts, StoreClient};
use termtodo::gateway::GatewayError;
use termtodo::sync::Subscription;
use termtodo_proto::store::MutationOp;
use termtodo_proto::task::{Task, TaskId};
use tokio::sync::mpsc;

/// Starts an in-process store server and returns its WebSocket URL.
async fn start_store() -> (String, tokio::task::JoinHandle<()>) {
    let (addr, handle) = termtodo_store::server::start_server("127.0.0.1:0")
        .await
        .expect("failed to start test store");
    (format!("ws://{addr}/ws"), handle)
}

/// Connects a fresh client, opens its subscription, and drains the initial
/// empty snapshot.
async fn connect_ready(url: &str) -> (StoreClient, Subscription, mpsc::Receiver<MutationOp>) {
    let mut client = StoreClient::connect(url, None, ConnectTimeouts::default())
        .await
        .expect("connect failed");
    let mut sub = client.subscribe().await.expect("subscribe failed");
    let acks = client.take_acks().expect("acks");
    let empty = next_snapshot(&mut sub).await;
    assert!(empty.is_empty());
    (client, sub, acks)
}

/// Receives the next snapshot with a test timeout.
async fn next_snapshot(sub: &mut Subscription) -> Vec<Task> {
    tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("snapshot timed out")
        .expect("subscription ended")
}

/// Receives the next acknowledgment with a test timeout.
async fn next_ack(acks: &mut mpsc::Receiver<MutationOp>) -> MutationOp {
    tokio::time::timeout(Duration::from_secs(5), acks.recv())
        .await
        .expect("ack timed out")
        .expect("ack channel ended")
}

#[tokio::test]
async fn create_task_defaults() {
    let (client, mut sub, mut acks) = connect_ready(&start_store().await.0).await;

    client
        .gateway()
        .create("Buy milk", None)
        .await
        .expect("create");

    assert_eq!(next_ack(&mut acks).await, MutationOp::Create);
    let snapshot = next_snapshot(&mut sub).await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].text, "Buy milk");
    assert!(!snapshot[0].completed);
    assert_eq!(snapshot[0].due_date, None);
    assert!(snapshot[0].created_at.is_some());
}

#[tokio::test]
async fn create_task_with_due_date() {
    let (client, mut sub, mut acks) = connect_ready(&start_store().await.0).await;

    client
        .gateway()
        .create("Pay rent", Some("2026-09-01T09:00".to_string()))
        .await
        .expect("create");

    let _ack = next_ack(&mut acks).await;
    let snapshot = next_snapshot(&mut sub).await;
    assert_eq!(snapshot[0].due_date.as_deref(), Some("2026-09-01T09:00"));
}

#[tokio::test]
async fn blank_create_never_reaches_the_wire() {
    let (client, mut sub, mut acks) = connect_ready(&start_store().await.0).await;

    let err = client
        .gateway()
        .create("   ", None)
        .await
        .expect_err("blank text must be rejected");
    assert_eq!(err, GatewayError::TextEmpty);

    // No write was issued, so neither an ack nor a snapshot may arrive.
    let nothing = tokio::time::timeout(Duration::from_millis(300), async {
        tokio::select! {
            ack = next_ack(&mut acks) => Some(format!("ack {ack:?}")),
            snap = next_snapshot(&mut sub) => Some(format!("snapshot of {}", snap.len())),
        }
    })
    .await;
    assert!(nothing.is_err(), "unexpected traffic: {nothing:?}");
}

#[tokio::test]
async fn toggle_twice_restores_original_state() {
    let (client, mut sub, mut acks) = connect_ready(&start_store().await.0).await;
    let gateway = client.gateway();

    gateway.create("Flip me", None).await.expect("create");
    let _ack = next_ack(&mut acks).await;
    let snapshot = next_snapshot(&mut sub).await;
    let task_id = snapshot[0].id.clone();
    assert!(!snapshot[0].completed);

    gateway.toggle(task_id.clone()).await.expect("toggle");
    assert_eq!(next_ack(&mut acks).await, MutationOp::Toggle);
    assert!(next_snapshot(&mut sub).await[0].completed);

    gateway.toggle(task_id).await.expect("toggle");
    assert_eq!(next_ack(&mut acks).await, MutationOp::Toggle);
    assert!(!next_snapshot(&mut sub).await[0].completed);
}

#[tokio::test]
async fn edit_overwrites_text_and_due_date() {
    let (client, mut sub, mut acks) = connect_ready(&start_store().await.0).await;
    let gateway = client.gateway();

    gateway
        .create("Old text", Some("2026-01-01T08:00".to_string()))
        .await
        .expect("create");
    let _ack = next_ack(&mut acks).await;
    let snapshot = next_snapshot(&mut sub).await;
    let task_id = snapshot[0].id.clone();
    let created_at = snapshot[0].created_at;

    gateway
        .edit(task_id, "New text", None)
        .await
        .expect("edit");
    assert_eq!(next_ack(&mut acks).await, MutationOp::Edit);

    let snapshot = next_snapshot(&mut sub).await;
    assert_eq!(snapshot[0].text, "New text");
    assert_eq!(snapshot[0].due_date, None);
    // Creation time is immutable through edits.
    assert_eq!(snapshot[0].created_at, created_at);
}

#[tokio::test]
async fn blank_edit_leaves_stored_task_unchanged() {
    let (client, mut sub, mut acks) = connect_ready(&start_store().await.0).await;
    let gateway = client.gateway();

    gateway.create("Original", None).await.expect("create");
    let _ack = next_ack(&mut acks).await;
    let snapshot = next_snapshot(&mut sub).await;
    let task_id = snapshot[0].id.clone();

    let err = gateway
        .edit(task_id.clone(), "", None)
        .await
        .expect_err("blank text must be rejected");
    assert_eq!(err, GatewayError::TextEmpty);

    // Force a fresh snapshot via an unrelated mutation and verify the
    // original text survived.
    gateway.create("Probe", None).await.expect("create");
    let _ack = next_ack(&mut acks).await;
    let snapshot = next_snapshot(&mut sub).await;
    let original = snapshot
        .iter()
        .find(|t| t.id == task_id)
        .expect("task still present");
    assert_eq!(original.text, "Original");
}

#[tokio::test]
async fn delete_removes_task_from_snapshot() {
    let (client, mut sub, mut acks) = connect_ready(&start_store().await.0).await;
    let gateway = client.gateway();

    gateway.create("Doomed", None).await.expect("create");
    let _ack = next_ack(&mut acks).await;
    let snapshot = next_snapshot(&mut sub).await;

    gateway
        .delete(snapshot[0].id.clone())
        .await
        .expect("delete");
    assert_eq!(next_ack(&mut acks).await, MutationOp::Delete);
    assert!(next_snapshot(&mut sub).await.is_empty());
}

#[tokio::test]
async fn delete_unknown_id_is_acked_noop() {
    let (client, mut sub, mut acks) = connect_ready(&start_store().await.0).await;
    let gateway = client.gateway();

    gateway.create("Survivor", None).await.expect("create");
    let _ack = next_ack(&mut acks).await;
    let _snapshot = next_snapshot(&mut sub).await;

    // The request is still sent and acknowledged; the collection is
    // untouched and no snapshot churn occurs.
    gateway.delete(TaskId::new()).await.expect("delete");
    assert_eq!(next_ack(&mut acks).await, MutationOp::Delete);

    let no_push = tokio::time::timeout(Duration::from_millis(300), next_snapshot(&mut sub)).await;
    assert!(no_push.is_err(), "no-op delete must not push a snapshot");
}
