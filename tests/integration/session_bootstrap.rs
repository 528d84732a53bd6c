//! Integration tests for anonymous session bootstrap.
//!
//! Covers fresh identity issuance, token-based resumption, collection
//! continuity across reconnects, and connection failure handling.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use termtodo::client::{ClientError, ConnectTimeouts, StoreClient};

/// Starts an in-process store server and returns its WebSocket URL.
async fn start_store() -> (String, tokio::task::JoinHandle<()>) {
    let (addr, handle) = termtodo_store::server::start_server("127.0.0.1:0")
        .await
        .expect("failed to start test store");
    (format!("ws://{addr}/ws"), handle)
}

/// Connects a client with the given token and default timeouts.
async fn connect(url: &str, token: Option<String>) -> StoreClient {
    StoreClient::connect(url, token, ConnectTimeouts::default())
        .await
        .expect("connect failed")
}

#[tokio::test]
async fn fresh_session_without_token() {
    let (url, _handle) = start_store().await;
    let client = connect(&url, None).await;
    assert!(!client.identity().is_empty());
    assert!(!client.token().is_empty());
    assert!(client.is_connected());
}

#[tokio::test]
async fn two_fresh_sessions_get_distinct_identities() {
    let (url, _handle) = start_store().await;
    let a = connect(&url, None).await;
    let b = connect(&url, None).await;
    assert_ne!(a.identity(), b.identity());
}

#[tokio::test]
async fn token_resumes_same_identity() {
    let (url, _handle) = start_store().await;
    let first = connect(&url, None).await;
    let identity = first.identity().to_string();
    let token = first.token().to_string();
    drop(first);

    let second = connect(&url, Some(token.clone())).await;
    assert_eq!(second.identity(), identity);
    assert_eq!(second.token(), token);
}

#[tokio::test]
async fn stale_token_gets_fresh_identity() {
    let (url, _handle) = start_store().await;
    let client = connect(&url, Some("token-from-before-restart".to_string())).await;
    assert!(!client.identity().is_empty());
    assert_ne!(client.token(), "token-from-before-restart");
}

#[tokio::test]
async fn collection_survives_reconnect_with_token() {
    let (url, _handle) = start_store().await;

    // First run: create a task.
    let mut first = connect(&url, None).await;
    let token = first.token().to_string();
    let mut sub = first.subscribe().await.expect("subscribe");
    let _empty = tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("snapshot timed out")
        .expect("snapshot");
    first
        .gateway()
        .create("Persisted task", None)
        .await
        .expect("create");
    let snapshot = tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("snapshot timed out")
        .expect("snapshot");
    assert_eq!(snapshot.len(), 1);
    drop(sub);
    drop(first);

    // Second run: same token sees the same collection.
    let mut second = connect(&url, Some(token)).await;
    let mut sub = second.subscribe().await.expect("subscribe");
    let snapshot = tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("snapshot timed out")
        .expect("snapshot");
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].text, "Persisted task");
}

#[tokio::test]
async fn connect_to_unreachable_store_fails() {
    let result = StoreClient::connect(
        "ws://127.0.0.1:1/ws",
        None,
        ConnectTimeouts {
            connect: Duration::from_secs(2),
            handshake: Duration::from_secs(2),
        },
    )
    .await;
    assert!(matches!(
        result,
        Err(ClientError::Unreachable | ClientError::Io(_) | ClientError::Timeout)
    ));
}

#[tokio::test]
async fn session_token_round_trips_through_state_file() {
    let path = std::env::temp_dir()
        .join("termtodo-bootstrap-test")
        .join("session.json");
    let _ = std::fs::remove_file(&path);

    let (url, _handle) = start_store().await;
    let client = connect(&url, None).await;
    termtodo::session::save_token(&path, client.token()).expect("save token");

    let loaded = termtodo::session::load_token(&path);
    assert_eq!(loaded.as_deref(), Some(client.token()));
    let _ = std::fs::remove_file(&path);
}
