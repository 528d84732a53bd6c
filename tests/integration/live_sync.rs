//! Integration tests for the live task list subscription.
//!
//! Covers the immediate snapshot on subscribe, push-on-mutation, display
//! ordering, full-replacement semantics, and subscription teardown.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use termtodo::client::{ConnectTimeouts, StoreClient};
use termtodo::sync::Subscription;
use termtodo_proto::task::Task;

/// Starts an in-process store server and returns its WebSocket URL.
async fn start_store() -> (String, tokio::task::JoinHandle<()>) {
    let (addr, handle) = termtodo_store::server::start_server("127.0.0.1:0")
        .await
        .expect("failed to start test store");
    (format!("ws://{addr}/ws"), handle)
}

/// Connects a fresh client and opens its subscription.
async fn connect_and_subscribe(url: &str) -> (StoreClient, Subscription) {
    let mut client = StoreClient::connect(url, None, ConnectTimeouts::default())
        .await
        .expect("connect failed");
    let sub = client.subscribe().await.expect("subscribe failed");
    (client, sub)
}

/// Receives the next snapshot with a test timeout.
async fn next_snapshot(sub: &mut Subscription) -> Vec<Task> {
    tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("snapshot timed out")
        .expect("subscription ended")
}

#[tokio::test]
async fn subscribe_immediately_yields_current_snapshot() {
    let (url, _handle) = start_store().await;
    let (_client, mut sub) = connect_and_subscribe(&url).await;
    let snapshot = next_snapshot(&mut sub).await;
    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn every_mutation_pushes_a_snapshot() {
    let (url, _handle) = start_store().await;
    let (client, mut sub) = connect_and_subscribe(&url).await;
    let _empty = next_snapshot(&mut sub).await;

    let gateway = client.gateway();
    gateway.create("First", None).await.expect("create");
    assert_eq!(next_snapshot(&mut sub).await.len(), 1);

    gateway.create("Second", None).await.expect("create");
    assert_eq!(next_snapshot(&mut sub).await.len(), 2);
}

#[tokio::test]
async fn snapshots_arrive_sorted_by_creation_time() {
    let (url, _handle) = start_store().await;
    let (client, mut sub) = connect_and_subscribe(&url).await;
    let _empty = next_snapshot(&mut sub).await;

    let gateway = client.gateway();
    for text in ["one", "two", "three"] {
        gateway.create(text, None).await.expect("create");
        let _snapshot = next_snapshot(&mut sub).await;
    }

    gateway.create("four", None).await.expect("create");
    let snapshot = next_snapshot(&mut sub).await;
    assert_eq!(snapshot.len(), 4);
    for pair in snapshot.windows(2) {
        assert!(pair[0].sort_key() <= pair[1].sort_key());
    }
    assert_eq!(snapshot[3].text, "four");
}

#[tokio::test]
async fn snapshot_is_full_replacement_not_a_diff() {
    let (url, _handle) = start_store().await;
    let (client, mut sub) = connect_and_subscribe(&url).await;
    let _empty = next_snapshot(&mut sub).await;

    let gateway = client.gateway();
    gateway.create("Keep", None).await.expect("create");
    let _snapshot = next_snapshot(&mut sub).await;
    gateway.create("Remove", None).await.expect("create");
    let snapshot = next_snapshot(&mut sub).await;
    assert_eq!(snapshot.len(), 2);

    let doomed = snapshot
        .iter()
        .find(|t| t.text == "Remove")
        .expect("task present")
        .id
        .clone();
    gateway.delete(doomed).await.expect("delete");

    let snapshot = next_snapshot(&mut sub).await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].text, "Keep");
}

#[tokio::test]
async fn closed_subscription_stops_yielding() {
    let (url, _handle) = start_store().await;
    let (client, mut sub) = connect_and_subscribe(&url).await;
    let _empty = next_snapshot(&mut sub).await;

    sub.close();

    // Mutations still succeed; the closed handle just yields nothing new.
    client
        .gateway()
        .create("Unobserved", None)
        .await
        .expect("create");

    let drained = tokio::time::timeout(Duration::from_secs(1), async {
        while sub.recv().await.is_some() {}
    })
    .await;
    assert!(drained.is_ok(), "closed subscription must end, not hang");
}

/// Starts a minimal store that performs the session handshake and then
/// closes the connection. Used to test client-side disconnect detection.
async fn start_closing_store() -> (String, tokio::task::JoinHandle<()>) {
    use futures_util::{SinkExt, StreamExt};
    use termtodo_proto::store::{self, StoreMessage};
    use tokio_tungstenite::tungstenite as ws;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let url = format!("ws://{addr}/ws");

    let handle = tokio::spawn(async move {
        // Accept exactly one connection.
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .expect("ws accept");

        // Read Hello, grant a throwaway session.
        if let Some(Ok(ws::Message::Binary(data))) = ws_stream.next().await
            && let Ok(StoreMessage::Hello { .. }) = store::decode(&data)
        {
            let welcome = StoreMessage::Welcome {
                identity: "ghost".to_string(),
                token: "ghost-token".to_string(),
            };
            let bytes = store::encode(&welcome).expect("encode");
            let _ = ws_stream.send(ws::Message::Binary(bytes.into())).await;
        }

        // Brief delay then close the connection.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = ws_stream.close(None).await;
    });

    (url, handle)
}

#[tokio::test]
async fn subscription_ends_when_store_closes_connection() {
    let (url, _handle) = start_closing_store().await;

    let mut client = StoreClient::connect(&url, None, ConnectTimeouts::default())
        .await
        .expect("connect failed");

    // The store closes shortly after the handshake; the subscription either
    // fails to open or its stream ends once the close is observed.
    match client.subscribe().await {
        Ok(mut sub) => {
            let ended = tokio::time::timeout(Duration::from_secs(5), async {
                while sub.recv().await.is_some() {}
            })
            .await;
            assert!(ended.is_ok(), "subscription must end after store close");
        }
        Err(e) => {
            // Connection already observed as closed, equally valid.
            let _ = e;
        }
    }
}
