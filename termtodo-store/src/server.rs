//! Store server core: shared state, WebSocket handler, subscriber registry,
//! and mutation dispatch.
//!
//! The store accepts WebSocket connections, grants each one an anonymous
//! identity via the [`SessionRegistry`], applies task mutations to the
//! [`TaskCollections`], and pushes a full [`StoreMessage::Snapshot`] to the
//! identity's live subscriber after every successful mutation.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use termtodo_proto::store::{self, MutationOp, StoreMessage};
use tokio::sync::{RwLock, mpsc};

use crate::collections::TaskCollections;
use crate::sessions::SessionRegistry;

/// Shared store state holding the subscriber registry, session directory,
/// and task collections.
pub struct StoreState {
    /// Maps identity to the channel sender of its live subscriber.
    subscribers: RwLock<HashMap<String, mpsc::UnboundedSender<Message>>>,
    /// Token → identity directory for anonymous session resumption.
    pub sessions: SessionRegistry,
    /// Authoritative per-identity task state.
    pub collections: TaskCollections,
}

impl Default for StoreState {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreState {
    /// Creates a new store state with no sessions, tasks, or subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            sessions: SessionRegistry::new(),
            collections: TaskCollections::new(),
        }
    }

    /// Registers a live subscriber for an identity.
    ///
    /// At most one subscriber per identity: if one was already registered,
    /// the old sender is replaced and returned (the previous connection's
    /// writer task detects the closed channel and winds down).
    pub async fn subscribe(
        &self,
        identity: &str,
        sender: mpsc::UnboundedSender<Message>,
    ) -> Option<mpsc::UnboundedSender<Message>> {
        let mut subs = self.subscribers.write().await;
        subs.insert(identity.to_string(), sender)
    }

    /// Removes the identity's subscriber if it is the given sender.
    ///
    /// A connection only unregisters its own subscription; a replacement
    /// registered by a newer connection is left in place.
    pub async fn unsubscribe(&self, identity: &str, sender: &mpsc::UnboundedSender<Message>) {
        let mut subs = self.subscribers.write().await;
        if subs
            .get(identity)
            .is_some_and(|current| current.same_channel(sender))
        {
            subs.remove(identity);
        }
    }

    /// Returns a clone of the identity's subscriber sender, if any.
    pub async fn subscriber(&self, identity: &str) -> Option<mpsc::UnboundedSender<Message>> {
        let subs = self.subscribers.read().await;
        subs.get(identity).cloned()
    }
}

/// Handles an upgraded WebSocket connection for a single client.
///
/// The connection lifecycle:
/// 1. Wait for a `Hello` message and resolve the session.
/// 2. Send `Welcome` with the identity and resumption token.
/// 3. Enter the message loop: `Subscribe` registers the live query,
///    mutations are applied and acknowledged, and every successful
///    mutation pushes a fresh snapshot to the identity's subscriber.
/// 4. On disconnect, drop the subscription if this connection held it.
pub async fn handle_socket(socket: WebSocket, state: Arc<StoreState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Wait for the Hello message.
    let Some(token) = wait_for_hello(&mut ws_receiver).await else {
        tracing::warn!("connection closed before session handshake");
        return;
    };

    let session = state.sessions.resolve(token.as_deref()).await;
    let identity = session.identity.clone();
    tracing::info!(identity = %identity, resumed = token.is_some(), "session granted");

    let welcome = StoreMessage::Welcome {
        identity: session.identity,
        token: session.token,
    };
    if let Err(e) = send_store_msg(&mut ws_sender, &welcome).await {
        tracing::error!(identity = %identity, error = %e, "failed to send Welcome");
        return;
    }

    // Channel for this connection's outgoing frames: acks, errors, and,
    // once subscribed, snapshot pushes.
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Writer task: forward channel messages to the WebSocket.
    let writer_identity = identity.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(identity = %writer_identity, "WebSocket write failed");
                break;
            }
        }
    });

    // Reader task: process incoming messages from this client.
    let reader_identity = identity.clone();
    let reader_state = Arc::clone(&state);
    let reader_tx = tx.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    handle_binary_message(&reader_identity, &data, &reader_state, &reader_tx).await;
                }
                Message::Close(_) => {
                    tracing::info!(identity = %reader_identity, "received close frame");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    // Clean up: drop the subscription if this connection held it.
    state.unsubscribe(&identity, &tx).await;
    tracing::info!(identity = %identity, "client disconnected");
}

/// Waits for the first message on the WebSocket, expecting a `Hello`.
///
/// Returns the presented token (`Some(None)` for a fresh session request)
/// wrapped in `Some`, or `None` if the connection closes or an invalid
/// message arrives first.
async fn wait_for_hello(
    receiver: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<Option<String>> {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Binary(data) => match store::decode(&data) {
                Ok(StoreMessage::Hello { token }) => return Some(token),
                Ok(other) => {
                    tracing::warn!(msg = ?other, "expected Hello, got different message");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to decode handshake message");
                    return None;
                }
            },
            Message::Close(_) => return None,
            _ => {
                // Skip non-binary frames (ping/pong) during the handshake.
            }
        }
    }
    None
}

/// Handles a binary WebSocket message from a session-established client.
async fn handle_binary_message(
    identity: &str,
    data: &[u8],
    state: &Arc<StoreState>,
    tx: &mpsc::UnboundedSender<Message>,
) {
    let msg = match store::decode(data) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(identity = %identity, error = %e, "failed to decode message");
            return;
        }
    };

    match msg {
        StoreMessage::Subscribe => {
            if state.subscribe(identity, tx.clone()).await.is_some() {
                tracing::info!(identity = %identity, "replaced existing subscription");
            }
            let tasks = state.collections.snapshot(identity).await;
            send_via_channel(tx, &StoreMessage::Snapshot { tasks });
        }
        StoreMessage::Create { text, due_date } => {
            match state.collections.create(identity, &text, due_date).await {
                Ok(task) => {
                    tracing::debug!(identity = %identity, task_id = %task.id, "task created");
                    send_via_channel(tx, &StoreMessage::Ack {
                        op: MutationOp::Create,
                    });
                    push_snapshot(state, identity).await;
                }
                Err(e) => {
                    tracing::warn!(identity = %identity, error = %e, "create rejected");
                    send_via_channel(tx, &StoreMessage::Error {
                        reason: e.to_string(),
                    });
                }
            }
        }
        StoreMessage::Toggle { task_id } => {
            match state.collections.toggle(identity, &task_id).await {
                Ok(completed) => {
                    tracing::debug!(
                        identity = %identity,
                        task_id = %task_id,
                        completed = completed,
                        "task toggled"
                    );
                    send_via_channel(tx, &StoreMessage::Ack {
                        op: MutationOp::Toggle,
                    });
                    push_snapshot(state, identity).await;
                }
                Err(e) => {
                    tracing::warn!(identity = %identity, error = %e, "toggle rejected");
                    send_via_channel(tx, &StoreMessage::Error {
                        reason: e.to_string(),
                    });
                }
            }
        }
        StoreMessage::Edit {
            task_id,
            text,
            due_date,
        } => {
            match state
                .collections
                .edit(identity, &task_id, &text, due_date)
                .await
            {
                Ok(()) => {
                    tracing::debug!(identity = %identity, task_id = %task_id, "task edited");
                    send_via_channel(tx, &StoreMessage::Ack {
                        op: MutationOp::Edit,
                    });
                    push_snapshot(state, identity).await;
                }
                Err(e) => {
                    tracing::warn!(identity = %identity, error = %e, "edit rejected");
                    send_via_channel(tx, &StoreMessage::Error {
                        reason: e.to_string(),
                    });
                }
            }
        }
        StoreMessage::Delete { task_id } => {
            let existed = state.collections.delete(identity, &task_id).await;
            tracing::debug!(
                identity = %identity,
                task_id = %task_id,
                existed = existed,
                "task deleted"
            );
            // Deleting an unknown id still acks: a no-op from the caller's
            // perspective, with no snapshot churn.
            send_via_channel(tx, &StoreMessage::Ack {
                op: MutationOp::Delete,
            });
            if existed {
                push_snapshot(state, identity).await;
            }
        }
        StoreMessage::Hello { .. } => {
            tracing::warn!(identity = %identity, "received duplicate Hello on established session");
        }
        other => {
            tracing::warn!(
                identity = %identity,
                msg = ?other,
                "unexpected message type from client"
            );
        }
    }
}

/// Pushes the identity's current snapshot to its live subscriber, if any.
async fn push_snapshot(state: &Arc<StoreState>, identity: &str) {
    let Some(subscriber) = state.subscriber(identity).await else {
        return;
    };
    let tasks = state.collections.snapshot(identity).await;
    let count = tasks.len();
    send_via_channel(&subscriber, &StoreMessage::Snapshot { tasks });
    tracing::debug!(identity = %identity, tasks = count, "snapshot pushed");
}

/// Encodes a store message and sends it through a connection's channel.
fn send_via_channel(tx: &mpsc::UnboundedSender<Message>, msg: &StoreMessage) {
    if let Ok(bytes) = store::encode(msg) {
        let _ = tx.send(Message::Binary(bytes.into()));
    }
}

/// Encodes and sends a store message directly on a WebSocket sender.
async fn send_store_msg(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    msg: &StoreMessage,
) -> Result<(), String> {
    let bytes = store::encode(msg).map_err(|e| e.to_string())?;
    ws_sender
        .send(Message::Binary(bytes.into()))
        .await
        .map_err(|e| format!("WebSocket send error: {e}"))
}

/// Starts the store server on the given address and returns the bound
/// address and a join handle.
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(StoreState::new())).await
}

/// Starts the store server with a pre-constructed [`StoreState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<StoreState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "store server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<StoreState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
