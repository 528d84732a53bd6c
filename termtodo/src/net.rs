//! Networking coordinator for wiring the TUI to the async store client.
//!
//! This module bridges the synchronous TUI event loop (crossterm
//! poll-based) with the async [`StoreClient`] stack. It spawns background
//! tokio tasks and communicates with the main thread via [`NetCommand`] /
//! [`NetEvent`] channels.
//!
//! # Architecture
//!
//! ```text
//! TUI (main thread)  ←── NetEvent ───  tokio background tasks
//!                     ─── NetCommand →
//! ```
//!
//! The main thread sends [`NetCommand`]s (task mutations) and drains
//! [`NetEvent`]s (snapshots, acks, connection status) on each tick of the
//! poll-based event loop.

use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};

use termtodo_proto::store::MutationOp;
use termtodo_proto::task::{Task, TaskId};

use crate::client::{ConnectTimeouts, StoreClient};
use crate::gateway::MutationGateway;
use crate::session;
use crate::sync::Subscription;

/// Commands sent from the TUI main loop to the networking background tasks.
#[derive(Debug)]
pub enum NetCommand {
    /// Create a task.
    Create {
        /// The task label.
        text: String,
        /// Optional due date-time string.
        due_date: Option<String>,
    },
    /// Flip a task's completion flag.
    Toggle {
        /// Which task to toggle.
        task_id: TaskId,
    },
    /// Overwrite a task's text and due date.
    Edit {
        /// Which task to edit.
        task_id: TaskId,
        /// Replacement label.
        text: String,
        /// Replacement due date; `None` clears it.
        due_date: Option<String>,
    },
    /// Remove a task.
    Delete {
        /// Which task to delete.
        task_id: TaskId,
    },
    /// Gracefully shut down the networking tasks.
    Shutdown,
}

/// Events sent from the networking background tasks to the TUI main loop.
#[derive(Debug)]
pub enum NetEvent {
    /// The session handshake completed and an identity is established.
    SessionReady {
        /// The store-granted identity identifier.
        identity: String,
    },
    /// A full-state snapshot was pushed, already in display order.
    Snapshot {
        /// The complete replacement task list.
        tasks: Vec<Task>,
    },
    /// The store acknowledged a mutation.
    MutationDone {
        /// Which operation completed.
        op: MutationOp,
    },
    /// The connection to the store was lost.
    ConnectionLost,
    /// An error occurred in the networking layer.
    Error(String),
}

/// Configuration for the networking layer.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// WebSocket URL of the store server (e.g., `ws://127.0.0.1:9400/ws`).
    pub store_url: String,
    /// Session file override; `None` uses the default data-dir path.
    pub session_file: Option<PathBuf>,
    /// Connect and handshake timeouts.
    pub timeouts: ConnectTimeouts,
    /// Channel capacity for command/event mpsc channels.
    pub channel_capacity: usize,
}

/// Default channel capacity for commands and events.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

impl NetConfig {
    /// Creates a `NetConfig` with default timeouts and channel capacity.
    #[must_use]
    pub fn new(store_url: String) -> Self {
        Self {
            store_url,
            session_file: None,
            timeouts: ConnectTimeouts::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Spawn the networking background tasks and return channel handles.
///
/// This loads any persisted session token, connects to the store and
/// performs the anonymous session bootstrap, persists the granted token,
/// opens the live subscription, and spawns:
///
/// 1. A **snapshot loop** draining the [`Subscription`] into
///    [`NetEvent::Snapshot`]s, closing the handle on shutdown.
/// 2. An **ack forwarder** mapping store acknowledgments to
///    [`NetEvent::MutationDone`].
/// 3. A **command handler** dispatching [`NetCommand`]s through the
///    [`MutationGateway`].
///
/// # Errors
///
/// Returns an error string if connection or the session handshake fails.
/// The caller should fall back to the disconnected UI state on error.
pub async fn spawn_net(
    config: NetConfig,
) -> Result<(mpsc::Sender<NetCommand>, mpsc::Receiver<NetEvent>), String> {
    // Resolve the session file and load any persisted token.
    let session_path = config
        .session_file
        .clone()
        .or_else(session::default_session_path);
    let token = session_path.as_deref().and_then(session::load_token);

    // Connect to the store and bootstrap the session.
    let mut client = StoreClient::connect(&config.store_url, token, config.timeouts)
        .await
        .map_err(|e| format!("store connection failed: {e}"))?;

    // Persist the granted token; failure is logged and otherwise ignored.
    if let Some(ref path) = session_path {
        if let Err(e) = session::save_token(path, client.token()) {
            tracing::warn!(error = %e, "failed to persist session token");
        }
    } else {
        tracing::warn!("no data directory available, session will not persist");
    }

    let identity = client.identity().to_string();

    // Open the live subscription and take the connection halves.
    let subscription = client
        .subscribe()
        .await
        .map_err(|e| format!("subscription failed: {e}"))?;
    let acks = client
        .take_acks()
        .ok_or_else(|| "acknowledgment channel already taken".to_string())?;
    let gateway = client.gateway();

    // Create the command/event channels for TUI communication.
    let (cmd_tx, cmd_rx) = mpsc::channel::<NetCommand>(config.channel_capacity);
    let (evt_tx, evt_rx) = mpsc::channel::<NetEvent>(config.channel_capacity);

    // Announce the established session.
    let _ = evt_tx.send(NetEvent::SessionReady { identity }).await;

    // Shutdown signal: command handler fires it, snapshot loop listens.
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let snapshot_evt_tx = evt_tx.clone();
    tokio::spawn(async move {
        snapshot_loop(subscription, snapshot_evt_tx, shutdown_rx).await;
    });

    let ack_evt_tx = evt_tx.clone();
    tokio::spawn(async move {
        ack_forwarder(acks, ack_evt_tx).await;
    });

    tokio::spawn(async move {
        command_handler(gateway, cmd_rx, evt_tx, shutdown_tx).await;
    });

    Ok((cmd_tx, evt_rx))
}

/// Background task: drain the subscription into snapshot events.
///
/// Ends when the subscription stream ends (connection lost, forwarded as
/// [`NetEvent::ConnectionLost`]) or the shutdown signal fires, in which
/// case the handle is closed explicitly.
async fn snapshot_loop(
    mut subscription: Subscription,
    evt_tx: mpsc::Sender<NetEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            maybe_snapshot = subscription.recv() => match maybe_snapshot {
                Some(tasks) => {
                    if evt_tx.send(NetEvent::Snapshot { tasks }).await.is_err() {
                        // TUI dropped; exit.
                        break;
                    }
                }
                None => {
                    tracing::warn!("subscription stream ended");
                    let _ = evt_tx.send(NetEvent::ConnectionLost).await;
                    break;
                }
            },
            _ = &mut shutdown_rx => {
                subscription.close();
                tracing::info!("subscription closed on shutdown");
                break;
            }
        }
    }
}

/// Background task: forward store acknowledgments to the TUI.
async fn ack_forwarder(
    mut acks: mpsc::Receiver<MutationOp>,
    evt_tx: mpsc::Sender<NetEvent>,
) {
    while let Some(op) = acks.recv().await {
        if evt_tx.send(NetEvent::MutationDone { op }).await.is_err() {
            break;
        }
    }
}

/// Background task: handle commands from the TUI main loop.
///
/// Dispatches mutations through the gateway. Failures are logged and
/// forwarded as [`NetEvent::Error`]. No retry, no rollback; the UI simply
/// does not advance until a snapshot or ack says otherwise.
async fn command_handler(
    gateway: MutationGateway,
    mut cmd_rx: mpsc::Receiver<NetCommand>,
    evt_tx: mpsc::Sender<NetEvent>,
    shutdown_tx: oneshot::Sender<()>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        let result = match cmd {
            NetCommand::Create { text, due_date } => gateway.create(&text, due_date).await,
            NetCommand::Toggle { task_id } => gateway.toggle(task_id).await,
            NetCommand::Edit {
                task_id,
                text,
                due_date,
            } => gateway.edit(task_id, &text, due_date).await,
            NetCommand::Delete { task_id } => gateway.delete(task_id).await,
            NetCommand::Shutdown => {
                tracing::info!("net command handler shutting down");
                break;
            }
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "mutation failed");
            let _ = evt_tx.send(NetEvent::Error(e.to_string())).await;
        }
    }
    let _ = shutdown_tx.send(());
}
