//! WebSocket connection to the task store.
//!
//! [`StoreClient::connect`] performs the anonymous session bootstrap
//! (`Hello` → `Welcome`), spawns a background reader that fans incoming
//! frames out to the snapshot and acknowledgment channels, and hands out
//! the [`Subscription`] and [`MutationGateway`] halves built on top of the
//! shared connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use termtodo_proto::store::{self, MutationOp, StoreMessage};
use termtodo_proto::task::Task;

use crate::gateway::MutationGateway;
use crate::sync::Subscription;

/// Type alias for the write half of a WebSocket connection.
pub(crate) type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Buffer size for the snapshot and acknowledgment channels.
const CHANNEL_CAPACITY: usize = 64;

/// Errors produced by the store connection.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connecting or the session handshake timed out.
    #[error("store operation timed out")]
    Timeout,
    /// The store URL could not be resolved or connected.
    #[error("store unreachable")]
    Unreachable,
    /// The connection to the store is closed.
    #[error("store connection closed")]
    ConnectionClosed,
    /// The session handshake failed.
    #[error("session handshake failed: {0}")]
    Handshake(String),
    /// An underlying I/O or WebSocket error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Connection timing knobs, resolved from the client configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConnectTimeouts {
    /// Timeout for establishing the WebSocket connection.
    pub connect: Duration,
    /// Timeout for the `Hello` → `Welcome` session handshake.
    pub handshake: Duration,
}

impl Default for ConnectTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            handshake: Duration::from_secs(5),
        }
    }
}

/// An established, session-scoped connection to the task store.
///
/// Created via [`StoreClient::connect`], which bootstraps the anonymous
/// session and spawns a background reader task. The connection is shared
/// by the [`Subscription`] (snapshots in) and the [`MutationGateway`]
/// (writes out).
pub struct StoreClient {
    /// The identity the store granted this session.
    identity: String,
    /// The session token to persist for resumption on the next run.
    token: String,
    /// Write half of the WebSocket connection (shared for concurrent sends).
    ws_sender: Arc<Mutex<WsSender>>,
    /// Snapshot channel receiver, taken once by [`StoreClient::subscribe`].
    snapshots: Option<mpsc::Receiver<Vec<Task>>>,
    /// Acknowledgment channel receiver, taken once by [`StoreClient::take_acks`].
    acks: Option<mpsc::Receiver<MutationOp>>,
    /// Whether the WebSocket connection to the store is active.
    connected: Arc<AtomicBool>,
    /// Handle to the background reader task (kept alive for the client's lifetime).
    _reader_handle: tokio::task::JoinHandle<()>,
}

impl StoreClient {
    /// Connect to the store and bootstrap an anonymous session.
    ///
    /// Performs the following steps:
    /// 1. Establishes a WebSocket connection to `store_url` (connect timeout)
    /// 2. Sends `Hello` with the persisted session token, if any
    /// 3. Waits for `Welcome` (handshake timeout)
    /// 4. Spawns a background task to read incoming frames
    ///
    /// # Errors
    ///
    /// - [`ClientError::Timeout`] if connection or handshake times out.
    /// - [`ClientError::Unreachable`] if the store URL cannot be connected.
    /// - [`ClientError::Handshake`] if the store rejects the session or
    ///   replies with something other than `Welcome`.
    pub async fn connect(
        store_url: &str,
        token: Option<String>,
        timeouts: ConnectTimeouts,
    ) -> Result<Self, ClientError> {
        // Step 1: Connect to the store WebSocket URL with a timeout.
        let (ws_stream, _response) = tokio::time::timeout(timeouts.connect, connect_async(store_url))
            .await
            .map_err(|_| {
                tracing::warn!(url = store_url, "store WebSocket connect timed out");
                ClientError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(url = store_url, err = %e, "store WebSocket connect failed");
                map_ws_connect_error(&e)
            })?;

        // Step 2: Split into sender and receiver halves and send Hello.
        let (mut ws_sender, mut ws_reader) = ws_stream.split();

        let resumed = token.is_some();
        let hello = StoreMessage::Hello { token };
        let hello_bytes =
            store::encode(&hello).map_err(|e| ClientError::Io(std::io::Error::other(e)))?;
        ws_sender
            .send(Message::Binary(hello_bytes.into()))
            .await
            .map_err(|e| {
                tracing::warn!(err = %e, "failed to send Hello message");
                ClientError::Io(std::io::Error::other(format!("failed to send Hello: {e}")))
            })?;

        // Step 3: Wait for Welcome with a timeout.
        let reply = tokio::time::timeout(timeouts.handshake, ws_reader.next())
            .await
            .map_err(|_| {
                tracing::warn!(url = store_url, "session handshake timed out");
                ClientError::Timeout
            })?;

        let (identity, token) = match reply {
            Some(Ok(Message::Binary(data))) => match store::decode(&data) {
                Ok(StoreMessage::Welcome { identity, token }) => {
                    tracing::info!(
                        identity = %identity,
                        resumed = resumed,
                        "session established with store"
                    );
                    (identity, token)
                }
                Ok(StoreMessage::Error { reason }) => {
                    tracing::warn!(reason = %reason, "store rejected session");
                    return Err(ClientError::Handshake(reason));
                }
                Ok(other) => {
                    tracing::warn!(?other, "unexpected store response during handshake");
                    return Err(ClientError::Handshake(
                        "unexpected response during handshake".to_string(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(err = %e, "malformed handshake response");
                    return Err(ClientError::Handshake(format!(
                        "malformed handshake response: {e}"
                    )));
                }
            },
            Some(Ok(Message::Close(_))) | None => {
                tracing::warn!("store closed connection during handshake");
                return Err(ClientError::ConnectionClosed);
            }
            Some(Ok(_)) => {
                tracing::warn!("unexpected non-binary frame during handshake");
                return Err(ClientError::Handshake(
                    "unexpected non-binary frame during handshake".to_string(),
                ));
            }
            Some(Err(e)) => {
                tracing::warn!(err = %e, "WebSocket error during handshake");
                return Err(ClientError::Io(std::io::Error::other(format!(
                    "WebSocket error during handshake: {e}"
                ))));
            }
        };

        // Step 4: Spawn the background reader task.
        let (snapshot_tx, snapshot_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (ack_tx, ack_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(true));
        let reader_connected = Arc::clone(&connected);

        let reader_handle = tokio::spawn(reader_loop(
            ws_reader,
            snapshot_tx,
            ack_tx,
            reader_connected,
        ));

        Ok(Self {
            identity,
            token,
            ws_sender: Arc::new(Mutex::new(ws_sender)),
            snapshots: Some(snapshot_rx),
            acks: Some(ack_rx),
            connected,
            _reader_handle: reader_handle,
        })
    }

    /// The identity the store granted this session.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The session token to persist for resumption on the next run.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Whether the connection to the store is still active.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Opens the live query over this identity's task collection.
    ///
    /// Sends `Subscribe` and returns the [`Subscription`] handle yielding
    /// sorted full-state snapshots. Exactly one subscription exists per
    /// client; calling this a second time fails.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectionClosed`] if the connection is down
    /// or the subscription was already taken.
    pub async fn subscribe(&mut self) -> Result<Subscription, ClientError> {
        let rx = self.snapshots.take().ok_or(ClientError::ConnectionClosed)?;
        self.send(&StoreMessage::Subscribe).await?;
        Ok(Subscription::new(rx))
    }

    /// Returns the mutation gateway sharing this connection.
    #[must_use]
    pub fn gateway(&self) -> MutationGateway {
        MutationGateway::new(Arc::clone(&self.ws_sender), Arc::clone(&self.connected))
    }

    /// Takes the acknowledgment receiver. Yields one [`MutationOp`] per
    /// mutation the store confirmed. Can only be taken once.
    pub fn take_acks(&mut self) -> Option<mpsc::Receiver<MutationOp>> {
        self.acks.take()
    }

    /// Encodes and sends a store message on the shared write half.
    pub(crate) async fn send(&self, msg: &StoreMessage) -> Result<(), ClientError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(ClientError::ConnectionClosed);
        }
        let bytes = store::encode(msg).map_err(|e| ClientError::Io(std::io::Error::other(e)))?;
        let mut sender = self.ws_sender.lock().await;
        sender
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| {
                tracing::warn!(err = %e, "store send failed");
                self.connected.store(false, Ordering::Relaxed);
                ClientError::ConnectionClosed
            })
    }
}

/// Background task that reads WebSocket frames and dispatches them.
///
/// Routes `Snapshot` frames to the snapshot channel and `Ack` frames to the
/// acknowledgment channel. `Error` frames are logged only: the store reports
/// rejected operations this way and the UI deliberately does not surface
/// them. Malformed frames are logged and skipped; the task does not
/// disconnect on bad data.
///
/// Sets `connected` to `false` when the WebSocket closes or errors out.
async fn reader_loop(
    mut ws_reader: WsReader,
    snapshot_tx: mpsc::Sender<Vec<Task>>,
    ack_tx: mpsc::Sender<MutationOp>,
    connected: Arc<AtomicBool>,
) {
    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Binary(data)) => match store::decode(&data) {
                Ok(StoreMessage::Snapshot { tasks }) => {
                    if snapshot_tx.send(tasks).await.is_err() {
                        // Subscription dropped and client gone; exit.
                        break;
                    }
                }
                Ok(StoreMessage::Ack { op }) => {
                    if ack_tx.send(op).await.is_err() {
                        break;
                    }
                }
                Ok(StoreMessage::Error { reason }) => {
                    tracing::warn!(reason = %reason, "store rejected operation");
                }
                Ok(other) => {
                    tracing::debug!(?other, "unexpected store message type");
                }
                Err(e) => {
                    // Malformed frame: log and skip, don't disconnect.
                    tracing::warn!(err = %e, "malformed store frame, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("store WebSocket closed by server");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Text(_) | Message::Frame(_)) => {
                // Ignore control, text, and raw frames.
            }
            Err(e) => {
                tracing::warn!(err = %e, "store WebSocket read error");
                break;
            }
        }
    }
    connected.store(false, Ordering::Relaxed);
    tracing::info!("store reader task exiting");
}

/// Map a `tokio_tungstenite` connection error to a [`ClientError`].
fn map_ws_connect_error(err: &tokio_tungstenite::tungstenite::Error) -> ClientError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => {
            // DNS/network failures surface as io errors.
            if io_err.kind() == std::io::ErrorKind::ConnectionRefused
                || io_err.kind() == std::io::ErrorKind::AddrNotAvailable
            {
                ClientError::Unreachable
            } else {
                ClientError::Io(std::io::Error::new(io_err.kind(), io_err.to_string()))
            }
        }
        WsError::Url(_) => ClientError::Unreachable,
        WsError::Http(response) => ClientError::Io(std::io::Error::other(format!(
            "store HTTP error: status {}",
            response.status()
        ))),
        other => ClientError::Io(std::io::Error::other(format!(
            "store connection error: {other}"
        ))),
    }
}
