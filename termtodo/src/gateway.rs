//! Task mutation gateway.
//!
//! Translates user intents into single remote writes against the store.
//! There is no optimistic local update: the store's pushed snapshot is the
//! only thing that ever changes the visible list. Text validation happens
//! here, client-side, before anything touches the wire.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::SinkExt;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

use termtodo_proto::store::{self, StoreMessage};
use termtodo_proto::task::{MAX_TASK_TEXT_LENGTH, TaskId};

use crate::client::WsSender;

/// Errors produced by the mutation gateway.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Task text cannot be empty or whitespace-only. Nothing was sent.
    #[error("task text cannot be empty")]
    TextEmpty,
    /// Task text exceeds the maximum length. Nothing was sent.
    #[error("task text too long (max {MAX_TASK_TEXT_LENGTH} characters)")]
    TextTooLong,
    /// The connection to the store is down.
    #[error("store connection closed")]
    ConnectionClosed,
    /// The write could not be sent.
    #[error("store send failed: {0}")]
    Send(String),
}

/// The four task mutations, each a fire-and-forget write to the store.
///
/// Cheap to clone; all clones share the session's connection.
#[derive(Clone)]
pub struct MutationGateway {
    ws_sender: Arc<Mutex<WsSender>>,
    connected: Arc<AtomicBool>,
}

impl MutationGateway {
    /// Builds a gateway over an established connection's write half.
    pub(crate) fn new(ws_sender: Arc<Mutex<WsSender>>, connected: Arc<AtomicBool>) -> Self {
        Self {
            ws_sender,
            connected,
        }
    }

    /// Validates task text: non-blank after trimming, within length limit.
    fn validate_text(text: &str) -> Result<(), GatewayError> {
        if text.trim().is_empty() {
            return Err(GatewayError::TextEmpty);
        }
        if text.chars().count() > MAX_TASK_TEXT_LENGTH {
            return Err(GatewayError::TextTooLong);
        }
        Ok(())
    }

    /// Creates a task.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TextEmpty`] / [`GatewayError::TextTooLong`]
    /// without issuing a write, or a send error if the connection is down.
    pub async fn create(
        &self,
        text: &str,
        due_date: Option<String>,
    ) -> Result<(), GatewayError> {
        Self::validate_text(text)?;
        self.send(&StoreMessage::Create {
            text: text.to_string(),
            due_date,
        })
        .await
    }

    /// Flips the completion flag of a task.
    ///
    /// # Errors
    ///
    /// Returns a send error if the connection is down.
    pub async fn toggle(&self, task_id: TaskId) -> Result<(), GatewayError> {
        self.send(&StoreMessage::Toggle { task_id }).await
    }

    /// Overwrites a task's text and due date.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TextEmpty`] / [`GatewayError::TextTooLong`]
    /// without issuing a write, or a send error if the connection is down.
    pub async fn edit(
        &self,
        task_id: TaskId,
        text: &str,
        due_date: Option<String>,
    ) -> Result<(), GatewayError> {
        Self::validate_text(text)?;
        self.send(&StoreMessage::Edit {
            task_id,
            text: text.to_string(),
            due_date,
        })
        .await
    }

    /// Removes a task. No local precondition check; deleting an id that is
    /// no longer present is a no-op on the store side.
    ///
    /// # Errors
    ///
    /// Returns a send error if the connection is down.
    pub async fn delete(&self, task_id: TaskId) -> Result<(), GatewayError> {
        self.send(&StoreMessage::Delete { task_id }).await
    }

    /// Encodes and sends a mutation on the shared write half.
    async fn send(&self, msg: &StoreMessage) -> Result<(), GatewayError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(GatewayError::ConnectionClosed);
        }
        let bytes = store::encode(msg).map_err(|e| GatewayError::Send(e.to_string()))?;
        let mut sender = self.ws_sender.lock().await;
        sender
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| {
                tracing::warn!(err = %e, "mutation send failed");
                self.connected.store(false, Ordering::Relaxed);
                GatewayError::ConnectionClosed
            })
    }
}
