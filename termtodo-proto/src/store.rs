//! Store wire protocol types for the `TermTodo` task store.
//!
//! Defines the [`StoreMessage`] enum that is postcard-encoded and sent
//! over WebSocket binary frames between clients and the store server.

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId};

/// Error type for wire encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Serialization or deserialization failed.
    #[error("wire serialization error: {0}")]
    Serialization(String),
}

/// Which mutation a store acknowledgment refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationOp {
    /// A task was created.
    Create,
    /// A task's completion flag was flipped.
    Toggle,
    /// A task's text and due date were overwritten.
    Edit,
    /// A task was removed.
    Delete,
}

impl std::fmt::Display for MutationOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Toggle => write!(f, "toggle"),
            Self::Edit => write!(f, "edit"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Messages exchanged between a `TermTodo` client and the store server.
///
/// The protocol is session-scoped: a connection first identifies itself
/// with `Hello`, after which every operation implicitly targets the
/// collection of the identity the store granted in `Welcome`. A client
/// can never address another identity's tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreMessage {
    /// Client requests a session.
    ///
    /// Must be the first message sent after the WebSocket connection.
    /// `token: None` requests a fresh anonymous identity; `Some` asks to
    /// resume a previous session. An unknown token is not an error; the
    /// store silently issues a fresh identity.
    Hello {
        /// Persisted session token from a previous run, if any.
        token: Option<String>,
    },

    /// Store grants a session.
    Welcome {
        /// The stable identity identifier scoping this connection.
        identity: String,
        /// Session token to persist for resumption on the next run.
        token: String,
    },

    /// Client opens the live query over its own task collection.
    ///
    /// The store replies with the current [`StoreMessage::Snapshot`]
    /// immediately and pushes a fresh one after every mutation. At most
    /// one subscriber per identity; a new subscription replaces the old.
    Subscribe,

    /// Full replacement state of the subscriber's collection.
    ///
    /// Unordered on the wire; receivers sort by creation time.
    Snapshot {
        /// Every task currently in the collection.
        tasks: Vec<Task>,
    },

    /// Create a task. Blank text is rejected with an error reply.
    Create {
        /// The task label.
        text: String,
        /// Optional due date-time string; `None` when no due date was set.
        due_date: Option<String>,
    },

    /// Flip the completion flag of a task.
    Toggle {
        /// Which task to toggle.
        task_id: TaskId,
    },

    /// Overwrite a task's text and due date. Blank text is rejected.
    Edit {
        /// Which task to edit.
        task_id: TaskId,
        /// Replacement label.
        text: String,
        /// Replacement due date; `None` clears it.
        due_date: Option<String>,
    },

    /// Remove a task. Deleting an unknown id is acknowledged as a no-op.
    Delete {
        /// Which task to delete.
        task_id: TaskId,
    },

    /// Store confirms a mutation was applied.
    Ack {
        /// Which operation completed.
        op: MutationOp,
    },

    /// Store reports a rejected operation or protocol violation.
    Error {
        /// Human-readable error description.
        reason: String,
    },
}

/// Encodes a [`StoreMessage`] into bytes using postcard.
///
/// # Errors
///
/// Returns [`WireError::Serialization`] if the message cannot be serialized.
pub fn encode(msg: &StoreMessage) -> Result<Vec<u8>, WireError> {
    postcard::to_allocvec(msg).map_err(|e| WireError::Serialization(e.to_string()))
}

/// Decodes a [`StoreMessage`] from bytes using postcard.
///
/// # Errors
///
/// Returns [`WireError::Serialization`] if the bytes cannot be deserialized.
pub fn decode(bytes: &[u8]) -> Result<StoreMessage, WireError> {
    postcard::from_bytes(bytes).map_err(|e| WireError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskId;

    fn make_task(text: &str) -> Task {
        Task {
            id: TaskId::new(),
            text: text.to_string(),
            completed: false,
            created_at: Some(1000),
            due_date: None,
        }
    }

    #[test]
    fn round_trip_hello_without_token() {
        let msg = StoreMessage::Hello { token: None };
        let bytes = encode(&msg).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(msg, decoded);
    }

    #[test]
    fn round_trip_hello_with_token() {
        let msg = StoreMessage::Hello {
            token: Some("session-abc".to_string()),
        };
        let bytes = encode(&msg).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(msg, decoded);
    }

    #[test]
    fn round_trip_welcome() {
        let msg = StoreMessage::Welcome {
            identity: "identity-1".to_string(),
            token: "token-1".to_string(),
        };
        let bytes = encode(&msg).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(msg, decoded);
    }

    #[test]
    fn round_trip_subscribe() {
        let msg = StoreMessage::Subscribe;
        let bytes = encode(&msg).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(msg, decoded);
    }

    #[test]
    fn round_trip_snapshot_empty() {
        let msg = StoreMessage::Snapshot { tasks: vec![] };
        let bytes = encode(&msg).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(msg, decoded);
    }

    #[test]
    fn round_trip_snapshot_with_tasks() {
        let msg = StoreMessage::Snapshot {
            tasks: vec![make_task("Buy milk"), make_task("Water plants")],
        };
        let bytes = encode(&msg).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(msg, decoded);
    }

    #[test]
    fn round_trip_create_with_due_date() {
        let msg = StoreMessage::Create {
            text: "Pay rent".to_string(),
            due_date: Some("2026-09-01T09:00".to_string()),
        };
        let bytes = encode(&msg).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(msg, decoded);
    }

    #[test]
    fn round_trip_toggle() {
        let msg = StoreMessage::Toggle {
            task_id: TaskId::new(),
        };
        let bytes = encode(&msg).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(msg, decoded);
    }

    #[test]
    fn round_trip_edit_clearing_due_date() {
        let msg = StoreMessage::Edit {
            task_id: TaskId::new(),
            text: "New label".to_string(),
            due_date: None,
        };
        let bytes = encode(&msg).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(msg, decoded);
    }

    #[test]
    fn round_trip_delete() {
        let msg = StoreMessage::Delete {
            task_id: TaskId::new(),
        };
        let bytes = encode(&msg).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(msg, decoded);
    }

    #[test]
    fn round_trip_ack_all_ops() {
        for op in [
            MutationOp::Create,
            MutationOp::Toggle,
            MutationOp::Edit,
            MutationOp::Delete,
        ] {
            let msg = StoreMessage::Ack { op };
            let bytes = encode(&msg).expect("encode");
            let decoded = decode(&bytes).expect("decode");
            assert_eq!(msg, decoded);
        }
    }

    #[test]
    fn round_trip_error() {
        let msg = StoreMessage::Error {
            reason: "task text cannot be empty".to_string(),
        };
        let bytes = encode(&msg).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(msg, decoded);
    }

    #[test]
    fn mutation_op_display() {
        assert_eq!(MutationOp::Create.to_string(), "create");
        assert_eq!(MutationOp::Toggle.to_string(), "toggle");
        assert_eq!(MutationOp::Edit.to_string(), "edit");
        assert_eq!(MutationOp::Delete.to_string(), "delete");
    }

    #[test]
    fn decode_corrupted_bytes_fails() {
        let result = decode(&[0xFF, 0xFE, 0xFD, 0xFC]);
        assert!(result.is_err());
    }

    #[test]
    fn decode_empty_bytes_fails() {
        let result = decode(&[]);
        assert!(result.is_err());
    }

    #[test]
    fn decode_truncated_snapshot_fails() {
        let msg = StoreMessage::Snapshot {
            tasks: vec![make_task("truncation test")],
        };
        let bytes = encode(&msg).expect("encode");
        let truncated = &bytes[..bytes.len() / 2];
        assert!(decode(truncated).is_err());
    }
}
