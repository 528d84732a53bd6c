//! Task data model shared between the `TermTodo` client and store.
//!
//! A [`Task`] is a plain value: the store is the single source of truth and
//! every change arrives as a full replacement snapshot, so there is no
//! merge metadata on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum allowed task text length in characters.
pub const MAX_TASK_TEXT_LENGTH: usize = 256;

/// Unique identifier for a task, based on UUID v7 for time-ordering.
///
/// Assigned by the store at creation; opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new time-ordered task identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `TaskId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single to-do item in an identity's collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier (UUID v7, store-assigned).
    pub id: TaskId,
    /// User-supplied label. Never empty or whitespace-only once stored.
    pub text: String,
    /// Completion flag; `false` at creation.
    pub completed: bool,
    /// Store-observed creation time (milliseconds since epoch).
    ///
    /// Set once by the store and never updated. `None` marks a timestamp
    /// the receiver could not resolve; such tasks sort as time zero.
    pub created_at: Option<u64>,
    /// Optional user-supplied due date-time string. Absence is an explicit
    /// `None` on the wire, never a missing field.
    pub due_date: Option<String>,
}

impl Task {
    /// The sort key for snapshot ordering: creation time ascending, with
    /// unresolvable timestamps first.
    #[must_use]
    pub fn sort_key(&self) -> u64 {
        self.created_at.unwrap_or(0)
    }
}

/// Sorts a snapshot in display order: ascending by creation time, tasks
/// without a resolvable timestamp first. Ties break on the time-ordered id.
pub fn sort_snapshot(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.sort_key()
            .cmp(&b.sort_key())
            .then_with(|| a.id.cmp(&b.id))
    });
}
