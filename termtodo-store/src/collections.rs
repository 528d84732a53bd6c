//! Per-identity task collections.
//!
//! The authoritative task state: one independent `TaskId → Task` map per
//! identity, guarded by an [`RwLock`]. Mutations validate input, stamp
//! server-observed creation timestamps, and return the information the
//! connection layer needs to acknowledge and re-snapshot.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;

use termtodo_proto::task::{MAX_TASK_TEXT_LENGTH, Task, TaskId};

/// Errors that can occur when mutating a task collection.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CollectionError {
    /// Task text cannot be empty or whitespace-only.
    #[error("task text cannot be empty")]
    TextEmpty,
    /// Task text exceeds the maximum length.
    #[error("task text too long (max {MAX_TASK_TEXT_LENGTH} characters)")]
    TextTooLong,
    /// Task with the given ID was not found in the identity's collection.
    #[error("task not found: {0}")]
    TaskNotFound(String),
}

/// In-memory per-identity task maps.
pub struct TaskCollections {
    tasks: RwLock<HashMap<String, HashMap<TaskId, Task>>>,
}

impl Default for TaskCollections {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskCollections {
    /// Creates empty collections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the current timestamp in milliseconds since epoch.
    fn now_ms() -> u64 {
        u64::try_from(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
        )
        .unwrap_or(u64::MAX)
    }

    /// Validates task text: non-blank after trimming, within length limit.
    fn validate_text(text: &str) -> Result<(), CollectionError> {
        if text.trim().is_empty() {
            return Err(CollectionError::TextEmpty);
        }
        if text.chars().count() > MAX_TASK_TEXT_LENGTH {
            return Err(CollectionError::TextTooLong);
        }
        Ok(())
    }

    /// Creates a task in the identity's collection.
    ///
    /// Stamps `created_at` with the server clock; `completed` starts false.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::TextEmpty`] for blank text or
    /// [`CollectionError::TextTooLong`] past the length limit.
    pub async fn create(
        &self,
        identity: &str,
        text: &str,
        due_date: Option<String>,
    ) -> Result<Task, CollectionError> {
        Self::validate_text(text)?;

        let task = Task {
            id: TaskId::new(),
            text: text.to_string(),
            completed: false,
            created_at: Some(Self::now_ms()),
            due_date,
        };

        let mut tasks = self.tasks.write().await;
        tasks
            .entry(identity.to_string())
            .or_default()
            .insert(task.id.clone(), task.clone());
        drop(tasks);

        Ok(task)
    }

    /// Flips the completion flag of a task.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::TaskNotFound`] if the identity has no
    /// task with the given id.
    pub async fn toggle(&self, identity: &str, task_id: &TaskId) -> Result<bool, CollectionError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(identity)
            .and_then(|collection| collection.get_mut(task_id))
            .ok_or_else(|| CollectionError::TaskNotFound(task_id.to_string()))?;
        task.completed = !task.completed;
        Ok(task.completed)
    }

    /// Overwrites a task's text and due date.
    ///
    /// `created_at` and `completed` are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::TextEmpty`] / [`CollectionError::TextTooLong`]
    /// for invalid text, or [`CollectionError::TaskNotFound`] for an
    /// unknown id.
    pub async fn edit(
        &self,
        identity: &str,
        task_id: &TaskId,
        text: &str,
        due_date: Option<String>,
    ) -> Result<(), CollectionError> {
        Self::validate_text(text)?;

        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(identity)
            .and_then(|collection| collection.get_mut(task_id))
            .ok_or_else(|| CollectionError::TaskNotFound(task_id.to_string()))?;
        task.text = text.to_string();
        task.due_date = due_date;
        Ok(())
    }

    /// Removes a task, returning whether it existed.
    ///
    /// Removing an unknown id is a silent no-op from the caller's
    /// perspective; the request is still acknowledged.
    pub async fn delete(&self, identity: &str, task_id: &TaskId) -> bool {
        let mut tasks = self.tasks.write().await;
        tasks
            .get_mut(identity)
            .is_some_and(|collection| collection.remove(task_id).is_some())
    }

    /// Clones the identity's current task set, unordered.
    ///
    /// Returns an empty vec for an identity with no tasks.
    pub async fn snapshot(&self, identity: &str) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        tasks
            .get(identity)
            .map(|collection| collection.values().cloned().collect())
            .unwrap_or_default()
    }
}
