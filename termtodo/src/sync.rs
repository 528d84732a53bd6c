//! Live task list synchronization.
//!
//! A [`Subscription`] is a cancellable handle over the store's live query:
//! it yields full-state snapshots pushed by the store, each one sorted into
//! display order before it reaches the consumer. Snapshots replace the
//! prior list entirely; there is no merging.

use tokio::sync::mpsc;

use termtodo_proto::task::{Task, sort_snapshot};

/// A cancellable handle yielding sorted full-state snapshots.
///
/// Obtained from [`crate::client::StoreClient::subscribe`]. Exactly one
/// subscription exists per session. The stream ends (`recv()` returns
/// `None`) when the connection to the store is lost; [`Subscription::close`]
/// ends it early and discards any buffered pushes.
pub struct Subscription {
    rx: mpsc::Receiver<Vec<Task>>,
}

impl Subscription {
    /// Wraps the raw snapshot channel.
    #[must_use]
    pub(crate) fn new(rx: mpsc::Receiver<Vec<Task>>) -> Self {
        Self { rx }
    }

    /// Receives the next snapshot, sorted ascending by creation time with
    /// unresolvable timestamps first.
    ///
    /// Returns `None` once the subscription is closed or the connection to
    /// the store is lost.
    pub async fn recv(&mut self) -> Option<Vec<Task>> {
        let mut tasks = self.rx.recv().await?;
        sort_snapshot(&mut tasks);
        Some(tasks)
    }

    /// Tears the subscription down.
    ///
    /// Already-buffered pushes are discarded and subsequent `recv()` calls
    /// return `None` once the buffer drains. Dropping the handle has the
    /// same effect.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
