//! `TermTodo` task store server library.
//!
//! Exposes the store server for use in tests and embedding. The store
//! issues anonymous identities, holds per-identity task collections, and
//! pushes full-snapshot updates to each identity's live subscriber.

pub mod collections;
pub mod config;
pub mod server;
pub mod sessions;
