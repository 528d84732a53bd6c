//! Anonymous session issuance for the store server.
//!
//! Maps opaque session tokens to stable identity identifiers. A client
//! presenting no token (or one the store does not recognize) is silently
//! granted a fresh identity; a known token resumes its identity. Entries
//! are ephemeral, lost on store restart, same as the task collections.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

/// A granted session: the identity plus the token that resumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Stable identity identifier scoping a task collection.
    pub identity: String,
    /// Opaque token the client persists to resume this identity.
    pub token: String,
}

/// In-memory token → identity directory.
///
/// Thread-safe via [`RwLock`]. Tokens and identities are both UUID v7
/// strings; the token is the secret half, the identity is what scopes
/// collection access.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, String>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Creates a new, empty session registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves a presented token to a session.
    ///
    /// A known token resumes its identity and echoes the same token back.
    /// `None` or an unknown token mints a fresh (identity, token) pair;
    /// an unknown token is deliberately not an error, so a client holding
    /// a stale token from before a restart still gets a working session.
    pub async fn resolve(&self, token: Option<&str>) -> Session {
        if let Some(token) = token {
            let sessions = self.sessions.read().await;
            if let Some(identity) = sessions.get(token) {
                return Session {
                    identity: identity.clone(),
                    token: token.to_string(),
                };
            }
        }

        let session = Session {
            identity: Uuid::now_v7().to_string(),
            token: Uuid::now_v7().to_string(),
        };
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.token.clone(), session.identity.clone());
        drop(sessions);
        session
    }

    /// Returns the number of issued sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if no sessions have been issued.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
