//! Session token persistence.
//!
//! The store issues an opaque token alongside each anonymous identity;
//! persisting it across runs is what makes the identity stable. The token
//! lives in a small JSON state file under the user's data directory
//! (`~/.local/share/termtodo/session.json`). A missing or malformed file
//! simply means "no previous session"; the store will mint a fresh one.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors that can occur when persisting the session token.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Could not determine the user's data directory.
    #[error("could not determine data directory (no HOME or XDG_DATA_HOME)")]
    NoDataDir,
    /// Failed to write the session file.
    #[error("failed to write session file {path}: {source}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to serialize the session state.
    #[error("failed to serialize session state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// On-disk session state.
#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    token: String,
}

/// The default session file path, or `None` when no data directory exists.
#[must_use]
pub fn default_session_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("termtodo").join("session.json"))
}

/// Loads the persisted session token.
///
/// Returns `None` for a missing, unreadable, or malformed file; all of
/// which just mean the next handshake requests a fresh identity.
#[must_use]
pub fn load_token(path: &Path) -> Option<String> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read session file");
            return None;
        }
    };
    match serde_json::from_str::<SessionFile>(&contents) {
        Ok(file) => Some(file.token),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "malformed session file, ignoring");
            None
        }
    }
}

/// Persists the session token, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`SessionError`] on serialization or I/O failure. Callers log
/// the failure and continue; a session that cannot be persisted still
/// works for the current run.
pub fn save_token(path: &Path, token: &str) -> Result<(), SessionError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SessionError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    let contents = serde_json::to_string_pretty(&SessionFile {
        token: token.to_string(),
    })?;
    std::fs::write(path, contents).map_err(|e| SessionError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}
