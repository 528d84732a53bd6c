//! Configuration system for the `TermTodo` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/termtodo/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error. A missing store URL is
//! not an error either: the app then runs in the permanent
//! "not configured" presentation state.

use std::path::PathBuf;
use std::time::Duration;

use crate::client::ConnectTimeouts;
use crate::net::NetConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    store: StoreFileConfig,
    ui: UiFileConfig,
    session: SessionFileConfig,
}

/// `[store]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StoreFileConfig {
    url: Option<String>,
    connect_timeout_secs: Option<u64>,
    handshake_timeout_secs: Option<u64>,
    channel_capacity: Option<usize>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    poll_timeout_ms: Option<u64>,
    due_date_format: Option<String>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Store --
    /// Store server WebSocket URL; `None` means not configured.
    pub store_url: Option<String>,
    /// Timeout for connecting to the store server.
    pub connect_timeout: Duration,
    /// Timeout for the session handshake.
    pub handshake_timeout: Duration,
    /// Channel capacity for command/event mpsc channels.
    pub channel_capacity: usize,

    // -- UI --
    /// Poll timeout for the TUI event loop.
    pub poll_timeout: Duration,
    /// Display format for due dates (chrono format string).
    pub due_date_format: String,

    // -- Session --
    /// Session file override; `None` uses the default data-dir path.
    pub session_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(5),
            channel_capacity: 256,
            poll_timeout: Duration::from_millis(50),
            due_date_format: "%Y-%m-%d %H:%M".to_string(),
            session_file: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// CLI args and env vars are parsed via `clap`. If `--config` is given
    /// and the file does not exist, returns an error. If no `--config` is
    /// given, the default path (`~/.config/termtodo/config.toml`) is tried
    /// and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. This is separated from `load()` to
    /// enable unit testing without CLI parsing.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            store_url: cli.store_url.clone().or_else(|| file.store.url.clone()),
            connect_timeout: file
                .store
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            handshake_timeout: file
                .store
                .handshake_timeout_secs
                .map_or(defaults.handshake_timeout, Duration::from_secs),
            channel_capacity: file
                .store
                .channel_capacity
                .unwrap_or(defaults.channel_capacity),
            poll_timeout: file
                .ui
                .poll_timeout_ms
                .map_or(defaults.poll_timeout, Duration::from_millis),
            due_date_format: file
                .ui
                .due_date_format
                .clone()
                .unwrap_or(defaults.due_date_format),
            session_file: cli
                .session_file
                .clone()
                .or_else(|| file.session.file.clone()),
        }
    }

    /// Build a [`NetConfig`] from this configuration, if a valid store URL
    /// is present.
    ///
    /// Returns `None` when no URL was resolved, or when the URL does not
    /// parse as a `ws://`/`wss://` URL; both leave the app in the
    /// "not configured" presentation state.
    #[must_use]
    pub fn to_net_config(&self) -> Option<NetConfig> {
        let store_url = self.store_url.clone()?;

        match url::Url::parse(&store_url) {
            Ok(parsed) if matches!(parsed.scheme(), "ws" | "wss") => {}
            Ok(parsed) => {
                tracing::warn!(
                    url = %store_url,
                    scheme = parsed.scheme(),
                    "store URL must use ws:// or wss://"
                );
                return None;
            }
            Err(e) => {
                tracing::warn!(url = %store_url, error = %e, "invalid store URL");
                return None;
            }
        }

        Some(NetConfig {
            store_url,
            session_file: self.session_file.clone(),
            timeouts: ConnectTimeouts {
                connect: self.connect_timeout,
                handshake: self.handshake_timeout,
            },
            channel_capacity: self.channel_capacity,
        })
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Terminal to-do list with live remote sync")]
pub struct CliArgs {
    /// WebSocket URL of the task store server.
    #[arg(long, env = "TERMTODO_STORE_URL")]
    pub store_url: Option<String>,

    /// Path to the session token file (default: `~/.local/share/termtodo/session.json`).
    #[arg(long)]
    pub session_file: Option<PathBuf>,

    /// Path to config file (default: `~/.config/termtodo/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TERMTODO_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/termtodo.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            // No config dir available; use defaults.
            return Ok(ConfigFile::default());
        };
        config_dir.join("termtodo").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
