//! `TermTodo` -- terminal to-do list with live remote sync.
//!
//! Launches the TUI and connects to a task store for live task
//! synchronization. Configuration via CLI flags, environment variables, or
//! config file (`~/.config/termtodo/config.toml`).
//!
//! ```bash
//! # Connect to a store
//! cargo run --bin termtodo -- --store-url ws://127.0.0.1:9400/ws
//!
//! # Or via environment variable
//! TERMTODO_STORE_URL=ws://127.0.0.1:9400/ws cargo run --bin termtodo
//!
//! # No store URL at all shows the "not configured" screen
//! cargo run --bin termtodo
//! ```

use std::io;
use std::path::Path;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use termtodo::app::App;
use termtodo::config::{CliArgs, ClientConfig};
use termtodo::net::{self, NetCommand, NetEvent};
use termtodo::ui;

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    // Load and resolve configuration (CLI args > config file > defaults).
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Initialize logging before terminal setup (logs go to file, not stdout).
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!("termtodo starting");

    // Build networking config from resolved settings; None means the app
    // stays in the "not configured" state for its entire lifetime.
    let net_config = config.to_net_config();

    // Set up terminal.
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app.
    let result = run_app(&mut terminal, net_config, &config).await;

    // Restore terminal.
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    tracing::info!("termtodo exiting");
    result
}

/// Initialize file-based logging.
///
/// Logs are written to a file (never stdout, since ratatui owns the
/// terminal). Returns a [`WorkerGuard`] that must be held until shutdown to
/// ensure all buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("termtodo.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Main application loop with optional networking.
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    net_config: Option<net::NetConfig>,
    client_config: &ClientConfig,
) -> io::Result<()> {
    let mut app =
        App::new(net_config.is_some()).with_due_date_format(&client_config.due_date_format);

    // Attempt to connect to the store if a URL was configured. Failure is
    // logged and the app runs disconnected; the loading indicator is
    // cleared so the stale/empty list shows instead of spinning forever.
    let (cmd_tx, mut evt_rx) = match net_config {
        Some(config) => match net::spawn_net(config).await {
            Ok((tx, rx)) => (Some(tx), Some(rx)),
            Err(e) => {
                tracing::warn!(error = %e, "store connection failed, running disconnected");
                app.apply_connection_lost();
                (None, None)
            }
        },
        None => (None, None),
    };

    loop {
        // Step 1: Draw the UI frame.
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Step 2: Drain all pending NetEvents (non-blocking).
        if let Some(ref mut rx) = evt_rx {
            drain_net_events(&mut app, rx);
        }

        // Step 3: Poll for terminal input events.
        if event::poll(client_config.poll_timeout)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            // handle_key_event returns Some(NetCommand) when the action
            // requires a remote write (create/toggle/edit/delete).
            if let Some(net_cmd) = app.handle_key_event(key) {
                if let Some(ref tx) = cmd_tx {
                    match tx.try_send(net_cmd) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            app.set_status("Network busy, action dropped");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            app.set_status("Network disconnected");
                        }
                    }
                } else {
                    app.set_status("Not connected, action not sent");
                }
            }
        }

        if app.should_quit {
            // Ask the networking tasks to shut down and release the
            // subscription.
            if let Some(ref tx) = cmd_tx {
                let _ = tx.try_send(NetCommand::Shutdown);
            }
            return Ok(());
        }
    }
}

/// Drain all pending `NetEvent`s from the receiver and apply them to the app.
fn drain_net_events(app: &mut App, rx: &mut mpsc::Receiver<NetEvent>) {
    while let Ok(event) = rx.try_recv() {
        match event {
            NetEvent::SessionReady { identity } => {
                tracing::info!(identity = %identity, "session ready");
                app.apply_session_ready(identity);
            }
            NetEvent::Snapshot { tasks } => {
                app.apply_snapshot(tasks);
            }
            NetEvent::MutationDone { op } => {
                app.apply_mutation_done(op);
            }
            NetEvent::ConnectionLost => {
                app.apply_connection_lost();
            }
            NetEvent::Error(msg) => {
                // Mutation failures are deliberately not surfaced beyond
                // the status bar; the list simply does not change.
                tracing::warn!(error = %msg, "network error");
                app.set_status(format!("Error: {msg}"));
            }
        }
    }
}
