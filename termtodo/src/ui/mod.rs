//! Terminal UI rendering.

pub mod input_form;
pub mod status_bar;
pub mod task_list;
pub mod theme;

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout},
    text::Line,
    widgets::{Block, Borders, Paragraph},
};

use crate::app::App;

/// Main draw function for the entire UI.
pub fn draw(frame: &mut Frame, app: &App) {
    if !app.configured {
        render_not_configured(frame);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Add-task form
            Constraint::Min(3),    // Task list
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    input_form::render(frame, chunks[0], app);
    task_list::render(frame, chunks[1], app);
    status_bar::render(frame, chunks[2], app);
}

/// Full-screen message shown when no store URL was resolved at startup.
///
/// This is a one-way steady state, not an error: the app stays here for
/// its entire lifetime.
fn render_not_configured(frame: &mut Frame) {
    let block = Block::default()
        .title("TermTodo")
        .borders(Borders::ALL)
        .border_style(theme::dimmed());

    let lines = vec![
        Line::from(""),
        Line::styled("Task store not configured", theme::bold()),
        Line::from(""),
        Line::styled(
            "Set --store-url, TERMTODO_STORE_URL, or [store].url in",
            theme::dimmed(),
        ),
        Line::styled("~/.config/termtodo/config.toml to connect.", theme::dimmed()),
        Line::from(""),
        Line::styled("q / Esc: quit", theme::dimmed()),
    ];

    let paragraph = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, frame.area());
}
