//! Status bar rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::{App, Focus};

/// Render the status bar at the bottom of the screen.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let help_text = if app.edit.is_some() {
        "Enter: save | Esc: cancel | Tab: field"
    } else {
        match app.focus {
            Focus::TextInput | Focus::DueInput => "Enter: add | Tab: switch | Esc: quit",
            Focus::List => {
                "Space: toggle | e: edit | d: delete | ↑↓/jk: navigate | Tab: switch | Esc: quit"
            }
        }
    };

    let (dot_color, status_text) = if app.connected {
        let identity = app
            .identity
            .as_deref()
            .map_or_else(String::new, |id| format!(" as {}", short_identity(id)));
        (theme::SUCCESS, format!("Connected{identity}"))
    } else {
        (theme::OFFLINE, "Disconnected".to_string())
    };

    let mut spans = vec![
        Span::styled("TermTodo v0.1.0", theme::bold()),
        Span::raw(" | "),
        Span::styled("●", theme::normal().fg(dot_color)),
        Span::raw(format!(" {status_text}")),
    ];
    if let Some(ref note) = app.status {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(note.clone(), theme::dimmed()));
    }
    spans.push(Span::raw(" | "));
    spans.push(Span::styled(help_text, theme::dimmed()));

    let paragraph = Paragraph::new(Line::from(spans)).style(theme::status_bar_bg());
    frame.render_widget(paragraph, area);
}

/// First segment of a UUID-shaped identity, enough to tell sessions apart.
fn short_identity(identity: &str) -> &str {
    identity.split('-').next().unwrap_or(identity)
}
