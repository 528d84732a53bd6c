//! Add-task form rendering.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Position, Rect},
    widgets::{Block, Borders, Paragraph},
};

use super::theme;
use crate::app::{App, Focus};

/// Render the add-task form: a text input and an optional due date input
/// side by side.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(area);

    render_field(
        frame,
        chunks[0],
        "New task",
        &app.input,
        app.input_cursor,
        app.focus == Focus::TextInput && app.edit.is_none(),
    );
    render_field(
        frame,
        chunks[1],
        "Due (optional)",
        &app.due_input,
        app.due_cursor,
        app.focus == Focus::DueInput && app.edit.is_none(),
    );
}

/// Render one bordered input field, placing the terminal cursor in it when
/// focused.
fn render_field(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    value: &str,
    cursor: usize,
    focused: bool,
) {
    let border_style = if focused {
        theme::highlighted()
    } else {
        theme::dimmed()
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style)
        .title_style(theme::panel_title(theme::FORM_TITLE));

    let paragraph = Paragraph::new(value).style(theme::normal()).block(block);
    frame.render_widget(paragraph, area);

    if focused {
        // Cursor column is a character offset; clamp to the inner width.
        let max_x = area.width.saturating_sub(2);
        let x = u16::try_from(cursor).unwrap_or(max_x).min(max_x);
        frame.set_cursor_position(Position::new(area.x + 1 + x, area.y + 1));
    }
}
