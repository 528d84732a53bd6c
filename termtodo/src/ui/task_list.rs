//! Task list rendering: loading / empty / list states plus the inline
//! edit row.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use super::theme;
use crate::app::{App, EditField, EditState, Focus};
use termtodo_proto::task::Task;

/// Render the task list panel.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let border_style = if app.focus == Focus::List && app.edit.is_none() {
        theme::highlighted()
    } else {
        theme::dimmed()
    };
    let block = Block::default()
        .title("Tasks")
        .borders(Borders::ALL)
        .border_style(border_style)
        .title_style(theme::panel_title(theme::LIST_TITLE));

    if app.loading {
        let paragraph = Paragraph::new(Line::styled("Loading tasks...", theme::dimmed()))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    if app.tasks.is_empty() {
        let paragraph =
            Paragraph::new(Line::styled("No tasks yet. Add one above.", theme::dimmed()))
                .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = app
        .tasks
        .iter()
        .enumerate()
        .map(|(idx, task)| {
            if let Some(edit) = app.edit.as_ref().filter(|e| e.task_id == task.id) {
                edit_row(edit)
            } else {
                task_row(app, task, idx)
            }
        })
        .collect();

    let list = List::new(items).block(block);
    frame.render_widget(list, area);
}

/// A normal (non-editing) task row.
fn task_row<'a>(app: &App, task: &'a Task, idx: usize) -> ListItem<'a> {
    let checkbox = if task.completed { "[x]" } else { "[ ]" };
    let text_style = if idx == app.selected && app.focus == Focus::List && app.edit.is_none() {
        theme::selected()
    } else if task.completed {
        theme::completed()
    } else {
        theme::normal()
    };

    let mut spans = vec![
        Span::styled(checkbox, text_style),
        Span::raw(" "),
        Span::styled(task.text.as_str(), text_style),
    ];
    if let Some(ref due) = task.due_date {
        spans.push(Span::styled(
            format!("  due {}", format_due(due, &app.due_date_format)),
            theme::dimmed(),
        ));
    }

    ListItem::new(Line::from(spans))
}

/// The inline edit row replacing the task being edited.
fn edit_row(edit: &EditState) -> ListItem<'static> {
    let text_style = if edit.field == EditField::Text {
        theme::selected()
    } else {
        theme::editing()
    };
    let due_style = if edit.field == EditField::Due {
        theme::selected()
    } else {
        theme::editing()
    };

    let due_display = if edit.due.is_empty() {
        "none".to_string()
    } else {
        edit.due.clone()
    };

    ListItem::new(Line::from(vec![
        Span::styled("edit: ", theme::editing()),
        Span::styled(edit.text.clone(), text_style),
        Span::styled("  due: ", theme::editing()),
        Span::styled(due_display, due_style),
        Span::styled("  (Enter: save, Esc: cancel, Tab: field)", theme::dimmed()),
    ]))
}

/// Format a stored due date string for display.
///
/// Due dates are stored as the user typed them (`%Y-%m-%dT%H:%M`, the
/// datetime-local shape). Anything that doesn't parse is shown verbatim.
fn format_due(due: &str, format: &str) -> String {
    chrono::NaiveDateTime::parse_from_str(due, "%Y-%m-%dT%H:%M")
        .map_or_else(|_| due.to_string(), |dt| dt.format(format).to_string())
}
