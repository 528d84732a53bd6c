//! Application state and event handling.
//!
//! [`App`] is a pure function of the events applied to it: key events come
//! in from crossterm and may produce a [`NetCommand`]; [`NetEvent`]s from
//! the networking layer are applied via the `apply_*` methods. No I/O
//! happens here.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use termtodo_proto::store::MutationOp;
use termtodo_proto::task::{Task, TaskId};

use crate::net::NetCommand;

/// Which part of the UI is currently focused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// The new-task text input (default).
    TextInput,
    /// The optional due date input.
    DueInput,
    /// The task list.
    List,
}

/// Which field of the inline edit form is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    /// The task text field.
    Text,
    /// The due date field.
    Due,
}

/// In-progress inline edit of a single task row.
#[derive(Debug, Clone)]
pub struct EditState {
    /// Which task is being edited.
    pub task_id: TaskId,
    /// Working copy of the task text.
    pub text: String,
    /// Working copy of the due date (empty string = no due date).
    pub due: String,
    /// Cursor position (character index) within the active field.
    pub cursor: usize,
    /// Which field the cursor is in.
    pub field: EditField,
}

/// Main application state.
pub struct App {
    /// Whether a store URL was resolved at startup. `false` is a one-way
    /// terminal state: the UI shows a configuration message indefinitely.
    pub configured: bool,
    /// Whether the store connection is currently up.
    pub connected: bool,
    /// The store-granted identity, once the session is established.
    pub identity: Option<String>,
    /// Whether the first snapshot is still outstanding.
    pub loading: bool,
    /// Current task list, always a full replacement from the last snapshot.
    pub tasks: Vec<Task>,
    /// New-task text input.
    pub input: String,
    /// Cursor position (character index) in the text input.
    pub input_cursor: usize,
    /// New-task due date input.
    pub due_input: String,
    /// Cursor position (character index) in the due date input.
    pub due_cursor: usize,
    /// Which part of the UI is focused.
    pub focus: Focus,
    /// Selected row in the task list.
    pub selected: usize,
    /// In-progress inline edit, if any.
    pub edit: Option<EditState>,
    /// Latest status note for the status bar.
    pub status: Option<String>,
    /// Display format for due dates (chrono format string).
    pub due_date_format: String,
    /// Whether the app should quit.
    pub should_quit: bool,
}

/// Converts a character index to a byte index within `s`, clamped to the end.
fn byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map_or(s.len(), |(idx, _)| idx)
}

/// An empty or whitespace-only due date input means "no due date".
fn due_or_none(due: &str) -> Option<String> {
    let trimmed = due.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl App {
    /// Create a new application in the loading state.
    #[must_use]
    pub fn new(configured: bool) -> Self {
        Self {
            configured,
            connected: false,
            identity: None,
            loading: configured,
            tasks: Vec::new(),
            input: String::new(),
            input_cursor: 0,
            due_input: String::new(),
            due_cursor: 0,
            focus: Focus::TextInput,
            selected: 0,
            edit: None,
            status: None,
            due_date_format: "%Y-%m-%d %H:%M".to_string(),
            should_quit: false,
        }
    }

    /// Set the due date display format (chrono format string).
    #[must_use]
    pub fn with_due_date_format(mut self, format: &str) -> Self {
        self.due_date_format = format.to_string();
        self
    }

    /// The task currently under the list selection, if any.
    #[must_use]
    pub fn selected_task(&self) -> Option<&Task> {
        self.tasks.get(self.selected)
    }

    // -----------------------------------------------------------------
    // Key handling
    // -----------------------------------------------------------------

    /// Handle a key event, returning a [`NetCommand`] when the action
    /// requires a remote write.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<NetCommand> {
        // Ctrl-C always quits.
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return None;
        }

        // The not-configured screen only accepts quit keys.
        if !self.configured {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('q')) {
                self.should_quit = true;
            }
            return None;
        }

        if self.edit.is_some() {
            return self.handle_edit_key(key);
        }

        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) => {
                self.should_quit = true;
                None
            }
            (KeyCode::Tab, KeyModifiers::SHIFT) | (KeyCode::BackTab, _) => {
                self.cycle_focus_backward();
                None
            }
            (KeyCode::Tab, _) => {
                self.cycle_focus_forward();
                None
            }
            _ => match self.focus {
                Focus::TextInput | Focus::DueInput => self.handle_input_key(key),
                Focus::List => self.handle_list_key(key),
            },
        }
    }

    /// Handle a key event when one of the add-form inputs is focused.
    fn handle_input_key(&mut self, key: KeyEvent) -> Option<NetCommand> {
        match key.code {
            KeyCode::Enter => self.submit_create(),
            KeyCode::Char(c) => {
                self.active_input_insert(c);
                None
            }
            KeyCode::Backspace => {
                self.active_input_backspace();
                None
            }
            KeyCode::Left => {
                self.active_input_move(-1);
                None
            }
            KeyCode::Right => {
                self.active_input_move(1);
                None
            }
            KeyCode::Home => {
                self.active_input_set_cursor(0);
                None
            }
            KeyCode::End => {
                self.active_input_set_cursor(usize::MAX);
                None
            }
            _ => None,
        }
    }

    /// Handle a key event when the task list is focused.
    fn handle_list_key(&mut self, key: KeyEvent) -> Option<NetCommand> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                if self.selected > 0 {
                    self.selected -= 1;
                }
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.tasks.len() {
                    self.selected += 1;
                }
                None
            }
            KeyCode::Char(' ') => {
                let task = self.selected_task()?;
                Some(NetCommand::Toggle {
                    task_id: task.id.clone(),
                })
            }
            KeyCode::Enter | KeyCode::Char('e') => {
                self.start_edit();
                None
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                let task = self.selected_task()?;
                Some(NetCommand::Delete {
                    task_id: task.id.clone(),
                })
            }
            _ => None,
        }
    }

    /// Handle a key event while a row is being edited inline.
    fn handle_edit_key(&mut self, key: KeyEvent) -> Option<NetCommand> {
        match key.code {
            KeyCode::Esc => {
                self.cancel_edit();
                None
            }
            KeyCode::Enter => self.submit_edit(),
            KeyCode::Tab | KeyCode::BackTab => {
                if let Some(edit) = self.edit.as_mut() {
                    edit.field = match edit.field {
                        EditField::Text => EditField::Due,
                        EditField::Due => EditField::Text,
                    };
                    edit.cursor = edit_field_len(edit);
                }
                None
            }
            KeyCode::Char(c) => {
                if let Some(edit) = self.edit.as_mut() {
                    let cursor = edit.cursor;
                    let field = edit_field_mut(edit);
                    let idx = byte_index(field, cursor);
                    field.insert(idx, c);
                    edit.cursor += 1;
                }
                None
            }
            KeyCode::Backspace => {
                if let Some(edit) = self.edit.as_mut()
                    && edit.cursor > 0
                {
                    edit.cursor -= 1;
                    let cursor = edit.cursor;
                    let field = edit_field_mut(edit);
                    let idx = byte_index(field, cursor);
                    field.remove(idx);
                }
                None
            }
            KeyCode::Left => {
                if let Some(edit) = self.edit.as_mut()
                    && edit.cursor > 0
                {
                    edit.cursor -= 1;
                }
                None
            }
            KeyCode::Right => {
                if let Some(edit) = self.edit.as_mut() {
                    edit.cursor = (edit.cursor + 1).min(edit_field_len(edit));
                }
                None
            }
            _ => None,
        }
    }

    // -----------------------------------------------------------------
    // Form actions
    // -----------------------------------------------------------------

    /// Submit the add-form. Blank text issues no write and leaves the
    /// fields untouched; the fields are cleared only when the store acks
    /// the create (see [`App::apply_mutation_done`]).
    fn submit_create(&mut self) -> Option<NetCommand> {
        if self.input.trim().is_empty() {
            return None;
        }
        Some(NetCommand::Create {
            text: self.input.trim().to_string(),
            due_date: due_or_none(&self.due_input),
        })
    }

    /// Begin inline editing of the selected task.
    pub fn start_edit(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let text = task.text.clone();
        let cursor = text.chars().count();
        self.edit = Some(EditState {
            task_id: task.id.clone(),
            text,
            due: task.due_date.clone().unwrap_or_default(),
            cursor,
            field: EditField::Text,
        });
    }

    /// Abandon the inline edit with no remote write; the row returns to
    /// its stored text and due date.
    pub fn cancel_edit(&mut self) {
        self.edit = None;
    }

    /// Submit the inline edit. Blank text issues no write and leaves edit
    /// mode active; edit mode is exited only when the store acks the edit.
    fn submit_edit(&mut self) -> Option<NetCommand> {
        let edit = self.edit.as_ref()?;
        if edit.text.trim().is_empty() {
            return None;
        }
        Some(NetCommand::Edit {
            task_id: edit.task_id.clone(),
            text: edit.text.trim().to_string(),
            due_date: due_or_none(&edit.due),
        })
    }

    // -----------------------------------------------------------------
    // Net event application
    // -----------------------------------------------------------------

    /// The session handshake completed.
    pub fn apply_session_ready(&mut self, identity: String) {
        self.connected = true;
        self.identity = Some(identity);
    }

    /// A full-state snapshot arrived: replace the list wholesale.
    pub fn apply_snapshot(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.loading = false;
        if self.selected >= self.tasks.len() {
            self.selected = self.tasks.len().saturating_sub(1);
        }
        // If the task under edit disappeared remotely, drop the edit.
        if let Some(ref edit) = self.edit
            && !self.tasks.iter().any(|t| t.id == edit.task_id)
        {
            self.edit = None;
        }
    }

    /// The store acknowledged a mutation; advance the matching UI state.
    pub fn apply_mutation_done(&mut self, op: MutationOp) {
        match op {
            MutationOp::Create => {
                self.input.clear();
                self.input_cursor = 0;
                self.due_input.clear();
                self.due_cursor = 0;
            }
            MutationOp::Edit => {
                self.edit = None;
            }
            MutationOp::Toggle | MutationOp::Delete => {}
        }
    }

    /// The connection to the store was lost. The list stays as-is; the
    /// loading indicator is cleared regardless.
    pub fn apply_connection_lost(&mut self) {
        self.connected = false;
        self.loading = false;
        self.status = Some("Disconnected from store".to_string());
    }

    /// Record a status note for the status bar.
    pub fn set_status(&mut self, note: impl Into<String>) {
        self.status = Some(note.into());
    }

    // -----------------------------------------------------------------
    // Input field helpers
    // -----------------------------------------------------------------

    /// Cycle focus forward: text → due → list → text.
    const fn cycle_focus_forward(&mut self) {
        self.focus = match self.focus {
            Focus::TextInput => Focus::DueInput,
            Focus::DueInput => Focus::List,
            Focus::List => Focus::TextInput,
        };
    }

    /// Cycle focus backward: text → list → due → text.
    const fn cycle_focus_backward(&mut self) {
        self.focus = match self.focus {
            Focus::TextInput => Focus::List,
            Focus::List => Focus::DueInput,
            Focus::DueInput => Focus::TextInput,
        };
    }

    /// Insert a character at the cursor of the focused add-form field.
    fn active_input_insert(&mut self, c: char) {
        let (field, cursor) = self.active_input_mut();
        let idx = byte_index(field, *cursor);
        field.insert(idx, c);
        *cursor += 1;
    }

    /// Delete the character before the cursor of the focused field.
    fn active_input_backspace(&mut self) {
        let (field, cursor) = self.active_input_mut();
        if *cursor > 0 {
            *cursor -= 1;
            let idx = byte_index(field, *cursor);
            field.remove(idx);
        }
    }

    /// Move the cursor of the focused field by one character.
    fn active_input_move(&mut self, delta: isize) {
        let (field, cursor) = self.active_input_mut();
        let len = field.chars().count();
        if delta < 0 {
            *cursor = cursor.saturating_sub(1);
        } else {
            *cursor = (*cursor + 1).min(len);
        }
    }

    /// Set the cursor of the focused field, clamped to the field length.
    fn active_input_set_cursor(&mut self, pos: usize) {
        let (field, cursor) = self.active_input_mut();
        *cursor = pos.min(field.chars().count());
    }

    /// The focused add-form field and its cursor.
    fn active_input_mut(&mut self) -> (&mut String, &mut usize) {
        match self.focus {
            Focus::DueInput => (&mut self.due_input, &mut self.due_cursor),
            _ => (&mut self.input, &mut self.input_cursor),
        }
    }
}

/// The active edit field's current character length.
fn edit_field_len(edit: &EditState) -> usize {
    match edit.field {
        EditField::Text => edit.text.chars().count(),
        EditField::Due => edit.due.chars().count(),
    }
}

/// Mutable access to the active edit field.
fn edit_field_mut(edit: &mut EditState) -> &mut String {
    match edit.field {
        EditField::Text => &mut edit.text,
        EditField::Due => &mut edit.due,
    }
}
