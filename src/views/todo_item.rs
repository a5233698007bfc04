use chrono::{DateTime, Datelike, Local, TimeZone};

use crate::{
    entities::{TodoId, TodoItem},
    session::SessionState,
};

pub const NO_DATE: &str = "no date";

/// Result of asking to enter edit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRequest {
    Entered,
    /// The session does not belong to the item's owner.
    Denied,
    /// The session is still loading; nothing changed and nothing was denied.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKey {
    Confirm,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Edit mode was left; the new text should be persisted.
    Commit(String),
    /// Edit mode was left without changes.
    Cancelled,
    Ignored,
}

/// What the item currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemDisplay<'a> {
    Read {
        text: &'a str,
        completed: bool,
        /// Completed items render with a strike-through.
        struck_through: bool,
        date: String,
        highlighted: bool,
    },
    Edit {
        text: &'a str,
    },
}

/// One row of the list with its local UI state.
#[derive(Debug, Clone, PartialEq)]
pub struct TodoItemView {
    todo: TodoItem,
    edit_text: Option<String>,
    highlighted: bool,
}

impl TodoItemView {
    pub fn new(todo: TodoItem) -> Self {
        Self {
            todo,
            edit_text: None,
            highlighted: false,
        }
    }

    pub fn id(&self) -> TodoId {
        self.todo.id
    }

    pub fn todo(&self) -> &TodoItem {
        &self.todo
    }

    pub(crate) fn todo_mut(&mut self) -> &mut TodoItem {
        &mut self.todo
    }

    pub fn is_editing(&self) -> bool {
        self.edit_text.is_some()
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn edit_text(&self) -> Option<&str> {
        self.edit_text.as_deref()
    }

    /// Enters edit mode when `session` belongs to the item's owner. The edit
    /// buffer starts from the current text.
    pub fn request_edit(&mut self, session: &SessionState) -> EditRequest {
        match session {
            SessionState::Loading => EditRequest::Deferred,
            SessionState::SignedIn(identity) if self.todo.is_owned_by(identity) => {
                self.edit_text = Some(self.todo.text.clone());
                EditRequest::Entered
            }
            SessionState::SignedIn(_) | SessionState::SignedOut => EditRequest::Denied,
        }
    }

    pub fn set_edit_text(&mut self, text: impl Into<String>) {
        if let Some(edit_text) = self.edit_text.as_mut() {
            *edit_text = text.into();
        }
    }

    /// Whether `key` would leave edit mode with text to persist.
    pub fn commits_on(&self, key: EditKey) -> bool {
        key == EditKey::Confirm
            && self
                .edit_text
                .as_deref()
                .is_some_and(|text| !text.trim().is_empty())
    }

    pub fn key(&mut self, key: EditKey) -> EditOutcome {
        let Some(edit_text) = self.edit_text.as_ref() else {
            return EditOutcome::Ignored;
        };

        match key {
            EditKey::Confirm if edit_text.trim().is_empty() => EditOutcome::Ignored,
            EditKey::Confirm => {
                let text = edit_text.clone();
                self.edit_text = None;
                EditOutcome::Commit(text)
            }
            EditKey::Cancel => {
                self.edit_text = None;
                EditOutcome::Cancelled
            }
        }
    }

    /// Losing focus cancels like the cancel key.
    pub fn blur(&mut self) -> EditOutcome {
        self.key(EditKey::Cancel)
    }

    pub fn toggle_highlight(&mut self) {
        self.highlighted = !self.highlighted;
    }

    pub fn formatted_date(&self) -> String {
        match self.todo.created_at {
            Some(created_at) => format_timestamp(&created_at.with_timezone(&Local)),
            None => NO_DATE.to_string(),
        }
    }

    pub fn display(&self) -> ItemDisplay<'_> {
        match &self.edit_text {
            Some(text) => ItemDisplay::Edit { text },
            None => ItemDisplay::Read {
                text: &self.todo.text,
                completed: self.todo.completed,
                struck_through: self.todo.completed,
                date: self.formatted_date(),
                highlighted: self.highlighted,
            },
        }
    }
}

/// `October 18th, 2026 3:04 PM`
pub fn format_timestamp<Tz: TimeZone>(timestamp: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let day = timestamp.day();
    format!(
        "{} {}{}, {}",
        timestamp.format("%B"),
        day,
        ordinal_suffix(day),
        timestamp.format("%Y %-I:%M %p"),
    )
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}
