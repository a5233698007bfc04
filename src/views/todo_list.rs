use std::sync::Arc;

use chrono::Utc;

use crate::{
    entities::{Identity, TodoId},
    error::ActionError,
    notify::{self, Notifier},
    repository::TodoRepository,
    session::SessionSource,
};

use super::todo_item::{EditKey, EditOutcome, EditRequest, TodoItemView};

/// The todo list screen: local rows, the new-item input, and the writes each
/// user action issues.
///
/// Writes are two-phase. The local change is applied first, then the store is
/// awaited; a failed write reverts the local change, alerts the user and
/// returns the error.
pub struct TodoListView {
    repo: Arc<dyn TodoRepository>,
    session: Arc<dyn SessionSource>,
    notifier: Arc<dyn Notifier>,
    items: Vec<TodoItemView>,
    input: String,
}

impl TodoListView {
    pub fn new(
        repo: Arc<dyn TodoRepository>,
        session: Arc<dyn SessionSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repo,
            session,
            notifier,
            items: Vec::new(),
            input: String::new(),
        }
    }

    pub fn items(&self) -> &[TodoItemView] {
        &self.items
    }

    pub fn item(&self, id: TodoId) -> Option<&TodoItemView> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    fn identity(&self) -> Result<Identity, ActionError> {
        let session = self.session.current();
        match session.identity() {
            Ok(identity) => Ok(identity.clone()),
            Err(e) => {
                if matches!(e, ActionError::SignedOut) {
                    self.notifier.alert(notify::SIGN_IN_REQUIRED);
                }
                Err(e)
            }
        }
    }

    fn position(&self, id: TodoId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    /// Replaces local state with the store's contents. Items without a
    /// timestamp are shown with the current time.
    pub async fn load(&mut self) -> Result<(), ActionError> {
        let identity = self.identity()?;
        let todos = match self.repo.list(&identity).await {
            Ok(todos) => todos,
            Err(e) => {
                tracing::warn!(error = %e, "loading todos failed");
                self.notifier.alert(notify::LOAD_FAILED);
                return Err(e.into());
            }
        };

        let now = Utc::now();
        self.items = todos
            .into_iter()
            .map(|mut todo| {
                todo.created_at.get_or_insert(now);
                TodoItemView::new(todo)
            })
            .collect();
        Ok(())
    }

    /// Appends a new uncompleted item. Blank text is a no-op and returns
    /// `Ok(None)`.
    pub async fn add(&mut self, text: &str) -> Result<Option<TodoId>, ActionError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let identity = self.identity()?;

        // the store assigns the id, so there is nothing to show before it answers
        let mut todo = match self.repo.add(&identity, text).await {
            Ok(todo) => todo,
            Err(e) => {
                tracing::warn!(error = %e, "adding todo failed");
                self.notifier.alert(notify::ADD_FAILED);
                return Err(e.into());
            }
        };
        todo.created_at.get_or_insert_with(Utc::now);

        let id = todo.id;
        self.items.push(TodoItemView::new(todo));
        Ok(Some(id))
    }

    /// Adds the input buffer as a new item and clears it on success.
    pub async fn submit_input(&mut self) -> Result<Option<TodoId>, ActionError> {
        let text = self.input.clone();
        let added = self.add(&text).await?;
        if added.is_some() {
            self.input.clear();
        }
        Ok(added)
    }

    /// Flips `completed` on the matching item. Unknown ids are ignored.
    pub async fn toggle(&mut self, id: TodoId) -> Result<(), ActionError> {
        let identity = self.identity()?;
        let Some(index) = self.position(id) else {
            return Ok(());
        };

        let todo = self.items[index].todo_mut();
        let previous = todo.completed;
        todo.completed = !previous;

        if let Err(e) = self.repo.set_completed(&identity, id, !previous).await {
            tracing::warn!(%id, error = %e, "toggle failed, reverting");
            if let Some(index) = self.position(id) {
                self.items[index].todo_mut().completed = previous;
            }
            self.notifier.alert(notify::UPDATE_FAILED);
            return Err(e.into());
        }
        Ok(())
    }

    /// Removes the matching item, keeping the order of the rest.
    pub async fn delete(&mut self, id: TodoId) -> Result<(), ActionError> {
        let identity = self.identity()?;
        let Some(index) = self.position(id) else {
            return Ok(());
        };

        let removed = self.items.remove(index);

        if let Err(e) = self.repo.delete(&identity, id).await {
            tracing::warn!(%id, error = %e, "delete failed, restoring item");
            let index = index.min(self.items.len());
            self.items.insert(index, removed);
            self.notifier.alert(notify::DELETE_FAILED);
            return Err(e.into());
        }
        Ok(())
    }

    /// Asks the item to enter edit mode, alerting the user on denial.
    pub fn request_edit(&mut self, id: TodoId) -> Option<EditRequest> {
        let session = self.session.current();
        let index = self.position(id)?;
        let request = self.items[index].request_edit(&session);
        if request == EditRequest::Denied {
            self.notifier.alert(notify::EDIT_NOT_AUTHORIZED);
        }
        Some(request)
    }

    pub fn set_edit_text(&mut self, id: TodoId, text: impl Into<String>) {
        if let Some(index) = self.position(id) {
            self.items[index].set_edit_text(text);
        }
    }

    pub fn blur(&mut self, id: TodoId) {
        if let Some(index) = self.position(id) {
            self.items[index].blur();
        }
    }

    pub fn toggle_highlight(&mut self, id: TodoId) {
        if let Some(index) = self.position(id) {
            self.items[index].toggle_highlight();
        }
    }

    /// Routes a key press to the item in edit mode and persists a commit.
    /// The outcome of a commit is always reported to the user.
    ///
    /// A commit without a signed-in session leaves the item in edit mode with
    /// its buffer intact.
    pub async fn edit_key(&mut self, id: TodoId, key: EditKey) -> Result<EditOutcome, ActionError> {
        let Some(index) = self.position(id) else {
            return Ok(EditOutcome::Ignored);
        };

        let identity = if self.items[index].commits_on(key) {
            Some(self.identity()?)
        } else {
            None
        };

        let outcome = self.items[index].key(key);
        let EditOutcome::Commit(text) = &outcome else {
            return Ok(outcome);
        };
        let Some(identity) = identity else {
            return Ok(outcome);
        };

        let todo = self.items[index].todo_mut();
        let previous = std::mem::replace(&mut todo.text, text.clone());

        match self.repo.set_text(&identity, id, text).await {
            Ok(_) => {
                self.notifier.alert(notify::UPDATE_SUCCEEDED);
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "edit failed, reverting");
                if let Some(index) = self.position(id) {
                    self.items[index].todo_mut().text = previous;
                }
                self.notifier.alert(notify::UPDATE_FAILED);
                Err(e.into())
            }
        }
    }
}
