use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    entities::{Identity, TodoId, TodoItem},
    error::StoreError,
    policy::{AccessPolicy, Action},
    repository::TodoRepository,
};

#[derive(Debug, Default)]
struct Collection {
    last_id: i64,
    todos: Vec<TodoItem>,
}

impl Collection {
    fn find(&mut self, id: TodoId) -> Result<&mut TodoItem, StoreError> {
        self.todos
            .iter_mut()
            .find(|todo| todo.id == id)
            .ok_or(StoreError::NotFound(id))
    }
}

/// Process-local todo collection with the same access rules as the SQLite
/// store. Writes can be switched to fail to exercise rollback paths.
#[derive(Debug, Default)]
pub struct MemoryTodoRepository {
    collection: Mutex<Collection>,
    policy: AccessPolicy,
    fail_writes: AtomicBool,
}

impl MemoryTodoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every write returns [`StoreError::Unavailable`] without
    /// touching the collection. Reads keep working.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Stores a document as-is, e.g. a legacy item with no owner or
    /// timestamp. Returns the assigned id.
    pub async fn insert_raw(
        &self,
        text: &str,
        completed: bool,
        user_name: Option<&str>,
    ) -> TodoId {
        let mut collection = self.collection.lock().await;
        collection.last_id += 1;
        let id = TodoId(collection.last_id);
        collection.todos.push(TodoItem {
            id,
            text: text.to_string(),
            completed,
            created_at: None,
            user_name: user_name.map(str::to_string),
        });
        id
    }

    pub async fn get(&self, id: TodoId) -> Option<TodoItem> {
        let collection = self.collection.lock().await;
        collection.todos.iter().find(|todo| todo.id == id).cloned()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl TodoRepository for MemoryTodoRepository {
    async fn list(&self, _actor: &Identity) -> Result<Vec<TodoItem>, StoreError> {
        Ok(self.collection.lock().await.todos.clone())
    }

    async fn add(&self, actor: &Identity, text: &str) -> Result<TodoItem, StoreError> {
        self.check_available()?;
        if text.trim().is_empty() {
            return Err(StoreError::EmptyText);
        }

        let mut collection = self.collection.lock().await;
        collection.last_id += 1;
        let todo = TodoItem {
            id: TodoId(collection.last_id),
            text: text.to_string(),
            completed: false,
            created_at: Some(Utc::now()),
            user_name: Some(actor.name().to_string()),
        };
        collection.todos.push(todo.clone());
        Ok(todo)
    }

    async fn update(
        &self,
        actor: &Identity,
        id: TodoId,
        text: Option<&str>,
        completed: Option<bool>,
    ) -> Result<TodoItem, StoreError> {
        self.check_available()?;
        if text.is_some_and(|text| text.trim().is_empty()) {
            return Err(StoreError::EmptyText);
        }

        let mut collection = self.collection.lock().await;
        let todo = collection.find(id)?;
        if text.is_some() {
            self.policy.authorize(actor, Action::EditText, todo)?;
        }
        if completed.is_some() {
            self.policy.authorize(actor, Action::Toggle, todo)?;
        }

        if let Some(text) = text {
            todo.text = text.to_string();
        }
        if let Some(completed) = completed {
            todo.completed = completed;
        }
        Ok(todo.clone())
    }

    async fn delete(&self, actor: &Identity, id: TodoId) -> Result<(), StoreError> {
        self.check_available()?;
        let mut collection = self.collection.lock().await;
        let todo = collection.find(id)?;
        self.policy.authorize(actor, Action::Delete, todo)?;
        collection.todos.retain(|todo| todo.id != id);
        Ok(())
    }
}
