use chrono::Utc;
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqlitePool, SqlitePoolOptions},
};

use crate::{
    entities::{Identity, TodoId, TodoItem},
    error::StoreError,
    policy::{AccessPolicy, Action},
};

/// The todo collection as the rest of the crate sees it.
///
/// Implementations are the storage boundary: they assign ids and timestamps
/// and evaluate [`AccessPolicy`] before every write.
#[async_trait::async_trait]
pub trait TodoRepository: Send + Sync {
    /// Every document in the collection, in insertion order.
    async fn list(&self, actor: &Identity) -> Result<Vec<TodoItem>, StoreError>;

    /// Inserts an uncompleted item owned by `actor`.
    async fn add(&self, actor: &Identity, text: &str) -> Result<TodoItem, StoreError>;

    /// Applies whichever fields are given in a single write. Each given field
    /// is authorized before anything is written.
    async fn update(
        &self,
        actor: &Identity,
        id: TodoId,
        text: Option<&str>,
        completed: Option<bool>,
    ) -> Result<TodoItem, StoreError>;

    async fn set_completed(
        &self,
        actor: &Identity,
        id: TodoId,
        completed: bool,
    ) -> Result<TodoItem, StoreError> {
        self.update(actor, id, None, Some(completed)).await
    }

    async fn set_text(
        &self,
        actor: &Identity,
        id: TodoId,
        text: &str,
    ) -> Result<TodoItem, StoreError> {
        self.update(actor, id, Some(text), None).await
    }

    async fn delete(&self, actor: &Identity, id: TodoId) -> Result<(), StoreError>;
}

const TODO_COLUMNS: &str = "id, text, completed, created_at, user_name";

#[derive(Debug, Clone)]
pub struct SqliteTodoRepository {
    sqlite_pool: SqlitePool,
    policy: AccessPolicy,
}

impl SqliteTodoRepository {
    pub fn new(sqlite_pool: SqlitePool) -> Self {
        Self {
            sqlite_pool,
            policy: AccessPolicy,
        }
    }

    /// Creates the `todos` and `users` tables if missing.
    pub async fn migrate(sqlite_pool: &SqlitePool) -> Result<(), MigrateError> {
        sqlx::migrate!("./migrations").run(sqlite_pool).await
    }

    /// A private in-memory database. A single connection keeps every query on
    /// the same database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let sqlite_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::migrate(&sqlite_pool)
            .await
            .map_err(|e| StoreError::Sqlx(e.into()))?;
        Ok(Self::new(sqlite_pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.sqlite_pool
    }

    async fn fetch(&self, id: TodoId) -> Result<TodoItem, StoreError> {
        let sql = format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?");
        sqlx::query_as::<_, TodoItem>(&sql)
            .bind(id)
            .fetch_optional(&self.sqlite_pool)
            .await?
            .ok_or(StoreError::NotFound(id))
    }
}

#[async_trait::async_trait]
impl TodoRepository for SqliteTodoRepository {
    async fn list(&self, _actor: &Identity) -> Result<Vec<TodoItem>, StoreError> {
        let sql = format!("SELECT {TODO_COLUMNS} FROM todos ORDER BY id");
        let todos = sqlx::query_as::<_, TodoItem>(&sql)
            .fetch_all(&self.sqlite_pool)
            .await?;
        Ok(todos)
    }

    async fn add(&self, actor: &Identity, text: &str) -> Result<TodoItem, StoreError> {
        if text.trim().is_empty() {
            return Err(StoreError::EmptyText);
        }

        let sql = format!(
            "INSERT INTO todos (text, completed, created_at, user_name) VALUES (?, ?, ?, ?) \
             RETURNING {TODO_COLUMNS}"
        );
        let todo = sqlx::query_as::<_, TodoItem>(&sql)
            .bind(text)
            .bind(false)
            .bind(Utc::now())
            .bind(actor.name())
            .fetch_one(&self.sqlite_pool)
            .await?;

        tracing::debug!(id = %todo.id, owner = %actor, "todo inserted");
        Ok(todo)
    }

    async fn update(
        &self,
        actor: &Identity,
        id: TodoId,
        text: Option<&str>,
        completed: Option<bool>,
    ) -> Result<TodoItem, StoreError> {
        if text.is_some_and(|text| text.trim().is_empty()) {
            return Err(StoreError::EmptyText);
        }

        let todo = self.fetch(id).await?;
        if text.is_some() {
            self.policy.authorize(actor, Action::EditText, &todo)?;
        }
        if completed.is_some() {
            self.policy.authorize(actor, Action::Toggle, &todo)?;
        }

        let sql = format!(
            "UPDATE todos SET text = COALESCE(?, text), completed = COALESCE(?, completed) \
             WHERE id = ? RETURNING {TODO_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, TodoItem>(&sql)
            .bind(text)
            .bind(completed)
            .bind(id)
            .fetch_optional(&self.sqlite_pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        tracing::debug!(%id, text_changed = text.is_some(), ?completed, "todo updated");
        Ok(updated)
    }

    async fn delete(&self, actor: &Identity, id: TodoId) -> Result<(), StoreError> {
        let todo = self.fetch(id).await?;
        self.policy.authorize(actor, Action::Delete, &todo)?;

        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&self.sqlite_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }

        tracing::debug!(%id, "todo deleted");
        Ok(())
    }
}
