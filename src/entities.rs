use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Store-assigned todo identifier. Never reused once deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct TodoId(pub i64);

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: TodoId,
    pub text: String,
    pub completed: bool,
    /// Assigned by the store on insert. Legacy rows may not carry one.
    pub created_at: Option<DateTime<Utc>>,
    /// Display name of the creator; the only identity allowed to edit `text`.
    pub user_name: Option<String>,
}

impl TodoItem {
    pub fn is_owned_by(&self, identity: &Identity) -> bool {
        self.user_name.as_deref() == Some(identity.name())
    }
}

/// The signed-in user as seen by the todo store: just a display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Stable id issued by the OAuth provider.
    pub provider_id: String,
    pub name: String,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity::new(self.name.clone())
    }
}

impl axum_login::AuthUser for User {
    type Id = i64;

    fn id(&self) -> Self::Id {
        self.id
    }

    // no password to rotate; a provider-side account switch invalidates the session
    fn session_auth_hash(&self) -> &[u8] {
        self.provider_id.as_bytes()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoRequest {
    pub text: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionUser {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_compares_display_names() {
        let item = TodoItem {
            id: TodoId(1),
            text: "Buy milk".into(),
            completed: false,
            created_at: None,
            user_name: Some("alice".into()),
        };

        assert!(item.is_owned_by(&Identity::new("alice")));
        assert!(!item.is_owned_by(&Identity::new("bob")));
    }

    #[test]
    fn ownerless_items_belong_to_nobody() {
        let item = TodoItem {
            id: TodoId(2),
            text: "legacy".into(),
            completed: true,
            created_at: None,
            user_name: None,
        };

        assert!(!item.is_owned_by(&Identity::new("")));
    }

    #[test]
    fn todo_id_serializes_as_bare_number() {
        let json = serde_json::to_string(&TodoId(42)).unwrap();
        assert_eq!(json, "42");
    }
}
