//! Access rules evaluated at the storage boundary.
//!
//! Every [`crate::repository::TodoRepository`] runs writes through
//! [`AccessPolicy::authorize`] before touching a document, so a client that
//! skips its own ownership check still cannot edit someone else's item.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    entities::{Identity, TodoItem},
    error::StoreError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Toggle,
    EditText,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Action::Toggle => "toggle",
            Action::EditText => "edit the text of",
            Action::Delete => "delete",
        };
        f.write_str(verb)
    }
}

/// Owner-keyed rules for the shared todo collection.
///
/// Listing and creating need nothing beyond a signed-in identity, which the
/// repository signature already demands. Toggling and deleting are open to any
/// signed-in user; editing text is reserved to the item's owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy;

impl AccessPolicy {
    pub fn authorize(
        &self,
        actor: &Identity,
        action: Action,
        item: &TodoItem,
    ) -> Result<(), StoreError> {
        let allowed = match action {
            Action::Toggle | Action::Delete => true,
            Action::EditText => item.is_owned_by(actor),
        };

        if allowed {
            Ok(())
        } else {
            tracing::warn!(actor = %actor, %action, id = %item.id, "write denied by access policy");
            Err(StoreError::Forbidden {
                actor: actor.clone(),
                action,
                id: item.id,
            })
        }
    }
}
