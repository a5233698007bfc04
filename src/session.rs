use std::sync::RwLock;

use crate::{entities::Identity, error::ActionError};

/// Who is using the view models right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// The auth provider has not answered yet.
    Loading,
    SignedOut,
    SignedIn(Identity),
}

impl SessionState {
    /// The identity to act as, or why there is none.
    pub fn identity(&self) -> Result<&Identity, ActionError> {
        match self {
            SessionState::SignedIn(identity) => Ok(identity),
            SessionState::Loading => Err(ActionError::SessionLoading),
            SessionState::SignedOut => Err(ActionError::SignedOut),
        }
    }
}

/// Supplies the current session to view models.
pub trait SessionSource: Send + Sync {
    fn current(&self) -> SessionState;
}

/// A session held in memory, updated by whoever drives sign-in.
#[derive(Debug)]
pub struct SharedSession {
    state: RwLock<SessionState>,
}

impl SharedSession {
    pub fn new(state: SessionState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn signed_in(name: impl Into<String>) -> Self {
        Self::new(SessionState::SignedIn(Identity::new(name)))
    }

    pub fn set(&self, state: SessionState) {
        // a poisoned lock still holds a whole SessionState
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        *guard = state;
    }
}

impl SessionSource for SharedSession {
    fn current(&self) -> SessionState {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_only_available_when_signed_in() {
        assert!(matches!(
            SessionState::Loading.identity(),
            Err(ActionError::SessionLoading)
        ));
        assert!(matches!(
            SessionState::SignedOut.identity(),
            Err(ActionError::SignedOut)
        ));
        assert_eq!(
            SessionState::SignedIn(Identity::new("alice"))
                .identity()
                .unwrap()
                .name(),
            "alice"
        );
    }

    #[test]
    fn shared_session_reflects_updates() {
        let session = SharedSession::new(SessionState::Loading);
        session.set(SessionState::SignedIn(Identity::new("bob")));
        assert_eq!(
            session.current(),
            SessionState::SignedIn(Identity::new("bob"))
        );
    }
}
