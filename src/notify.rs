//! Blocking, modal-style alerts: the only way view models report errors to the
//! user.

use std::sync::Mutex;

pub const UPDATE_SUCCEEDED: &str = "Todo updated successfully.";
pub const UPDATE_FAILED: &str = "Failed to update todo.";
pub const EDIT_NOT_AUTHORIZED: &str = "You are not authorized to edit this item.";
pub const ADD_FAILED: &str = "Failed to add todo.";
pub const DELETE_FAILED: &str = "Failed to delete todo.";
pub const LOAD_FAILED: &str = "Failed to load todos.";
pub const SIGN_IN_REQUIRED: &str = "Please sign in first.";

pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

/// Sends alerts to the log; used when no interactive surface is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn alert(&self, message: &str) {
        tracing::info!(target: "todo_api::alert", "{message}");
    }
}

/// Keeps every alert so callers can inspect what the user was shown.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, message: &str) {
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
    }
}
