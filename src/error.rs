use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::{
    authentication,
    entities::{Identity, TodoId},
    policy::Action,
};

/// Failures reported by a [`crate::repository::TodoRepository`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("todo {0} not found")]
    NotFound(TodoId),

    #[error("{actor} may not {action} todo {id}")]
    Forbidden {
        actor: Identity,
        action: Action,
        id: TodoId,
    },

    #[error("todo text must not be empty")]
    EmptyText,

    #[error("todo store unavailable")]
    Unavailable,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Failures of a view-model action.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("sign in required")]
    SignedOut,

    #[error("session is still loading")]
    SessionLoading,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Error returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("sign in required")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] axum_login::Error<authentication::OAuthBackend>),

    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),

    #[error("identity provider unavailable: {0}")]
    Provider(#[from] authentication::ProviderError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) | AppError::Store(StoreError::EmptyText) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            AppError::Store(StoreError::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(StoreError::Sqlx(_)) | AppError::Auth(_) | AppError::Session(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // keep driver and session internals out of responses
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
