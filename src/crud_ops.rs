use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    authentication::{self, AuthSession},
    entities::{CreateTodoRequest, TodoId, TodoItem, UpdateTodoRequest},
    error::AppError,
    repository::TodoRepository,
};

pub type SharedRepository = Arc<dyn TodoRepository>;

pub async fn get_todos(
    auth_session: AuthSession,
    Extension(repo): Extension<SharedRepository>,
) -> Result<Json<Vec<TodoItem>>, AppError> {
    let identity = authentication::require_identity(&auth_session)?;
    let todos = repo.list(&identity).await?;
    Ok(Json(todos))
}

pub async fn create_todo(
    auth_session: AuthSession,
    Extension(repo): Extension<SharedRepository>,
    Json(request): Json<CreateTodoRequest>,
) -> Result<impl IntoResponse, AppError> {
    let identity = authentication::require_identity(&auth_session)?;
    let todo = repo.add(&identity, &request.text).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

/// Applies whichever of `text` and `completed` the body carries, in one
/// write.
pub async fn update_todo(
    auth_session: AuthSession,
    Extension(repo): Extension<SharedRepository>,
    Path(id): Path<TodoId>,
    Json(request): Json<UpdateTodoRequest>,
) -> Result<Json<TodoItem>, AppError> {
    let identity = authentication::require_identity(&auth_session)?;

    if request.text.is_none() && request.completed.is_none() {
        return Err(AppError::BadRequest("nothing to update".into()));
    }

    let todo = repo
        .update(&identity, id, request.text.as_deref(), request.completed)
        .await?;
    Ok(Json(todo))
}

pub async fn delete_todo(
    auth_session: AuthSession,
    Extension(repo): Extension<SharedRepository>,
    Path(id): Path<TodoId>,
) -> Result<StatusCode, AppError> {
    let identity = authentication::require_identity(&auth_session)?;
    repo.delete(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
