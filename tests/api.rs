use std::sync::Arc;

use axum::{
    body::Body,
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Method, Request, Response, StatusCode,
    },
    Router,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tempfile::TempDir;
use tokio::time::{sleep, Duration};
use tower::ServiceExt;

use todo_api::{
    authentication::{IdentityProvider, ProviderError, ProviderProfile},
    config::SessionConfig,
    entities::TodoItem,
    repository::SqliteTodoRepository,
    routes,
};

/// Treats the authorization code as the user's name; `rejected` is refused.
#[derive(Debug)]
struct FakeProvider;

#[async_trait::async_trait]
impl IdentityProvider for FakeProvider {
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError> {
        Ok(format!("https://provider.test/authorize?state={state}"))
    }

    async fn resolve(&self, code: &str) -> Result<ProviderProfile, ProviderError> {
        if code == "rejected" {
            return Err(ProviderError::Rejected(StatusCode::BAD_REQUEST));
        }
        Ok(ProviderProfile {
            provider_id: format!("test:{code}"),
            name: code.to_string(),
        })
    }
}

async fn open_pool(dir: &TempDir) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("todos.db"))
        .create_if_missing(true);
    let sqlite_pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .unwrap();
    SqliteTodoRepository::migrate(&sqlite_pool).await.unwrap();
    sqlite_pool
}

async fn test_app() -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    let sqlite_pool = open_pool(&dir).await;

    let app = routes::build_app(sqlite_pool, Arc::new(FakeProvider), &SessionConfig::default())
        .await
        .unwrap();
    (app.router, dir)
}

async fn stored_sessions(sqlite_pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM tower_sessions")
        .fetch_one(sqlite_pool)
        .await
        .unwrap()
}

fn session_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get(SET_COOKIE)
        .expect("response should set the session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    let body = match body {
        Some(body) => {
            request = request.header(CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(request.body(body).unwrap()).await.unwrap()
}

async fn json_body<T: serde::de::DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn start_sign_in(app: &Router) -> (String, String) {
    let response = send(app, Method::GET, "/auth/login", None, None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let cookie = session_cookie(&response);
    let location = response.headers()[LOCATION].to_str().unwrap();
    let state = location.split("state=").nth(1).unwrap().to_string();
    (cookie, state)
}

/// Runs the OAuth round trip and returns the signed-in session cookie.
async fn sign_in(app: &Router, name: &str) -> String {
    let (cookie, state) = start_sign_in(app).await;

    let uri = format!("/auth/callback?code={name}&state={state}");
    let response = send(app, Method::GET, &uri, Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/");

    session_cookie(&response)
}

async fn create(app: &Router, cookie: &str, text: &str) -> TodoItem {
    let response = send(
        app,
        Method::POST,
        "/api/todos",
        Some(cookie),
        Some(json!({ "text": text })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

#[tokio::test]
async fn health_check_needs_no_session() {
    let (app, _dir) = test_app().await;

    let response = send(&app, Method::GET, "/api/health", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn todo_routes_require_sign_in() {
    let (app, _dir) = test_app().await;

    let list = send(&app, Method::GET, "/api/todos", None, None).await;
    let create = send(
        &app,
        Method::POST,
        "/api/todos",
        None,
        Some(json!({ "text": "Buy milk" })),
    )
    .await;
    let me = send(&app, Method::GET, "/auth/me", None, None).await;

    assert_eq!(list.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(create.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signed_in_user_manages_todos() {
    let (app, _dir) = test_app().await;
    let cookie = sign_in(&app, "alice").await;

    let me: Value = json_body(send(&app, Method::GET, "/auth/me", Some(&cookie), None).await).await;
    assert_eq!(me, json!({ "name": "alice" }));

    let todo = create(&app, &cookie, "Buy milk").await;
    assert_eq!(todo.text, "Buy milk");
    assert!(!todo.completed);
    assert!(todo.created_at.is_some());
    assert_eq!(todo.user_name.as_deref(), Some("alice"));

    let uri = format!("/api/todos/{}", todo.id);
    let response = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&cookie),
        Some(json!({ "completed": true })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let todos: Vec<TodoItem> =
        json_body(send(&app, Method::GET, "/api/todos", Some(&cookie), None).await).await;
    assert_eq!(todos.len(), 1);
    assert!(todos[0].completed);

    let response = send(&app, Method::DELETE, &uri, Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let todos: Vec<TodoItem> =
        json_body(send(&app, Method::GET, "/api/todos", Some(&cookie), None).await).await;
    assert!(todos.is_empty());
}

#[tokio::test]
async fn only_the_owner_may_edit_text() {
    let (app, _dir) = test_app().await;
    let alice = sign_in(&app, "alice").await;
    let bob = sign_in(&app, "bob").await;
    let todo = create(&app, &alice, "alice's item").await;
    let uri = format!("/api/todos/{}", todo.id);

    let response = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&bob),
        Some(json!({ "text": "bob was here" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&bob),
        Some(json!({ "completed": true })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&alice),
        Some(json!({ "text": "edited by alice" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: TodoItem = json_body(response).await;
    assert_eq!(updated.text, "edited by alice");
    assert!(updated.completed);
}

#[tokio::test]
async fn patch_with_text_and_completed_updates_both() {
    let (app, _dir) = test_app().await;
    let cookie = sign_in(&app, "alice").await;
    let todo = create(&app, &cookie, "draft").await;
    let uri = format!("/api/todos/{}", todo.id);

    let response = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&cookie),
        Some(json!({ "text": "final", "completed": true })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let todos: Vec<TodoItem> =
        json_body(send(&app, Method::GET, "/api/todos", Some(&cookie), None).await).await;
    assert_eq!(todos[0].text, "final");
    assert!(todos[0].completed);
}

#[tokio::test]
async fn forbidden_text_change_blocks_the_whole_patch() {
    let (app, _dir) = test_app().await;
    let alice = sign_in(&app, "alice").await;
    let bob = sign_in(&app, "bob").await;
    let todo = create(&app, &alice, "alice's item").await;
    let uri = format!("/api/todos/{}", todo.id);

    let response = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&bob),
        Some(json!({ "text": "bob was here", "completed": true })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let todos: Vec<TodoItem> =
        json_body(send(&app, Method::GET, "/api/todos", Some(&alice), None).await).await;
    assert_eq!(todos[0].text, "alice's item");
    assert!(!todos[0].completed);
}

#[tokio::test]
async fn blank_text_and_empty_updates_are_bad_requests() {
    let (app, _dir) = test_app().await;
    let cookie = sign_in(&app, "alice").await;

    let response = send(
        &app,
        Method::POST,
        "/api/todos",
        Some(&cookie),
        Some(json!({ "text": "   " })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let todo = create(&app, &cookie, "keep me").await;
    let uri = format!("/api/todos/{}", todo.id);
    for body in [json!({ "text": "" }), json!({})] {
        let response = send(&app, Method::PATCH, &uri, Some(&cookie), Some(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn writes_to_unknown_ids_are_not_found() {
    let (app, _dir) = test_app().await;
    let cookie = sign_in(&app, "alice").await;

    let response = send(&app, Method::DELETE, "/api/todos/999", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        Method::PATCH,
        "/api/todos/999",
        Some(&cookie),
        Some(json!({ "completed": true })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn callback_with_foreign_state_is_rejected() {
    let (app, _dir) = test_app().await;
    let (cookie, _state) = start_sign_in(&app).await;

    let response = send(
        &app,
        Method::GET,
        "/auth/callback?code=alice&state=forged",
        Some(&cookie),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejected_authorization_code_is_unauthorized() {
    let (app, _dir) = test_app().await;
    let (cookie, state) = start_sign_in(&app).await;

    let uri = format!("/auth/callback?code=rejected&state={state}");
    let response = send(&app, Method::GET, &uri, Some(&cookie), None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_out_ends_the_session() {
    let (app, _dir) = test_app().await;
    let cookie = sign_in(&app, "alice").await;

    let response = send(&app, Method::POST, "/auth/logout", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, Method::GET, "/auth/me", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_sessions_are_purged() {
    let dir = TempDir::new().unwrap();
    let sqlite_pool = open_pool(&dir).await;
    let session = SessionConfig {
        inactivity_minutes: 0,
        ..SessionConfig::default()
    };
    let app = routes::build_app(sqlite_pool.clone(), Arc::new(FakeProvider), &session)
        .await
        .unwrap();

    for _ in 0..5 {
        start_sign_in(&app.router).await;
    }
    assert_eq!(stored_sessions(&sqlite_pool).await, 5);

    // expiry is compared at one-second resolution
    sleep(Duration::from_millis(1500)).await;
    let cleanup = routes::spawn_session_cleanup(app.session_store, Duration::from_millis(100));
    sleep(Duration::from_millis(500)).await;
    cleanup.abort();

    assert_eq!(stored_sessions(&sqlite_pool).await, 0);
}
