use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Router,
};
use axum_login::AuthManagerLayerBuilder;
use sqlx::SqlitePool;
use tokio::{task::JoinHandle, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tower_sessions::{cookie::Key, ExpiredDeletion, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

use crate::{
    authentication::{self, IdentityProvider, OAuthBackend},
    config::SessionConfig,
    crud_ops::{self, SharedRepository},
    repository::SqliteTodoRepository,
};

/// How often expired sessions are purged from the store.
pub const SESSION_CLEANUP_PERIOD: Duration = Duration::from_secs(60);

/// The router plus the session store behind it, which needs periodic cleanup.
pub struct App {
    pub router: Router,
    pub session_store: SqliteStore,
}

async fn health_check() -> &'static str {
    "ok"
}

/// The API routes without session handling; every todo route expects an
/// `AuthSession` layer around it.
pub fn create_router(repo: SharedRepository) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route(
            "/api/todos",
            get(crud_ops::get_todos).post(crud_ops::create_todo),
        )
        .route(
            "/api/todos/{id}",
            patch(crud_ops::update_todo).delete(crud_ops::delete_todo),
        )
        .route("/auth/login", get(authentication::sign_in))
        .route("/auth/callback", get(authentication::oauth_callback))
        .route("/auth/logout", post(authentication::sign_out))
        .route("/auth/me", get(authentication::current_user))
        .layer(Extension(repo))
}

/// The full application: routes, SQLite-backed sessions and OAuth sign-in.
/// Expects the todo schema to be migrated already.
pub async fn build_app(
    sqlite_pool: SqlitePool,
    provider: Arc<dyn IdentityProvider>,
    session: &SessionConfig,
) -> Result<App> {
    let session_store = SqliteStore::new(sqlite_pool.clone());
    session_store
        .migrate()
        .await
        .context("failed to migrate session store")?;

    let key = match &session.secret {
        Some(secret) => Key::try_from(secret.as_bytes())
            .map_err(|_| anyhow!("session secret must be at least 64 bytes"))?,
        None => {
            tracing::warn!("no session secret configured, sessions will not survive a restart");
            Key::generate()
        }
    };

    let session_layer = SessionManagerLayer::new(session_store.clone())
        .with_secure(session.secure_cookie)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            session.inactivity_minutes,
        )))
        .with_signed(key);

    let backend = OAuthBackend::new(sqlite_pool.clone(), provider);
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    let repo: SharedRepository = Arc::new(SqliteTodoRepository::new(sqlite_pool));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = create_router(repo)
        .layer(auth_layer)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    Ok(App {
        router,
        session_store,
    })
}

/// Deletes expired sessions every `period` until aborted.
pub fn spawn_session_cleanup(session_store: SqliteStore, period: Duration) -> JoinHandle<()> {
    tokio::task::spawn(async move {
        if let Err(e) = session_store.continuously_delete_expired(period).await {
            tracing::error!(error = %e, "expired session cleanup stopped");
        }
    })
}
