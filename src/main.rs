mod cli;

use std::{str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::net::TcpListener;

use cli::Cli;
use todo_api::{
    authentication::KakaoProvider,
    config::Config,
    repository::SqliteTodoRepository,
    routes::{self, App},
};

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    tracing::info!("shutting down");
}

async fn run_server(config: Config) -> Result<()> {
    if config.oauth.client_id.is_empty() {
        tracing::warn!("KAKAO_CLIENT_ID is not set, sign-in will fail");
    }

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .with_context(|| format!("invalid database url {}", config.database_url))?
        .create_if_missing(true);
    let sqlite_pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await
        .context("failed to open database")?;

    SqliteTodoRepository::migrate(&sqlite_pool)
        .await
        .context("failed to migrate database")?;

    let provider = Arc::new(KakaoProvider::new(&config.oauth));
    let App {
        router,
        session_store,
    } = routes::build_app(sqlite_pool, provider, &config.session).await?;
    let cleanup_task = routes::spawn_session_cleanup(session_store, routes::SESSION_CLEANUP_PERIOD);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    cleanup_task.abort();

    Ok(served?)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(database_url) = cli.database_url {
        config.database_url = database_url;
    }

    if let Err(e) = run_server(config).await {
        tracing::error!("run server error: {e:?}");
        return Err(e);
    }
    Ok(())
}
