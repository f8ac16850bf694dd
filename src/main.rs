mod config;
mod crud;
mod flow;
mod gate;
mod provider;
mod render;
mod routes;
mod rows;
mod session;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, ConfigError};
use crate::provider::AuthError;
use crate::provider::storage::SessionFile;
use crate::provider::supabase::SupabaseAuth;
use crate::rows::RowsError;
use crate::rows::supabase::SupabaseRows;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("auth client: {0}")]
    Auth(#[from] AuthError),
    #[error("rows client: {0}")]
    Rows(#[from] RowsError),
    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "rowdesk failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;

    let session_file = config.session_file.clone().map(SessionFile::new);
    match &session_file {
        Some(file) => tracing::info!(path = %file.path().display(), "session persisted to file"),
        None => tracing::info!("session kept in memory only"),
    }
    let auth = Arc::new(SupabaseAuth::new(&config.supabase, session_file)?);
    auth.restore().await;
    let refresher = Arc::clone(&auth).spawn_auto_refresh(
        Duration::from_secs(config.refresh_interval_secs),
        config.refresh_margin_secs,
    );

    let rows = Arc::new(SupabaseRows::new(&config.supabase, &config.rows_table)?);
    let state = state::AppState::new(auth, rows, Duration::from_millis(config.gate_settle_ms));

    let store = Arc::clone(&state.store);
    tokio::spawn(async move {
        let resolved = store.wait_resolved().await;
        tracing::info!(authenticated = resolved.is_authenticated(), user = ?resolved.user().map(provider::User::label), "initial session");
    });

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;

    tracing::info!(port = config.port, table = %config.rows_table, "rowdesk listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    refresher.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed");
    }
    tracing::info!("shutting down");
}
