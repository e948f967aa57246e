// runlog-cli/src/serve.rs
// ============================================================================
// Module: Serve Command
// Description: Builds the durable store, tool registry, and AppState, then
//              binds and runs the axum HTTP/SSE server.
// Purpose: The `runlog serve` entry point.
// Dependencies: runlog-config, runlog-store-sqlite, runlog-providers,
//               runlog-server, axum, tokio
// ============================================================================

//! ## Overview
//! Build the object graph, bind a [`tokio::net::TcpListener`], and run
//! `axum::serve` to completion.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use runlog_config::RunlogConfig;
use runlog_core::RandomIdGenerator;
use runlog_core::Store;
use runlog_core::SystemClock;
use runlog_providers::ToolRegistry;
use runlog_server::AppState;
use runlog_store_sqlite::SqliteStore;
use runlog_store_sqlite::SqliteStoreConfig;
use thiserror::Error;

use crate::auth::load_bearer_authority;

/// Errors raised while assembling or running the server.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The config file/environment failed to load or validate.
    #[error("config error: {0}")]
    Config(#[from] runlog_config::ConfigError),
    /// The `SQLite` store failed to open.
    #[error("store error: {0}")]
    Store(String),
    /// `AppState`'s object graph failed to assemble.
    #[error("state error: {0}")]
    State(String),
    /// The bind address was malformed.
    #[error("invalid bind address {0}")]
    InvalidAddress(String),
    /// The listener or server failed.
    #[error("server error: {0}")]
    Transport(String),
}

/// Runs the server to completion (until the process is killed).
///
/// # Errors
///
/// Returns [`ServeError`] if the config, store, or server fails to start.
pub async fn run(config_path: Option<PathBuf>, bind: &str, db_path: PathBuf) -> Result<(), ServeError> {
    let config = RunlogConfig::load(config_path.as_deref())?;
    let store_config = SqliteStoreConfig { busy_timeout_ms: config.sqlite_busy_timeout_ms, ..SqliteStoreConfig::new(db_path) };
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(store_config).map_err(|err| ServeError::Store(err.to_string()))?);
    let manifests = store.list_manifests().map_err(|err| ServeError::Store(err.to_string()))?;
    let registry = Arc::new(ToolRegistry::from_manifests(&manifests, config.allow_remote_mcp));
    let auth = load_bearer_authority();

    let server_config = runlog_server::ServerConfig::from(config);
    let state = AppState::new(
        store,
        Arc::new(SystemClock),
        Arc::new(RandomIdGenerator),
        registry.into_resolver(),
        server_config,
        auth,
    )
    .map_err(|err| ServeError::State(err.to_string()))?;

    let addr: SocketAddr = bind.parse().map_err(|_| ServeError::InvalidAddress(bind.to_string()))?;
    let app = runlog_server::build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|err| ServeError::Transport(err.to_string()))?;
    tracing::info!(%addr, "runlog-server listening");
    axum::serve(listener, app).await.map_err(|err| ServeError::Transport(err.to_string()))
}
