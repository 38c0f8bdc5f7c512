use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use configs::{AppConfig, ServerConfig};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::errors::StartupError;
use crate::routes::{self, ServerState};
use service::{
    runtime,
    storage::FileRecordStore,
    users::{hasher_from_config, UserService},
};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(server: &ServerConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", server.host, server.port).parse()?)
}

/// Wire the record store and hasher described by `cfg` into router state.
pub fn build_state(cfg: &AppConfig) -> Result<ServerState, StartupError> {
    let store = Arc::new(FileRecordStore::new(&cfg.storage.data_dir));
    let hasher = hasher_from_config(&cfg.security).map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
    Ok(ServerState { users: UserService::new(store, hasher) })
}

pub fn build_app(state: ServerState) -> Router {
    routes::build_router(state, build_cors())
}

/// Public entry: serve the app described by an already validated `cfg`.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    runtime::ensure_data_dir(&cfg.storage.data_dir)
        .await
        .map_err(|e| StartupError::Runtime(e.to_string()))?;

    let state = build_state(&cfg)?;
    let app = build_app(state);

    let addr = bind_addr(&cfg.server)?;
    info!(%addr, data_dir = %cfg.storage.data_dir, algorithm = %cfg.security.password_algorithm, "starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
