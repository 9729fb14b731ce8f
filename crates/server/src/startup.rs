use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use configs::AppConfig;
use service::{autosave::AutoSaveConfig, runtime};

use crate::errors::StartupError;
use crate::registry::DraftRegistry;
use crate::routes::{self, ServerState};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("server address: {e}")))
}

/// Construct the process-wide backends once and wrap them in router state.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<ServerState> {
    runtime::ensure_env(&cfg.cache.path).await?;
    let backends = runtime::build_backends(cfg).await?;
    let registry = Arc::new(DraftRegistry::new(backends, AutoSaveConfig::from(&cfg.autosave)));
    Ok(ServerState { registry })
}

pub fn build_app_with_state(state: ServerState) -> Router {
    routes::build_router(state, build_cors())
}

/// Build the router with backends constructed from `cfg`.
pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    Ok(build_app_with_state(build_state(cfg).await?))
}

/// Serve the draft API with an already loaded configuration. Logging and
/// `.env` are the caller's concern.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    info!(
        storage = ?cfg.autosave.storage,
        interval_secs = cfg.autosave.interval_secs,
        enabled = cfg.autosave.enabled,
        "auto-save configuration loaded"
    );

    let app = build_app(&cfg).await?;

    let addr = bind_addr(&cfg)?;
    info!(%addr, "starting draft server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
