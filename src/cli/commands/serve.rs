use anyhow::{bail, Context};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::config::{config, StoreBackend};
use crate::handlers::{router, AppState};
use crate::notifications::NotificationHub;
use crate::store::{self, DatabaseManager};

pub async fn run() -> anyhow::Result<()> {
    let settings = config();
    tracing::info!("Starting InfoLine API in {:?} mode", settings.environment);

    if settings.security.jwt_secret.is_empty() {
        bail!("JWT_SECRET must be set in {:?}", settings.environment);
    }

    let store = store::connect().await?;
    let app = router(AppState::new(store, NotificationHub::from_config()));

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("InfoLine API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if settings.store.backend == StoreBackend::Postgres {
        DatabaseManager::close().await;
    }
    tracing::info!("InfoLine API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
