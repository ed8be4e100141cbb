mod config;
mod db;
mod error;
mod models;
mod routes;
mod terminal;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::db::Db;
use crate::routes::AppState;
use crate::terminal::Terminals;

/// Resolves on Ctrl+C or SIGTERM, after ending every terminal session so the
/// server can drain.
async fn shutdown_signal(terminals: Arc<Terminals>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, closing terminals");
    terminals.shutdown().await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = Config::parse();
    let addr = config.bind_address().await?;
    info!(
        "plant_space {} starting: env={}, data_file={}, persist={}",
        env!("CARGO_PKG_VERSION"),
        config.environment,
        config.data_file.display(),
        !config.no_persist
    );

    if let Err(e) = tokio::fs::create_dir_all(&config.upload_dir).await {
        warn!("could not create {}: {}", config.upload_dir.display(), e);
    }

    let db = Arc::new(Db::open(&config).await?);
    let terminals = Arc::new(Terminals::default());
    let state = AppState::new(config, db, terminals.clone())?;

    let (bound, server) = warp::serve(routes::routes(state))
        .try_bind_with_graceful_shutdown(addr, shutdown_signal(terminals))
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("server running on http://{}", bound);
    info!("terminal websocket at ws://{}/terminal", bound);
    info!("health endpoints: /health, /health/live, /health/ready");

    server.await;
    info!("server stopped");
    Ok(())
}
