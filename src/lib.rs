pub mod analysis;
pub mod commands;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod state;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use config::Config;
use state::AppState;

/// Installs the global `tracing` subscriber (`RUST_LOG`, default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call (tests, binaries sharing the lib) is harmless
    let _ = fmt().with_env_filter(filter).try_init();
}

pub async fn run() -> Result<()> {
    init_tracing();

    info!("Loading configuration...");
    let config = Config::load()?;

    std::fs::create_dir_all(&config.upload_dir)
        .with_context(|| format!("creating upload directory {}", config.upload_dir.display()))?;

    // 1. Database
    let pool = db::init(&config).await?;

    // 2. Default catalog
    if config.seed_catalog {
        core::seeder::seed_catalog(&pool).await?;
    } else {
        info!("Catalog seeding disabled");
    }

    // 3. HTTP
    let address = format!("0.0.0.0:{}", config.port);
    let state = AppState::new(pool.clone(), config);
    let app = commands::router(state);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
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
}
