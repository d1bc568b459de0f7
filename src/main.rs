//! Board server: REST API over the in-memory store, snapshotted to disk.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use anonboard::api::{self, SharedStore};
use anonboard::config::ServerConfig;
use anonboard::store::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!("Starting board server...");

    let config = ServerConfig::from_env().context("invalid server configuration")?;

    let store = Arc::new(
        MemoryStore::load(&config.data_file)
            .with_context(|| format!("failed to load {}", config.data_file.display()))?,
    );

    // Background task for periodic snapshot saving
    let saver = store.clone();
    let data_file = config.data_file.clone();
    let every = config.snapshot_interval;
    tokio::task::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = saver.save(&data_file).await {
                warn!("failed to save snapshot: {}", e);
            }
        }
    });

    let shared: SharedStore = store.clone();
    let routes = api::routes(shared, &config.allowed_origins);

    info!("Server running at http://0.0.0.0:{}/", config.port);
    let server = warp::serve(routes).run(([0, 0, 0, 0], config.port));

    tokio::select! {
        _ = server => {
            info!("Server process finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Cleaning up...");
        }
    }

    store
        .save(&config.data_file)
        .await
        .context("failed to save snapshot on shutdown")?;
    info!("Shutdown complete.");

    Ok(())
}
