//! tilestash server binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tilestash_blobstore::{StaticLayerCatalog, TileBlobStore};
use tilestash_server::{AppState, create_router, load_config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// tilestash - tile cache storage with crash-safe bulk deletes
#[derive(Parser, Debug)]
#[command(name = "tilestashd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "TILESTASH_CONFIG",
        default_value = "config/tilestash.toml"
    )]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("tilestash v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    tilestash_blobstore::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let storage = tilestash_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend connectivity verified");

    let catalog = std::sync::Arc::new(StaticLayerCatalog::from_config(&config.layers));
    let blobstore = TileBlobStore::new(
        storage.clone(),
        catalog,
        config.storage.bucket(),
        &config.blobstore,
    )
    .await
    .context("failed to initialize tile blob store")?;
    tracing::info!(
        layers = config.layers.len(),
        prefix = %blobstore.prefix(),
        "Tile blob store ready"
    );

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let state = AppState::new(config, storage, blobstore.clone());
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Stopping bulk deletes");
    if blobstore.shutdown().await {
        tracing::info!("Bulk delete pool drained");
    } else {
        tracing::warn!("Bulk deletes still running after grace period; they resume on next start");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
