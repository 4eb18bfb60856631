//! Pantry Server
//!
//! Serves the shared `items` collection and the image blob store to
//! `pantry` clients over HTTP, with WebSocket snapshot subscriptions.
//!
//! # Configuration
//!
//! Reads the same config file as the CLI. Environment variables:
//! - `PANTRY_CONFIG`: Path to config file (default: ~/.config/pantry/config.yaml)
//! - `PANTRY_PORT`: Port to listen on (default: 8080)
//! - `PANTRY_DATABASE_PATH`: SQLite database (default: ~/.local/share/pantry/pantry.db)
//! - `PANTRY_BLOB_DIR`: Directory to store images (default: ~/.local/share/pantry/blobs)
//! - `PANTRY_PUBLIC_URL`: Base URL in image retrieval URLs (default: http://localhost:8080)
//! - `PANTRY_MAX_UPLOAD_BYTES`: Largest accepted image upload (default: 25 MiB)

use pantry::config::Config;
use pantry::db::{init_db, SqliteDocumentStore};
use pantry::server::{router, AppState, FsBlobStore};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pantry_server=info,pantry=info,pantry_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config_path = std::env::var("PANTRY_CONFIG").ok().map(PathBuf::from);
    let config = Config::load(config_path)?;

    if let Some(path) = &config.config_file {
        tracing::info!("Config file: {}", path.display());
    }
    tracing::info!("Database: {}", config.database_path.value.display());
    tracing::info!("Blob directory: {}", config.blob_dir.value.display());
    tracing::info!("Upload limit: {} bytes", config.max_upload_bytes.value);

    std::fs::create_dir_all(&config.blob_dir.value)
        .map_err(|e| format!("Failed to create blob directory: {}", e))?;

    let pool = init_db(&config.database_path.value).await?;

    // Build app state
    let state = AppState::new(
        Arc::new(SqliteDocumentStore::new(pool)),
        Arc::new(FsBlobStore::new(
            config.blob_dir.value.clone(),
            config.public_url.value.clone(),
        )),
    )
    .with_max_upload_bytes(config.max_upload_bytes.value);

    let app = router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port.value));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
