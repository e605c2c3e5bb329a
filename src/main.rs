//! Bysykkel Fleet Service
//!
//! Serves the fleet API backed by a SQLite database.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bysykkel::{routes, AppState, Config, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bysykkel=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!(?config, "Loaded configuration");

    // Open the store (runs migrations)
    let store = SqliteStore::open(&config.db_path)?;
    tracing::info!(db_path = %config.db_path, "Store ready");

    // Create app state
    let state = Arc::new(AppState::new(store));

    // Create router
    let app = routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Fleet service listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
