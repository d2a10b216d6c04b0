//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, DocxRenderer},
    config::Config,
    error::ApiError,
    web::{api_router, AppState},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_adapter = Arc::new(DbAdapter::connect(&config.database_url).await?);
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Prepare the Upload Root ---
    tokio::fs::create_dir_all(&config.upload_dir).await?;
    info!("Upload root ready at {}", config.upload_dir.display());

    // --- 4. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState {
        reports: db_adapter.clone(),
        chats: db_adapter,
        renderer: Arc::new(DocxRenderer::new()),
        config: config.clone(),
    });
    let app = api_router(app_state);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
