//! svault-import - Music Library Import Service
//!
//! Accepts CSV library uploads, processes them in background jobs and serves
//! poll-based progress to the browser.

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use svault_common::ServiceConfig;
use svault_import::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting svault-import (Music Library Import)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load()?;
    config.ensure_directories()?;
    info!("Root folder: {}", config.root_folder.display());

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = svault_import::db::init_database_pool(&db_path).await?;

    // Jobs left non-terminal by a previous run can never progress
    let swept = svault_import::db::jobs::fail_stale_jobs(&db_pool).await?;
    if swept > 0 {
        info!("Marked {} stale import job(s) as failed", swept);
    }

    let listen_port = config.listen_port;
    let state = AppState::new(db_pool, config);
    let app = svault_import::build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", listen_port)).await?;
    info!("Listening on http://127.0.0.1:{}", listen_port);
    info!("Health check: http://127.0.0.1:{}/health", listen_port);

    axum::serve(listener, app).await?;

    Ok(())
}
