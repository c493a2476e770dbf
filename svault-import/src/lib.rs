//! svault-import library interface
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use db::{JobStore, SongStore, SqliteJobStore, SqliteSongStore};
use sqlx::SqlitePool;
use std::sync::Arc;
use svault_common::ServiceConfig;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Import job records; sole writer is the job runner
    pub jobs: Arc<dyn JobStore>,
    /// Destination song store, authoritative for key uniqueness
    pub songs: Arc<dyn SongStore>,
    /// Service configuration (upload dir, import tuning)
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: ServiceConfig) -> Self {
        Self {
            jobs: Arc::new(SqliteJobStore::new(db.clone())),
            songs: Arc::new(SqliteSongStore::new(db.clone())),
            db,
            config: Arc::new(config),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // UI routes (HTML pages)
        .merge(api::ui_routes())
        // API routes
        .merge(api::import_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
