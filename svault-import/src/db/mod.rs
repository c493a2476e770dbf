//! Database access for svault-import

pub mod jobs;
pub mod songs;

pub use jobs::{JobStore, SqliteJobStore};
pub use songs::{SongStore, SqliteSongStore};

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create svault-import tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_jobs (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            total_rows INTEGER NOT NULL DEFAULT 0,
            processed_rows INTEGER NOT NULL DEFAULT 0,
            inserted_count INTEGER NOT NULL DEFAULT 0,
            duplicate_count INTEGER NOT NULL DEFAULT 0,
            error_count INTEGER NOT NULL DEFAULT 0,
            original_filename TEXT NOT NULL,
            started_at TEXT,
            finished_at TEXT,
            error_message TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // The songs table enforces key uniqueness; it is the final authority on
    // duplicates across concurrently running jobs.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            track_uri TEXT PRIMARY KEY NOT NULL,
            track_name TEXT,
            album_name TEXT,
            artist_names TEXT,
            release_date TEXT,
            duration_ms INTEGER,
            popularity INTEGER,
            explicit INTEGER NOT NULL DEFAULT 0,
            added_by TEXT,
            added_at TEXT,
            genres TEXT,
            record_label TEXT,
            danceability REAL,
            energy REAL,
            key INTEGER,
            loudness REAL,
            mode INTEGER,
            speechiness REAL,
            acousticness REAL,
            instrumentalness REAL,
            liveness REAL,
            valence REAL,
            tempo REAL,
            time_signature INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_songs_artist_names ON songs(artist_names)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_songs_track_name ON songs(track_name)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (import_jobs, songs)");

    Ok(())
}
