//! Destination song store
//!
//! The `track_uri` primary key is the final authority on duplicates. Inserts
//! use `ON CONFLICT DO NOTHING` so a row that loses a race against a
//! concurrently running job is rejected by the store rather than erroring,
//! and the runner re-counts it as a duplicate.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashSet;
use svault_common::Result;

use crate::models::NewSong;

/// Destination store for validated song records
#[async_trait]
pub trait SongStore: Send + Sync {
    /// All keys currently present in the store
    async fn known_keys(&self) -> Result<HashSet<String>>;

    /// Insert a batch, skipping keys the store already holds.
    /// Returns the number of rows actually inserted.
    async fn insert_batch(&self, songs: &[NewSong]) -> Result<u64>;
}

/// SQLite-backed song store
pub struct SqliteSongStore {
    pool: SqlitePool,
}

impl SqliteSongStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SongStore for SqliteSongStore {
    async fn known_keys(&self) -> Result<HashSet<String>> {
        let uris: Vec<String> = sqlx::query_scalar("SELECT track_uri FROM songs")
            .fetch_all(&self.pool)
            .await?;
        Ok(uris.into_iter().collect())
    }

    async fn insert_batch(&self, songs: &[NewSong]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for song in songs {
            let result = sqlx::query(
                r#"
                INSERT INTO songs (
                    track_uri, track_name, album_name, artist_names,
                    release_date, duration_ms, popularity, explicit,
                    added_by, added_at, genres, record_label,
                    danceability, energy, key, loudness, mode, speechiness,
                    acousticness, instrumentalness, liveness, valence,
                    tempo, time_signature
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(track_uri) DO NOTHING
                "#,
            )
            .bind(&song.track_uri)
            .bind(&song.track_name)
            .bind(&song.album_name)
            .bind(&song.artist_names)
            .bind(&song.release_date)
            .bind(song.duration_ms)
            .bind(song.popularity)
            .bind(song.explicit)
            .bind(&song.added_by)
            .bind(&song.added_at)
            .bind(&song.genres)
            .bind(&song.record_label)
            .bind(song.danceability)
            .bind(song.energy)
            .bind(song.key)
            .bind(song.loudness)
            .bind(song.mode)
            .bind(song.speechiness)
            .bind(song.acousticness)
            .bind(song.instrumentalness)
            .bind(song.liveness)
            .bind(song.valence)
            .bind(song.tempo)
            .bind(song.time_signature)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    fn song(uri: &str) -> NewSong {
        NewSong {
            track_uri: uri.to_string(),
            track_name: Some("Test Track".to_string()),
            album_name: None,
            artist_names: None,
            release_date: None,
            duration_ms: Some(180_000),
            popularity: None,
            explicit: false,
            added_by: None,
            added_at: None,
            genres: None,
            record_label: None,
            danceability: None,
            energy: None,
            key: None,
            loudness: None,
            mode: None,
            speechiness: None,
            acousticness: None,
            instrumentalness: None,
            liveness: None,
            valence: None,
            tempo: None,
            time_signature: None,
        }
    }

    async fn test_store() -> SqliteSongStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        SqliteSongStore::new(pool)
    }

    #[tokio::test]
    async fn insert_batch_counts_only_new_rows() {
        let store = test_store().await;

        let inserted = store
            .insert_batch(&[song("spotify:track:a"), song("spotify:track:b")])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        // Second batch overlaps one existing key
        let inserted = store
            .insert_batch(&[song("spotify:track:b"), song("spotify:track:c")])
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let keys = store.known_keys().await.unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains("spotify:track:a"));
        assert!(keys.contains("spotify:track:c"));
    }

    #[tokio::test]
    async fn known_keys_is_empty_for_fresh_store() {
        let store = test_store().await;
        assert!(store.known_keys().await.unwrap().is_empty());
    }
}
