//! Import pipeline integration tests
//!
//! Drives the job runner end to end over real CSV files and an in-memory
//! SQLite database, covering the happy path, duplicate handling, re-import
//! idempotence and mid-job destination store failure.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use svault_common::{ImportTuning, Result};
use svault_import::db::{self, JobStore, SongStore, SqliteJobStore, SqliteSongStore};
use svault_import::models::{ImportJob, JobStatus, NewSong};
use svault_import::services::run_import;

/// Job store wrapper that snapshots every checkpoint write
struct RecordingJobStore {
    inner: SqliteJobStore,
    snapshots: Mutex<Vec<ImportJob>>,
}

impl RecordingJobStore {
    fn new(pool: SqlitePool) -> Self {
        Self {
            inner: SqliteJobStore::new(pool),
            snapshots: Mutex::new(Vec::new()),
        }
    }

    fn snapshots(&self) -> Vec<ImportJob> {
        self.snapshots.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for RecordingJobStore {
    async fn get(&self, id: uuid::Uuid) -> Result<Option<ImportJob>> {
        self.inner.get(id).await
    }

    async fn put(&self, job: &ImportJob) -> Result<()> {
        self.snapshots.lock().unwrap().push(job.clone());
        self.inner.put(job).await
    }
}

/// Song store that starts failing at the nth batch flush
struct FailingSongStore {
    inner: SqliteSongStore,
    fail_from_flush: u32,
    flushes: AtomicU32,
}

impl FailingSongStore {
    fn new(pool: SqlitePool, fail_from_flush: u32) -> Self {
        Self {
            inner: SqliteSongStore::new(pool),
            fail_from_flush,
            flushes: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl SongStore for FailingSongStore {
    async fn known_keys(&self) -> Result<HashSet<String>> {
        self.inner.known_keys().await
    }

    async fn insert_batch(&self, songs: &[NewSong]) -> Result<u64> {
        let flush = self.flushes.fetch_add(1, Ordering::SeqCst) + 1;
        if flush >= self.fail_from_flush {
            return Err(svault_common::Error::Internal(
                "song store unavailable".to_string(),
            ));
        }
        self.inner.insert_batch(songs).await
    }
}

async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    db::init_tables(&pool).await.unwrap();
    pool
}

async fn song_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM songs")
        .fetch_one(pool)
        .await
        .unwrap()
}

fn write_upload(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// 100 data rows: 95 unique keys, 3 repeated keys, 2 rows missing the key
fn hundred_row_csv() -> String {
    let mut csv = String::from("Track URI,Track Name,Artist Name(s),Duration (ms)\n");
    for i in 0..95 {
        csv.push_str(&format!("spotify:track:{i},Track {i},Artist {i},200000\n"));
    }
    for i in 0..3 {
        csv.push_str(&format!("spotify:track:{i},Track {i} again,Artist {i},200000\n"));
    }
    for i in 0..2 {
        csv.push_str(&format!(",No Key {i},Artist,100\n"));
    }
    csv
}

async fn queue_job(jobs: &dyn JobStore, filename: &str) -> ImportJob {
    let job = ImportJob::new(filename);
    jobs.put(&job).await.unwrap();
    job
}

#[tokio::test]
async fn hundred_row_file_with_duplicates_and_missing_keys() {
    let pool = test_pool().await;
    let jobs: Arc<RecordingJobStore> = Arc::new(RecordingJobStore::new(pool.clone()));
    let songs: Arc<dyn SongStore> = Arc::new(SqliteSongStore::new(pool.clone()));
    let dir = tempfile::tempdir().unwrap();
    let path = write_upload(&dir, "songs.csv", &hundred_row_csv());

    let job = queue_job(&*jobs, "songs.csv").await;
    run_import(
        jobs.clone(),
        songs,
        ImportTuning::default(),
        job.id,
        path.clone(),
    )
    .await;

    let job = jobs.get(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.total_rows, 100);
    assert_eq!(job.processed_rows, 100);
    assert_eq!(job.inserted_count, 95);
    assert_eq!(job.duplicate_count, 3);
    assert_eq!(job.error_count, 2);

    assert_eq!(song_count(&pool).await, 95);

    // Uploaded artifact is released after the runner consumed it
    assert!(!path.exists());
}

#[tokio::test]
async fn counters_stay_consistent_at_every_checkpoint() {
    let pool = test_pool().await;
    let jobs: Arc<RecordingJobStore> = Arc::new(RecordingJobStore::new(pool.clone()));
    let songs: Arc<dyn SongStore> = Arc::new(SqliteSongStore::new(pool.clone()));
    let dir = tempfile::tempdir().unwrap();
    let path = write_upload(&dir, "songs.csv", &hundred_row_csv());

    let job = queue_job(&*jobs, "songs.csv").await;
    run_import(jobs.clone(), songs, ImportTuning::default(), job.id, path).await;

    let snapshots = jobs.snapshots();
    assert!(!snapshots.is_empty());

    fn rank(status: JobStatus) -> u8 {
        match status {
            JobStatus::Queued => 0,
            JobStatus::Running => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    let mut last_rank = 0;
    let mut last_processed = 0;
    for snapshot in &snapshots {
        assert!(
            snapshot.counters_consistent(),
            "torn checkpoint: {:?}",
            snapshot
        );
        assert!(
            rank(snapshot.status) >= last_rank,
            "status reversal: {:?}",
            snapshot.status
        );
        assert!(snapshot.processed_rows >= last_processed);
        last_rank = rank(snapshot.status);
        last_processed = snapshot.processed_rows;
    }
}

#[tokio::test]
async fn reimporting_identical_dataset_is_idempotent() {
    let pool = test_pool().await;
    let jobs: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(pool.clone()));
    let songs: Arc<dyn SongStore> = Arc::new(SqliteSongStore::new(pool.clone()));
    let dir = tempfile::tempdir().unwrap();

    let mut csv = String::from("Track URI,Track Name\n");
    for i in 0..30 {
        csv.push_str(&format!("spotify:track:{i},Track {i}\n"));
    }

    let first = queue_job(&*jobs, "first.csv").await;
    let path = write_upload(&dir, "first.csv", &csv);
    run_import(
        jobs.clone(),
        songs.clone(),
        ImportTuning::default(),
        first.id,
        path,
    )
    .await;

    let first = jobs.get(first.id).await.unwrap().unwrap();
    assert_eq!(first.inserted_count, 30);

    // Second job over the same content: everything is a duplicate
    let second = queue_job(&*jobs, "second.csv").await;
    let path = write_upload(&dir, "second.csv", &csv);
    run_import(
        jobs.clone(),
        songs.clone(),
        ImportTuning::default(),
        second.id,
        path,
    )
    .await;

    let second = jobs.get(second.id).await.unwrap().unwrap();
    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(second.total_rows, 30);
    assert_eq!(second.inserted_count, 0);
    assert_eq!(second.duplicate_count, 30);
    assert_eq!(second.error_count, 0);

    assert_eq!(song_count(&pool).await, 30);
}

#[tokio::test]
async fn store_failure_mid_job_aborts_with_message() {
    let pool = test_pool().await;
    let jobs: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(pool.clone()));
    // First flush (20 rows) succeeds, second flush (at row 40) fails
    let songs: Arc<dyn SongStore> = Arc::new(FailingSongStore::new(pool.clone(), 2));
    let dir = tempfile::tempdir().unwrap();

    let mut csv = String::from("Track URI,Track Name\n");
    for i in 0..100 {
        csv.push_str(&format!("spotify:track:{i},Track {i}\n"));
    }
    let path = write_upload(&dir, "songs.csv", &csv);

    let tuning = ImportTuning {
        batch_size: 20,
        checkpoint_interval: 20,
    };

    let job = queue_job(&*jobs, "songs.csv").await;
    run_import(jobs.clone(), songs, tuning, job.id, path.clone()).await;

    let job = jobs.get(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.total_rows, 100);
    assert_eq!(job.processed_rows, 40);
    assert!(job.error_message.is_some());
    assert!(job.counters_consistent());

    // Only the first flushed batch reached the store; the remaining 60 rows
    // were never processed
    assert_eq!(song_count(&pool).await, 20);

    // Cleanup happens on the failure path too
    assert!(!path.exists());
}

#[tokio::test]
async fn blank_rows_are_skipped_without_counting() {
    let pool = test_pool().await;
    let jobs: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(pool.clone()));
    let songs: Arc<dyn SongStore> = Arc::new(SqliteSongStore::new(pool.clone()));
    let dir = tempfile::tempdir().unwrap();

    let csv = "Track URI,Track Name\nspotify:track:a,A\n,\nspotify:track:b,B\n,\n";
    let path = write_upload(&dir, "songs.csv", csv);

    let job = queue_job(&*jobs, "songs.csv").await;
    run_import(jobs.clone(), songs, ImportTuning::default(), job.id, path).await;

    let job = jobs.get(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.total_rows, 2);
    assert_eq!(job.processed_rows, 2);
    assert_eq!(job.inserted_count, 2);
}

#[tokio::test]
async fn bom_prefixed_header_still_resolves_key_column() {
    let pool = test_pool().await;
    let jobs: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(pool.clone()));
    let songs: Arc<dyn SongStore> = Arc::new(SqliteSongStore::new(pool.clone()));
    let dir = tempfile::tempdir().unwrap();

    let csv = "\u{feff}Track URI,Track Name\nspotify:track:a,A\n";
    let path = write_upload(&dir, "songs.csv", csv);

    let job = queue_job(&*jobs, "songs.csv").await;
    run_import(jobs.clone(), songs, ImportTuning::default(), job.id, path).await;

    let job = jobs.get(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.inserted_count, 1);
    assert_eq!(job.error_count, 0);
}

#[tokio::test]
async fn unreadable_input_fails_the_job() {
    let pool = test_pool().await;
    let jobs: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(pool.clone()));
    let songs: Arc<dyn SongStore> = Arc::new(SqliteSongStore::new(pool.clone()));

    let job = queue_job(&*jobs, "missing.csv").await;
    run_import(
        jobs.clone(),
        songs,
        ImportTuning::default(),
        job.id,
        PathBuf::from("/nonexistent/missing.csv"),
    )
    .await;

    let job = jobs.get(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.is_some());
    assert_eq!(job.processed_rows, 0);
}
