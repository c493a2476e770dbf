//! Import job persistence
//!
//! The job record is the single point of synchronization between the job
//! runner (sole writer) and the status endpoint (sole reader). `put` replaces
//! the whole record in one UPSERT so a reader never observes a torn update.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use svault_common::{Error, Result};
use uuid::Uuid;

use crate::models::{ImportJob, JobStatus};

/// Key-value access to import job records
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<ImportJob>>;

    /// Atomic whole-record replacement keyed by job id
    async fn put(&self, job: &ImportJob) -> Result<()>;
}

/// SQLite-backed job store
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn get(&self, id: Uuid) -> Result<Option<ImportJob>> {
        let row = sqlx::query(
            r#"
            SELECT id, status, total_rows, processed_rows, inserted_count,
                   duplicate_count, error_count, original_filename,
                   started_at, finished_at, error_message
            FROM import_jobs
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(job_from_row).transpose()
    }

    async fn put(&self, job: &ImportJob) -> Result<()> {
        let status = status_to_str(job.status);
        sqlx::query(
            r#"
            INSERT INTO import_jobs (
                id, status, total_rows, processed_rows, inserted_count,
                duplicate_count, error_count, original_filename,
                started_at, finished_at, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                total_rows = excluded.total_rows,
                processed_rows = excluded.processed_rows,
                inserted_count = excluded.inserted_count,
                duplicate_count = excluded.duplicate_count,
                error_count = excluded.error_count,
                original_filename = excluded.original_filename,
                started_at = excluded.started_at,
                finished_at = excluded.finished_at,
                error_message = excluded.error_message
            "#,
        )
        .bind(job.id.to_string())
        .bind(status)
        .bind(job.total_rows as i64)
        .bind(job.processed_rows as i64)
        .bind(job.inserted_count as i64)
        .bind(job.duplicate_count as i64)
        .bind(job.error_count as i64)
        .bind(&job.original_filename)
        .bind(job.started_at.map(|dt| dt.to_rfc3339()))
        .bind(job.finished_at.map(|dt| dt.to_rfc3339()))
        .bind(&job.error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Mark jobs left non-terminal by a previous process run as failed.
///
/// A job whose runner died with the process can never progress; leaving it
/// `queued`/`running` would have pollers spin forever.
pub async fn fail_stale_jobs(pool: &SqlitePool) -> Result<usize> {
    let result = sqlx::query(
        r#"
        UPDATE import_jobs
        SET status = 'failed',
            finished_at = ?,
            error_message = 'Import interrupted by service restart'
        WHERE status IN ('queued', 'running')
        "#,
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() as usize)
}

fn status_to_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Queued => "queued",
        JobStatus::Running => "running",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
    }
}

fn status_from_str(s: &str) -> Result<JobStatus> {
    match s {
        "queued" => Ok(JobStatus::Queued),
        "running" => Ok(JobStatus::Running),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(Error::Internal(format!("Unknown job status: {}", other))),
    }
}

fn job_from_row(row: sqlx::sqlite::SqliteRow) -> Result<ImportJob> {
    let id_str: String = row.get("id");
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| Error::Internal(format!("Failed to parse job id: {}", e)))?;

    let status: String = row.get("status");
    let status = status_from_str(&status)?;

    let started_at: Option<String> = row.get("started_at");
    let started_at = parse_timestamp(started_at, "started_at")?;
    let finished_at: Option<String> = row.get("finished_at");
    let finished_at = parse_timestamp(finished_at, "finished_at")?;

    Ok(ImportJob {
        id,
        status,
        total_rows: row.get::<i64, _>("total_rows") as u64,
        processed_rows: row.get::<i64, _>("processed_rows") as u64,
        inserted_count: row.get::<i64, _>("inserted_count") as u64,
        duplicate_count: row.get::<i64, _>("duplicate_count") as u64,
        error_count: row.get::<i64, _>("error_count") as u64,
        original_filename: row.get("original_filename"),
        started_at,
        finished_at,
        error_message: row.get("error_message"),
    })
}

fn parse_timestamp(
    value: Option<String>,
    column: &str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    value
        .map(|s| chrono::DateTime::parse_from_rfc3339(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
        .map(|opt| opt.map(|dt| dt.with_timezone(&chrono::Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = SqliteJobStore::new(test_pool().await);

        let mut job = ImportJob::new("library.csv");
        job.start();
        job.total_rows = 10;
        job.processed_rows = 5;
        job.inserted_count = 3;
        job.duplicate_count = 1;
        job.error_count = 1;
        store.put(&job).await.unwrap();

        let loaded = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Running);
        assert_eq!(loaded.total_rows, 10);
        assert_eq!(loaded.processed_rows, 5);
        assert_eq!(loaded.inserted_count, 3);
        assert_eq!(loaded.duplicate_count, 1);
        assert_eq!(loaded.error_count, 1);
        assert_eq!(loaded.original_filename, "library.csv");
        assert!(loaded.started_at.is_some());
    }

    #[tokio::test]
    async fn put_replaces_whole_record() {
        let store = SqliteJobStore::new(test_pool().await);

        let mut job = ImportJob::new("library.csv");
        store.put(&job).await.unwrap();

        job.start();
        job.total_rows = 4;
        job.processed_rows = 4;
        job.inserted_count = 4;
        job.complete();
        store.put(&job).await.unwrap();

        let loaded = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(loaded.processed_rows, 4);
        assert!(loaded.finished_at.is_some());
    }

    #[tokio::test]
    async fn get_unknown_id_is_none() {
        let store = SqliteJobStore::new(test_pool().await);
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_jobs_are_failed_on_sweep() {
        let pool = test_pool().await;
        let store = SqliteJobStore::new(pool.clone());

        let mut running = ImportJob::new("a.csv");
        running.start();
        store.put(&running).await.unwrap();

        let mut done = ImportJob::new("b.csv");
        done.start();
        done.complete();
        store.put(&done).await.unwrap();

        let swept = fail_stale_jobs(&pool).await.unwrap();
        assert_eq!(swept, 1);

        let loaded = store.get(running.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Failed);
        assert!(loaded.error_message.is_some());

        let loaded = store.get(done.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
    }
}
