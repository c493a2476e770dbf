//! Import API handlers
//!
//! POST /import/upload, GET /import/status/{job_id}

use axum::{
    extract::{Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{ImportJob, JobStatus},
    services::{self, row_processor::KEY_COLUMN},
    AppState,
};

/// POST /import/upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// GET /import/status/{job_id} response
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total_rows: u64,
    pub processed_rows: u64,
    pub inserted_count: u64,
    pub duplicate_count: u64,
    pub error_count: u64,
    pub progress_percent: u64,
    pub original_filename: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<ImportJob> for JobStatusResponse {
    fn from(job: ImportJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            total_rows: job.total_rows,
            processed_rows: job.processed_rows,
            inserted_count: job.inserted_count,
            duplicate_count: job.duplicate_count,
            error_count: job.error_count,
            progress_percent: job.progress_percent(),
            original_filename: job.original_filename,
            started_at: job.started_at,
            finished_at: job.finished_at,
            error_message: job.error_message,
        }
    }
}

/// POST /import/upload
///
/// Accepts a multipart upload with a `csv_file` field, validates it, creates
/// the job and spawns the runner. Returns the job id immediately; the upload
/// request never waits for row processing. Rejected uploads create no job.
pub async fn upload_import(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("csv_file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_default();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(ApiError::BadRequest("No file provided".to_string()));
    };

    let filename = sanitize_filename(&filename)
        .ok_or_else(|| ApiError::BadRequest("No file selected".to_string()))?;

    if !filename.to_lowercase().ends_with(".csv") {
        return Err(ApiError::BadRequest("File must be a CSV".to_string()));
    }

    // Fail fast before creating any job: the header must carry the
    // primary-key column.
    validate_header(&bytes)?;

    let job = ImportJob::new(filename.clone());

    let upload_dir = state.config.upload_dir();
    tokio::fs::create_dir_all(&upload_dir).await?;
    let stored_path = upload_dir.join(format!("{}_{}", job.id, filename));
    tokio::fs::write(&stored_path, &bytes).await?;

    state.jobs.put(&job).await?;

    tracing::info!(
        job_id = %job.id,
        filename = %filename,
        bytes = bytes.len(),
        "Import job created"
    );

    let response = UploadResponse {
        job_id: job.id,
        status: job.status,
    };

    // Hand the dataset to a background runner; the request returns now.
    let jobs = state.jobs.clone();
    let songs = state.songs.clone();
    let tuning = state.config.import;
    let job_id = job.id;
    tokio::spawn(async move {
        services::run_import(jobs, songs, tuning, job_id, stored_path).await;
    });

    Ok(Json(response))
}

/// GET /import/status/{job_id}
///
/// Poll import progress. The job store is only read here; the runner is the
/// sole writer.
pub async fn get_import_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobStatusResponse>> {
    let job = state
        .jobs
        .get(job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Import job not found: {}", job_id)))?;

    tracing::debug!(job_id = %job_id, status = ?job.status, "Status query");

    Ok(Json(job.into()))
}

/// Strip any path components from a client-supplied filename
fn sanitize_filename(raw: &str) -> Option<String> {
    let name = std::path::Path::new(raw)
        .file_name()?
        .to_str()?
        .trim()
        .to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Reject uploads whose header is unreadable or missing the key column
fn validate_header(bytes: &[u8]) -> ApiResult<()> {
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("File is empty".to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| ApiError::BadRequest(format!("Unreadable CSV header: {}", e)))?;

    let has_key = headers
        .iter()
        .any(|h| h.trim_start_matches('\u{feff}') == KEY_COLUMN);
    if !has_key {
        return Err(ApiError::BadRequest(format!(
            "CSV is missing required column '{}'",
            KEY_COLUMN
        )));
    }

    Ok(())
}

/// Build import routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/import/upload", post(upload_import))
        .route("/import/status/:job_id", get(get_import_status))
}
