//! Job runner: drives the row processor over an uploaded CSV file
//!
//! Exactly one runner task executes per import job, spawned at job-creation
//! time. Rows are processed strictly in input order; inserts happen in
//! fixed-size batches and progress counters are checkpointed to the job
//! store so the poller sees near-real-time state. A fatal error (unreadable
//! input, destination store down) aborts the remainder of the job. The
//! uploaded temp file is removed on both success and failure paths.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use svault_common::{Error, ImportTuning, Result};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::{JobStore, SongStore};
use crate::models::{ImportJob, NewSong};
use crate::services::row_processor::{self, RowOutcome};

/// Run one import job to a terminal state.
///
/// Never blocks the request that created the job; callers spawn this onto
/// the runtime with `tokio::spawn`.
pub async fn run_import(
    jobs: Arc<dyn JobStore>,
    songs: Arc<dyn SongStore>,
    tuning: ImportTuning,
    job_id: Uuid,
    file_path: PathBuf,
) {
    let mut job = match jobs.get(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            error!(job_id = %job_id, "Import job not found, abandoning run");
            cleanup_upload(&file_path).await;
            return;
        }
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Failed to load import job");
            cleanup_upload(&file_path).await;
            return;
        }
    };

    match drive(&mut job, &*jobs, &*songs, tuning, &file_path).await {
        Ok(()) => {
            info!(
                job_id = %job.id,
                inserted = job.inserted_count,
                duplicates = job.duplicate_count,
                errors = job.error_count,
                "Import job completed"
            );
        }
        Err(e) => {
            error!(job_id = %job.id, error = %e, "Import job failed");
            job.fail(e.to_string());
            if let Err(put_err) = jobs.put(&job).await {
                error!(job_id = %job.id, error = %put_err, "Failed to persist failed job state");
            }
        }
    }

    cleanup_upload(&file_path).await;
}

async fn drive(
    job: &mut ImportJob,
    jobs: &dyn JobStore,
    songs: &dyn SongStore,
    tuning: ImportTuning,
    path: &Path,
) -> Result<()> {
    job.start();
    jobs.put(job).await?;

    job.total_rows = count_data_rows(path)?;
    jobs.put(job).await?;

    info!(job_id = %job.id, total_rows = job.total_rows, "Starting import");

    // Keys already in the destination store plus keys inserted earlier in
    // this job. The store's uniqueness constraint remains the final
    // authority; this set only avoids pointless insert attempts.
    let mut known_keys = songs.known_keys().await?;

    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader)?;

    let mut batch: Vec<NewSong> = Vec::with_capacity(tuning.batch_size);
    let mut processed: u64 = 0;

    for record in reader.records() {
        match record {
            Ok(record) => {
                if record.iter().all(|f| f.trim().is_empty()) {
                    continue;
                }
                let row = record_to_row(&headers, &record);
                processed += 1;

                match row_processor::process_row(&row, &known_keys) {
                    RowOutcome::Inserted(song) => {
                        known_keys.insert(song.track_uri.clone());
                        batch.push(*song);
                        job.inserted_count += 1;
                    }
                    RowOutcome::Duplicate(_) => {
                        job.duplicate_count += 1;
                    }
                    RowOutcome::Error(reason) => {
                        job.error_count += 1;
                        log_row_error(job, processed, &reason);
                    }
                }
            }
            Err(e) => {
                // Malformed row: counted, skipped, never aborts the job
                processed += 1;
                job.error_count += 1;
                log_row_error(job, processed, &e.to_string());
            }
        }

        job.processed_rows = processed;

        if batch.len() >= tuning.batch_size {
            flush_batch(songs, &mut batch, job).await?;
        }

        // Checkpoint: flush first so persisted counters reflect what the
        // destination store accepted, then replace the job record whole.
        if processed % tuning.checkpoint_interval as u64 == 0 {
            flush_batch(songs, &mut batch, job).await?;
            jobs.put(job).await?;
        }
    }

    flush_batch(songs, &mut batch, job).await?;

    job.complete();
    jobs.put(job).await?;

    Ok(())
}

/// Insert the pending batch and reconcile against the store's verdict.
///
/// Rows the store rejects (a concurrent job inserted the same key first)
/// are re-counted from inserted to duplicate. On a store failure the whole
/// batch is re-counted as errors before the error propagates, keeping the
/// counter sum equal to processed rows even in the failure record.
async fn flush_batch(
    songs: &dyn SongStore,
    batch: &mut Vec<NewSong>,
    job: &mut ImportJob,
) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }

    let attempted = batch.len() as u64;
    match songs.insert_batch(batch).await {
        Ok(inserted) => {
            let lost = attempted - inserted;
            if lost > 0 {
                job.inserted_count -= lost;
                job.duplicate_count += lost;
                warn!(job_id = %job.id, lost, "Rows lost uniqueness race, re-counted as duplicates");
            }
            batch.clear();
            Ok(())
        }
        Err(e) => {
            job.inserted_count -= attempted;
            job.error_count += attempted;
            batch.clear();
            Err(e)
        }
    }
}

/// Count data rows (excluding the header and fully blank rows)
fn count_data_rows(path: &Path) -> Result<u64> {
    let mut reader = open_reader(path)?;
    let mut count = 0u64;
    for record in reader.records() {
        match record {
            Ok(record) => {
                if !record.iter().all(|f| f.trim().is_empty()) {
                    count += 1;
                }
            }
            // Malformed rows still occupy a row; the processing pass counts
            // them as row errors.
            Err(_) => count += 1,
        }
    }
    Ok(count)
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::InvalidInput(format!("Unreadable CSV file: {}", e)))
}

/// Header row with a UTF-8 BOM stripped from the first column
fn read_headers(reader: &mut csv::Reader<std::fs::File>) -> Result<Vec<String>> {
    let headers = reader
        .headers()
        .map_err(|e| Error::InvalidInput(format!("Unreadable CSV header: {}", e)))?;
    Ok(headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect())
}

fn record_to_row(headers: &[String], record: &csv::StringRecord) -> HashMap<String, String> {
    headers
        .iter()
        .zip(record.iter())
        .map(|(h, v)| (h.clone(), v.to_string()))
        .collect()
}

fn log_row_error(job: &ImportJob, row: u64, reason: &str) {
    // First 10 errors and then every 100th, to keep log volume bounded
    if job.error_count <= 10 || job.error_count % 100 == 0 {
        warn!(job_id = %job.id, row, reason, "Skipping row");
    }
}

async fn cleanup_upload(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!("Cleaned up import file: {}", path.display()),
        Err(e) => warn!("Failed to clean up import file {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn count_excludes_header_and_blank_rows() {
        let file = write_csv("Track URI,Track Name\nuri:1,One\n,\nuri:2,Two\n");
        assert_eq!(count_data_rows(file.path()).unwrap(), 2);
    }

    #[test]
    fn headers_are_bom_stripped() {
        let file = write_csv("\u{feff}Track URI,Track Name\nuri:1,One\n");
        let mut reader = open_reader(file.path()).unwrap();
        let headers = read_headers(&mut reader).unwrap();
        assert_eq!(headers[0], "Track URI");
    }

    #[test]
    fn short_rows_map_to_present_columns_only() {
        let headers = vec!["Track URI".to_string(), "Track Name".to_string()];
        let record = csv::StringRecord::from(vec!["uri:1"]);
        let row = record_to_row(&headers, &record);
        assert_eq!(row.get("Track URI").map(String::as_str), Some("uri:1"));
        assert!(!row.contains_key("Track Name"));
    }
}
