//! Import job record and status lifecycle
//!
//! One record tracks one CSV bulk-import attempt. Status moves monotonically
//! along `queued -> running -> {completed|failed}`; terminal states are
//! immutable. The job runner is the sole writer, the status endpoint only
//! reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Import job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, runner not yet started processing
    Queued,
    /// Runner is processing rows
    Running,
    /// All rows processed
    Completed,
    /// Aborted by a fatal error
    Failed,
}

impl JobStatus {
    /// Terminal states accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Durable state for one import attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    /// Opaque job identifier, used as the polling key
    pub id: Uuid,
    pub status: JobStatus,
    /// Data rows in the uploaded file (set once the input is parsed)
    pub total_rows: u64,
    /// Rows consumed so far; never exceeds `total_rows`
    pub processed_rows: u64,
    pub inserted_count: u64,
    pub duplicate_count: u64,
    pub error_count: u64,
    /// Name of the uploaded file as provided by the client
    pub original_filename: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set only when status is `failed`
    pub error_message: Option<String>,
}

impl ImportJob {
    /// Create a fresh job in `queued` state with all counters zero
    pub fn new(original_filename: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Queued,
            total_rows: 0,
            processed_rows: 0,
            inserted_count: 0,
            duplicate_count: 0,
            error_count: 0,
            original_filename: original_filename.into(),
            started_at: None,
            finished_at: None,
            error_message: None,
        }
    }

    /// Transition `queued -> running`. No-op from any other state.
    pub fn start(&mut self) {
        if self.status == JobStatus::Queued {
            self.status = JobStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// Transition `running -> completed`. No-op once terminal.
    ///
    /// Completion pins `processed_rows` to `total_rows`.
    pub fn complete(&mut self) {
        if self.status == JobStatus::Running {
            self.status = JobStatus::Completed;
            self.processed_rows = self.total_rows;
            self.finished_at = Some(Utc::now());
        }
    }

    /// Transition to `failed` with an operator-visible message. No-op once
    /// terminal.
    pub fn fail(&mut self, message: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Failed;
            self.error_message = Some(message.into());
            self.finished_at = Some(Utc::now());
        }
    }

    /// Integer progress percentage, floor(processed/total*100).
    ///
    /// Returns 0 while `total_rows` is 0 (queued, or input not yet counted).
    pub fn progress_percent(&self) -> u64 {
        if self.total_rows == 0 {
            return 0;
        }
        self.processed_rows * 100 / self.total_rows
    }

    /// Counter consistency: every processed row lands in exactly one bucket
    pub fn counters_consistent(&self) -> bool {
        self.inserted_count + self.duplicate_count + self.error_count == self.processed_rows
            && self.processed_rows <= self.total_rows
    }
}
