//! Data models for svault-import

pub mod import_job;
pub mod song;

pub use import_job::{ImportJob, JobStatus};
pub use song::NewSong;
