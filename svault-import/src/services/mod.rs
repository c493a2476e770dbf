//! Import pipeline services

pub mod job_runner;
pub mod row_processor;

pub use job_runner::run_import;
pub use row_processor::{process_row, RowOutcome, KEY_COLUMN};
