//! # SongVault Common Library
//!
//! Shared code for SongVault services:
//! - Common error type
//! - Configuration loading and root folder resolution

pub mod config;
pub mod error;

pub use config::{ImportTuning, ServiceConfig};
pub use error::{Error, Result};
