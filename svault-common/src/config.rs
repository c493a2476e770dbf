//! Configuration loading and root folder resolution
//!
//! Resolution priority for every setting:
//! 1. Environment variable (`SONGVAULT_*`)
//! 2. TOML config file (`~/.config/songvault/config.toml`)
//! 3. Compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default HTTP listen port for svault-import
pub const DEFAULT_PORT: u16 = 5745;

/// Import pipeline tuning knobs
#[derive(Debug, Clone, Copy)]
pub struct ImportTuning {
    /// Rows accumulated before a batch insert into the song store
    pub batch_size: usize,
    /// Rows between progress checkpoint writes to the job store
    pub checkpoint_interval: usize,
}

impl Default for ImportTuning {
    fn default() -> Self {
        Self {
            batch_size: 50,
            checkpoint_interval: 25,
        }
    }
}

impl ImportTuning {
    /// Validate tuning constraints.
    ///
    /// The checkpoint interval must not exceed the batch size, otherwise
    /// progress writes would lag behind batch commits.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.checkpoint_interval == 0 {
            return Err(Error::Config(
                "batch_size and checkpoint_interval must be positive".to_string(),
            ));
        }
        if self.checkpoint_interval > self.batch_size {
            return Err(Error::Config(format!(
                "checkpoint_interval ({}) must be <= batch_size ({})",
                self.checkpoint_interval, self.batch_size
            )));
        }
        Ok(())
    }
}

/// Service configuration for svault-import
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listen port
    pub listen_port: u16,
    /// Data root folder (database and uploads live underneath)
    pub root_folder: PathBuf,
    /// Import pipeline tuning
    pub import: ImportTuning,
}

/// Optional keys read from the TOML config file
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    port: Option<u16>,
    root_folder: Option<String>,
    batch_size: Option<usize>,
    checkpoint_interval: Option<usize>,
}

impl ServiceConfig {
    /// Load configuration from environment and config file
    pub fn load() -> Result<Self> {
        let file = load_config_file().unwrap_or_default();

        let listen_port = match std::env::var("SONGVAULT_PORT") {
            Ok(v) => v
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("Invalid SONGVAULT_PORT: {}", v)))?,
            Err(_) => file.port.unwrap_or(DEFAULT_PORT),
        };

        let root_folder = std::env::var("SONGVAULT_ROOT_FOLDER")
            .map(PathBuf::from)
            .ok()
            .or_else(|| file.root_folder.as_deref().map(PathBuf::from))
            .unwrap_or_else(default_root_folder);

        let defaults = ImportTuning::default();
        let import = ImportTuning {
            batch_size: file.batch_size.unwrap_or(defaults.batch_size),
            checkpoint_interval: file
                .checkpoint_interval
                .unwrap_or(defaults.checkpoint_interval),
        };
        import.validate()?;

        Ok(Self {
            listen_port,
            root_folder,
            import,
        })
    }

    /// Build a configuration rooted at an explicit folder (used by tests)
    pub fn with_root(root_folder: impl Into<PathBuf>) -> Self {
        Self {
            listen_port: DEFAULT_PORT,
            root_folder: root_folder.into(),
            import: ImportTuning::default(),
        }
    }

    /// Path of the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("songvault.db")
    }

    /// Directory where uploaded CSV files are staged until consumed
    pub fn upload_dir(&self) -> PathBuf {
        self.root_folder.join("uploads")
    }

    /// Create the root and upload directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.upload_dir())?;
        Ok(())
    }
}

fn load_config_file() -> Option<ConfigFile> {
    let path = config_file_path()?;
    let content = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => Some(file),
        Err(e) => {
            tracing::warn!("Ignoring malformed config file {}: {}", path.display(), e);
            None
        }
    }
}

fn config_file_path() -> Option<PathBuf> {
    // ~/.config/songvault/config.toml, then /etc/songvault/config.toml
    if let Some(user_config) = dirs::config_dir().map(|d| d.join("songvault").join("config.toml")) {
        if user_config.exists() {
            return Some(user_config);
        }
    }
    let system_config = Path::new("/etc/songvault/config.toml");
    if system_config.exists() {
        return Some(system_config.to_path_buf());
    }
    None
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("songvault"))
        .unwrap_or_else(|| PathBuf::from("./songvault_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tuning_is_valid() {
        assert!(ImportTuning::default().validate().is_ok());
    }

    #[test]
    fn checkpoint_interval_must_not_exceed_batch_size() {
        let tuning = ImportTuning {
            batch_size: 10,
            checkpoint_interval: 20,
        };
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let tuning = ImportTuning {
            batch_size: 0,
            checkpoint_interval: 0,
        };
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn paths_derive_from_root_folder() {
        let config = ServiceConfig::with_root("/tmp/sv-test");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/sv-test/songvault.db"));
        assert_eq!(config.upload_dir(), PathBuf::from("/tmp/sv-test/uploads"));
    }
}
