//! Application state management

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use pairup_core::Database;
use tracing::info;

use crate::config::AppConfig;
use crate::error::{AppError, Result};

const DATABASE_FILE: &str = "pairup.db";

/// Local state opened at startup
pub struct AppState {
    pub db: Database,
    data_dir: PathBuf,
}

impl AppState {
    pub fn open(config: &AppConfig) -> Result<Self> {
        let data_dir = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => Self::data_path()?,
        };
        Self::open_in(&data_dir)
    }

    /// Open (creating if needed) the database under `data_dir`
    pub fn open_in(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db = Database::open(data_dir.join(DATABASE_FILE))?;
        info!(data_dir = %data_dir.display(), schema = db.schema_version(), "Opened local state");

        Ok(Self {
            db,
            data_dir: data_dir.to_path_buf(),
        })
    }

    fn data_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "pairup", "pairup").ok_or_else(|| {
            AppError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine data directory",
            ))
        })?;

        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
