//! Configuration for katib-points

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::TrackingError;
use crate::points::PointValues;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("katib-points")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the database and config file
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// SQLite file name inside `storage_dir`
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Serialize recorder writes per student inside this process
    #[serde(default = "default_true")]
    pub serialize_student_writes: bool,

    /// Default number of leaderboard lines
    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_limit: usize,

    /// Points per completion. Read once at startup.
    #[serde(default)]
    pub points: PointValues,
}

fn default_database_file() -> String {
    "tracking.db".to_string()
}

fn default_true() -> bool {
    true
}

fn default_leaderboard_limit() -> usize {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            database_file: default_database_file(),
            serialize_student_writes: true,
            leaderboard_limit: default_leaderboard_limit(),
            points: PointValues::default(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TrackingError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| TrackingError::Config(e.to_string()))?;
        config.points.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), TrackingError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TrackingError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get database path
    pub fn database_path(&self) -> PathBuf {
        self.storage_dir.join(&self.database_file)
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}
