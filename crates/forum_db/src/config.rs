//! Storage configuration.
//!
//! Loaded from the `[database]` table of the forum's TOML config file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};
use crate::CategoryId;

/// Top-level config file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForumConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl ForumConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> DbResult<Self> {
        toml::from_str(text).map_err(|e| DbError::Config {
            message: e.to_string(),
        })
    }

    /// Load a config file from disk.
    pub fn load(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|e| DbError::Config {
            message: format!("{}: {}", path.display(), e),
        })
    }
}

/// Database configuration for SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the data directory.
    pub path: PathBuf,

    /// Pool size for the shared config store.
    pub config_max_connections: u32,

    /// Pool size for each category partition.
    pub partition_max_connections: u32,

    /// Default deadline applied to every store call, if any.
    pub operation_timeout_secs: Option<u64>,
}

impl DatabaseConfig {
    /// Config store rooted at `path`, with default pool sizes.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Path to the config database file.
    pub fn config_db(&self) -> PathBuf {
        self.path.join("forum.db")
    }

    /// Directory holding one database file per category.
    pub fn partitions_dir(&self) -> PathBuf {
        self.path.join("partitions")
    }

    /// Path to the partition file for a category.
    pub fn partition_db(&self, key: CategoryId) -> PathBuf {
        partition_file(&self.partitions_dir(), key)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("forum"),
            config_max_connections: 5,
            partition_max_connections: 3,
            operation_timeout_secs: None,
        }
    }
}

/// Deterministic file name for a partition key.
pub(crate) fn partition_file(dir: &Path, key: CategoryId) -> PathBuf {
    dir.join(format!("category_{}.db", key.get()))
}
