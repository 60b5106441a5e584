//! Store connection management.
//!
//! A [`Store`] is one single-file SQLite database behind a connection pool.
//! It knows nothing about schemas; the config store and every category
//! partition are opened through it and then handed to [`crate::schema`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::error::DbResult;

/// Pool and pragma settings for one store.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub max_connections: u32,
    /// Page cache size in KiB
    pub cache_kib: u32,
    pub busy_timeout: Duration,
}

impl StoreOptions {
    /// Settings for the shared config store.
    pub fn config_store(max_connections: u32) -> Self {
        Self {
            max_connections,
            cache_kib: 16_000,
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Settings for a category partition. Many of these are open at once,
    /// so each gets a smaller cache.
    pub fn partition(max_connections: u32) -> Self {
        Self {
            max_connections,
            cache_kib: 4_000,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::config_store(5)
    }
}

/// Connection pool for one database file.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl Store {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directory and the file if they do not exist and
    /// configures WAL mode with foreign keys enforced on every connection.
    pub async fn open(path: impl AsRef<Path>, store_options: StoreOptions) -> DbResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening store: {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(store_options.busy_timeout)
            .pragma("cache_size", format!("-{}", store_options.cache_kib))
            .pragma("synchronous", "NORMAL") // Safe with WAL
            .pragma("temp_store", "MEMORY")
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(store_options.max_connections.max(1))
            .connect_with(options)
            .await?;

        debug!("Store connection established");

        Ok(Self {
            pool,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory store (for testing).
    pub async fn open_in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(1) // In-memory must be single connection to share state
            .connect_with(options)
            .await?;

        Ok(Self { pool, path: None })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Backing file, or None for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close the store. Waits for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Check if the store is healthy.
    pub async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Write a consistent, compacted copy of the store to `dest`.
    ///
    /// The destination must not exist yet.
    pub async fn snapshot_to(&self, dest: impl AsRef<Path>) -> DbResult<()> {
        let dest = dest.as_ref();
        if let Some(parent) = dest.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }
        debug!("Snapshotting store to {}", dest.display());
        sqlx::query("VACUUM INTO ?")
            .bind(dest.to_string_lossy().into_owned())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Remove a database file along with its WAL and shared-memory siblings.
///
/// Missing files are not an error.
pub(crate) fn remove_store_files(path: &Path) -> std::io::Result<()> {
    let mut wal = path.as_os_str().to_owned();
    wal.push("-wal");
    let mut shm = path.as_os_str().to_owned();
    shm.push("-shm");

    for file in [path.to_path_buf(), PathBuf::from(wal), PathBuf::from(shm)] {
        match std::fs::remove_file(&file) {
            Ok(()) => debug!("Removed {}", file.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let store = Store::open_in_memory().await.unwrap();
        store.health_check().await.unwrap();
        assert!(store.path().is_none());
    }

    #[tokio::test]
    async fn test_open_creates_file_and_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");

        let store = Store::open(&path, StoreOptions::partition(2)).await.unwrap();
        store.health_check().await.unwrap();
        assert!(path.exists());

        let fk: (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(fk.0, 1);

        store.close().await;
        assert!(store.is_closed());
    }

    #[tokio::test]
    async fn test_remove_store_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.db");

        let store = Store::open(&path, StoreOptions::partition(1)).await.unwrap();
        sqlx::query("CREATE TABLE t (x INTEGER)")
            .execute(store.pool())
            .await
            .unwrap();
        store.close().await;

        remove_store_files(&path).unwrap();
        assert!(!path.exists());

        // Second removal is a no-op
        remove_store_files(&path).unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_to() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("src.db"), StoreOptions::default())
            .await
            .unwrap();
        sqlx::query("CREATE TABLE t (x INTEGER)")
            .execute(store.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO t (x) VALUES (42)")
            .execute(store.pool())
            .await
            .unwrap();

        let dest = dir.path().join("backup").join("copy.db");
        store.snapshot_to(&dest).await.unwrap();

        let copy = Store::open(&dest, StoreOptions::default()).await.unwrap();
        let x: (i64,) = sqlx::query_as("SELECT x FROM t")
            .fetch_one(copy.pool())
            .await
            .unwrap();
        assert_eq!(x.0, 42);
    }
}
