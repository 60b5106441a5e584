//! Partition registry.
//!
//! Owns the mapping from category ID to an open partition store. Each
//! category's posts, comments and attachments live in their own SQLite file
//! under the partitions directory, created the first time the category is
//! touched.
//!
//! # Single-flight
//!
//! The cache holds one `OnceCell` per key. Concurrent first opens of the same
//! key all wait on that cell, so exactly one caller creates the file and
//! applies the schema; the rest reuse its handle. A failed (or cancelled)
//! initialization leaves the cell empty and the entry is dropped, so nothing
//! half-built is ever served from the cache.
//!
//! No map guard is held across an `.await`: callers clone the cell's `Arc`
//! out of the map first.
//!
//! # Lifecycle
//!
//! Creation and deletion run on spawned tasks so they finish even when the
//! caller is dropped. Deletion retires its key under the write side of a
//! lifecycle lock; first opens take the read side, so a key is never
//! re-created while its files are being removed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

use crate::config::partition_file;
use crate::connection::{remove_store_files, Store, StoreOptions};
use crate::deadline::bounded;
use crate::error::{DbError, DbResult};
use crate::models::{Category, CategoryId, NewCategory};
use crate::{queries, schema};

/// Maximum category name length, in characters.
pub const MAX_CATEGORY_NAME_CHARS: usize = 100;

/// An open category partition.
#[derive(Debug)]
pub struct Partition {
    key: CategoryId,
    store: Store,
}

impl Partition {
    /// The category this partition belongs to.
    pub fn key(&self) -> CategoryId {
        self.key
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        self.store.pool()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

type PartitionCell = Arc<OnceCell<Arc<Partition>>>;

/// Lazily opens, caches and tears down category partitions.
#[derive(Debug)]
pub struct PartitionRegistry {
    config: Store,
    dir: PathBuf,
    options: StoreOptions,
    timeout: Option<Duration>,
    partitions: DashMap<CategoryId, PartitionCell>,
    /// Keys being deleted or already deleted
    retired: DashSet<CategoryId>,
    lifecycle: RwLock<()>,
    initializations: AtomicUsize,
}

impl PartitionRegistry {
    /// Create a registry storing partitions under `dir`.
    ///
    /// `config` is the shared config store, used for category creation and
    /// deletion. Nothing is opened until first use.
    pub fn new(
        config: Store,
        dir: impl Into<PathBuf>,
        options: StoreOptions,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            config,
            dir: dir.into(),
            options,
            timeout,
            partitions: DashMap::new(),
            retired: DashSet::new(),
            lifecycle: RwLock::new(()),
            initializations: AtomicUsize::new(0),
        }
    }

    /// Directory holding the partition files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a partition lives in, whether or not it exists yet.
    pub fn partition_path(&self, key: CategoryId) -> PathBuf {
        partition_file(&self.dir, key)
    }

    /// The shared config store.
    pub fn config(&self) -> &Store {
        &self.config
    }

    /// Return the partition for `key`, creating the store and applying the
    /// content schema on first use.
    ///
    /// This does not consult the config store; use [`Self::open_active`] when
    /// the category must exist and be active. A partition that is being
    /// deleted, or was deleted through this registry, is NotFound.
    pub async fn open(&self, key: CategoryId) -> DbResult<Arc<Partition>> {
        if self.retired.contains(&key) {
            return Err(DbError::not_found("partition", key));
        }
        if let Some(partition) = self.cached(key) {
            return Ok(partition);
        }

        // Deletion holds the write side, so no file is created mid-delete
        let _gate = self.lifecycle.read().await;
        if self.retired.contains(&key) {
            return Err(DbError::not_found("partition", key));
        }

        let cell = self.partitions.entry(key).or_default().clone();
        let result = cell
            .get_or_try_init(|| bounded(self.timeout, "open partition", self.initialize(key)))
            .await;

        match result {
            Ok(partition) => Ok(partition.clone()),
            Err(e) => {
                // Drop the empty cell so the next caller starts fresh, unless
                // someone already replaced it.
                self.partitions
                    .remove_if(&key, |_, c| Arc::ptr_eq(c, &cell) && !c.initialized());
                warn!(category_id = %key, error = %e, "Failed to open partition");
                Err(e)
            }
        }
    }

    /// Open the partition of an active category, failing with NotFound for
    /// unknown or deactivated categories.
    pub async fn open_active(&self, key: CategoryId) -> DbResult<Arc<Partition>> {
        queries::require_active_category(self.config.pool(), key).await?;
        self.open(key).await
    }

    async fn initialize(&self, key: CategoryId) -> DbResult<Arc<Partition>> {
        let path = self.partition_path(key);
        let existed = path.exists();

        let store = match Store::open(&path, self.options).await {
            Ok(store) => store,
            Err(e) => {
                if !existed {
                    discard_files(&path);
                }
                return Err(e);
            }
        };

        if let Err(e) = schema::apply_content_schema(store.pool(), key).await {
            store.close().await;
            if !existed {
                discard_files(&path);
            }
            return Err(e);
        }

        self.initializations.fetch_add(1, Ordering::Relaxed);
        info!(category_id = %key, created = !existed, "Partition ready");

        Ok(Arc::new(Partition { key, store }))
    }

    /// Whether a handle for `key` is cached and ready. No side effects.
    pub fn is_open(&self, key: CategoryId) -> bool {
        self.partitions
            .get(&key)
            .map_or(false, |cell| cell.initialized())
    }

    /// Keys with a ready handle, ascending.
    pub fn open_keys(&self) -> Vec<CategoryId> {
        let mut keys: Vec<CategoryId> = self
            .partitions
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| *entry.key())
            .collect();
        keys.sort();
        keys
    }

    /// Number of partition initializations performed by this registry.
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::Relaxed)
    }

    /// Create a category and its partition as one unit.
    ///
    /// The category row is inserted inside a config-store transaction that
    /// only commits once the partition is open and has its schema. If
    /// anything fails the row is rolled back and the partition discarded.
    /// The work runs on its own task, so a caller that stops waiting cannot
    /// leave it half done.
    pub async fn create_partition(self: &Arc<Self>, category: &NewCategory) -> DbResult<Category> {
        validate_category_name(&category.name)?;

        let registry = Arc::clone(self);
        let category = category.clone();
        tokio::spawn(async move { registry.insert_partition(&category).await }).await?
    }

    async fn insert_partition(&self, category: &NewCategory) -> DbResult<Category> {
        let mut tx = self.config.pool().begin().await?;
        let created = queries::insert_category(&mut *tx, category).await?;

        // tx rolls back on drop if the partition cannot be opened
        self.open(created.id).await?;

        if let Err(e) = tx.commit().await {
            warn!(category_id = %created.id, error = %e, "Category insert failed to commit");
            self.discard(created.id).await;
            return Err(e.into());
        }

        info!(category_id = %created.id, name = %created.name, "Created category partition");
        Ok(created)
    }

    /// Delete an empty category and its partition.
    ///
    /// While this runs the key is retired: opens fail with NotFound and the
    /// cached handle is closed, which waits for in-flight statements to
    /// finish. Posts are then counted on a private connection. With none
    /// left, the files are removed and the category row and its moderator
    /// grants are deleted in one transaction. Otherwise the call fails with
    /// [`DbError::NotEmpty`] and the partition can be opened again.
    ///
    /// Handles obtained before the delete stop working once it starts.
    pub async fn delete_partition(self: &Arc<Self>, key: CategoryId) -> DbResult<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move { registry.remove_partition(key).await }).await?
    }

    async fn remove_partition(&self, key: CategoryId) -> DbResult<()> {
        let _gate = self.lifecycle.write().await;

        if queries::get_category(self.config.pool(), key).await?.is_none() {
            return Err(DbError::not_found("category", key));
        }

        self.retired.insert(key);
        self.evict(key).await;

        let result = self.remove_retired(key).await;
        if result.is_err() {
            self.retired.remove(&key);
        }
        result
    }

    async fn remove_retired(&self, key: CategoryId) -> DbResult<()> {
        let path = self.partition_path(key);
        let posts = if path.exists() {
            let store = Store::open(&path, StoreOptions::partition(1)).await?;
            let posts = queries::count_posts(store.pool()).await;
            store.close().await;
            posts?
        } else {
            0
        };
        if posts > 0 {
            return Err(DbError::NotEmpty {
                entity_type: "category",
                id: key.to_string(),
                count: posts,
            });
        }

        let mut tx = self.config.pool().begin().await?;
        let grants = queries::delete_grants_for_category(&mut *tx, key).await?;
        queries::delete_category(&mut *tx, key).await?;

        // tx rolls back on drop if the files cannot be removed
        remove_store_files(&path)?;

        tx.commit().await?;
        info!(category_id = %key, grants_removed = grants, "Deleted category partition");
        Ok(())
    }

    /// Whether the partition's store has every required table and trigger.
    ///
    /// Inspects without repairing: an unopened partition is examined through
    /// a temporary connection, and a missing file counts as invalid.
    pub async fn validate_schema(&self, key: CategoryId) -> DbResult<bool> {
        if let Some(partition) = self.cached(key) {
            return schema::content_schema_is_current(partition.pool()).await;
        }

        let path = self.partition_path(key);
        if !path.exists() {
            return Ok(false);
        }

        let store = Store::open(&path, StoreOptions::partition(1)).await?;
        let result = schema::content_schema_is_current(store.pool()).await;
        store.close().await;
        result
    }

    /// Re-apply the content schema to a partition.
    pub async fn repair_schema(&self, key: CategoryId) -> DbResult<()> {
        match self.cached(key) {
            Some(partition) => schema::apply_content_schema(partition.pool(), key).await?,
            // A fresh open applies the schema
            None => {
                self.open(key).await?;
            }
        }
        info!(category_id = %key, "Re-applied partition schema");
        Ok(())
    }

    /// Close every open partition. Cells that never finished initializing
    /// are simply dropped.
    pub async fn close_all(&self) {
        let keys: Vec<CategoryId> = self.partitions.iter().map(|e| *e.key()).collect();
        let mut closed = 0;
        for key in keys {
            if let Some((_, cell)) = self.partitions.remove(&key) {
                if let Some(partition) = cell.get() {
                    partition.store.close().await;
                    closed += 1;
                }
            }
        }
        debug!(closed, "Closed all partitions");
    }

    fn cached(&self, key: CategoryId) -> Option<Arc<Partition>> {
        self.partitions
            .get(&key)
            .and_then(|cell| cell.get().cloned())
    }

    async fn evict(&self, key: CategoryId) {
        if let Some((_, cell)) = self.partitions.remove(&key) {
            if let Some(partition) = cell.get() {
                partition.store.close().await;
            }
        }
    }

    async fn discard(&self, key: CategoryId) {
        self.evict(key).await;
        discard_files(&self.partition_path(key));
    }
}

fn discard_files(path: &Path) {
    if let Err(e) = remove_store_files(path) {
        warn!(path = %path.display(), error = %e, "Failed to remove partial partition");
    }
}

/// Check a category name before any store access.
pub fn validate_category_name(name: &str) -> DbResult<()> {
    if name.trim().is_empty() {
        return Err(DbError::invalid_data("category name cannot be empty"));
    }
    if name.chars().count() > MAX_CATEGORY_NAME_CHARS {
        return Err(DbError::invalid_data(format!(
            "category name exceeds {MAX_CATEGORY_NAME_CHARS} characters"
        )));
    }
    Ok(())
}
