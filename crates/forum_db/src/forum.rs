//! The forum's storage, assembled.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::connection::{Store, StoreOptions};
use crate::content::ContentService;
use crate::coordinator::Coordinator;
use crate::error::DbResult;
use crate::permissions::Moderation;
use crate::registry::PartitionRegistry;
use crate::{queries, schema};

/// Owns the config store and the partition registry, and hands out the
/// services built on them.
#[derive(Debug, Clone)]
pub struct ForumDb {
    config: DatabaseConfig,
    registry: Arc<PartitionRegistry>,
}

/// What a snapshot wrote.
#[derive(Debug, Clone, Default)]
pub struct SnapshotReport {
    pub config_store: PathBuf,
    pub partitions: Vec<PathBuf>,
}

impl ForumDb {
    /// Open (or create) the config store and apply its schema.
    ///
    /// Partitions are opened lazily on first use.
    pub async fn open(config: &DatabaseConfig) -> DbResult<Self> {
        let store = Store::open(
            config.config_db(),
            StoreOptions::config_store(config.config_max_connections),
        )
        .await?;
        schema::apply_config_schema(store.pool()).await?;

        let registry = PartitionRegistry::new(
            store,
            config.partitions_dir(),
            StoreOptions::partition(config.partition_max_connections),
            config.operation_timeout(),
        );

        info!(path = %config.path.display(), "Forum storage ready");
        Ok(Self {
            config: config.clone(),
            registry: Arc::new(registry),
        })
    }

    /// Open with default settings rooted at `dir`.
    pub async fn open_in(dir: impl Into<PathBuf>) -> DbResult<Self> {
        Self::open(&DatabaseConfig::at(dir)).await
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// The shared config store.
    pub fn config_store(&self) -> &Store {
        self.registry.config()
    }

    pub fn registry(&self) -> &Arc<PartitionRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> Coordinator {
        Coordinator::new(self.registry.clone(), self.config.operation_timeout())
    }

    pub fn moderation(&self) -> Moderation {
        Moderation::new(self.registry.clone())
    }

    pub fn content(&self) -> ContentService {
        ContentService::new(self.registry.clone(), self.config.operation_timeout())
    }

    /// Check the config store and every open partition respond.
    pub async fn health_check(&self) -> DbResult<()> {
        self.config_store().health_check().await?;
        for key in self.registry.open_keys() {
            self.registry.open(key).await?.store().health_check().await?;
        }
        Ok(())
    }

    /// Copy the config store and each active partition into `dest`.
    ///
    /// Each file is written with `VACUUM INTO` and can be restored on its own
    /// by copying it back into the data directory under the same name.
    pub async fn snapshot(&self, dest: impl AsRef<Path>) -> DbResult<SnapshotReport> {
        let dest = dest.as_ref();
        std::fs::create_dir_all(dest.join("partitions"))?;

        let config_store = dest.join("forum.db");
        self.config_store().snapshot_to(&config_store).await?;

        let mut partitions = Vec::new();
        let partitions_dir = dest.join("partitions");
        for key in queries::list_active_category_ids(self.config_store().pool()).await? {
            let partition = self.registry.open(key).await?;
            let file = self.registry.partition_path(key);
            let target = match file.file_name() {
                Some(name) => partitions_dir.join(name),
                None => {
                    warn!(category_id = %key, "Partition path has no file name, skipping");
                    continue;
                }
            };
            partition.store().snapshot_to(&target).await?;
            partitions.push(target);
        }

        info!(dest = %dest.display(), partitions = partitions.len(), "Snapshot written");
        Ok(SnapshotReport {
            config_store,
            partitions,
        })
    }

    /// Close every partition, then the config store.
    pub async fn close(&self) {
        let opened = self.registry.initializations();
        self.registry.close_all().await;
        self.config_store().close().await;
        info!(partitions_opened = opened, "Forum storage closed");
    }
}
