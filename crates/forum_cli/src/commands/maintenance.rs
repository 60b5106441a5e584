//! Setup, integrity checks, index rebuilds and backups.

use std::path::Path;

use forum_db::{fts, queries, Category, CategoryId, ForumDb};
use miette::Result;
use owo_colors::OwoColorize;
use tracing::warn;

use crate::output::Output;

/// Report where the forum's files live
pub async fn init(db: &ForumDb) -> Result<()> {
    let output = Output::new();
    db.health_check().await?;

    let config = db.config();
    output.success("Forum storage initialized");
    output.kv("  Config store", &config.config_db().display().to_string());
    output.kv("  Partitions", &config.partitions_dir().display().to_string());

    let categories = queries::list_all_categories(db.config_store().pool()).await?;
    output.kv("  Categories", &categories.len().to_string());
    Ok(())
}

/// Outcome of checking one partition.
#[derive(Debug, Default)]
struct PartitionCheck {
    schema: &'static str,
    index: &'static str,
    misplaced: Option<i64>,
    problems: usize,
}

impl PartitionCheck {
    fn fail(&mut self) {
        self.problems += 1;
    }
}

/// Check every partition's schema, search index and post placement
pub async fn verify(db: &ForumDb, repair: bool) -> Result<()> {
    let output = Output::new();
    db.config_store().health_check().await?;

    let categories = queries::list_all_categories(db.config_store().pool()).await?;
    if categories.is_empty() {
        output.info("No categories found", "nothing to verify");
        return Ok(());
    }

    let mut rows = Vec::with_capacity(categories.len());
    let mut problems = 0;
    for category in &categories {
        let check = verify_partition(db, category, repair).await;
        problems += check.problems;
        rows.push(vec![
            category.id.to_string(),
            category.name.clone(),
            check.schema.to_string(),
            check.index.to_string(),
            check
                .misplaced
                .map_or("-".to_string(), |count| count.to_string()),
        ]);
    }

    output.table(&["ID", "Name", "Schema", "Index", "Misplaced posts"], rows);

    if problems == 0 {
        output.success(&format!("{} partition(s) verified", categories.len()));
        Ok(())
    } else if repair {
        output.warning(&format!(
            "{} problem(s) remain after repair",
            problems.to_string().bright_red()
        ));
        Err(miette::miette!("verification failed"))
    } else {
        Err(miette::miette!(
            help = "rerun with --repair",
            "{} problem(s) found",
            problems
        ))
    }
}

async fn verify_partition(db: &ForumDb, category: &Category, repair: bool) -> PartitionCheck {
    let registry = db.registry();
    let key = category.id;
    let mut check = PartitionCheck::default();

    match registry.validate_schema(key).await {
        Ok(true) => check.schema = "ok",
        Ok(false) if repair => match registry.repair_schema(key).await {
            Ok(()) => check.schema = "repaired",
            Err(e) => {
                warn!(category_id = %key, error = %e, "Schema repair failed");
                check.schema = "repair failed";
                check.fail();
            }
        },
        Ok(false) => {
            check.schema = if registry.partition_path(key).exists() {
                "incomplete"
            } else {
                "missing file"
            };
            check.fail();
        }
        Err(e) => {
            warn!(category_id = %key, error = %e, "Partition unreadable");
            check.schema = "unreadable";
            check.index = "-";
            check.fail();
            return check;
        }
    }

    if check.problems > 0 {
        check.index = "-";
        return check;
    }

    let partition = match registry.open(key).await {
        Ok(partition) => partition,
        Err(e) => {
            warn!(category_id = %key, error = %e, "Partition unreadable");
            check.index = "-";
            check.fail();
            return check;
        }
    };

    check.index = match fts::check_posts_fts(partition.pool()).await {
        Ok(()) => "ok",
        Err(_) if repair => match fts::rebuild_posts_fts(partition.pool()).await {
            Ok(()) => "rebuilt",
            Err(e) => {
                warn!(category_id = %key, error = %e, "Index rebuild failed");
                check.fail();
                "rebuild failed"
            }
        },
        Err(_) => {
            check.fail();
            "inconsistent"
        }
    };

    // Misplaced rows can only be fixed by hand
    match queries::count_misplaced_posts(partition.pool(), key).await {
        Ok(count) => {
            if count > 0 {
                check.fail();
            }
            check.misplaced = Some(count);
        }
        Err(e) => {
            warn!(category_id = %key, error = %e, "Could not count misplaced posts");
            check.fail();
        }
    }

    check
}

/// Rebuild the search index of one or every active partition
pub async fn rebuild_index(db: &ForumDb, category: Option<CategoryId>) -> Result<()> {
    let output = Output::new();

    let keys = match category {
        Some(key) => {
            queries::require_active_category(db.config_store().pool(), key).await?;
            vec![key]
        }
        None => queries::list_active_category_ids(db.config_store().pool()).await?,
    };

    for key in keys {
        let partition = db.registry().open(key).await?;
        fts::rebuild_posts_fts(partition.pool()).await?;
        let stats = fts::get_fts_stats(partition.pool()).await?;
        output.list_item(&format!(
            "category {}: {} post(s) indexed",
            key.to_string().bright_cyan(),
            stats.posts_indexed
        ));
    }

    output.success("Search index rebuilt");
    Ok(())
}

/// Snapshot the config store and every active partition
pub async fn backup(db: &ForumDb, dir: &Path) -> Result<()> {
    let output = Output::new();

    let report = db.snapshot(dir).await?;

    output.success(&format!("Backup written to {}", dir.display()));
    output.kv("  Config store", &report.config_store.display().to_string());
    output.kv("  Partitions", &report.partitions.len().to_string());
    for path in &report.partitions {
        output.list_item(&path.display().to_string());
    }
    Ok(())
}
