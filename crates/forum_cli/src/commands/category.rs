//! Category management commands.
//!
//! Creating a category also creates its partition file; deleting one
//! removes the file and is refused while the partition still holds posts.

use std::collections::HashMap;

use forum_db::{queries, CategoryId, CategorySummary, ForumDb, NewCategory};
use miette::Result;
use owo_colors::OwoColorize;

use super::format_time;
use crate::output::Output;

/// List categories, with post counts for the active ones
pub async fn list(db: &ForumDb, all: bool) -> Result<()> {
    let output = Output::new();
    let pool = db.config_store().pool();

    let categories = if all {
        queries::list_all_categories(pool).await?
    } else {
        queries::list_active_categories(pool).await?
    };

    if categories.is_empty() {
        output.info(
            "No categories found",
            "Create one with: forum-cli category create <name>",
        );
        return Ok(());
    }

    let summaries: HashMap<CategoryId, CategorySummary> = db
        .coordinator()
        .list_categories()
        .await?
        .into_iter()
        .map(|s| (s.category.id, s))
        .collect();

    output.status(&format!("Found {} category(ies):", categories.len()));
    output.table(
        &["ID", "Name", "Order", "Active", "Posts", "Comments", "Last activity"],
        categories.iter().map(|category| {
            let summary = summaries.get(&category.id);
            vec![
                category.id.to_string(),
                category.name.clone(),
                category.display_order.to_string(),
                if category.is_active { "yes" } else { "no" }.to_string(),
                summary.map_or("-".to_string(), |s| s.post_count.to_string()),
                summary.map_or("-".to_string(), |s| s.comment_count.to_string()),
                format_time(summary.and_then(|s| s.last_activity_at)),
            ]
        }),
    );

    Ok(())
}

/// Create a category and initialize its partition
pub async fn create(
    db: &ForumDb,
    name: &str,
    description: Option<String>,
    order: i64,
) -> Result<()> {
    let output = Output::new();

    let mut new = NewCategory::new(name).with_display_order(order);
    if let Some(description) = description {
        new = new.with_description(description);
    }

    let category = db.registry().create_partition(&new).await?;

    output.success(&format!("Created category {}", category.name.bright_cyan()));
    output.kv("  ID", &category.id.to_string());
    output.kv(
        "  Partition",
        &db.registry().partition_path(category.id).display().to_string(),
    );
    Ok(())
}

/// Toggle a category's visibility
pub async fn set_active(db: &ForumDb, id: CategoryId, active: bool) -> Result<()> {
    let output = Output::new();
    let pool = db.config_store().pool();

    let category = queries::get_category(pool, id)
        .await?
        .ok_or_else(|| miette::miette!("No category with id {}", id))?;

    if category.is_active == active {
        output.warning(&format!(
            "Category {} is already {}",
            category.name,
            if active { "active" } else { "inactive" }
        ));
        return Ok(());
    }

    queries::set_category_active(pool, id, active).await?;
    if active {
        output.success(&format!("Activated category {}", category.name.bright_cyan()));
    } else {
        output.success(&format!("Deactivated category {}", category.name.bright_cyan()));
        output.info("Note:", "the partition file is kept; its posts are hidden");
    }
    Ok(())
}

/// Delete an empty category along with its partition file
pub async fn delete(db: &ForumDb, id: CategoryId) -> Result<()> {
    let output = Output::new();
    let path = db.registry().partition_path(id);

    db.registry().delete_partition(id).await?;

    output.success(&format!("Deleted category {}", id));
    output.kv("  Removed", &path.display().to_string());
    Ok(())
}
