//! Read-only views: statistics and search.

use forum_db::{fts, CategoryId, ForumDb, SearchSort};
use miette::Result;
use owo_colors::OwoColorize;
use tracing::warn;

use super::format_time;
use crate::output::Output;

/// Show forum-wide counts and a per-category breakdown
pub async fn stats(db: &ForumDb) -> Result<()> {
    let output = Output::new();
    let coordinator = db.coordinator();

    let totals = coordinator.public_statistics().await?;
    output.section("Forum");
    output.kv("  Members", &totals.member_count.to_string());
    output.kv("  Categories", &totals.category_count.to_string());
    output.kv("  Posts", &totals.post_count.to_string());

    let summaries = coordinator.list_categories().await?;
    if summaries.is_empty() {
        return Ok(());
    }

    let mut rows = Vec::with_capacity(summaries.len());
    for summary in &summaries {
        let key = summary.category.id;
        let indexed = match db.registry().open(key).await {
            Ok(partition) => match fts::get_fts_stats(partition.pool()).await {
                Ok(stats) => stats.posts_indexed.to_string(),
                Err(e) => {
                    warn!(category_id = %key, error = %e, "Could not read index stats");
                    "?".to_string()
                }
            },
            Err(_) => "unreadable".to_string(),
        };
        rows.push(vec![
            key.to_string(),
            summary.category.name.clone(),
            summary.post_count.to_string(),
            summary.comment_count.to_string(),
            indexed,
            summary
                .latest_post
                .as_ref()
                .map_or("-".to_string(), |p| p.title.clone()),
            format_time(summary.last_activity_at),
        ]);
    }

    output.section("Categories");
    output.table(
        &["ID", "Name", "Posts", "Comments", "Indexed", "Latest post", "Last activity"],
        rows,
    );
    Ok(())
}

/// Run a search and print one page of hits
pub async fn search(
    db: &ForumDb,
    query: &str,
    category: Option<CategoryId>,
    sort: SearchSort,
    page: u32,
    page_size: u32,
) -> Result<()> {
    let output = Output::new();

    let results = db
        .coordinator()
        .search_posts(query, category, page, page_size, sort)
        .await?;

    if results.items.is_empty() {
        output.info("No matches for", &query.bright_yellow().to_string());
        return Ok(());
    }

    output.status(&format!(
        "{} match(es), page {} ({} per page, sorted by {})",
        results.total,
        results.page,
        results.page_size,
        sort.as_str()
    ));
    output.table(
        &["Category", "Post", "Title", "Author", "Views", "Comments", "Rank"],
        results.items.iter().map(|hit| {
            let item = &hit.item;
            vec![
                item.post.category_id.to_string(),
                item.post.id.to_string(),
                item.post.title.clone(),
                item.author.username.clone(),
                item.post.view_count.to_string(),
                item.comment_count.to_string(),
                format!("{:.3}", hit.rank),
            ]
        }),
    );
    if results.has_next {
        output.info("More:", &format!("--page {}", results.page + 1));
    }
    Ok(())
}
