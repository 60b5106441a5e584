//! Full-text search over posts using FTS5.
//!
//! Each partition carries its own `posts_fts` index, kept in sync by the
//! triggers defined in [`crate::schema`]. Application code only ever reads
//! from it (and, for repair, asks FTS5 to rebuild it).
//!
//! # Query handling
//!
//! User input is never handed to `MATCH` verbatim. [`build_match_expression`]
//! splits it into words and quotes each one, so stray FTS5 operators or
//! unbalanced quotes cannot produce syntax errors. A trailing `*` on a word
//! is kept as a prefix search. All words must match.
//!
//! See: https://www.sqlite.org/fts5.html

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::error::{DbError, DbResult};
use crate::models::Post;

/// Ordering of search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSort {
    /// FTS5 bm25 rank, best first
    #[default]
    Relevance,
    /// Newest first
    CreatedAt,
    /// Most viewed first
    ViewCount,
}

impl SearchSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchSort::Relevance => "relevance",
            SearchSort::CreatedAt => "created_at",
            SearchSort::ViewCount => "view_count",
        }
    }
}

impl FromStr for SearchSort {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(SearchSort::Relevance),
            "created_at" => Ok(SearchSort::CreatedAt),
            "view_count" => Ok(SearchSort::ViewCount),
            other => Err(DbError::invalid_data(format!("invalid search sort: {other}"))),
        }
    }
}

/// A post matched by a search, with its bm25 rank (lower is better).
#[derive(Debug, Clone, FromRow)]
pub struct RankedPost {
    #[sqlx(flatten)]
    pub post: Post,
    pub rank: f64,
}

/// Turn free text into a safe FTS5 match expression.
///
/// Returns None when the input has no searchable words.
pub fn build_match_expression(query: &str) -> Option<String> {
    let mut terms = Vec::new();

    for raw in query.split_whitespace() {
        let prefix = raw.ends_with('*');
        let words: Vec<&str> = raw
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| !w.is_empty())
            .collect();

        let last = words.len().saturating_sub(1);
        for (i, word) in words.iter().enumerate() {
            if prefix && i == last {
                terms.push(format!("\"{word}\"*"));
            } else {
                terms.push(format!("\"{word}\""));
            }
        }
    }

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// Search one partition's posts.
///
/// `match_expr` should come from [`build_match_expression`].
pub async fn search_posts(
    pool: &SqlitePool,
    match_expr: &str,
    sort: SearchSort,
    limit: i64,
    offset: i64,
) -> DbResult<Vec<RankedPost>> {
    let sql = match sort {
        SearchSort::Relevance => {
            r#"
            SELECT p.id, p.category_id, p.author_id, p.title, p.body, p.view_count,
                   p.created_at, p.updated_at, p.last_activity_at,
                   bm25(posts_fts) AS rank
            FROM posts_fts
            JOIN posts p ON p.id = posts_fts.rowid
            WHERE posts_fts MATCH ?
            ORDER BY rank ASC, p.id DESC
            LIMIT ? OFFSET ?
            "#
        }
        SearchSort::CreatedAt => {
            r#"
            SELECT p.id, p.category_id, p.author_id, p.title, p.body, p.view_count,
                   p.created_at, p.updated_at, p.last_activity_at,
                   bm25(posts_fts) AS rank
            FROM posts_fts
            JOIN posts p ON p.id = posts_fts.rowid
            WHERE posts_fts MATCH ?
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT ? OFFSET ?
            "#
        }
        SearchSort::ViewCount => {
            r#"
            SELECT p.id, p.category_id, p.author_id, p.title, p.body, p.view_count,
                   p.created_at, p.updated_at, p.last_activity_at,
                   bm25(posts_fts) AS rank
            FROM posts_fts
            JOIN posts p ON p.id = posts_fts.rowid
            WHERE posts_fts MATCH ?
            ORDER BY p.view_count DESC, p.created_at DESC, p.id DESC
            LIMIT ? OFFSET ?
            "#
        }
    };

    let results = sqlx::query_as::<_, RankedPost>(sql)
        .bind(match_expr)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
    Ok(results)
}

/// Count the posts a match expression hits in one partition.
pub async fn count_matches(pool: &SqlitePool, match_expr: &str) -> DbResult<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM posts_fts WHERE posts_fts MATCH ?")
        .bind(match_expr)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Rebuild a partition's post index from the `posts` table.
///
/// Use this after restoring a partition from an older snapshot or if the
/// index is suspected to be out of sync.
pub async fn rebuild_posts_fts(pool: &SqlitePool) -> DbResult<()> {
    sqlx::query("INSERT INTO posts_fts(posts_fts) VALUES('rebuild')")
        .execute(pool)
        .await?;
    Ok(())
}

/// FTS index statistics for one partition.
#[derive(Debug, Clone, Default)]
pub struct FtsStats {
    pub posts_indexed: u64,
}

/// Get statistics about a partition's index.
pub async fn get_fts_stats(pool: &SqlitePool) -> DbResult<FtsStats> {
    let posts: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts_fts")
        .fetch_one(pool)
        .await?;

    Ok(FtsStats {
        posts_indexed: posts.0 as u64,
    })
}

/// Run FTS5's own consistency check against the content table.
///
/// Fails with a schema error if the index disagrees with `posts`.
pub async fn check_posts_fts(pool: &SqlitePool) -> DbResult<()> {
    sqlx::query("INSERT INTO posts_fts(posts_fts, rank) VALUES('integrity-check', 1)")
        .execute(pool)
        .await
        .map_err(|e| DbError::schema(format!("posts_fts integrity check failed: {e}")))?;
    Ok(())
}
