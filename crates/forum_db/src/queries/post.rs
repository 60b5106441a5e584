//! Post queries (category partition).
//!
//! Every function here runs against one partition's pool. Listing order is
//! chosen by enum, each variant mapping to its own fixed statement.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteExecutor, SqlitePool};

use crate::error::{DbError, DbResult};
use crate::models::{CategoryId, Post, PostId, UserId};

/// Column a post listing is ordered by (descending).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSort {
    #[default]
    CreatedAt,
    LastActivityAt,
}

impl PostSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostSort::CreatedAt => "created_at",
            PostSort::LastActivityAt => "last_activity_at",
        }
    }
}

impl FromStr for PostSort {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(PostSort::CreatedAt),
            "last_activity_at" => Ok(PostSort::LastActivityAt),
            other => Err(DbError::invalid_data(format!("invalid sort key: {other}"))),
        }
    }
}

/// Insert a post. `category_id` must be the partition's own key.
pub async fn insert_post<'e>(
    executor: impl SqliteExecutor<'e>,
    category_id: CategoryId,
    author_id: UserId,
    title: &str,
    body: &str,
) -> DbResult<Post> {
    let now = Utc::now();
    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (category_id, author_id, title, body, view_count, created_at, updated_at, last_activity_at)
        VALUES (?, ?, ?, ?, 0, ?, ?, ?)
        RETURNING id, category_id, author_id, title, body, view_count, created_at, updated_at, last_activity_at
        "#,
    )
    .bind(category_id)
    .bind(author_id)
    .bind(title)
    .bind(body)
    .bind(now)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await?;
    Ok(post)
}

/// Get a post by ID.
pub async fn get_post<'e>(executor: impl SqliteExecutor<'e>, id: PostId) -> DbResult<Option<Post>> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, category_id, author_id, title, body, view_count, created_at, updated_at, last_activity_at
        FROM posts WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(post)
}

/// Replace a post's title and body. Returns the updated row.
pub async fn update_post<'e>(
    executor: impl SqliteExecutor<'e>,
    id: PostId,
    title: &str,
    body: &str,
) -> DbResult<Option<Post>> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        UPDATE posts SET title = ?, body = ?, updated_at = ?
        WHERE id = ?
        RETURNING id, category_id, author_id, title, body, view_count, created_at, updated_at, last_activity_at
        "#,
    )
    .bind(title)
    .bind(body)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(post)
}

/// Delete a post. Comments and attachments cascade.
pub async fn delete_post<'e>(executor: impl SqliteExecutor<'e>, id: PostId) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Add one to a post's view count, returning the new count.
pub async fn increment_view_count<'e>(
    executor: impl SqliteExecutor<'e>,
    id: PostId,
) -> DbResult<Option<i64>> {
    let count = sqlx::query_scalar("UPDATE posts SET view_count = view_count + 1 WHERE id = ? RETURNING view_count")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(count)
}

/// Mark a post as active at `at`.
pub async fn touch_last_activity<'e>(
    executor: impl SqliteExecutor<'e>,
    id: PostId,
    at: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query("UPDATE posts SET last_activity_at = ? WHERE id = ?")
        .bind(at)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Count posts in the partition.
pub async fn count_posts(pool: &SqlitePool) -> DbResult<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Count posts whose category disagrees with the partition key.
pub async fn count_misplaced_posts(pool: &SqlitePool, key: CategoryId) -> DbResult<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE category_id != ?")
        .bind(key)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// One page of posts, newest first on the chosen column, ties by row id.
pub async fn list_posts_page(
    pool: &SqlitePool,
    sort: PostSort,
    limit: i64,
    offset: i64,
) -> DbResult<Vec<Post>> {
    let sql = match sort {
        PostSort::CreatedAt => {
            r#"
            SELECT id, category_id, author_id, title, body, view_count, created_at, updated_at, last_activity_at
            FROM posts
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#
        }
        PostSort::LastActivityAt => {
            r#"
            SELECT id, category_id, author_id, title, body, view_count, created_at, updated_at, last_activity_at
            FROM posts
            ORDER BY last_activity_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#
        }
    };

    let posts = sqlx::query_as::<_, Post>(sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
    Ok(posts)
}

/// The most recently created post.
pub async fn latest_post(pool: &SqlitePool) -> DbResult<Option<Post>> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, category_id, author_id, title, body, view_count, created_at, updated_at, last_activity_at
        FROM posts
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;
    Ok(post)
}

/// Posts created since `since`, most viewed first.
pub async fn popular_posts(
    pool: &SqlitePool,
    since: DateTime<Utc>,
    limit: i64,
) -> DbResult<Vec<Post>> {
    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, category_id, author_id, title, body, view_count, created_at, updated_at, last_activity_at
        FROM posts
        WHERE created_at >= ?
        ORDER BY view_count DESC, created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(posts)
}

/// Posts with recorded activity, most recent first.
pub async fn recently_active_posts(pool: &SqlitePool, limit: i64) -> DbResult<Vec<Post>> {
    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, category_id, author_id, title, body, view_count, created_at, updated_at, last_activity_at
        FROM posts
        WHERE last_activity_at IS NOT NULL
        ORDER BY last_activity_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(posts)
}

/// Comment counts for a batch of posts. Posts without comments are absent.
pub async fn comment_counts(pool: &SqlitePool, ids: &[PostId]) -> DbResult<HashMap<PostId, i64>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, (PostId, i64)>(
        r#"
        SELECT post_id, COUNT(*)
        FROM comments
        WHERE post_id IN (SELECT value FROM json_each(?))
        GROUP BY post_id
        "#,
    )
    .bind(serde_json::to_string(ids)?)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}
