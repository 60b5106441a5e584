//! Comment queries (category partition).

use chrono::{DateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};

use crate::error::DbResult;
use crate::models::{Comment, CommentId, PostId, UserId};

/// Insert a comment with the given timestamp.
pub async fn insert_comment<'e>(
    executor: impl SqliteExecutor<'e>,
    post_id: PostId,
    author_id: UserId,
    body: &str,
    at: DateTime<Utc>,
) -> DbResult<Comment> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (post_id, author_id, body, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, post_id, author_id, body, created_at, updated_at
        "#,
    )
    .bind(post_id)
    .bind(author_id)
    .bind(body)
    .bind(at)
    .bind(at)
    .fetch_one(executor)
    .await?;
    Ok(comment)
}

/// Get a comment by ID.
pub async fn get_comment<'e>(
    executor: impl SqliteExecutor<'e>,
    id: CommentId,
) -> DbResult<Option<Comment>> {
    let comment = sqlx::query_as::<_, Comment>(
        "SELECT id, post_id, author_id, body, created_at, updated_at FROM comments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(comment)
}

/// Replace a comment's body.
pub async fn update_comment<'e>(
    executor: impl SqliteExecutor<'e>,
    id: CommentId,
    body: &str,
) -> DbResult<Option<Comment>> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        UPDATE comments SET body = ?, updated_at = ?
        WHERE id = ?
        RETURNING id, post_id, author_id, body, created_at, updated_at
        "#,
    )
    .bind(body)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(comment)
}

/// Delete a comment.
pub async fn delete_comment<'e>(executor: impl SqliteExecutor<'e>, id: CommentId) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Comments on a post, oldest first.
pub async fn list_comments_for_post(pool: &SqlitePool, post_id: PostId) -> DbResult<Vec<Comment>> {
    let comments = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, author_id, body, created_at, updated_at
        FROM comments
        WHERE post_id = ?
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;
    Ok(comments)
}

/// Count comments on one post.
pub async fn count_comments_for_post<'e>(
    executor: impl SqliteExecutor<'e>,
    post_id: PostId,
) -> DbResult<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ?")
        .bind(post_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// Count comments in the partition.
pub async fn count_comments(pool: &SqlitePool) -> DbResult<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// The most recent comment in the partition.
pub async fn latest_comment(pool: &SqlitePool) -> DbResult<Option<Comment>> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, author_id, body, created_at, updated_at
        FROM comments
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;
    Ok(comment)
}
