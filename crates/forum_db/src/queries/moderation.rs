//! Moderator grant and ban queries (config store).

use chrono::{DateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};

use crate::error::{DbError, DbResult};
use crate::models::{Ban, CategoryId, ModeratorGrant, NewBan, UserId};

// ============================================================================
// Moderator grants
// ============================================================================

/// Insert a grant. A duplicate (user, category) pair is a conflict.
pub async fn insert_grant<'e>(
    executor: impl SqliteExecutor<'e>,
    user_id: UserId,
    category_id: CategoryId,
    granted_by: Option<UserId>,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO moderator_grants (user_id, category_id, granted_by, granted_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(category_id)
    .bind(granted_by)
    .bind(Utc::now())
    .execute(executor)
    .await
    .map_err(|e| {
        DbError::or_conflict(
            e,
            "moderator grant",
            format!("user {user_id} on category {category_id}"),
        )
    })?;
    Ok(())
}

/// Delete a grant, returning whether one existed.
pub async fn delete_grant<'e>(
    executor: impl SqliteExecutor<'e>,
    user_id: UserId,
    category_id: CategoryId,
) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM moderator_grants WHERE user_id = ? AND category_id = ?")
        .bind(user_id)
        .bind(category_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete every grant on a category.
pub async fn delete_grants_for_category<'e>(
    executor: impl SqliteExecutor<'e>,
    category_id: CategoryId,
) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM moderator_grants WHERE category_id = ?")
        .bind(category_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Whether a user holds a grant on a category.
pub async fn has_grant<'e>(
    executor: impl SqliteExecutor<'e>,
    user_id: UserId,
    category_id: CategoryId,
) -> DbResult<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM moderator_grants WHERE user_id = ? AND category_id = ?)",
    )
    .bind(user_id)
    .bind(category_id)
    .fetch_one(executor)
    .await?;
    Ok(exists)
}

/// Count the grants a user holds.
pub async fn count_grants_for_user<'e>(
    executor: impl SqliteExecutor<'e>,
    user_id: UserId,
) -> DbResult<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM moderator_grants WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// List the moderators of a category.
pub async fn list_grants_for_category(
    pool: &SqlitePool,
    category_id: CategoryId,
) -> DbResult<Vec<ModeratorGrant>> {
    let grants = sqlx::query_as::<_, ModeratorGrant>(
        r#"
        SELECT user_id, category_id, granted_by, granted_at
        FROM moderator_grants
        WHERE category_id = ?
        ORDER BY granted_at
        "#,
    )
    .bind(category_id)
    .fetch_all(pool)
    .await?;
    Ok(grants)
}

// ============================================================================
// Bans
// ============================================================================

/// Record a ban.
pub async fn insert_ban<'e>(
    executor: impl SqliteExecutor<'e>,
    ban: &NewBan,
    issued_by: UserId,
) -> DbResult<Ban> {
    let created = sqlx::query_as::<_, Ban>(
        r#"
        INSERT INTO bans (user_id, issued_by, reason, issued_at, expires_at, is_active)
        VALUES (?, ?, ?, ?, ?, 1)
        RETURNING id, user_id, issued_by, reason, issued_at, expires_at, is_active
        "#,
    )
    .bind(ban.user_id)
    .bind(issued_by)
    .bind(&ban.reason)
    .bind(Utc::now())
    .bind(ban.expires_at)
    .fetch_one(executor)
    .await?;
    Ok(created)
}

/// Soft-revoke every active ban on a user. Returns how many were lifted.
pub async fn deactivate_bans<'e>(executor: impl SqliteExecutor<'e>, user_id: UserId) -> DbResult<u64> {
    let result = sqlx::query("UPDATE bans SET is_active = 0 WHERE user_id = ? AND is_active = 1")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// The ban currently restricting a user, if any. Latest expiry wins;
/// permanent bans sort first.
pub async fn get_active_ban<'e>(
    executor: impl SqliteExecutor<'e>,
    user_id: UserId,
    now: DateTime<Utc>,
) -> DbResult<Option<Ban>> {
    let ban = sqlx::query_as::<_, Ban>(
        r#"
        SELECT id, user_id, issued_by, reason, issued_at, expires_at, is_active
        FROM bans
        WHERE user_id = ?
          AND is_active = 1
          AND (expires_at IS NULL OR expires_at > ?)
        ORDER BY expires_at IS NOT NULL, expires_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(now)
    .fetch_optional(executor)
    .await?;
    Ok(ban)
}

/// Full ban history of a user, newest first.
pub async fn list_bans_for_user(pool: &SqlitePool, user_id: UserId) -> DbResult<Vec<Ban>> {
    let bans = sqlx::query_as::<_, Ban>(
        r#"
        SELECT id, user_id, issued_by, reason, issued_at, expires_at, is_active
        FROM bans
        WHERE user_id = ?
        ORDER BY issued_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(bans)
}
