//! Activity log queries (config store). The log is append-only.

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};

use crate::error::DbResult;
use crate::models::{ActivityLogEntry, UserId};

/// Append an audit row.
pub async fn log_activity<'e>(
    executor: impl SqliteExecutor<'e>,
    user_id: Option<UserId>,
    action: &str,
    detail: Option<&str>,
    origin: Option<&str>,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO activity_log (user_id, action, detail, origin, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(action)
    .bind(detail)
    .bind(origin)
    .bind(Utc::now())
    .execute(executor)
    .await?;
    Ok(())
}

/// Most recent audit rows, newest first.
pub async fn recent_activity(pool: &SqlitePool, limit: i64) -> DbResult<Vec<ActivityLogEntry>> {
    let entries = sqlx::query_as::<_, ActivityLogEntry>(
        r#"
        SELECT id, user_id, action, detail, origin, created_at
        FROM activity_log
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

/// Audit rows for one user, newest first.
pub async fn activity_for_user(
    pool: &SqlitePool,
    user_id: UserId,
    limit: i64,
) -> DbResult<Vec<ActivityLogEntry>> {
    let entries = sqlx::query_as::<_, ActivityLogEntry>(
        r#"
        SELECT id, user_id, action, detail, origin, created_at
        FROM activity_log
        WHERE user_id = ?
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}
