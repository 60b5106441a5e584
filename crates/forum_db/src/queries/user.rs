//! User queries (config store).

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};

use crate::error::{DbError, DbResult};
use crate::models::{NewUser, User, UserId, UserRole};

/// Register a user. Duplicate usernames or emails are a conflict.
pub async fn create_user(pool: &SqlitePool, user: &NewUser) -> DbResult<User> {
    let now = Utc::now();
    let created = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, credential_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id, username, email, credential_hash, role, created_at, updated_at
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.credential_hash)
    .bind(user.role)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| DbError::or_conflict(e, "user", &user.username))?;
    Ok(created)
}

/// Get just a user's role.
pub async fn get_user_role<'e>(
    executor: impl SqliteExecutor<'e>,
    id: UserId,
) -> DbResult<Option<UserRole>> {
    let role = sqlx::query_scalar::<_, UserRole>("SELECT role FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(role)
}

/// Update a user's role.
pub async fn set_user_role<'e>(
    executor: impl SqliteExecutor<'e>,
    id: UserId,
    role: UserRole,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role)
        .bind(Utc::now())
        .bind(id)
        .execute(executor)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("user", id));
    }
    Ok(())
}

/// Count users holding a role.
pub async fn count_users_with_role(pool: &SqlitePool, role: UserRole) -> DbResult<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?")
        .bind(role)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Resolve usernames and roles for a batch of user IDs in one round-trip.
///
/// IDs with no matching user are simply absent from the map.
pub async fn get_authors(
    pool: &SqlitePool,
    ids: &[UserId],
) -> DbResult<HashMap<UserId, (String, UserRole)>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let ids_json = serde_json::to_string(ids)?;
    let rows = sqlx::query_as::<_, (UserId, String, UserRole)>(
        "SELECT id, username, role FROM users WHERE id IN (SELECT value FROM json_each(?))",
    )
    .bind(ids_json)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, username, role)| (id, (username, role)))
        .collect())
}
