//! Category queries (config store).

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};

use crate::error::{DbError, DbResult};
use crate::models::{Category, CategoryId, NewCategory};

/// Insert a category row and return it. A duplicate name is a conflict.
///
/// Takes an executor so the registry can run it inside the transaction that
/// also initializes the partition.
pub async fn insert_category<'e>(
    executor: impl SqliteExecutor<'e>,
    category: &NewCategory,
) -> DbResult<Category> {
    let created = sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (name, description, display_order, is_active, created_at)
        VALUES (?, ?, ?, 1, ?)
        RETURNING id, name, description, display_order, is_active, created_at
        "#,
    )
    .bind(&category.name)
    .bind(&category.description)
    .bind(category.display_order)
    .bind(Utc::now())
    .fetch_one(executor)
    .await
    .map_err(|e| DbError::or_conflict(e, "category", &category.name))?;
    Ok(created)
}

/// Get a category by ID, active or not.
pub async fn get_category<'e>(
    executor: impl SqliteExecutor<'e>,
    id: CategoryId,
) -> DbResult<Option<Category>> {
    let category = sqlx::query_as::<_, Category>(
        "SELECT id, name, description, display_order, is_active, created_at FROM categories WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(category)
}

/// Get an active category, failing with NotFound for missing or inactive ones.
pub async fn require_active_category(pool: &SqlitePool, id: CategoryId) -> DbResult<Category> {
    match get_category(pool, id).await? {
        Some(category) if category.is_active => Ok(category),
        _ => Err(DbError::not_found("category", id)),
    }
}

/// List active categories in display order.
pub async fn list_active_categories(pool: &SqlitePool) -> DbResult<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>(
        r#"
        SELECT id, name, description, display_order, is_active, created_at
        FROM categories
        WHERE is_active = 1
        ORDER BY display_order ASC, created_at ASC, id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(categories)
}

/// List every category including deactivated ones.
pub async fn list_all_categories(pool: &SqlitePool) -> DbResult<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>(
        r#"
        SELECT id, name, description, display_order, is_active, created_at
        FROM categories
        ORDER BY display_order ASC, created_at ASC, id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(categories)
}

/// IDs of active categories, the fan-out set.
pub async fn list_active_category_ids(pool: &SqlitePool) -> DbResult<Vec<CategoryId>> {
    let ids = sqlx::query_scalar::<_, CategoryId>(
        "SELECT id FROM categories WHERE is_active = 1 ORDER BY display_order ASC, created_at ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Count active categories.
pub async fn count_active_categories(pool: &SqlitePool) -> DbResult<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE is_active = 1")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Soft-delete or restore a category. The partition is left untouched.
pub async fn set_category_active(pool: &SqlitePool, id: CategoryId, active: bool) -> DbResult<()> {
    let result = sqlx::query("UPDATE categories SET is_active = ? WHERE id = ?")
        .bind(active)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("category", id));
    }
    Ok(())
}

/// Apply a new display order to several categories atomically.
///
/// Either every listed category is updated or none is.
pub async fn reorder_categories(pool: &SqlitePool, order: &[(CategoryId, i64)]) -> DbResult<()> {
    let mut tx = pool.begin().await?;
    for (id, display_order) in order {
        let result = sqlx::query("UPDATE categories SET display_order = ? WHERE id = ?")
            .bind(display_order)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("category", id));
        }
    }
    tx.commit().await?;
    Ok(())
}

/// Delete a category row. Grants go with it via `ON DELETE CASCADE`, but
/// callers delete them explicitly first so the count can be logged.
pub async fn delete_category<'e>(executor: impl SqliteExecutor<'e>, id: CategoryId) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
