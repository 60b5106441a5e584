//! Schema definitions for the config store and category partitions.
//!
//! Both schemas are plain `CREATE ... IF NOT EXISTS` statement lists applied
//! inside a single transaction, so applying one to a store that already has
//! it is a no-op. Applying is kept separate from opening so an existing
//! partition can be checked for drift and repaired in place.
//!
//! # Search index
//!
//! `posts_fts` is an FTS5 external-content table over `posts(title, body)`.
//! Three triggers keep it in step with `posts`; the update trigger removes
//! the old entry before inserting the new one, so an edited post never keeps
//! matching its previous text.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::CategoryId;

/// Version stamped into `PRAGMA user_version` of the config store.
pub const CONFIG_SCHEMA_VERSION: i64 = 1;

/// Version stamped into `PRAGMA user_version` of each partition.
pub const CONTENT_SCHEMA_VERSION: i64 = 1;

/// Tables every config store must have.
pub const CONFIG_TABLES: &[&str] = &[
    "users",
    "categories",
    "moderator_grants",
    "bans",
    "activity_log",
];

/// Tables every partition must have.
pub const CONTENT_TABLES: &[&str] = &[
    "partition_meta",
    "posts",
    "comments",
    "attachments",
    "posts_fts",
];

/// Triggers every partition must have.
pub const CONTENT_TRIGGERS: &[&str] = &[
    "posts_fts_insert",
    "posts_fts_delete",
    "posts_fts_update",
    "posts_category_guard_insert",
    "posts_category_guard_update",
];

const CONFIG_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        credential_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'member'
            CHECK (role IN ('member', 'moderator', 'site_admin')),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE CHECK (length(name) BETWEEN 1 AND 100),
        description TEXT,
        display_order INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_categories_listing ON categories(is_active, display_order, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS moderator_grants (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
        granted_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
        granted_at TEXT NOT NULL,
        PRIMARY KEY (user_id, category_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_moderator_grants_category ON moderator_grants(category_id)",
    r#"
    CREATE TABLE IF NOT EXISTS bans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        issued_by INTEGER NOT NULL,
        reason TEXT NOT NULL,
        issued_at TEXT NOT NULL,
        expires_at TEXT,
        is_active INTEGER NOT NULL DEFAULT 1
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_bans_user ON bans(user_id, is_active)",
    r#"
    CREATE TABLE IF NOT EXISTS activity_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER,
        action TEXT NOT NULL,
        detail TEXT,
        origin TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_activity_log_created ON activity_log(created_at)",
    "PRAGMA user_version = 1",
];

const CONTENT_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS partition_meta (
        singleton INTEGER PRIMARY KEY CHECK (singleton = 1),
        category_id INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        category_id INTEGER NOT NULL,
        author_id INTEGER NOT NULL,
        title TEXT NOT NULL CHECK (length(title) BETWEEN 1 AND 200),
        body TEXT NOT NULL,
        view_count INTEGER NOT NULL DEFAULT 0 CHECK (view_count >= 0),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        last_activity_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_posts_last_activity ON posts(last_activity_at)",
    "CREATE INDEX IF NOT EXISTS idx_posts_views ON posts(view_count)",
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        author_id INTEGER NOT NULL,
        body TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id)",
    r#"
    CREATE TABLE IF NOT EXISTS attachments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        stored_filename TEXT NOT NULL,
        original_filename TEXT NOT NULL,
        mime_type TEXT NOT NULL,
        byte_size INTEGER NOT NULL,
        data BLOB NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_attachments_post ON attachments(post_id)",
    r#"
    CREATE VIRTUAL TABLE IF NOT EXISTS posts_fts USING fts5(
        title,
        body,
        content='posts',
        content_rowid='id'
    )
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS posts_fts_insert AFTER INSERT ON posts BEGIN
        INSERT INTO posts_fts(rowid, title, body) VALUES (new.id, new.title, new.body);
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS posts_fts_delete AFTER DELETE ON posts BEGIN
        INSERT INTO posts_fts(posts_fts, rowid, title, body)
        VALUES ('delete', old.id, old.title, old.body);
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS posts_fts_update AFTER UPDATE OF title, body ON posts BEGIN
        INSERT INTO posts_fts(posts_fts, rowid, title, body)
        VALUES ('delete', old.id, old.title, old.body);
        INSERT INTO posts_fts(rowid, title, body) VALUES (new.id, new.title, new.body);
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS posts_category_guard_insert BEFORE INSERT ON posts
    WHEN new.category_id IS NOT (SELECT category_id FROM partition_meta WHERE singleton = 1)
    BEGIN
        SELECT RAISE(ABORT, 'post category does not match partition');
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS posts_category_guard_update BEFORE UPDATE OF category_id ON posts
    WHEN new.category_id IS NOT (SELECT category_id FROM partition_meta WHERE singleton = 1)
    BEGIN
        SELECT RAISE(ABORT, 'post category does not match partition');
    END
    "#,
    "PRAGMA user_version = 1",
];

/// Create the config-store tables if absent. Never drops data.
pub async fn apply_config_schema(pool: &SqlitePool) -> DbResult<()> {
    debug!("Applying config schema");
    let mut tx = pool.begin().await?;
    for statement in CONFIG_SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Create the partition tables, search index and triggers if absent, and
/// bind the partition to `key`.
///
/// Fails with a schema error if the store already belongs to another
/// category.
pub async fn apply_content_schema(pool: &SqlitePool, key: CategoryId) -> DbResult<()> {
    debug!(category_id = %key, "Applying content schema");
    let mut tx = pool.begin().await?;
    for statement in CONTENT_SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    sqlx::query(
        "INSERT OR IGNORE INTO partition_meta (singleton, category_id, created_at) VALUES (1, ?, ?)",
    )
    .bind(key)
    .bind(chrono::Utc::now())
    .execute(&mut *tx)
    .await?;

    let owner: CategoryId =
        sqlx::query_scalar("SELECT category_id FROM partition_meta WHERE singleton = 1")
            .fetch_one(&mut *tx)
            .await?;
    if owner != key {
        return Err(DbError::schema(format!(
            "partition store belongs to category {owner}, not {key}"
        )));
    }

    tx.commit().await?;
    Ok(())
}

/// Whether every named table exists.
pub async fn tables_present(pool: &SqlitePool, required: &[&str]) -> DbResult<bool> {
    Ok(missing_objects(pool, "table", required).await?.is_empty())
}

/// Whether every named trigger exists.
pub async fn triggers_present(pool: &SqlitePool, required: &[&str]) -> DbResult<bool> {
    Ok(missing_objects(pool, "trigger", required).await?.is_empty())
}

/// Names from `required` with no `sqlite_master` entry of the given type.
pub async fn missing_objects(
    pool: &SqlitePool,
    object_type: &str,
    required: &[&str],
) -> DbResult<Vec<String>> {
    let present: Vec<String> = sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = ?")
        .bind(object_type)
        .fetch_all(pool)
        .await?;

    Ok(required
        .iter()
        .filter(|name| !present.iter().any(|p| p.as_str() == **name))
        .map(|name| name.to_string())
        .collect())
}

/// The `user_version` stamp of a store.
pub async fn schema_version(pool: &SqlitePool) -> DbResult<i64> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

/// Full check of a partition store: tables, triggers and version.
pub async fn content_schema_is_current(pool: &SqlitePool) -> DbResult<bool> {
    Ok(tables_present(pool, CONTENT_TABLES).await?
        && triggers_present(pool, CONTENT_TRIGGERS).await?
        && schema_version(pool).await? >= CONTENT_SCHEMA_VERSION)
}
