//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use forum_db::{queries, Category, ForumDb, NewCategory, NewUser, User, UserRole};
use tempfile::TempDir;

/// A fresh forum in its own temporary data directory.
pub async fn forum() -> (TempDir, ForumDb) {
    let dir = tempfile::tempdir().unwrap();
    let db = ForumDb::open_in(dir.path()).await.unwrap();
    (dir, db)
}

pub async fn user(db: &ForumDb, username: &str, role: UserRole) -> User {
    queries::create_user(
        db.config_store().pool(),
        &NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            credential_hash: "opaque".to_string(),
            role,
        },
    )
    .await
    .unwrap()
}

pub async fn category(db: &ForumDb, name: &str) -> Category {
    db.registry()
        .create_partition(&NewCategory::new(name))
        .await
        .unwrap()
}
