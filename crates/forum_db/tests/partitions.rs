//! Partition lifecycle: creation, single-flight opens, deletion and
//! recovery from unreadable partitions.

mod common;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use forum_db::{queries, schema, CategoryId, DbError, ErrorKind, ForumDb, NewCategory, UserRole};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_free_talk_scenario() {
    let (_dir, db) = common::forum().await;

    let category = common::category(&db, "Free Talk").await;
    assert_eq!(category.id, CategoryId::new(1));
    assert!(db.registry().is_open(category.id));
    assert!(db.registry().validate_schema(category.id).await.unwrap());

    // Author 42 is not a registered user; partitions do not enforce it
    let partition = db.registry().open(category.id).await.unwrap();
    let post = queries::insert_post(partition.pool(), category.id, 42, "Hello", "World")
        .await
        .unwrap();
    assert_eq!(post.id, 1);

    let coordinator = db.coordinator();
    let first = coordinator.get_post(category.id, post.id, true).await.unwrap();
    assert_eq!(first.post.view_count, 1);
    let second = coordinator.get_post(category.id, post.id, true).await.unwrap();
    assert_eq!(second.post.view_count, 2);
    assert_eq!(second.author.username, "unknown");

    let peek = coordinator.get_post(category.id, post.id, false).await.unwrap();
    assert_eq!(peek.post.view_count, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_open_creates_one_store() {
    let (dir, db) = common::forum().await;
    let registry = db.registry().clone();
    let key = CategoryId::new(7);

    let (a, b) = tokio::join!(
        tokio::spawn({
            let registry = registry.clone();
            async move { registry.open(key).await.unwrap() }
        }),
        tokio::spawn({
            let registry = registry.clone();
            async move { registry.open(key).await.unwrap() }
        }),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(registry.initializations(), 1);

    let files: Vec<_> = std::fs::read_dir(dir.path().join("partitions"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".db"))
        .collect();
    assert_eq!(files, vec!["category_7.db".to_string()]);
}

#[tokio::test]
async fn test_every_post_matches_its_partition() {
    let (_dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await;
    let content = db.content();

    let a = common::category(&db, "A").await;
    let b = common::category(&db, "B").await;

    for key in [a.id, b.id, a.id] {
        content
            .create_post(author.id, key, "Title", "Body")
            .await
            .unwrap();
    }

    for key in [a.id, b.id] {
        let partition = db.registry().open(key).await.unwrap();
        assert_eq!(
            queries::count_misplaced_posts(partition.pool(), key).await.unwrap(),
            0
        );
    }

    // The partition itself refuses a foreign category id
    let partition = db.registry().open(a.id).await.unwrap();
    let err = queries::insert_post(partition.pool(), b.id, author.id, "Stray", "post")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreFailure);
}

#[tokio::test]
async fn test_delete_partition_guard() {
    let (dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await;
    let category = common::category(&db, "Doomed").await;

    let post = db
        .content()
        .create_post(author.id, category.id, "Still here", "content")
        .await
        .unwrap();

    let err = db.registry().delete_partition(category.id).await.unwrap_err();
    assert!(matches!(err, DbError::NotEmpty { count: 1, .. }));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(queries::get_category(db.config_store().pool(), category.id)
        .await
        .unwrap()
        .is_some());

    db.content()
        .delete_post(author.id, category.id, post.id)
        .await
        .unwrap();
    db.registry().delete_partition(category.id).await.unwrap();

    assert!(queries::get_category(db.config_store().pool(), category.id)
        .await
        .unwrap()
        .is_none());
    assert!(!db.registry().is_open(category.id));
    assert!(!dir.path().join("partitions").join("category_1.db").exists());
}

#[tokio::test]
async fn test_delete_partition_removes_grants() {
    let (_dir, db) = common::forum().await;
    let admin = common::user(&db, "admin", UserRole::SiteAdmin).await;
    let helper = common::user(&db, "helper", UserRole::Member).await;
    let category = common::category(&db, "Temporary").await;

    db.moderation()
        .grant_moderator(admin.id, helper.id, category.id)
        .await
        .unwrap();
    db.registry().delete_partition(category.id).await.unwrap();

    let grants = queries::list_grants_for_category(db.config_store().pool(), category.id)
        .await
        .unwrap();
    assert!(grants.is_empty());
}

fn partition_files(dir: &Path) -> BTreeSet<CategoryId> {
    let Ok(entries) = std::fs::read_dir(dir.join("partitions")) else {
        return BTreeSet::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let id = name.strip_prefix("category_")?.strip_suffix(".db")?;
            id.parse().ok().map(CategoryId::new)
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delete_racing_writes_loses_nothing() {
    let (dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await.id;
    let mut deleted = Vec::new();

    for i in 0..40 {
        let key = common::category(&db, &format!("Race {i}")).await.id;
        let registry = db.registry().clone();
        let content = db.content();
        let coordinator = db.coordinator();

        let (removed, created, listed) = tokio::join!(
            tokio::spawn(async move { registry.delete_partition(key).await }),
            tokio::spawn(async move { content.create_post(author, key, "Racing", "body").await }),
            tokio::spawn(async move { coordinator.list_categories().await }),
        );
        listed.unwrap().unwrap();

        match (removed.unwrap(), created.unwrap()) {
            (Ok(()), Ok(post)) => {
                panic!("post {} was acknowledged in deleted category {key}", post.id)
            }
            (Ok(()), Err(_)) => deleted.push(key),
            (Err(e), Ok(post)) => {
                assert!(matches!(e, DbError::NotEmpty { count: 1, .. }), "{e}");
                let detail = db.coordinator().get_post(key, post.id, false).await.unwrap();
                assert_eq!(detail.post.title, "Racing");
            }
            (Err(a), Err(b)) => panic!("delete and create both failed: {a}; {b}"),
        }
    }

    let files = partition_files(dir.path());
    for key in deleted {
        assert!(!files.contains(&key), "partition {key} came back after delete");
        assert!(queries::get_category(db.config_store().pool(), key)
            .await
            .unwrap()
            .is_none());
        let err = db.registry().open(key).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abandoned_create_is_all_or_nothing() {
    let (dir, db) = common::forum().await;

    for i in 0..12 {
        let registry = db.registry().clone();
        let handle = tokio::spawn(async move {
            registry
                .create_partition(&NewCategory::new(format!("Abandoned {i}")))
                .await
        });
        for _ in 0..i {
            tokio::task::yield_now().await;
        }
        handle.abort();
        let _ = handle.await;
    }

    // Work the callers walked away from keeps running; wait for it to settle
    let mut consistent = false;
    for _ in 0..200 {
        let rows: BTreeSet<CategoryId> = queries::list_all_categories(db.config_store().pool())
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        let files = partition_files(dir.path());
        let open: BTreeSet<CategoryId> = db.registry().open_keys().into_iter().collect();
        if rows == files && rows == open {
            consistent = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(consistent, "category rows, partition files and open partitions disagree");

    // The next category gets a fresh, empty partition
    let next = common::category(&db, "After").await;
    let page = db
        .coordinator()
        .list_posts(next.id, forum_db::PostSort::CreatedAt, 1, 20)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_unreadable_partition_shows_zero_stats() {
    let (dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await;

    let mut keys = Vec::new();
    for name in ["One", "Two", "Three"] {
        let category = common::category(&db, name).await;
        db.content()
            .create_post(author.id, category.id, name, "body text")
            .await
            .unwrap();
        keys.push(category.id);
    }

    db.registry().close_all().await;
    let broken = dir.path().join("partitions").join("category_3.db");
    std::fs::write(&broken, vec![0x5a_u8; 8192]).unwrap();
    for suffix in ["-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", broken.display(), suffix));
    }

    let summaries = db.coordinator().list_categories().await.unwrap();
    assert_eq!(summaries.len(), 3);

    let counts: Vec<(CategoryId, i64)> = summaries
        .iter()
        .map(|s| (s.category.id, s.post_count))
        .collect();
    assert_eq!(counts, vec![(keys[0], 1), (keys[1], 1), (keys[2], 0)]);
    assert!(summaries[2].latest_post.is_none());
    assert!(summaries[2].last_activity_at.is_none());
    assert!(!db.registry().is_open(keys[2]));

    let stats = db.coordinator().public_statistics().await.unwrap();
    assert_eq!(stats.post_count, 2);
    assert_eq!(stats.category_count, 3);

    // The unreadable file is left for an operator to inspect
    assert!(broken.exists());
}

#[tokio::test]
async fn test_reopen_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let key = {
        let db = ForumDb::open_in(dir.path()).await.unwrap();
        let category = common::category(&db, "Persistent").await;
        db.close().await;
        category.id
    };

    let db = ForumDb::open_in(dir.path()).await.unwrap();
    assert!(!db.registry().is_open(key));
    assert!(db.registry().validate_schema(key).await.unwrap());

    let partition = db.registry().open(key).await.unwrap();
    assert!(schema::content_schema_is_current(partition.pool()).await.unwrap());
    assert_eq!(
        schema::schema_version(partition.pool()).await.unwrap(),
        schema::CONTENT_SCHEMA_VERSION
    );

    let categories = queries::list_active_categories(db.config_store().pool())
        .await
        .unwrap();
    assert_eq!(categories.len(), 1);
}

#[tokio::test]
async fn test_deactivated_category_is_hidden() {
    let (_dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await;
    let visible = common::category(&db, "Visible").await;
    let hidden = common::category(&db, "Hidden").await;

    db.content()
        .create_post(author.id, hidden.id, "Secret", "body")
        .await
        .unwrap();
    queries::set_category_active(db.config_store().pool(), hidden.id, false)
        .await
        .unwrap();

    let summaries = db.coordinator().list_categories().await.unwrap();
    let ids: Vec<CategoryId> = summaries.iter().map(|s| s.category.id).collect();
    assert_eq!(ids, vec![visible.id]);

    let err = db
        .coordinator()
        .list_posts(hidden.id, forum_db::PostSort::CreatedAt, 1, 20)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = db
        .content()
        .create_post(author.id, hidden.id, "More", "body")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    // Soft delete keeps the partition file
    assert!(db.registry().partition_path(hidden.id).exists());
}

#[tokio::test]
async fn test_duplicate_category_name_rolls_back() {
    let (_dir, db) = common::forum().await;
    common::category(&db, "General").await;

    let err = db
        .registry()
        .create_partition(&NewCategory::new("General"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(db.registry().open_keys(), vec![CategoryId::new(1)]);
}

#[tokio::test]
async fn test_snapshot_restores_independently() {
    let (_dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await;
    let category = common::category(&db, "Backed Up").await;
    db.content()
        .create_post(author.id, category.id, "Keep me", "safe")
        .await
        .unwrap();

    let backup = tempfile::tempdir().unwrap();
    let report = db.snapshot(backup.path().join("snap")).await.unwrap();
    assert!(report.config_store.exists());
    assert_eq!(report.partitions.len(), 1);

    let restored = ForumDb::open_in(backup.path().join("snap")).await.unwrap();
    let page = restored
        .coordinator()
        .list_posts(category.id, forum_db::PostSort::CreatedAt, 1, 20)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].post.title, "Keep me");
    assert_eq!(page.items[0].author.username, "writer");
}
