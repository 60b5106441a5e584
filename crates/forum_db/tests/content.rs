//! Content writes and the cross-store reads built on them.

mod common;

use forum_db::{
    queries, CategoryId, ErrorKind, NewAttachment, PostSort, SearchSort, UserRole,
};
use pretty_assertions::assert_eq;

fn attachment(name: &str) -> NewAttachment {
    NewAttachment {
        stored_filename: format!("stored-{name}"),
        original_filename: name.to_string(),
        mime_type: "text/plain".to_string(),
        data: b"attachment bytes".to_vec(),
    }
}

#[tokio::test]
async fn test_deleting_post_cascades() {
    let (_dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await;
    let reader = common::user(&db, "reader", UserRole::Member).await;
    let category = common::category(&db, "General").await;
    let content = db.content();

    let post = content
        .create_post(author.id, category.id, "Parent", "with children")
        .await
        .unwrap();
    content
        .add_comment(reader.id, category.id, post.id, "first")
        .await
        .unwrap();
    content
        .add_comment(author.id, category.id, post.id, "second")
        .await
        .unwrap();
    content
        .add_attachment(author.id, category.id, post.id, &attachment("notes.txt"))
        .await
        .unwrap();

    let detail = db.coordinator().get_post(category.id, post.id, false).await.unwrap();
    assert_eq!(detail.comment_count, 2);
    assert_eq!(detail.attachments.len(), 1);
    assert_eq!(detail.attachments[0].byte_size, 16);

    content
        .delete_post(author.id, category.id, post.id)
        .await
        .unwrap();

    let partition = db.registry().open(category.id).await.unwrap();
    let pool = partition.pool();
    assert!(queries::list_comments_for_post(pool, post.id).await.unwrap().is_empty());
    assert_eq!(queries::count_comments(pool).await.unwrap(), 0);
    assert_eq!(queries::count_attachments(pool).await.unwrap(), 0);
}

#[tokio::test]
async fn test_search_follows_edits() {
    let (_dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await;
    let category = common::category(&db, "Greek").await;
    let content = db.content();
    let coordinator = db.coordinator();

    let post = content
        .create_post(author.id, category.id, "Alpha Beta", "Gamma")
        .await
        .unwrap();

    let hits = coordinator
        .search_posts("beta", Some(category.id), 1, 20, SearchSort::Relevance)
        .await
        .unwrap();
    assert_eq!(hits.total, 1);
    assert_eq!(hits.items[0].item.post.id, post.id);
    assert_eq!(hits.items[0].item.author.username, "writer");

    content
        .update_post(author.id, category.id, post.id, "Alpha", "Gamma")
        .await
        .unwrap();

    let hits = coordinator
        .search_posts("beta", Some(category.id), 1, 20, SearchSort::Relevance)
        .await
        .unwrap();
    assert_eq!(hits.total, 0);
    assert!(hits.items.is_empty());

    let hits = coordinator
        .search_posts("gamma", Some(category.id), 1, 20, SearchSort::Relevance)
        .await
        .unwrap();
    assert_eq!(hits.total, 1);
}

#[tokio::test]
async fn test_blank_search_is_empty() {
    let (_dir, db) = common::forum().await;
    common::category(&db, "Quiet").await;

    for query in ["", "   ", "()*"] {
        let page = db
            .coordinator()
            .search_posts(query, None, 1, 20, SearchSort::Relevance)
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
        assert!(!page.has_next);
    }
}

#[tokio::test]
async fn test_search_fans_out_across_categories() {
    let (_dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await;
    let content = db.content();

    let rust = common::category(&db, "Rust").await;
    let go = common::category(&db, "Go").await;

    content
        .create_post(author.id, rust.id, "Async runtimes", "tokio is an async runtime")
        .await
        .unwrap();
    content
        .create_post(author.id, go.id, "Goroutines", "not quite async")
        .await
        .unwrap();
    content
        .create_post(author.id, go.id, "Channels", "message passing")
        .await
        .unwrap();

    let page = db
        .coordinator()
        .search_posts("async", None, 1, 20, SearchSort::CreatedAt)
        .await
        .unwrap();
    assert_eq!(page.total, 2);

    // Newest first across both partitions
    let titles: Vec<&str> = page
        .items
        .iter()
        .map(|hit| hit.item.post.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Goroutines", "Async runtimes"]);

    let second = db
        .coordinator()
        .search_posts("async", None, 2, 1, SearchSort::CreatedAt)
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].item.post.title, "Async runtimes");
    assert!(second.has_prev);
    assert!(!second.has_next);
}

#[tokio::test]
async fn test_list_posts_pagination() {
    let (_dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await;
    let category = common::category(&db, "Busy").await;
    let content = db.content();

    let mut posts = Vec::new();
    for i in 0..45 {
        posts.push(
            content
                .create_post(author.id, category.id, &format!("Post {i}"), "body")
                .await
                .unwrap(),
        );
    }
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    let page = db
        .coordinator()
        .list_posts(category.id, PostSort::CreatedAt, 2, 20)
        .await
        .unwrap();

    assert_eq!(page.total, 45);
    assert_eq!(page.items.len(), 20);
    assert!(page.has_next);
    assert!(page.has_prev);

    let got: Vec<i64> = page.items.iter().map(|item| item.post.id).collect();
    let expected: Vec<i64> = posts[20..40].iter().map(|p| p.id).collect();
    assert_eq!(got, expected);

    let last = db
        .coordinator()
        .list_posts(category.id, PostSort::CreatedAt, 3, 20)
        .await
        .unwrap();
    assert_eq!(last.items.len(), 5);
    assert!(!last.has_next);
}

#[tokio::test]
async fn test_list_posts_rejects_bad_paging() {
    let (_dir, db) = common::forum().await;
    let category = common::category(&db, "Strict").await;

    for (page, size) in [(0, 20), (1, 0), (1, 101)] {
        let err = db
            .coordinator()
            .list_posts(category.id, PostSort::CreatedAt, page, size)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

#[tokio::test]
async fn test_comments_bump_activity() {
    let (_dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await;
    let category = common::category(&db, "Chatter").await;
    let content = db.content();

    let older = content
        .create_post(author.id, category.id, "Older", "first post")
        .await
        .unwrap();
    let newer = content
        .create_post(author.id, category.id, "Newer", "second post")
        .await
        .unwrap();

    let comment = content
        .add_comment(author.id, category.id, older.id, "bump")
        .await
        .unwrap();

    let page = db
        .coordinator()
        .list_posts(category.id, PostSort::LastActivityAt, 1, 20)
        .await
        .unwrap();
    let ids: Vec<i64> = page.items.iter().map(|item| item.post.id).collect();
    assert_eq!(ids, vec![older.id, newer.id]);
    assert_eq!(page.items[0].post.last_activity_at, Some(comment.created_at));
    assert_eq!(page.items[0].comment_count, 1);
    assert_eq!(page.items[1].comment_count, 0);

    let recent = db
        .coordinator()
        .recent_activity_posts(Some(category.id), 1)
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].post.id, older.id);

    let comments = db
        .coordinator()
        .list_comments(category.id, older.id)
        .await
        .unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author.username, "writer");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_comments_all_commit() {
    let (_dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await.id;
    let key = common::category(&db, "Busy Thread").await.id;
    let post = db
        .content()
        .create_post(author, key, "Pile on", "reply below")
        .await
        .unwrap()
        .id;

    let replies: Vec<_> = (0..16)
        .map(|i| {
            let content = db.content();
            tokio::spawn(async move {
                content
                    .add_comment(author, key, post, &format!("reply {i}"))
                    .await
            })
        })
        .collect();
    for reply in replies {
        reply.await.unwrap().unwrap();
    }

    let detail = db.coordinator().get_post(key, post, false).await.unwrap();
    assert_eq!(detail.comment_count, 16);
}

#[tokio::test]
async fn test_comment_on_missing_post() {
    let (_dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await;
    let category = common::category(&db, "Empty").await;

    let err = db
        .content()
        .add_comment(author.id, category.id, 999, "hello?")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = db
        .coordinator()
        .get_post(category.id, 999, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_validation_precedes_store_access() {
    let (_dir, db) = common::forum().await;

    // Neither the user nor the category exists; validation still answers first
    let err = db
        .content()
        .create_post(1, CategoryId::new(99), &"x".repeat(201), "body")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = db
        .content()
        .create_post(1, CategoryId::new(99), "Title", "  ")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert!(db.registry().open_keys().is_empty());
}

#[tokio::test]
async fn test_popular_posts_ranked_globally() {
    let (_dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await;
    let content = db.content();
    let coordinator = db.coordinator();

    let a = common::category(&db, "A").await;
    let b = common::category(&db, "B").await;

    let quiet = content.create_post(author.id, a.id, "Quiet", "x").await.unwrap();
    let hot = content.create_post(author.id, b.id, "Hot", "x").await.unwrap();
    let warm = content.create_post(author.id, a.id, "Warm", "x").await.unwrap();

    for _ in 0..3 {
        coordinator.get_post(b.id, hot.id, true).await.unwrap();
    }
    coordinator.get_post(a.id, warm.id, true).await.unwrap();

    let popular = coordinator.popular_posts(None, 2, 7).await.unwrap();
    let titles: Vec<&str> = popular.iter().map(|p| p.post.title.as_str()).collect();
    assert_eq!(titles, vec!["Hot", "Warm"]);

    let in_a = coordinator.popular_posts(Some(a.id), 10, 7).await.unwrap();
    let ids: Vec<i64> = in_a.iter().map(|p| p.post.id).collect();
    assert_eq!(ids, vec![warm.id, quiet.id]);

    assert!(coordinator.popular_posts(None, 0, 7).await.unwrap().is_empty());

    // An unbounded window covers every post instead of overflowing
    let all_time = coordinator.popular_posts(None, 10, u32::MAX).await.unwrap();
    let titles: Vec<&str> = all_time.iter().map(|p| p.post.title.as_str()).collect();
    assert_eq!(titles, vec!["Hot", "Warm", "Quiet"]);
}

#[tokio::test]
async fn test_bounded_coordinator_matches_unbounded() {
    let (_dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await;
    let category = common::category(&db, "Timed").await;
    db.content()
        .create_post(author.id, category.id, "On time", "fast enough")
        .await
        .unwrap();

    let bounded = db.coordinator().with_timeout(std::time::Duration::from_secs(30));
    let listed = bounded.list_categories().await.unwrap();
    assert_eq!(listed, db.coordinator().list_categories().await.unwrap());
    assert_eq!(listed[0].post_count, 1);
}

#[tokio::test]
async fn test_category_listing_stats() {
    let (_dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await;
    let commenter = common::user(&db, "commenter", UserRole::Member).await;
    let content = db.content();

    let first = common::category(&db, "First").await;
    let second = common::category(&db, "Second").await;

    let post = content
        .create_post(author.id, first.id, "Opening", "hello")
        .await
        .unwrap();
    let comment = content
        .add_comment(commenter.id, first.id, post.id, "reply")
        .await
        .unwrap();

    let summaries = db.coordinator().list_categories().await.unwrap();
    assert_eq!(summaries.len(), 2);

    let busy = &summaries[0];
    assert_eq!(busy.category.id, first.id);
    assert_eq!(busy.post_count, 1);
    assert_eq!(busy.comment_count, 1);
    let latest = busy.latest_post.as_ref().unwrap();
    assert_eq!(latest.title, "Opening");
    assert_eq!(latest.author.username, "writer");
    let latest_comment = busy.latest_comment.as_ref().unwrap();
    assert_eq!(latest_comment.author.username, "commenter");
    assert_eq!(busy.last_activity_at, Some(comment.created_at));

    let idle = &summaries[1];
    assert_eq!(idle.category.id, second.id);
    assert_eq!(idle.post_count, 0);
    assert!(idle.last_activity_at.is_none());

    let stats = db.coordinator().public_statistics().await.unwrap();
    assert_eq!(stats.member_count, 2);
    assert_eq!(stats.category_count, 2);
    assert_eq!(stats.post_count, 1);
}

#[tokio::test]
async fn test_reorder_changes_listing() {
    let (_dir, db) = common::forum().await;
    let a = common::category(&db, "A").await;
    let b = common::category(&db, "B").await;

    queries::reorder_categories(db.config_store().pool(), &[(a.id, 2), (b.id, 1)])
        .await
        .unwrap();

    let ids: Vec<CategoryId> = db
        .coordinator()
        .list_categories()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.category.id)
        .collect();
    assert_eq!(ids, vec![b.id, a.id]);

    // An unknown id rolls back the whole reorder
    let err = queries::reorder_categories(
        db.config_store().pool(),
        &[(a.id, 0), (CategoryId::new(404), 5)],
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let a_now = queries::get_category(db.config_store().pool(), a.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a_now.display_order, 2);
}

#[tokio::test]
async fn test_attachment_round_trip() {
    let (_dir, db) = common::forum().await;
    let author = common::user(&db, "writer", UserRole::Member).await;
    let other = common::user(&db, "other", UserRole::Member).await;
    let category = common::category(&db, "Files").await;
    let content = db.content();

    let post = content
        .create_post(author.id, category.id, "Upload", "see attached")
        .await
        .unwrap();
    let info = content
        .add_attachment(author.id, category.id, post.id, &attachment("a.txt"))
        .await
        .unwrap();

    let stored = db
        .coordinator()
        .get_attachment(category.id, info.id)
        .await
        .unwrap();
    assert_eq!(stored.data, b"attachment bytes".to_vec());
    assert_eq!(stored.original_filename, "a.txt");

    let err = content
        .delete_attachment(other.id, category.id, info.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    content
        .delete_attachment(author.id, category.id, info.id)
        .await
        .unwrap();
    let err = db
        .coordinator()
        .get_attachment(category.id, info.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
