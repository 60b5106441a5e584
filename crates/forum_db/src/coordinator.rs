//! Cross-store reads.
//!
//! The config store and the category partitions are separate SQLite files,
//! so nothing here joins across them in SQL. Each operation issues one query
//! per store and stitches the rows together in memory. Author details for a
//! batch of posts come from a single config-store lookup.
//!
//! Operations that span every active category fan out concurrently. A
//! partition that fails to open or answer is logged and contributes nothing;
//! the call still succeeds with whatever the other partitions returned.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::deadline::bounded;
use crate::error::{DbError, DbResult};
use crate::fts::{self, RankedPost, SearchSort};
use crate::models::{
    Attachment, AttachmentId, AttachmentInfo, Category, CategoryId, Comment, Post, PostId, UserId,
    UserRole,
};
use crate::queries::{self, PostSort};
use crate::registry::{Partition, PartitionRegistry};

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Characters kept in a post preview before the ellipsis.
pub const PREVIEW_CHARS: usize = 150;

/// Display name for authors missing from the config store.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// Who wrote something, as shown next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorInfo {
    pub id: UserId,
    pub username: String,
    pub role: UserRole,
}

impl AuthorInfo {
    fn unknown(id: UserId) -> Self {
        Self {
            id,
            username: UNKNOWN_AUTHOR.to_string(),
            role: UserRole::Member,
        }
    }
}

/// Headline of a category's newest post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummary {
    pub id: PostId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub author: AuthorInfo,
}

/// Pointer to a category's newest comment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentSummary {
    pub id: i64,
    pub post_id: PostId,
    pub created_at: DateTime<Utc>,
    pub author: AuthorInfo,
}

/// An active category with its partition's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    #[serde(flatten)]
    pub category: Category,
    pub post_count: i64,
    pub comment_count: i64,
    pub latest_post: Option<PostSummary>,
    pub latest_comment: Option<CommentSummary>,
    /// Newer of the latest post and latest comment; None for an empty partition
    pub last_activity_at: Option<DateTime<Utc>>,
}

/// A post as it appears in listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostListItem {
    #[serde(flatten)]
    pub post: Post,
    pub author: AuthorInfo,
    pub comment_count: i64,
    pub preview: String,
}

/// A search match. `rank` is the bm25 score, lower is better.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub item: PostListItem,
    pub rank: f64,
}

/// One page of results plus enough metadata to navigate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    fn new(items: Vec<T>, total: i64, page: u32, page_size: u32) -> Self {
        let seen = i64::from(page) * i64::from(page_size);
        Self {
            items,
            total,
            page,
            page_size,
            has_next: seen < total,
            has_prev: page > 1,
        }
    }

    fn empty(page: u32, page_size: u32) -> Self {
        Self::new(Vec::new(), 0, page, page_size)
    }
}

pub type PostPage = Page<PostListItem>;
pub type SearchPage = Page<SearchHit>;

/// A single post with everything a detail view needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostDetail {
    pub post: Post,
    pub author: AuthorInfo,
    pub comment_count: i64,
    pub attachments: Vec<AttachmentInfo>,
}

/// A comment with its author.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentItem {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: AuthorInfo,
}

/// Dashboard counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublicStatistics {
    /// Users holding the member role
    pub member_count: i64,
    pub category_count: i64,
    /// Posts across every readable active partition
    pub post_count: i64,
}

#[derive(Debug, Default)]
struct PartitionStats {
    post_count: i64,
    comment_count: i64,
    latest_post: Option<Post>,
    latest_comment: Option<Comment>,
}

#[derive(Debug, Default)]
struct PartitionMatches {
    hits: Vec<(RankedPost, i64)>,
    total: i64,
}

/// Read-side entry point spanning the config store and the partitions.
#[derive(Debug, Clone)]
pub struct Coordinator {
    registry: Arc<PartitionRegistry>,
    timeout: Option<Duration>,
}

impl Coordinator {
    pub fn new(registry: Arc<PartitionRegistry>, timeout: Option<Duration>) -> Self {
        Self { registry, timeout }
    }

    /// A copy whose operations each fail with [`DbError::Timeout`] once
    /// `limit` elapses.
    pub fn with_timeout(&self, limit: Duration) -> Self {
        Self {
            registry: self.registry.clone(),
            timeout: Some(limit),
        }
    }

    fn config(&self) -> &SqlitePool {
        self.registry.config().pool()
    }

    /// Active categories in display order, each with partition stats.
    ///
    /// An unreadable partition shows zero stats.
    pub async fn list_categories(&self) -> DbResult<Vec<CategorySummary>> {
        bounded(self.timeout, "list categories", async {
            let categories = queries::list_active_categories(self.config()).await?;

            let results = join_all(categories.iter().map(|c| self.partition_stats(c.id))).await;
            let stats: Vec<PartitionStats> = categories
                .iter()
                .zip(results)
                .map(|(c, result)| settle(c.id, "category stats", result))
                .collect();

            let author_ids: Vec<UserId> = stats
                .iter()
                .flat_map(|s| {
                    let post = s.latest_post.as_ref().map(|p| p.author_id);
                    let comment = s.latest_comment.as_ref().map(|c| c.author_id);
                    post.into_iter().chain(comment)
                })
                .collect();
            let authors = self.resolve_authors(&author_ids).await?;

            Ok::<_, DbError>(categories
                .into_iter()
                .zip(stats)
                .map(|(category, stats)| {
                    let last_activity_at = match (&stats.latest_post, &stats.latest_comment) {
                        (Some(p), Some(c)) => Some(p.created_at.max(c.created_at)),
                        (Some(p), None) => Some(p.created_at),
                        (None, Some(c)) => Some(c.created_at),
                        (None, None) => None,
                    };
                    CategorySummary {
                        category,
                        post_count: stats.post_count,
                        comment_count: stats.comment_count,
                        latest_post: stats.latest_post.map(|p| PostSummary {
                            author: author_of(&authors, p.author_id),
                            id: p.id,
                            title: p.title,
                            created_at: p.created_at,
                        }),
                        latest_comment: stats.latest_comment.map(|c| CommentSummary {
                            author: author_of(&authors, c.author_id),
                            id: c.id,
                            post_id: c.post_id,
                            created_at: c.created_at,
                        }),
                        last_activity_at,
                    }
                })
                .collect())
        })
        .await
    }

    async fn partition_stats(&self, key: CategoryId) -> DbResult<PartitionStats> {
        let partition = self.registry.open(key).await?;
        let pool = partition.pool();
        Ok(PartitionStats {
            post_count: queries::count_posts(pool).await?,
            comment_count: queries::count_comments(pool).await?,
            latest_post: queries::latest_post(pool).await?,
            latest_comment: queries::latest_comment(pool).await?,
        })
    }

    /// One page of a category's posts, newest first on `sort`.
    pub async fn list_posts(
        &self,
        key: CategoryId,
        sort: PostSort,
        page: u32,
        page_size: u32,
    ) -> DbResult<PostPage> {
        validate_page(page, page_size)?;

        bounded(self.timeout, "list posts", async {
            let partition = self.registry.open_active(key).await?;
            let pool = partition.pool();

            let total = queries::count_posts(pool).await?;
            let offset = i64::from(page - 1) * i64::from(page_size);
            let posts = queries::list_posts_page(pool, sort, i64::from(page_size), offset).await?;
            let counted = with_comment_counts(pool, posts).await?;

            let items = self.list_items(counted).await?;
            Ok::<_, DbError>(Page::new(items, total, page, page_size))
        })
        .await
    }

    /// One post with author, comment count and attachments.
    ///
    /// With `increment_view` the view counter is bumped first and the
    /// returned post carries the new count.
    pub async fn get_post(
        &self,
        key: CategoryId,
        post_id: PostId,
        increment_view: bool,
    ) -> DbResult<PostDetail> {
        bounded(self.timeout, "get post", async {
            let partition = self.registry.open_active(key).await?;
            let pool = partition.pool();

            let post = if increment_view {
                let mut tx = pool.begin().await?;
                if queries::increment_view_count(&mut *tx, post_id).await?.is_none() {
                    return Err(DbError::not_found("post", post_id));
                }
                let post = queries::get_post(&mut *tx, post_id).await?;
                tx.commit().await?;
                post
            } else {
                queries::get_post(pool, post_id).await?
            };
            let post = post.ok_or_else(|| DbError::not_found("post", post_id))?;

            let comment_count = queries::count_comments_for_post(pool, post_id).await?;
            let attachments = queries::list_attachments_for_post(pool, post_id).await?;
            let authors = self.resolve_authors(&[post.author_id]).await?;

            Ok(PostDetail {
                author: author_of(&authors, post.author_id),
                post,
                comment_count,
                attachments,
            })
        })
        .await
    }

    /// Most viewed posts created in the last `window_days` days.
    ///
    /// Without a key every active category is searched and the results are
    /// ranked together.
    pub async fn popular_posts(
        &self,
        key: Option<CategoryId>,
        limit: u32,
        window_days: u32,
    ) -> DbResult<Vec<PostListItem>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let since = window_start(Utc::now(), window_days);
        let limit = i64::from(limit);

        bounded(self.timeout, "popular posts", async {
            let per_partition = self
                .collect(key, "popular posts", |partition, _| async move {
                    let pool = partition.pool();
                    let posts = queries::popular_posts(pool, since, limit).await?;
                    with_comment_counts(pool, posts).await
                })
                .await?;

            let mut posts: Vec<(Post, i64)> = per_partition.into_iter().flatten().collect();
            posts.sort_by(|(a, _), (b, _)| {
                b.view_count
                    .cmp(&a.view_count)
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| newest_row(a, b))
            });
            posts.truncate(limit as usize);

            self.list_items(posts).await
        })
        .await
    }

    /// Posts with the most recent activity.
    ///
    /// When fanning out, each partition is asked for an even share of
    /// `limit` before the merged list is cut.
    pub async fn recent_activity_posts(
        &self,
        key: Option<CategoryId>,
        limit: u32,
    ) -> DbResult<Vec<PostListItem>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        bounded(self.timeout, "recent activity", async {
            let per_partition = self
                .collect(key, "recent activity", |partition, partitions| async move {
                    let share = (limit as usize).div_ceil(partitions.max(1)).max(1);
                    let pool = partition.pool();
                    let posts = queries::recently_active_posts(pool, share as i64).await?;
                    with_comment_counts(pool, posts).await
                })
                .await?;

            let mut posts: Vec<(Post, i64)> = per_partition.into_iter().flatten().collect();
            posts.sort_by(|(a, _), (b, _)| {
                b.last_activity_at
                    .cmp(&a.last_activity_at)
                    .then_with(|| newest_row(a, b))
            });
            posts.truncate(limit as usize);

            self.list_items(posts).await
        })
        .await
    }

    /// Full-text search over titles and bodies.
    ///
    /// A blank query (or one with no searchable words) yields an empty page
    /// rather than an error.
    pub async fn search_posts(
        &self,
        query: &str,
        key: Option<CategoryId>,
        page: u32,
        page_size: u32,
        sort: SearchSort,
    ) -> DbResult<SearchPage> {
        validate_page(page, page_size)?;

        let Some(expr) = fts::build_match_expression(query) else {
            return Ok(Page::empty(page, page_size));
        };
        debug!(%expr, ?sort, "Searching posts");

        // A single partition pages in SQL; a fan-out needs every partition's
        // leading rows to merge before slicing.
        let offset = i64::from(page - 1) * i64::from(page_size);
        let (limit, sql_offset) = match key {
            Some(_) => (i64::from(page_size), offset),
            None => (offset + i64::from(page_size), 0),
        };

        bounded(self.timeout, "search posts", async {
            let expr = expr.as_str();
            let per_partition = self
                .collect(key, "search posts", |partition, _| async move {
                    let pool = partition.pool();
                    let total = fts::count_matches(pool, expr).await?;
                    let ranked = fts::search_posts(pool, expr, sort, limit, sql_offset).await?;
                    let ids: Vec<PostId> = ranked.iter().map(|r| r.post.id).collect();
                    let counts = queries::comment_counts(pool, &ids).await?;
                    let hits = ranked
                        .into_iter()
                        .map(|r| {
                            let count = counts.get(&r.post.id).copied().unwrap_or(0);
                            (r, count)
                        })
                        .collect();
                    Ok::<_, DbError>(PartitionMatches { hits, total })
                })
                .await?;

            let total = per_partition.iter().map(|m| m.total).sum();
            let mut hits: Vec<(RankedPost, i64)> =
                per_partition.into_iter().flat_map(|m| m.hits).collect();

            if key.is_none() {
                hits.sort_by(|(a, _), (b, _)| compare_hits(sort, a, b));
                hits = hits
                    .into_iter()
                    .skip(offset as usize)
                    .take(page_size as usize)
                    .collect();
            }

            let author_ids: Vec<UserId> = hits.iter().map(|(r, _)| r.post.author_id).collect();
            let authors = self.resolve_authors(&author_ids).await?;
            let items = hits
                .into_iter()
                .map(|(ranked, comment_count)| SearchHit {
                    rank: ranked.rank,
                    item: list_item(&authors, ranked.post, comment_count),
                })
                .collect();

            Ok::<_, DbError>(Page::new(items, total, page, page_size))
        })
        .await
    }

    /// Dashboard counters. Unreadable partitions count as zero posts.
    pub async fn public_statistics(&self) -> DbResult<PublicStatistics> {
        bounded(self.timeout, "public statistics", async {
            let member_count =
                queries::count_users_with_role(self.config(), UserRole::Member).await?;
            let category_count = queries::count_active_categories(self.config()).await?;
            let post_count = self
                .collect(None, "post count", |partition, _| async move {
                    queries::count_posts(partition.pool()).await
                })
                .await?
                .into_iter()
                .sum();

            Ok::<_, DbError>(PublicStatistics {
                member_count,
                category_count,
                post_count,
            })
        })
        .await
    }

    /// Comments on a post, oldest first, with their authors.
    pub async fn list_comments(
        &self,
        key: CategoryId,
        post_id: PostId,
    ) -> DbResult<Vec<CommentItem>> {
        bounded(self.timeout, "list comments", async {
            let partition = self.registry.open_active(key).await?;
            let pool = partition.pool();

            if queries::get_post(pool, post_id).await?.is_none() {
                return Err(DbError::not_found("post", post_id));
            }
            let comments = queries::list_comments_for_post(pool, post_id).await?;

            let author_ids: Vec<UserId> = comments.iter().map(|c| c.author_id).collect();
            let authors = self.resolve_authors(&author_ids).await?;

            Ok(comments
                .into_iter()
                .map(|comment| CommentItem {
                    author: author_of(&authors, comment.author_id),
                    comment,
                })
                .collect())
        })
        .await
    }

    /// An attachment including its bytes.
    pub async fn get_attachment(
        &self,
        key: CategoryId,
        attachment_id: AttachmentId,
    ) -> DbResult<Attachment> {
        bounded(self.timeout, "get attachment", async {
            let partition = self.registry.open_active(key).await?;
            queries::get_attachment(partition.pool(), attachment_id)
                .await?
                .ok_or_else(|| DbError::not_found("attachment", attachment_id))
        })
        .await
    }

    /// Run `query` against one partition, or every active partition when
    /// `key` is None.
    ///
    /// `query` receives the partition and how many partitions are being
    /// asked. With an explicit key, errors propagate; in a fan-out they are
    /// logged and the partition is left out.
    async fn collect<T, F, Fut>(
        &self,
        key: Option<CategoryId>,
        operation: &'static str,
        query: F,
    ) -> DbResult<Vec<T>>
    where
        F: Fn(Arc<Partition>, usize) -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        if let Some(key) = key {
            let partition = self.registry.open_active(key).await?;
            return Ok(vec![query(partition, 1).await?]);
        }

        let keys = queries::list_active_category_ids(self.config()).await?;
        let partitions = keys.len();
        let query = &query;

        let results = join_all(keys.iter().map(|&key| async move {
            let partition = self.registry.open(key).await?;
            query(partition, partitions).await
        }))
        .await;

        Ok(keys
            .iter()
            .zip(results)
            .filter_map(|(&key, result)| match result {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(category_id = %key, operation, error = %e, "Partition skipped in fan-out");
                    None
                }
            })
            .collect())
    }

    async fn resolve_authors(&self, ids: &[UserId]) -> DbResult<HashMap<UserId, AuthorInfo>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let rows = queries::get_authors(self.config(), &ids).await?;
        Ok(rows
            .into_iter()
            .map(|(id, (username, role))| (id, AuthorInfo { id, username, role }))
            .collect())
    }

    async fn list_items(&self, posts: Vec<(Post, i64)>) -> DbResult<Vec<PostListItem>> {
        let author_ids: Vec<UserId> = posts.iter().map(|(p, _)| p.author_id).collect();
        let authors = self.resolve_authors(&author_ids).await?;
        Ok(posts
            .into_iter()
            .map(|(post, count)| list_item(&authors, post, count))
            .collect())
    }
}

fn validate_page(page: u32, page_size: u32) -> DbResult<()> {
    if page == 0 {
        return Err(DbError::invalid_data("page must be at least 1"));
    }
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(DbError::invalid_data(format!(
            "page size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok(())
}

/// Start of a trailing window of `days` days. Windows reaching back past
/// the Unix epoch start there.
fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    chrono::Duration::try_days(i64::from(days))
        .and_then(|window| now.checked_sub_signed(window))
        .filter(|since| *since > DateTime::<Utc>::UNIX_EPOCH)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Log a failed partition read and fall back to an empty value.
fn settle<T: Default>(key: CategoryId, operation: &'static str, result: DbResult<T>) -> T {
    result.unwrap_or_else(|e| {
        warn!(category_id = %key, operation, error = %e, "Partition unreadable, using empty result");
        T::default()
    })
}

async fn with_comment_counts(pool: &SqlitePool, posts: Vec<Post>) -> DbResult<Vec<(Post, i64)>> {
    let ids: Vec<PostId> = posts.iter().map(|p| p.id).collect();
    let counts = queries::comment_counts(pool, &ids).await?;
    Ok(posts
        .into_iter()
        .map(|p| {
            let count = counts.get(&p.id).copied().unwrap_or(0);
            (p, count)
        })
        .collect())
}

fn author_of(authors: &HashMap<UserId, AuthorInfo>, id: UserId) -> AuthorInfo {
    authors
        .get(&id)
        .cloned()
        .unwrap_or_else(|| AuthorInfo::unknown(id))
}

fn list_item(authors: &HashMap<UserId, AuthorInfo>, post: Post, comment_count: i64) -> PostListItem {
    PostListItem {
        author: author_of(authors, post.author_id),
        preview: preview(&post.body),
        comment_count,
        post,
    }
}

/// Tiebreak for merged lists: later category, then later row, first.
fn newest_row(a: &Post, b: &Post) -> Ordering {
    b.category_id
        .cmp(&a.category_id)
        .then_with(|| b.id.cmp(&a.id))
}

fn compare_hits(sort: SearchSort, a: &RankedPost, b: &RankedPost) -> Ordering {
    let (a_post, b_post) = (&a.post, &b.post);
    match sort {
        SearchSort::Relevance => a
            .rank
            .total_cmp(&b.rank)
            .then_with(|| b_post.created_at.cmp(&a_post.created_at)),
        SearchSort::CreatedAt => b_post.created_at.cmp(&a_post.created_at),
        SearchSort::ViewCount => b_post
            .view_count
            .cmp(&a_post.view_count)
            .then_with(|| b_post.created_at.cmp(&a_post.created_at)),
    }
    .then_with(|| newest_row(a_post, b_post))
}

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static MD_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static MD_MARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*_`#>~|]+").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Plain-text preview of a post body: markup stripped, whitespace
/// collapsed, cut to [`PREVIEW_CHARS`] characters.
pub fn preview(body: &str) -> String {
    let text = HTML_TAG.replace_all(body, " ");
    let text = MD_LINK.replace_all(&text, "$1");
    let text = MD_MARK.replace_all(&text, "");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = text.trim();

    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_preview_strips_markup() {
        assert_eq!(
            preview("<p>Hello <b>world</b></p>\n\n## Heading\n*bold* and `code`"),
            "Hello world Heading bold and code"
        );
        assert_eq!(preview("see [the docs](https://example.com)!"), "see the docs!");
        assert_eq!(preview("   "), "");
    }

    #[test]
    fn test_preview_truncates() {
        let body = "word ".repeat(100);
        let p = preview(&body);
        assert!(p.ends_with("..."));
        assert!(p.chars().count() <= PREVIEW_CHARS + 3);

        let exact = "a".repeat(PREVIEW_CHARS);
        assert_eq!(preview(&exact), exact);
    }

    #[test]
    fn test_page_metadata() {
        let page: Page<()> = Page::new(Vec::new(), 45, 2, 20);
        assert!(page.has_next);
        assert!(page.has_prev);

        let last: Page<()> = Page::new(Vec::new(), 45, 3, 20);
        assert!(!last.has_next);

        let first: Page<()> = Page::new(Vec::new(), 20, 1, 20);
        assert!(!first.has_next);
        assert!(!first.has_prev);
    }

    #[test]
    fn test_validate_page() {
        assert!(validate_page(1, 20).is_ok());
        assert!(validate_page(0, 20).is_err());
        assert!(validate_page(1, 0).is_err());
        assert!(validate_page(1, MAX_PAGE_SIZE + 1).is_err());
    }

    #[test]
    fn test_window_start() {
        let now = Utc::now();
        assert_eq!(window_start(now, 0), now);
        assert_eq!(window_start(now, 7), now - chrono::Duration::days(7));
        assert_eq!(window_start(now, 30_000), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(window_start(now, u32::MAX), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_unknown_author() {
        let authors = HashMap::new();
        let author = author_of(&authors, 9);
        assert_eq!(author.username, UNKNOWN_AUTHOR);
        assert_eq!(author.role, UserRole::Member);
        assert_eq!(author.id, 9);
    }
}
