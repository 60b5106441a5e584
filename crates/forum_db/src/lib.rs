//! Forum Database Layer
//!
//! SQLite-based storage for a discussion forum, split across files.
//!
//! # Architecture
//!
//! - **One config store** - Users, categories, moderator grants, bans, audit log
//! - **One partition per category** - Posts, comments and attachments, created on first use
//! - **FTS5 per partition** - Post search index kept in sync by triggers
//! - **No cross-file joins** - The coordinator stitches config and partition rows in memory
//!
//! # Usage
//!
//! ```rust,ignore
//! use forum_db::{ForumDb, NewCategory, PostSort};
//!
//! let db = ForumDb::open_in("path/to/data").await?;
//! let category = db.registry().create_partition(&NewCategory::new("Free Talk")).await?;
//! let page = db.coordinator().list_posts(category.id, PostSort::CreatedAt, 1, 20).await?;
//! ```

pub mod config;
pub mod connection;
pub mod content;
pub mod coordinator;
mod deadline;
pub mod error;
pub mod forum;
pub mod fts;
pub mod models;
pub mod permissions;
pub mod queries;
pub mod registry;
pub mod schema;

pub use config::{DatabaseConfig, ForumConfig};
pub use connection::{Store, StoreOptions};
pub use content::ContentService;
pub use error::{DbError, DbResult, ErrorKind};
pub use forum::{ForumDb, SnapshotReport};
pub use permissions::{Action, Moderation, Resource};
pub use registry::{Partition, PartitionRegistry};

// Re-export coordinator result types
pub use coordinator::{
    AuthorInfo, CategorySummary, CommentItem, CommentSummary, Coordinator, Page, PostDetail,
    PostListItem, PostPage, PostSummary, PublicStatistics, SearchHit, SearchPage,
};

// Re-export FTS types
pub use fts::{FtsStats, SearchSort};
pub use queries::PostSort;

// Re-export key model types for convenience
pub use models::{
    ActivityLogEntry, Attachment, AttachmentId, AttachmentInfo, Ban, Category, CategoryId, Comment,
    CommentId, ModeratorGrant, NewAttachment, NewBan, NewCategory, NewUser, Post, PostId, User,
    UserId, UserRole,
};
