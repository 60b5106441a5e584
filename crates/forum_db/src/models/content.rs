//! Partition models: posts, comments and attachments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{AttachmentId, CategoryId, CommentId, PostId, UserId};

/// A post in a category partition.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Post {
    /// Partition-local identifier
    pub id: PostId,

    /// Always equal to the owning partition's key
    pub category_id: CategoryId,

    /// References a user in the config store (not enforced by the partition)
    pub author_id: UserId,

    pub title: String,
    pub body: String,

    /// Monotonic counter
    pub view_count: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Bumped whenever a comment is added
    pub last_activity_at: Option<DateTime<Utc>>,
}

/// A comment on a post. Deleted with its post.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored file, including its bytes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub post_id: PostId,
    pub stored_filename: String,
    pub original_filename: String,
    pub mime_type: String,
    pub byte_size: i64,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Attachment metadata without the payload, for post listings.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub id: AttachmentId,
    pub post_id: PostId,
    pub stored_filename: String,
    pub original_filename: String,
    pub mime_type: String,
    pub byte_size: i64,
    pub created_at: DateTime<Utc>,
}

/// An already-validated upload handed over by the boundary layer.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub stored_filename: String,
    pub original_filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}
