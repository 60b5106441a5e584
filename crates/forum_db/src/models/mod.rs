//! Database models.
//!
//! These structs map directly to database tables via sqlx. The config-store
//! tables live in `user` and `category`; partition tables live in `content`.

mod category;
mod content;
mod user;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use category::{ActivityLogEntry, Ban, Category, ModeratorGrant, NewBan, NewCategory};
pub use content::{Attachment, AttachmentInfo, Comment, NewAttachment, Post};
pub use user::{NewUser, User, UserRole};

/// Row id of a user in the config store.
pub type UserId = i64;

/// Partition-local row id of a post.
pub type PostId = i64;

/// Partition-local row id of a comment.
pub type CommentId = i64;

/// Partition-local row id of an attachment.
pub type AttachmentId = i64;

/// Category identifier, doubling as the partition key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct CategoryId(i64);

impl CategoryId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for CategoryId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
