//! Writes to category partitions.
//!
//! Posts, comments and attachments are only ever created or changed through
//! [`ContentService`]. Input is checked before any store is touched, then the
//! acting user's permission, then the write runs against the category's
//! partition.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::deadline::bounded;
use crate::error::{DbError, DbResult};
use crate::models::{
    AttachmentId, AttachmentInfo, CategoryId, Comment, CommentId, NewAttachment, Post, PostId,
    UserId,
};
use crate::permissions::{Action, Moderation, Resource};
use crate::queries;
use crate::registry::PartitionRegistry;

/// Maximum post title length, in characters.
pub const MAX_TITLE_CHARS: usize = 200;

pub fn validate_title(title: &str) -> DbResult<()> {
    if title.trim().is_empty() {
        return Err(DbError::invalid_data("title cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(DbError::invalid_data(format!(
            "title exceeds {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(())
}

pub fn validate_body(body: &str) -> DbResult<()> {
    if body.trim().is_empty() {
        return Err(DbError::invalid_data("body cannot be empty"));
    }
    Ok(())
}

pub fn validate_attachment(attachment: &NewAttachment) -> DbResult<()> {
    if attachment.stored_filename.trim().is_empty() || attachment.original_filename.trim().is_empty() {
        return Err(DbError::invalid_data("attachment filename cannot be empty"));
    }
    if attachment.mime_type.trim().is_empty() {
        return Err(DbError::invalid_data("attachment MIME type cannot be empty"));
    }
    Ok(())
}

/// Validated, permission-checked content writes.
#[derive(Debug, Clone)]
pub struct ContentService {
    registry: Arc<PartitionRegistry>,
    moderation: Moderation,
    timeout: Option<Duration>,
}

impl ContentService {
    pub fn new(registry: Arc<PartitionRegistry>, timeout: Option<Duration>) -> Self {
        Self {
            moderation: Moderation::new(registry.clone()),
            registry,
            timeout,
        }
    }

    async fn require(&self, actor: UserId, action: Action, resource: Resource) -> DbResult<()> {
        if self
            .moderation
            .check_permission(actor, action, Some(resource))
            .await?
        {
            Ok(())
        } else {
            Err(DbError::permission_denied(action.as_str()))
        }
    }

    pub async fn create_post(
        &self,
        author: UserId,
        key: CategoryId,
        title: &str,
        body: &str,
    ) -> DbResult<Post> {
        validate_title(title)?;
        validate_body(body)?;

        bounded(self.timeout, "create post", async {
            self.require(author, Action::CreatePost, Resource::Category(key))
                .await?;
            let partition = self.registry.open_active(key).await?;
            let post = queries::insert_post(partition.pool(), key, author, title, body).await?;
            info!(category_id = %key, post_id = post.id, author, "Created post");
            Ok::<_, DbError>(post)
        })
        .await
    }

    pub async fn update_post(
        &self,
        actor: UserId,
        key: CategoryId,
        post_id: PostId,
        title: &str,
        body: &str,
    ) -> DbResult<Post> {
        validate_title(title)?;
        validate_body(body)?;

        bounded(self.timeout, "update post", async {
            self.require(actor, Action::EditPost, Resource::Post { category: key, post: post_id })
                .await?;
            let partition = self.registry.open_active(key).await?;
            queries::update_post(partition.pool(), post_id, title, body)
                .await?
                .ok_or_else(|| DbError::not_found("post", post_id))
        })
        .await
    }

    /// Delete a post along with its comments and attachments.
    pub async fn delete_post(&self, actor: UserId, key: CategoryId, post_id: PostId) -> DbResult<()> {
        bounded(self.timeout, "delete post", async {
            self.require(actor, Action::DeletePost, Resource::Post { category: key, post: post_id })
                .await?;
            let partition = self.registry.open_active(key).await?;
            if !queries::delete_post(partition.pool(), post_id).await? {
                return Err(DbError::not_found("post", post_id));
            }
            info!(category_id = %key, post_id, actor, "Deleted post");
            Ok(())
        })
        .await
    }

    /// Comment on a post. The post's `last_activity_at` moves to the
    /// comment's timestamp in the same transaction.
    pub async fn add_comment(
        &self,
        author: UserId,
        key: CategoryId,
        post_id: PostId,
        body: &str,
    ) -> DbResult<Comment> {
        validate_body(body)?;

        bounded(self.timeout, "add comment", async {
            self.require(author, Action::CreateComment, Resource::Post { category: key, post: post_id })
                .await?;
            let partition = self.registry.open_active(key).await?;

            let now = Utc::now();
            let mut tx = partition.pool().begin_with("BEGIN IMMEDIATE").await?;
            if queries::get_post(&mut *tx, post_id).await?.is_none() {
                return Err(DbError::not_found("post", post_id));
            }
            let comment = queries::insert_comment(&mut *tx, post_id, author, body, now).await?;
            queries::touch_last_activity(&mut *tx, post_id, now).await?;
            tx.commit().await?;

            Ok(comment)
        })
        .await
    }

    pub async fn update_comment(
        &self,
        actor: UserId,
        key: CategoryId,
        comment_id: CommentId,
        body: &str,
    ) -> DbResult<Comment> {
        validate_body(body)?;

        bounded(self.timeout, "update comment", async {
            self.require(
                actor,
                Action::EditComment,
                Resource::Comment { category: key, comment: comment_id },
            )
            .await?;
            let partition = self.registry.open_active(key).await?;
            queries::update_comment(partition.pool(), comment_id, body)
                .await?
                .ok_or_else(|| DbError::not_found("comment", comment_id))
        })
        .await
    }

    pub async fn delete_comment(
        &self,
        actor: UserId,
        key: CategoryId,
        comment_id: CommentId,
    ) -> DbResult<()> {
        bounded(self.timeout, "delete comment", async {
            self.require(
                actor,
                Action::DeleteComment,
                Resource::Comment { category: key, comment: comment_id },
            )
            .await?;
            let partition = self.registry.open_active(key).await?;
            if !queries::delete_comment(partition.pool(), comment_id).await? {
                return Err(DbError::not_found("comment", comment_id));
            }
            Ok(())
        })
        .await
    }

    /// Store an already-validated upload against a post.
    pub async fn add_attachment(
        &self,
        actor: UserId,
        key: CategoryId,
        post_id: PostId,
        attachment: &NewAttachment,
    ) -> DbResult<AttachmentInfo> {
        validate_attachment(attachment)?;

        bounded(self.timeout, "add attachment", async {
            self.require(
                actor,
                Action::UploadAttachment,
                Resource::Post { category: key, post: post_id },
            )
            .await?;
            let partition = self.registry.open_active(key).await?;
            let info = queries::insert_attachment(partition.pool(), post_id, attachment).await?;
            info!(
                category_id = %key,
                post_id,
                attachment_id = info.id,
                bytes = info.byte_size,
                "Stored attachment"
            );
            Ok::<_, DbError>(info)
        })
        .await
    }

    /// Remove an attachment. Allowed to whoever may upload to its post.
    pub async fn delete_attachment(
        &self,
        actor: UserId,
        key: CategoryId,
        attachment_id: AttachmentId,
    ) -> DbResult<()> {
        bounded(self.timeout, "delete attachment", async {
            let partition = self.registry.open_active(key).await?;
            let info = queries::get_attachment_info(partition.pool(), attachment_id)
                .await?
                .ok_or_else(|| DbError::not_found("attachment", attachment_id))?;

            self.require(
                actor,
                Action::UploadAttachment,
                Resource::Post { category: key, post: info.post_id },
            )
            .await?;
            queries::delete_attachment(partition.pool(), attachment_id).await?;
            Ok::<_, DbError>(())
        })
        .await
    }
}
