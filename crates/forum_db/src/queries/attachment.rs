//! Attachment queries (category partition).

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};

use crate::error::DbResult;
use crate::models::{Attachment, AttachmentId, AttachmentInfo, NewAttachment, PostId};

/// Store an attachment's bytes and metadata.
pub async fn insert_attachment<'e>(
    executor: impl SqliteExecutor<'e>,
    post_id: PostId,
    attachment: &NewAttachment,
) -> DbResult<AttachmentInfo> {
    let info = sqlx::query_as::<_, AttachmentInfo>(
        r#"
        INSERT INTO attachments (post_id, stored_filename, original_filename, mime_type, byte_size, data, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id, post_id, stored_filename, original_filename, mime_type, byte_size, created_at
        "#,
    )
    .bind(post_id)
    .bind(&attachment.stored_filename)
    .bind(&attachment.original_filename)
    .bind(&attachment.mime_type)
    .bind(attachment.data.len() as i64)
    .bind(&attachment.data)
    .bind(Utc::now())
    .fetch_one(executor)
    .await?;
    Ok(info)
}

/// Get an attachment including its bytes.
pub async fn get_attachment(pool: &SqlitePool, id: AttachmentId) -> DbResult<Option<Attachment>> {
    let attachment = sqlx::query_as::<_, Attachment>(
        r#"
        SELECT id, post_id, stored_filename, original_filename, mime_type, byte_size, data, created_at
        FROM attachments WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(attachment)
}

/// Get attachment metadata without loading the bytes.
pub async fn get_attachment_info<'e>(
    executor: impl SqliteExecutor<'e>,
    id: AttachmentId,
) -> DbResult<Option<AttachmentInfo>> {
    let info = sqlx::query_as::<_, AttachmentInfo>(
        r#"
        SELECT id, post_id, stored_filename, original_filename, mime_type, byte_size, created_at
        FROM attachments WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(info)
}

/// Attachment metadata for a post, in upload order.
pub async fn list_attachments_for_post<'e>(
    executor: impl SqliteExecutor<'e>,
    post_id: PostId,
) -> DbResult<Vec<AttachmentInfo>> {
    let attachments = sqlx::query_as::<_, AttachmentInfo>(
        r#"
        SELECT id, post_id, stored_filename, original_filename, mime_type, byte_size, created_at
        FROM attachments
        WHERE post_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(executor)
    .await?;
    Ok(attachments)
}

/// Delete an attachment.
pub async fn delete_attachment<'e>(
    executor: impl SqliteExecutor<'e>,
    id: AttachmentId,
) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM attachments WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Count attachments in the partition.
pub async fn count_attachments(pool: &SqlitePool) -> DbResult<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM attachments")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
