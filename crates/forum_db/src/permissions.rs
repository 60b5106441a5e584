//! Roles, moderator grants, bans and permission checks.
//!
//! Roles are ordered `member < moderator < site_admin` and checks use
//! "at least" semantics, with one exception: moderating a category needs an
//! explicit grant for that category unless the user is a site admin.
//!
//! Granting a member their first category promotes them to moderator;
//! revoking a moderator's last grant demotes them back. Each grant change and
//! the role change it causes commit together, and both are recorded in the
//! activity log.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::models::{Ban, CategoryId, CommentId, NewBan, PostId, UserId, UserRole};
use crate::queries;
use crate::registry::PartitionRegistry;

/// Something a user may try to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreatePost,
    CreateComment,
    EditPost,
    DeletePost,
    EditComment,
    DeleteComment,
    UploadAttachment,
    ModerateCategory,
    ManageCategories,
    ManageModerators,
    BanUsers,
    ViewActivityLog,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatePost => "create_post",
            Self::CreateComment => "create_comment",
            Self::EditPost => "edit_post",
            Self::DeletePost => "delete_post",
            Self::EditComment => "edit_comment",
            Self::DeleteComment => "delete_comment",
            Self::UploadAttachment => "upload_attachment",
            Self::ModerateCategory => "moderate_category",
            Self::ManageCategories => "manage_categories",
            Self::ManageModerators => "manage_moderators",
            Self::BanUsers => "ban_users",
            Self::ViewActivityLog => "view_activity_log",
        }
    }

    /// Whether an active ban blocks this action.
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::ViewActivityLog)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Category(CategoryId),
    Post {
        category: CategoryId,
        post: PostId,
    },
    Comment {
        category: CategoryId,
        comment: CommentId,
    },
    User(UserId),
}

impl Resource {
    fn category(&self) -> Option<CategoryId> {
        match self {
            Self::Category(c) | Self::Post { category: c, .. } | Self::Comment { category: c, .. } => {
                Some(*c)
            }
            Self::User(_) => None,
        }
    }
}

/// Role, grant and ban management over the config store.
#[derive(Debug, Clone)]
pub struct Moderation {
    registry: Arc<PartitionRegistry>,
}

impl Moderation {
    pub fn new(registry: Arc<PartitionRegistry>) -> Self {
        Self { registry }
    }

    fn config(&self) -> &sqlx::SqlitePool {
        self.registry.config().pool()
    }

    async fn require(&self, actor: UserId, action: Action, resource: Option<Resource>) -> DbResult<()> {
        if self.check_permission(actor, action, resource).await? {
            Ok(())
        } else {
            Err(DbError::permission_denied(action.as_str()))
        }
    }

    /// Decide whether `user_id` may perform `action` on `resource`.
    ///
    /// Reads stored state only. Unknown users get `false`, as do actively
    /// banned users attempting anything but reads.
    ///
    /// Policy:
    /// - CreatePost, CreateComment: any user, in an active category
    /// - EditPost, DeletePost, EditComment, DeleteComment, UploadAttachment:
    ///   the author, or a moderator of the category
    /// - ModerateCategory: site admin, or moderator with a grant on it
    /// - BanUsers: moderator or above, against users of a lower role
    /// - ManageCategories, ManageModerators, ViewActivityLog: site admin
    pub async fn check_permission(
        &self,
        user_id: UserId,
        action: Action,
        resource: Option<Resource>,
    ) -> DbResult<bool> {
        let Some(role) = queries::get_user_role(self.config(), user_id).await? else {
            return Ok(false);
        };

        if action.is_write()
            && queries::get_active_ban(self.config(), user_id, Utc::now())
                .await?
                .is_some()
        {
            debug!(user_id, %action, "Denied: user is banned");
            return Ok(false);
        }

        if let Some(category) = resource.as_ref().and_then(Resource::category) {
            if !self.category_is_active(category).await? {
                return Ok(false);
            }
        }

        let allowed = match action {
            Action::ManageCategories | Action::ManageModerators | Action::ViewActivityLog => {
                role == UserRole::SiteAdmin
            }
            Action::BanUsers => match resource {
                Some(Resource::User(target)) => match queries::get_user_role(self.config(), target).await? {
                    Some(target_role) => role >= UserRole::Moderator && target_role < role,
                    None => false,
                },
                None => role >= UserRole::Moderator,
                Some(_) => false,
            },
            Action::ModerateCategory => match resource {
                Some(Resource::Category(category)) => self.moderates(user_id, role, category).await?,
                None => role == UserRole::SiteAdmin,
                Some(_) => false,
            },
            Action::CreatePost => matches!(resource, None | Some(Resource::Category(_))),
            Action::CreateComment => match resource {
                Some(Resource::Post { category, post }) => self.post_author(category, post).await?.is_some(),
                _ => false,
            },
            Action::EditPost | Action::DeletePost | Action::UploadAttachment => match resource {
                Some(Resource::Post { category, post }) => match self.post_author(category, post).await? {
                    Some(author) => author == user_id || self.moderates(user_id, role, category).await?,
                    None => false,
                },
                _ => false,
            },
            Action::EditComment | Action::DeleteComment => match resource {
                Some(Resource::Comment { category, comment }) => {
                    match self.comment_author(category, comment).await? {
                        Some(author) => {
                            author == user_id || self.moderates(user_id, role, category).await?
                        }
                        None => false,
                    }
                }
                _ => false,
            },
        };

        Ok(allowed)
    }

    async fn moderates(&self, user_id: UserId, role: UserRole, category: CategoryId) -> DbResult<bool> {
        match role {
            UserRole::SiteAdmin => Ok(true),
            UserRole::Moderator => queries::has_grant(self.config(), user_id, category).await,
            UserRole::Member => Ok(false),
        }
    }

    async fn category_is_active(&self, category: CategoryId) -> DbResult<bool> {
        Ok(queries::get_category(self.config(), category)
            .await?
            .is_some_and(|c| c.is_active))
    }

    // Partition lookups only run for active categories, whose files exist.
    async fn post_author(&self, category: CategoryId, post: PostId) -> DbResult<Option<UserId>> {
        let partition = self.registry.open(category).await?;
        Ok(queries::get_post(partition.pool(), post)
            .await?
            .map(|p| p.author_id))
    }

    async fn comment_author(
        &self,
        category: CategoryId,
        comment: CommentId,
    ) -> DbResult<Option<UserId>> {
        let partition = self.registry.open(category).await?;
        Ok(queries::get_comment(partition.pool(), comment)
            .await?
            .map(|c| c.author_id))
    }

    /// Give `user_id` moderation rights on `category`.
    ///
    /// A member is promoted to moderator in the same transaction. Returns the
    /// user's role afterwards.
    pub async fn grant_moderator(
        &self,
        actor: UserId,
        user_id: UserId,
        category: CategoryId,
    ) -> DbResult<UserRole> {
        self.require(actor, Action::ManageModerators, None).await?;
        queries::require_active_category(self.config(), category).await?;

        let mut tx = self.config().begin_with("BEGIN IMMEDIATE").await?;
        let role = queries::get_user_role(&mut *tx, user_id)
            .await?
            .ok_or_else(|| DbError::not_found("user", user_id))?;

        queries::insert_grant(&mut *tx, user_id, category, Some(actor)).await?;
        queries::log_activity(
            &mut *tx,
            Some(actor),
            "moderator_granted",
            Some(&format!("user {user_id} on category {category}")),
            None,
        )
        .await?;

        let new_role = if role == UserRole::Member {
            queries::set_user_role(&mut *tx, user_id, UserRole::Moderator).await?;
            queries::log_activity(
                &mut *tx,
                Some(actor),
                "role_changed",
                Some(&format!("user {user_id}: member -> moderator")),
                None,
            )
            .await?;
            UserRole::Moderator
        } else {
            role
        };

        tx.commit().await?;
        info!(actor, user_id, category_id = %category, role = %new_role, "Granted moderator");
        Ok(new_role)
    }

    /// Remove `user_id`'s moderation rights on `category`.
    ///
    /// A moderator left with no grants is demoted to member in the same
    /// transaction. Returns the user's role afterwards.
    pub async fn revoke_moderator(
        &self,
        actor: UserId,
        user_id: UserId,
        category: CategoryId,
    ) -> DbResult<UserRole> {
        self.require(actor, Action::ManageModerators, None).await?;

        let mut tx = self.config().begin_with("BEGIN IMMEDIATE").await?;
        if !queries::delete_grant(&mut *tx, user_id, category).await? {
            return Err(DbError::not_found(
                "moderator grant",
                format!("user {user_id} on category {category}"),
            ));
        }
        queries::log_activity(
            &mut *tx,
            Some(actor),
            "moderator_revoked",
            Some(&format!("user {user_id} on category {category}")),
            None,
        )
        .await?;

        let remaining = queries::count_grants_for_user(&mut *tx, user_id).await?;
        let role = queries::get_user_role(&mut *tx, user_id)
            .await?
            .ok_or_else(|| DbError::not_found("user", user_id))?;

        let new_role = if remaining == 0 && role == UserRole::Moderator {
            queries::set_user_role(&mut *tx, user_id, UserRole::Member).await?;
            queries::log_activity(
                &mut *tx,
                Some(actor),
                "role_changed",
                Some(&format!("user {user_id}: moderator -> member")),
                None,
            )
            .await?;
            UserRole::Member
        } else {
            role
        };

        tx.commit().await?;
        info!(actor, user_id, category_id = %category, role = %new_role, "Revoked moderator");
        Ok(new_role)
    }

    /// Set a user's role directly. Grants are left in place.
    pub async fn set_role(&self, actor: UserId, user_id: UserId, role: UserRole) -> DbResult<()> {
        self.require(actor, Action::ManageModerators, None).await?;

        let mut tx = self.config().begin_with("BEGIN IMMEDIATE").await?;
        let previous = queries::get_user_role(&mut *tx, user_id)
            .await?
            .ok_or_else(|| DbError::not_found("user", user_id))?;
        queries::set_user_role(&mut *tx, user_id, role).await?;
        queries::log_activity(
            &mut *tx,
            Some(actor),
            "role_changed",
            Some(&format!("user {user_id}: {previous} -> {role}")),
            None,
        )
        .await?;
        tx.commit().await?;

        info!(actor, user_id, %previous, %role, "Changed role");
        Ok(())
    }

    /// Ban a user from writing.
    pub async fn ban_user(&self, actor: UserId, ban: &NewBan) -> DbResult<Ban> {
        if ban.reason.trim().is_empty() {
            return Err(DbError::invalid_data("ban reason cannot be empty"));
        }
        if ban.expires_at.is_some_and(|at| at <= Utc::now()) {
            return Err(DbError::invalid_data("ban expiry must be in the future"));
        }
        self.require(actor, Action::BanUsers, Some(Resource::User(ban.user_id)))
            .await?;

        let mut tx = self.config().begin_with("BEGIN IMMEDIATE").await?;
        let created = queries::insert_ban(&mut *tx, ban, actor).await?;
        queries::log_activity(
            &mut *tx,
            Some(actor),
            "user_banned",
            Some(&format!("user {}: {}", ban.user_id, ban.reason)),
            None,
        )
        .await?;
        tx.commit().await?;

        info!(actor, user_id = ban.user_id, expires_at = ?ban.expires_at, "Banned user");
        Ok(created)
    }

    /// Lift every active ban on a user. Returns how many were lifted.
    pub async fn lift_ban(&self, actor: UserId, user_id: UserId) -> DbResult<u64> {
        self.require(actor, Action::BanUsers, None).await?;

        let mut tx = self.config().begin_with("BEGIN IMMEDIATE").await?;
        let lifted = queries::deactivate_bans(&mut *tx, user_id).await?;
        if lifted > 0 {
            queries::log_activity(
                &mut *tx,
                Some(actor),
                "ban_lifted",
                Some(&format!("user {user_id}")),
                None,
            )
            .await?;
        }
        tx.commit().await?;

        info!(actor, user_id, lifted, "Lifted bans");
        Ok(lifted)
    }

    /// The ban currently in effect for a user, if any.
    pub async fn active_ban(&self, user_id: UserId) -> DbResult<Option<Ban>> {
        queries::get_active_ban(self.config(), user_id, Utc::now()).await
    }
}
