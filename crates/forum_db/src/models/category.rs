//! Category, moderation and audit models (config store).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{CategoryId, UserId};

/// A discussion category. Each one owns a content partition.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier, also the partition key
    pub id: CategoryId,

    /// Display name (at most 100 characters)
    pub name: String,

    pub description: Option<String>,

    /// Sort position in listings (ascending)
    pub display_order: i64,

    /// Soft-delete flag
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub display_order: i64,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_display_order(mut self, display_order: i64) -> Self {
        self.display_order = display_order;
        self
    }
}

/// Moderation permission for one user on one category.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ModeratorGrant {
    pub user_id: UserId,
    pub category_id: CategoryId,
    pub granted_by: Option<UserId>,
    pub granted_at: DateTime<Utc>,
}

/// A ban on posting.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Ban {
    pub id: i64,
    pub user_id: UserId,
    pub issued_by: UserId,
    pub reason: String,
    pub issued_at: DateTime<Utc>,

    /// None means permanent
    pub expires_at: Option<DateTime<Utc>>,

    /// Cleared when the ban is lifted early
    pub is_active: bool,
}

impl Ban {
    /// Whether the ban restricts the user at `now`.
    pub fn is_in_effect(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |expires| expires > now)
    }
}

/// Fields needed to issue a ban.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBan {
    pub user_id: UserId,
    pub reason: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Append-only audit row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: i64,
    pub user_id: Option<UserId>,
    /// Short machine-readable tag, e.g. `grant_moderator`
    pub action: String,
    pub detail: Option<String>,
    /// Client address as reported by the boundary layer
    pub origin: Option<String>,
    pub created_at: DateTime<Utc>,
}
