//! User models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::UserId;
use crate::error::DbError;

/// A forum account.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: UserId,

    /// Login name (unique)
    pub username: String,

    /// Contact address (unique)
    pub email: String,

    /// Opaque credential produced by the auth collaborator
    #[serde(skip_serializing)]
    pub credential_hash: String,

    /// Site-wide role
    pub role: UserRole,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to register a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub credential_hash: String,
    #[serde(default)]
    pub role: UserRole,
}

/// Site-wide role.
///
/// Ordered so that `role >= UserRole::Moderator` reads as "at least
/// moderator". Category moderation is not implied by the ordering; see
/// [`crate::permissions`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Member,
    Moderator,
    SiteAdmin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Member => "member",
            UserRole::Moderator => "moderator",
            UserRole::SiteAdmin => "site_admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(UserRole::Member),
            "moderator" => Ok(UserRole::Moderator),
            "site_admin" | "admin" => Ok(UserRole::SiteAdmin),
            other => Err(DbError::invalid_data(format!("unknown role: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_hierarchy() {
        assert!(UserRole::SiteAdmin > UserRole::Moderator);
        assert!(UserRole::Moderator > UserRole::Member);
    }

    #[test]
    fn test_role_roundtrip() {
        for role in [UserRole::Member, UserRole::Moderator, UserRole::SiteAdmin] {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
        assert!("root".parse::<UserRole>().is_err());
    }
}
