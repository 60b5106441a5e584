//! Error types for the storage layer.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for storage operations.
pub type DbResult<T> = Result<T, DbError>;

/// Coarse classification handed to the boundary layer.
///
/// The HTTP collaborator maps these onto status codes; the library never
/// does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    Validation,
    Conflict,
    StoreFailure,
}

/// Storage error types.
#[derive(Debug, Error, Diagnostic)]
pub enum DbError {
    /// SQLite/sqlx error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Entity not found (or soft-deleted)
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Action checked and disallowed
    #[error("Permission denied: {action}")]
    PermissionDenied { action: String },

    /// Duplicate entity
    #[error("{entity_type} already exists: {id}")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },

    /// Refused to remove something that still has content
    #[error("{entity_type} {id} is not empty ({count} remaining)")]
    #[diagnostic(help("Remove or move the remaining posts before deleting the category"))]
    NotEmpty {
        entity_type: &'static str,
        id: String,
        count: i64,
    },

    /// Invalid data
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Schema application or verification failed
    #[error("Schema error: {message}")]
    #[diagnostic(help("Run `forum-cli verify --repair` to re-apply the schema"))]
    Schema { message: String },

    /// Operation exceeded its deadline
    #[error("Operation timed out: {operation}")]
    Timeout { operation: &'static str },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (partition files, snapshots)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A lifecycle task panicked before finishing
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl DbError {
    /// Create a not found error.
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Create an already exists error.
    pub fn already_exists(entity_type: &'static str, id: impl ToString) -> Self {
        Self::AlreadyExists {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a permission denied error.
    pub fn permission_denied(action: impl Into<String>) -> Self {
        Self::PermissionDenied {
            action: action.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Classify this error for the boundary layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            DbError::InvalidData { .. } | DbError::Config { .. } => ErrorKind::Validation,
            DbError::AlreadyExists { .. } | DbError::NotEmpty { .. } => ErrorKind::Conflict,
            DbError::Sqlx(_)
            | DbError::Schema { .. }
            | DbError::Timeout { .. }
            | DbError::Serialization(_)
            | DbError::Io(_)
            | DbError::Task(_) => ErrorKind::StoreFailure,
        }
    }

    /// Turn a unique-constraint violation into `AlreadyExists`, passing
    /// every other error through.
    pub(crate) fn or_conflict(err: sqlx::Error, entity_type: &'static str, id: impl ToString) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::already_exists(entity_type, id)
            }
            _ => Self::Sqlx(err),
        }
    }
}
