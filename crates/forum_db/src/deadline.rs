//! Operation deadlines.
//!
//! Store calls are bounded by an optional timeout. When it elapses the
//! in-flight future is dropped, which rolls back any open sqlx transaction.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{DbError, DbResult};

/// Run `fut`, failing with [`DbError::Timeout`] if `limit` elapses first.
pub(crate) async fn bounded<T, F>(
    limit: Option<Duration>,
    operation: &'static str,
    fut: F,
) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, ?limit, "Store operation timed out");
                Err(DbError::Timeout { operation })
            }
        },
        None => fut.await,
    }
}
