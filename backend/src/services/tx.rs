//! Bounded retry for transactional units of work
//!
//! Every mutating operation runs as one database transaction. When Postgres
//! aborts it with a serialization or deadlock failure the whole unit is
//! retried against fresh state; after the attempt budget is spent the caller
//! sees a `Conflict`.

use std::future::Future;

use crate::error::{AppError, AppResult};

/// Attempts before a retryable failure surfaces as `Conflict`
pub const MAX_TX_ATTEMPTS: u32 = 3;

/// Serialization failure or deadlock detected
fn is_retryable(err: &AppError) -> bool {
    match err {
        AppError::DatabaseError(sqlx::Error::Database(db)) => {
            matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
        }
        _ => false,
    }
}

/// Run `op` until it succeeds, fails non-retryably, or exhausts the attempt
/// budget. `op` must begin and commit its own transaction so a retry
/// re-reads fresh state.
pub async fn with_retry<T, F, Fut>(resource: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Err(err) if is_retryable(&err) => {
                if attempt >= MAX_TX_ATTEMPTS {
                    return Err(AppError::Conflict(resource.to_string()));
                }
                tracing::warn!(resource, attempt, "transaction lost a race, retrying");
            }
            other => return other,
        }
    }
}
