use std::future::Future;
use std::time::Duration;

pub mod models;
pub mod repository;

pub use models::*;
pub use repository::*;

use crate::error::{AppError, AppResult};

const MAX_BUSY_RETRIES: u64 = 3;

/// SQLite reports write contention as a "database is locked" error rather
/// than blocking forever. Conflicting transactions lose the race and are
/// retried a bounded number of times before the error is surfaced.
pub fn is_busy_error(err: &AppError) -> bool {
    match err {
        AppError::Database(sqlx::Error::Database(db)) => {
            let msg = db.message();
            msg.contains("database is locked") || msg.contains("database table is locked")
        }
        _ => false,
    }
}

/// Run a store operation, transparently retrying on write contention.
pub async fn with_busy_retry<T, F, Fut>(mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt: u64 = 0;
    loop {
        match op().await {
            Err(e) if is_busy_error(&e) && attempt < MAX_BUSY_RETRIES => {
                attempt += 1;
                tracing::debug!("Store busy, retrying (attempt {})", attempt);
                tokio::time::sleep(Duration::from_millis(25 * attempt)).await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use sqlx::SqlitePool;

    /// Pool over a throwaway file-backed database with migrations applied.
    /// File-backed rather than in-memory so concurrent connections see the
    /// same database and writer contention behaves as in production.
    pub async fn test_pool() -> SqlitePool {
        let path = std::env::temp_dir().join(format!("booking-engine-test-{}.db", uuid::Uuid::new_v4()));
        let options = sqlx::sqlite::SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .expect("failed to open test database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("failed to run migrations");

        pool
    }
}
