//! Database retry logic
//!
//! Exponential backoff for transient SQLite lock errors. A transaction that
//! read a WAL snapshot and then lost the race for the write lock fails with
//! "database is locked" immediately, whatever the busy timeout. Rerunning
//! the whole transaction re-reads fresh state, which is what makes the
//! guarded read-then-write sequences safe under contention.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::{Error, Result};

/// Initial backoff between attempts
const INITIAL_BACKOFF_MS: u64 = 5;

/// Backoff ceiling
const MAX_BACKOFF_MS: u64 = 250;

/// Retry a database operation while it fails with lock contention
///
/// **Algorithm:**
/// 1. Attempt operation
/// 2. If successful, return result
/// 3. If "database is locked":
///    a. If time elapsed < max_wait_ms: log WARN, backoff, retry
///    b. Otherwise: log ERROR, return `Error::Internal`
/// 4. Any other error is returned immediately
pub async fn retry_on_lock<F, Fut, T>(operation_name: &str, max_wait_ms: u64, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_when(operation_name, max_wait_ms, Error::is_lock_contention, operation).await
}

/// Same loop as [`retry_on_lock`] with a caller-supplied transient-error test
async fn retry_when<F, Fut, T, P>(
    operation_name: &str,
    max_wait_ms: u64,
    is_transient: P,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_transient(&err) {
                    return Err(err);
                }

                let elapsed = start_time.elapsed();
                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms,
                        "Database operation failed: max retry time exceeded"
                    );
                    return Err(Error::Internal(format!(
                        "Database locked after {} attempts ({} ms elapsed, max {} ms)",
                        attempt,
                        elapsed.as_millis(),
                        max_wait_ms
                    )));
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    "Database locked, will retry after backoff"
                );

                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }
}
