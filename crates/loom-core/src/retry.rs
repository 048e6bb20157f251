//! Generic busy-retry policy (C9), shared by the catalog's "store busy"
//! wrapper (§4.2, `attempt × 25ms`, 8 attempts) and the consumer's resource
//! insert retry (§4.6, `attempt × 100ms`, 3 attempts).
//!
//! Grounded on `original_source/db/sqlite_busy_retry.go`'s linear-backoff
//! shape, reimplemented generically so both call sites share one
//! implementation instead of duplicating the loop.

use std::time::Duration;

/// A policy is fully described by its backoff unit and attempt cap.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub backoff_unit: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// The catalog's busy-retry policy: `attempt × 25ms`, up to 8 attempts.
    pub const CATALOG_BUSY: RetryPolicy = RetryPolicy { backoff_unit: Duration::from_millis(25), max_attempts: 8 };

    /// The consumer's resource-insert retry policy: `attempt × 100ms`, up to
    /// 3 attempts.
    pub const CONSUMER_INSERT: RetryPolicy = RetryPolicy { backoff_unit: Duration::from_millis(100), max_attempts: 3 };

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_unit * attempt
    }
}

/// A classification hook so callers can tell a transient ("busy") failure
/// from a terminal one. Implemented by each crate's own error type.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Retries `op` under `policy`, sleeping `attempt × backoff_unit` between
/// tries (synchronous — used by the catalog from within a Diesel connection
/// that is not `Send` across an await point).
pub fn retry_on_busy<T, E, F>(policy: RetryPolicy, mut op: F) -> Result<T, E>
    where F: FnMut() -> Result<T, E>,
          E: Transient
{
    let mut attempt = 1;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                std::thread::sleep(policy.backoff_for(attempt));
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Async counterpart, used by the consumer (§4.6) which already runs inside
/// a `tokio` task.
pub async fn retry_on_busy_async<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
    where F: FnMut() -> Fut,
          Fut: std::future::Future<Output = Result<T, E>>,
          E: Transient
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                tokio::time::sleep(policy.backoff_for(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
