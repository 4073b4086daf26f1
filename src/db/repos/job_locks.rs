use std::time::Duration;

use async_trait::async_trait;

use crate::db::error::DbResult;

/// Repository trait for lease-based job locks.
///
/// A lock is held by one holder until it is released or its lease expires.
/// Holders renew the lease while they keep working.
#[async_trait]
pub trait JobLockRepo: Send + Sync {
    /// Take the lock if it is free or its lease has expired.
    ///
    /// Returns `true` when `holder` now owns the lock.
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> DbResult<bool>;

    /// Extend the lease. Returns `false` if `holder` no longer owns the lock.
    async fn renew(&self, name: &str, holder: &str, ttl: Duration) -> DbResult<bool>;

    /// Release the lock. Returns `false` if `holder` did not own it.
    async fn release(&self, name: &str, holder: &str) -> DbResult<bool>;
}
