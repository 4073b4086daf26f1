use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::common::{expiry_millis, now_millis};
use crate::db::{error::DbResult, repos::JobLockRepo};

pub struct SqliteJobLockRepo {
    pool: SqlitePool,
}

impl SqliteJobLockRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobLockRepo for SqliteJobLockRepo {
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> DbResult<bool> {
        let now = now_millis();

        // The upsert only overwrites a row whose lease has run out, so a live
        // holder makes this a no-op with zero affected rows.
        let result = sqlx::query(
            r#"
            INSERT INTO job_locks (name, holder, acquired_at_ms, expires_at_ms)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                holder = excluded.holder,
                acquired_at_ms = excluded.acquired_at_ms,
                expires_at_ms = excluded.expires_at_ms
            WHERE job_locks.expires_at_ms <= ?
            "#,
        )
        .bind(name)
        .bind(holder)
        .bind(now)
        .bind(expiry_millis(now, ttl))
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn renew(&self, name: &str, holder: &str, ttl: Duration) -> DbResult<bool> {
        let result =
            sqlx::query("UPDATE job_locks SET expires_at_ms = ? WHERE name = ? AND holder = ?")
                .bind(expiry_millis(now_millis(), ttl))
                .bind(name)
                .bind(holder)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, name: &str, holder: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM job_locks WHERE name = ? AND holder = ?")
            .bind(name)
            .bind(holder)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
