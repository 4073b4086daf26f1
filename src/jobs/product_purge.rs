//! Batched purge of a merchant's products and their image attachments.
//!
//! A run repeatedly:
//! 1. Fetches up to `batch_size` product IDs owned by the merchant
//! 2. Hard-deletes each product's image attachments, then the product
//! 3. Sends a progress notification every `batches_per_notification` batches
//! 4. Waits `delay_between_batches` (cancellable)
//!
//! until a fetch comes back empty. Every step is recorded in the audit log.
//! Individual deletion failures are logged and skipped; they never abort the
//! run. Products are fetched in ascending ID order behind a cursor, so one
//! that failed to delete is not fetched again in the same run and the loop
//! always terminates.

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    audit::AuditLog,
    config::{ConfigError, NotificationConfig, PurgeConfig},
    db::{DbError, DbPool, JobLockRepo, PostRepo},
    models::{DeletedPost, PostId, PostType},
    notify::{Notification, Notifier},
    observability::metrics,
    storage::MediaStorage,
};

const MSG_STARTED: &str = "Image deletion process started.";
const MSG_NO_MORE: &str = "No more products found. Process complete.";
const MSG_COMPLETED: &str = "Image and product deletion process completed.";

/// Errors that abort a purge run.
#[derive(Debug, Error)]
pub enum PurgeError {
    #[error("Another purge run holds lock '{0}'")]
    AlreadyRunning(String),

    #[error("Run lock '{0}' was lost to another holder")]
    LockLost(String),

    #[error("Failed to write audit log {path}: {source}")]
    AuditLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Invalid purge configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Why a run stopped without error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    /// No matching products remained.
    #[default]
    Completed,
    /// Cancellation was requested between batches.
    Cancelled,
}

/// What happened in a single batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// 1-based batch number within the run.
    pub batch: u64,
    pub products_deleted: Vec<PostId>,
    pub products_failed: Vec<PostId>,
    pub attachments_deleted: Vec<PostId>,
    pub attachments_failed: Vec<PostId>,
    /// Media files removed from disk.
    pub files_removed: u64,
    /// Whether a progress notification was delivered after this batch.
    pub notified: bool,
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeRunResult {
    pub batches: u64,
    pub products_deleted: u64,
    pub products_failed: u64,
    pub attachments_deleted: u64,
    pub attachments_failed: u64,
    pub files_removed: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub stop_reason: StopReason,
    /// Duration of the run in milliseconds.
    pub duration_ms: u64,
}

impl PurgeRunResult {
    /// Check if any records were deleted.
    pub fn has_deletions(&self) -> bool {
        self.products_deleted > 0 || self.attachments_deleted > 0
    }

    fn absorb(&mut self, batch: &BatchOutcome) {
        self.products_deleted += batch.products_deleted.len() as u64;
        self.products_failed += batch.products_failed.len() as u64;
        self.attachments_deleted += batch.attachments_deleted.len() as u64;
        self.attachments_failed += batch.attachments_failed.len() as u64;
        self.files_removed += batch.files_removed;
    }
}

/// The purge job for one merchant.
pub struct ProductPurgeJob {
    posts: Arc<dyn PostRepo>,
    locks: Arc<dyn JobLockRepo>,
    notifier: Arc<dyn Notifier>,
    audit: AuditLog,
    media: MediaStorage,
    config: PurgeConfig,
    notification: NotificationConfig,
    progress: Option<mpsc::Sender<BatchOutcome>>,
}

impl ProductPurgeJob {
    pub fn new(
        posts: Arc<dyn PostRepo>,
        locks: Arc<dyn JobLockRepo>,
        notifier: Arc<dyn Notifier>,
        config: PurgeConfig,
        notification: NotificationConfig,
    ) -> Self {
        Self {
            posts,
            locks,
            notifier,
            audit: AuditLog::new(config.audit_log_path.clone()),
            media: MediaStorage::new(config.media_root.clone()),
            config,
            notification,
            progress: None,
        }
    }

    /// Build a job over the repositories of `db`.
    pub fn from_db(
        db: &DbPool,
        notifier: Arc<dyn Notifier>,
        config: PurgeConfig,
        notification: NotificationConfig,
    ) -> Self {
        Self::new(db.posts(), db.job_locks(), notifier, config, notification)
    }

    /// Publish every finished batch to `sender`.
    ///
    /// Sending waits for channel capacity; a dropped receiver is ignored.
    pub fn with_progress(mut self, sender: mpsc::Sender<BatchOutcome>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Run the purge to completion or until `cancel` fires.
    ///
    /// The run lock is held for the whole run and released on every exit
    /// path after it was acquired.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<PurgeRunResult, PurgeError> {
        self.config.validate()?;

        let lock_name = self.config.lock_name.as_str();
        let holder = Uuid::new_v4().to_string();

        if !self
            .locks
            .try_acquire(lock_name, &holder, self.config.lock_ttl())
            .await?
        {
            tracing::warn!(lock = lock_name, "Product purge already running");
            return Err(PurgeError::AlreadyRunning(lock_name.to_string()));
        }

        let outcome = self.run_locked(&holder, cancel).await;

        match self.locks.release(lock_name, &holder).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(lock = lock_name, "Run lock was no longer held at release"),
            Err(e) => tracing::warn!(lock = lock_name, error = %e, "Failed to release run lock"),
        }

        outcome
    }

    async fn run_locked(
        &self,
        holder: &str,
        cancel: &CancellationToken,
    ) -> Result<PurgeRunResult, PurgeError> {
        let start = Instant::now();
        let mut result = PurgeRunResult::default();

        self.audit
            .append(MSG_STARTED)
            .await
            .map_err(|source| PurgeError::AuditLog {
                path: self.audit.path().to_path_buf(),
                source,
            })?;

        tracing::info!(
            owner_id = %self.config.owner_id,
            batch_size = self.config.batch_size,
            batches_per_notification = self.config.batches_per_notification,
            delay_ms = self.config.delay_between_batches_ms,
            media_files = self.media.is_enabled(),
            "Starting product purge"
        );

        if let Err(e) = self.process_batches(holder, cancel, &mut result).await {
            tracing::error!(
                owner_id = %self.config.owner_id,
                batches = result.batches,
                error = %e,
                "Product purge aborted"
            );
            self.audit_line(&format!(
                "Deletion process aborted after {} batches: {}",
                result.batches, e
            ))
            .await;
            return Err(e);
        }

        if result.stop_reason == StopReason::Completed && result.batches > 0 {
            self.audit_line(MSG_COMPLETED).await;
        }

        result.duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            owner_id = %self.config.owner_id,
            batches = result.batches,
            products_deleted = result.products_deleted,
            products_failed = result.products_failed,
            attachments_deleted = result.attachments_deleted,
            attachments_failed = result.attachments_failed,
            files_removed = result.files_removed,
            notifications_sent = result.notifications_sent,
            stop_reason = ?result.stop_reason,
            duration_ms = result.duration_ms,
            "Product purge finished"
        );

        Ok(result)
    }

    /// The batch loop. Returns once no products remain or `cancel` fires.
    async fn process_batches(
        &self,
        holder: &str,
        cancel: &CancellationToken,
        result: &mut PurgeRunResult,
    ) -> Result<(), PurgeError> {
        // Every product at or below the cursor has been attempted. Deleted
        // ones are gone and failed ones stay behind it, so none is refetched.
        let mut cursor: PostId = 0;

        loop {
            if cancel.is_cancelled() {
                self.audit_line(&format!(
                    "Deletion process cancelled after {} batches.",
                    result.batches
                ))
                .await;
                result.stop_reason = StopReason::Cancelled;
                return Ok(());
            }

            self.renew_lease(holder).await?;

            let ids = self
                .posts
                .list_ids_by_owner_and_type(
                    &self.config.owner_id,
                    PostType::Product,
                    self.config.batch_size,
                    cursor,
                )
                .await?;

            let Some(&last) = ids.iter().max() else {
                self.audit_line(MSG_NO_MORE).await;
                return Ok(());
            };
            cursor = last;

            result.batches += 1;
            let mut batch = BatchOutcome {
                batch: result.batches,
                ..Default::default()
            };

            tracing::debug!(batch = batch.batch, products = ids.len(), "Processing batch");

            for id in ids {
                self.purge_product(id, &mut batch).await;
            }

            result.absorb(&batch);
            metrics::record_purge_batch();

            if self.config.notification_due(result.batches) {
                if self.notify(result.batches).await {
                    batch.notified = true;
                    result.notifications_sent += 1;
                } else {
                    result.notifications_failed += 1;
                }
            }

            if let Some(progress) = &self.progress
                && progress.send(batch).await.is_err()
            {
                tracing::debug!("Progress receiver dropped");
            }

            self.wait_between_batches(holder, cancel).await?;
        }
    }

    async fn renew_lease(&self, holder: &str) -> Result<(), PurgeError> {
        if self
            .locks
            .renew(&self.config.lock_name, holder, self.config.lock_ttl())
            .await?
        {
            Ok(())
        } else {
            Err(PurgeError::LockLost(self.config.lock_name.clone()))
        }
    }

    /// Sleep for the inter-batch delay, renewing the lease every half TTL.
    /// Returns early when `cancel` fires.
    async fn wait_between_batches(
        &self,
        holder: &str,
        cancel: &CancellationToken,
    ) -> Result<(), PurgeError> {
        let mut remaining = self.config.delay_between_batches();
        let renew_every = (self.config.lock_ttl() / 2).max(Duration::from_millis(1));

        while !remaining.is_zero() {
            let step = remaining.min(renew_every);
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(step) => {}
            }
            remaining -= step;
            if !remaining.is_zero() {
                self.renew_lease(holder).await?;
            }
        }
        Ok(())
    }

    /// Delete a product's image attachments, then the product itself.
    async fn purge_product(&self, id: PostId, batch: &mut BatchOutcome) {
        match self.posts.list_image_attachment_ids(id).await {
            Ok(attachment_ids) => {
                for attachment_id in attachment_ids {
                    self.purge_attachment(attachment_id, batch).await;
                }
            }
            Err(e) => {
                tracing::error!(
                    product_id = id,
                    error = %e,
                    "Failed to list image attachments"
                );
                self.audit_line(&format!(
                    "Failed to fetch image attachments for product ID: {}",
                    id
                ))
                .await;
            }
        }

        match self.posts.hard_delete(id).await {
            Ok(Some(deleted)) => {
                batch.files_removed += self.remove_files(&deleted).await;
                batch.products_deleted.push(id);
                metrics::record_purge_deletion("product", "success");
                self.audit_line(&format!("Deleted product ID: {}", id)).await;
            }
            Ok(None) => {
                tracing::warn!(product_id = id, "Product vanished before deletion");
                self.product_failed(id, batch).await;
            }
            Err(e) => {
                tracing::error!(product_id = id, error = %e, "Failed to delete product");
                self.product_failed(id, batch).await;
            }
        }
    }

    async fn product_failed(&self, id: PostId, batch: &mut BatchOutcome) {
        batch.products_failed.push(id);
        metrics::record_purge_deletion("product", "failure");
        self.audit_line(&format!("Failed to delete product ID: {}", id))
            .await;
    }

    async fn purge_attachment(&self, id: PostId, batch: &mut BatchOutcome) {
        let deleted = match self.posts.hard_delete(id).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::error!(attachment_id = id, error = %e, "Failed to delete attachment");
                None
            }
        };

        match deleted {
            Some(deleted) => {
                batch.files_removed += self.remove_files(&deleted).await;
                batch.attachments_deleted.push(id);
                metrics::record_purge_deletion("attachment", "success");
                self.audit_line(&format!("Deleted image attachment ID: {}", id))
                    .await;
            }
            None => {
                batch.attachments_failed.push(id);
                metrics::record_purge_deletion("attachment", "failure");
                self.audit_line(&format!("Failed to delete image attachment ID: {}", id))
                    .await;
            }
        }
    }

    /// Remove the media files of a deleted record. Returns how many were removed.
    async fn remove_files(&self, deleted: &DeletedPost) -> u64 {
        let mut removed = 0;
        for path in &deleted.file_paths {
            match self.media.remove(path).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(
                    post_id = deleted.post.id,
                    path = %path,
                    error = %e,
                    "Failed to remove media file"
                ),
            }
        }
        removed
    }

    /// Send a progress notification. Returns whether it was delivered.
    async fn notify(&self, batches: u64) -> bool {
        let notification = Notification::progress(&self.notification, batches);
        match self.notifier.send(&notification).await {
            Ok(()) => {
                tracing::info!(
                    batches,
                    transport = self.notifier.transport_name(),
                    "Progress notification sent"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    batches,
                    transport = self.notifier.transport_name(),
                    error = %e,
                    "Failed to send progress notification"
                );
                metrics::record_notification_failure(self.notifier.transport_name());
                false
            }
        }
    }

    /// Append to the audit log; failures after the start entry are only logged.
    async fn audit_line(&self, message: &str) {
        if let Err(e) = self.audit.append(message).await {
            tracing::warn!(
                path = %self.audit.path().display(),
                error = %e,
                entry = message,
                "Failed to write audit log entry"
            );
        }
    }
}
