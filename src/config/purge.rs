//! Product purge job configuration.
//!
//! # Example
//!
//! ```toml
//! [purge]
//! owner_id = "7"
//! batch_size = 10
//! batches_per_notification = 50
//! delay_between_batches_ms = 0
//! audit_log_path = "image-deletion-log.txt"
//! media_root = "/var/www/uploads"
//! ```

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Settings for the batched product purge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurgeConfig {
    /// Merchant whose products are deleted.
    pub owner_id: String,

    /// Number of products fetched and deleted per batch.
    /// Default: 10
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// A progress notification is sent after every this many batches.
    /// Default: 50
    #[serde(default = "default_batches_per_notification")]
    pub batches_per_notification: u64,

    /// Pause between batches (milliseconds). 0 disables the pause.
    /// Default: 0
    #[serde(default)]
    pub delay_between_batches_ms: u64,

    /// Audit log file; created if absent, only ever appended to.
    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: PathBuf,

    /// Directory that attachment file paths are relative to.
    /// When unset, only database records are deleted.
    #[serde(default)]
    pub media_root: Option<PathBuf>,

    /// Name of the run lock guarding against concurrent purges.
    #[serde(default = "default_lock_name")]
    pub lock_name: String,

    /// Lease duration of the run lock (seconds). Renewed before every fetch
    /// and at half this interval during the inter-batch pause, which must be
    /// shorter than the lease.
    /// Default: 900
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
}

fn default_batch_size() -> u32 {
    10
}

fn default_batches_per_notification() -> u64 {
    50
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("image-deletion-log.txt")
}

fn default_lock_name() -> String {
    "product_purge".to_string()
}

fn default_lock_ttl_secs() -> u64 {
    900
}

impl PurgeConfig {
    /// Configuration for `owner_id` with every other setting at its default.
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            batch_size: default_batch_size(),
            batches_per_notification: default_batches_per_notification(),
            delay_between_batches_ms: 0,
            audit_log_path: default_audit_log_path(),
            media_root: None,
            lock_name: default_lock_name(),
            lock_ttl_secs: default_lock_ttl_secs(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.owner_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "purge.owner_id cannot be empty".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Validation(
                "purge.batch_size must be at least 1".into(),
            ));
        }
        if self.batches_per_notification == 0 {
            return Err(ConfigError::Validation(
                "purge.batches_per_notification must be at least 1".into(),
            ));
        }
        if self.lock_name.is_empty() {
            return Err(ConfigError::Validation(
                "purge.lock_name cannot be empty".into(),
            ));
        }
        if self.lock_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "purge.lock_ttl_secs must be at least 1".into(),
            ));
        }
        if self.delay_between_batches_ms >= self.lock_ttl_secs.saturating_mul(1000) {
            return Err(ConfigError::Validation(
                "purge.delay_between_batches_ms must be shorter than purge.lock_ttl_secs".into(),
            ));
        }
        Ok(())
    }

    /// Get the inter-batch delay as a Duration.
    pub fn delay_between_batches(&self) -> Duration {
        Duration::from_millis(self.delay_between_batches_ms)
    }

    /// Get the lock lease as a Duration.
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    /// Whether a progress notification is due after `batch_count` batches.
    pub fn notification_due(&self, batch_count: u64) -> bool {
        batch_count > 0 && batch_count % self.batches_per_notification == 0
    }
}

/// One-shot trigger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerConfig {
    /// Seconds between activation and the start of the purge.
    /// Default: 20
    #[serde(default = "default_trigger_delay_secs")]
    pub delay_secs: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_trigger_delay_secs(),
        }
    }
}

fn default_trigger_delay_secs() -> u64 {
    20
}

impl TriggerConfig {
    /// Get the activation delay as a Duration.
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}
