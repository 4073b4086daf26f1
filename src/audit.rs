//! Append-only audit log of purge activity.
//!
//! Every entry is a single line of the form `[YYYY-MM-DD HH:MM:SS] message`,
//! stamped in UTC. The file is created on first write and never truncated.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamped text log that operators read after a purge.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    // Serializes appends from a single process so lines never interleave.
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry stamped with the current time.
    pub async fn append(&self, message: &str) -> std::io::Result<()> {
        self.append_at(Utc::now(), message).await
    }

    /// Append one entry stamped with `at`.
    pub async fn append_at(&self, at: DateTime<Utc>, message: &str) -> std::io::Result<()> {
        let entry = format_entry(at, message);
        let _guard = self.write_lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await
    }
}

/// Render a single audit line, including the trailing newline.
pub fn format_entry(at: DateTime<Utc>, message: &str) -> String {
    format!("[{}] {}\n", at.format(TIMESTAMP_FORMAT), message)
}
