//! Removal of attachment media files from the uploads directory.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Refusing to remove path outside the media root: {0}")]
    OutsideRoot(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Media files stored relative to a root directory.
///
/// With no root configured every removal is a no-op, so a purge only
/// touches database records.
#[derive(Debug, Clone, Default)]
pub struct MediaStorage {
    root: Option<PathBuf>,
}

impl MediaStorage {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn is_enabled(&self) -> bool {
        self.root.is_some()
    }

    /// Delete `relative` under the media root.
    ///
    /// Returns `Ok(true)` when a file was removed and `Ok(false)` when there
    /// was nothing to remove.
    pub async fn remove(&self, relative: &str) -> StorageResult<bool> {
        let Some(root) = &self.root else {
            return Ok(false);
        };
        let path = resolve(root, relative)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed media file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Media file already gone");
                Ok(false)
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Join `relative` onto `root`, rejecting anything that could escape it.
fn resolve(root: &Path, relative: &str) -> StorageResult<PathBuf> {
    let candidate = Path::new(relative);
    if relative.is_empty()
        || candidate
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(StorageError::OutsideRoot(relative.to_string()));
    }
    Ok(root.join(candidate))
}
