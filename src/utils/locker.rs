//! File-based locking to prevent overlapping backups of the same artifact

use anyhow::{Context, Result};
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Exclusive lock held for the duration of one backup run
pub struct BackupLock {
    // The advisory lock lives as long as this open file
    _lock: RwLock<File>,
    lock_path: PathBuf,
}

impl BackupLock {
    /// Acquire the lock for an artifact (`channel`, `tapd`) inside `dir`
    /// Returns error if a backup of the same artifact is already running
    pub fn acquire(dir: &Path, artifact_name: &str) -> Result<Self> {
        let lock_path = dir.join(format!("lightning-backup-{}.lock", artifact_name));

        debug!("Attempting to acquire lock: {:?}", lock_path);

        std::fs::create_dir_all(dir).context("Failed to create lock directory")?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;

        let mut lock = RwLock::new(file);
        {
            let guard = lock.try_write().with_context(|| {
                format!(
                    "A {} backup is already running (lock held: {:?})",
                    artifact_name, lock_path
                )
            })?;
            // Unlocking happens when the file is closed on drop
            std::mem::forget(guard);
        }

        info!("Acquired backup lock for: {}", artifact_name);

        Ok(Self {
            _lock: lock,
            lock_path,
        })
    }

    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for BackupLock {
    fn drop(&mut self) {
        debug!("Released backup lock: {:?}", self.lock_path);
    }
}
