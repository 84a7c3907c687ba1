//! File-based locking to prevent overlapping backup runs

use anyhow::{Context, Result};
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lock held for the duration of a backup run
pub struct RunLock {
    // The flock is released when this file is closed
    _lock: RwLock<File>,
    lock_path: PathBuf,
}

impl RunLock {
    /// Acquire an exclusive lock on `lock_path`.
    /// Returns error if another run already holds it.
    pub fn acquire(lock_path: &Path) -> Result<Self> {
        debug!("Attempting to acquire lock: {:?}", lock_path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create lock directory")?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;

        let mut lock = RwLock::new(file);
        {
            let guard = lock.try_write().with_context(|| {
                format!("Another backup run is in progress (lock held: {:?})", lock_path)
            })?;
            // Keep the OS lock until the file itself is closed in Drop
            std::mem::forget(guard);
        }

        info!("Acquired run lock: {:?}", lock_path);

        Ok(Self {
            _lock: lock,
            lock_path: lock_path.to_path_buf(),
        })
    }

    /// Get the lock file path (for cleanup or inspection)
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl std::fmt::Debug for RunLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLock").field("lock_path", &self.lock_path).finish()
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        info!("Released run lock: {:?}", self.lock_path);

        // Best effort; the lock itself goes away with the file handle
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            debug!("Failed to remove lock file: {}", e);
        }
    }
}
