use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::CoreError;
use crate::model::SessionKey;

/// An exclusive advisory lock on one session key, held until dropped.
///
/// Backed by a lock file per key so that separate processes writing to the
/// same repository serialize on the same key.
#[derive(Debug)]
pub struct KeyLock {
    file: File,
    path: PathBuf,
}

impl KeyLock {
    /// Block until the lock for `key` under `lock_dir` is acquired.
    pub fn acquire(lock_dir: &Path, key: &SessionKey) -> Result<Self, CoreError> {
        fs::create_dir_all(lock_dir)?;
        let path = lock_dir.join(format!("{}.lock", key.digest()));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release lock {}: {e}", self.path.display());
        }
    }
}
