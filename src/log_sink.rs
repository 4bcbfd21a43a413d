//! Append-only log destinations
//!
//! Several pipelines may append to the same file at once. Appends to one path
//! are serialized through a per-path async lock so each write lands whole;
//! appends to different paths proceed independently.

use crate::error::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::AsyncWriteExt;

/// Serializes appends per destination path
#[derive(Debug, Default)]
pub struct LogSink {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl LogSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `content` to `path` exactly as given (no newline is added)
    ///
    /// Missing parent directories and the file itself are created. Existing
    /// content is never truncated.
    pub async fn append(&self, path: &Path, content: &str) -> Result<()> {
        let lock = self.lock_for(path);
        let result = {
            let _guard = lock.lock().await;
            write_entry(path, content).await
        };
        drop(lock);
        self.release(path);
        result
    }

    fn lock_for(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        self.locks().entry(path.to_path_buf()).or_default().clone()
    }

    /// Forget the lock of `path` once no append holds or waits on it
    fn release(&self, path: &Path) {
        let mut locks = self.locks();
        if locks
            .get(path)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(path);
        }
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>> {
        match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[cfg(test)]
    fn tracked_paths(&self) -> usize {
        self.locks().len()
    }
}

async fn write_entry(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;

    tracing::trace!(path = %path.display(), bytes = content.len(), "appended log entry");
    Ok(())
}
