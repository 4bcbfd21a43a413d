//! Writing fetched bytes to their resolved path.

use crate::error::{Error, Result};
use crate::utils::is_directory_path;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Write `bytes` to `path`, creating parent directories
///
/// Bytes go to a sibling `.part` file that is renamed onto `path` only once
/// fully written and synced. On I/O failure or cancellation only the `.part`
/// file is removed, so an existing file at `path` is never lost or truncated.
pub(super) async fn write_output(
    path: &Path,
    bytes: &[u8],
    cancel: &CancellationToken,
) -> Result<()> {
    let partial = partial_path(path)?;
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create directory '{}': {}", parent.display(), e),
            ))
        })?;
    }

    let written = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = write_partial(&partial, bytes) => result.map_err(Error::from),
    };

    let result = match written {
        Ok(()) => tokio::fs::rename(&partial, path).await.map_err(Error::from),
        Err(e) => Err(e),
    };

    if result.is_err() {
        match tokio::fs::remove_file(&partial).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %partial.display(), error = %e, "failed to remove partial file");
            }
        }
    }
    result
}

/// Sibling path the bytes are staged in, e.g. `out.jpg.part`
fn partial_path(path: &Path) -> Result<PathBuf> {
    let file_name = match path.file_name() {
        Some(name) if !is_directory_path(path) => name,
        _ => {
            return Err(Error::InvalidPath {
                path: path.to_path_buf(),
                reason: "template produced no file name".to_string(),
            });
        }
    };
    let mut partial = file_name.to_os_string();
    partial.push(".part");
    Ok(path.with_file_name(partial))
}

/// Create the staging file and write it out; the handle is closed on return
async fn write_partial(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    write_all(&mut file, bytes).await
}

async fn write_all(file: &mut tokio::fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}
