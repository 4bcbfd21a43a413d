//! Spawned runs and bounded-concurrency batches.

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{ImageDownloader, SaveReport};

/// Handle to a spawned `save()` run
///
/// Dropping the handle cancels the run.
#[derive(Debug)]
pub struct SaveHandle {
    cancel: CancellationToken,
    task: JoinHandle<Option<SaveReport>>,
}

impl SaveHandle {
    pub(super) fn spawn(downloader: ImageDownloader) -> Self {
        let cancel = downloader.cancel_token();
        let task = tokio::spawn(async move { downloader.save().await });
        Self { cancel, task }
    }

    /// Cancel the run
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run; `None` if it was cancelled or the task panicked
    pub async fn join(mut self) -> Option<SaveReport> {
        match (&mut self.task).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "save task failed");
                None
            }
        }
    }
}

impl Drop for SaveHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Run many downloaders with at most `concurrency` pipelines in flight
///
/// Results are in input order; a cancelled run yields `None`.
pub async fn save_batch(downloaders: &[ImageDownloader], concurrency: usize) -> Vec<Option<SaveReport>> {
    futures::stream::iter(downloaders.iter().map(|downloader| downloader.save()))
        .buffered(concurrency.max(1))
        .collect()
        .await
}
