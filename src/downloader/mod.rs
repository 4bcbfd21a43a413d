//! Per-item download pipeline split into focused submodules.
//!
//! The [`ImageDownloader`] struct and its run are organized by concern:
//! - [`context`] - Shared services (settings, transport, tag loader, log sink, events)
//! - [`orchestration`] - The `save()` state machine
//! - [`fetch`] - Variant fetching with size fallback and extension rotation
//! - [`persist`] - Writing bytes to the resolved path
//! - [`notify`] - Log appends and post-save commands
//! - [`batch`] - Spawned runs and bounded-concurrency batches

mod batch;
mod context;
mod fetch;
mod notify;
mod orchestration;
mod persist;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use batch::{SaveHandle, save_batch};
pub use context::DownloaderContext;

use crate::blacklist::Blacklist;
use crate::types::{Image, SaveOutcome, Size};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One requested output of an item
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputRequest {
    /// Filename template, e.g. `%md5%.%ext%`
    pub template: String,
    /// Directory the template is resolved under
    pub destination_root: PathBuf,
    /// Size variant to fetch
    pub size: Size,
}

impl OutputRequest {
    /// Create an output request
    pub fn new(template: impl Into<String>, destination_root: impl Into<PathBuf>, size: Size) -> Self {
        Self {
            template: template.into(),
            destination_root: destination_root.into(),
            size,
        }
    }
}

/// Per-downloader behaviour flags
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaveOptions {
    /// Load page tags when a template or the blacklist needs them (default: true)
    pub load_tags: bool,
    /// Rotate extensions on not-found and correct them from content (default: false)
    pub rotate_extension: bool,
    /// Value of the `%count%` token (default: 1)
    pub count: u32,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            load_tags: true,
            rotate_extension: false,
            count: 1,
        }
    }
}

/// Completion payload of a `save()` run
#[derive(Clone, Debug)]
pub struct SaveReport {
    /// The item that was saved
    pub image: Arc<Image>,
    /// One outcome per requested output, in request order
    pub outcomes: Vec<SaveOutcome>,
}

/// Saves one item to one or more destinations
///
/// Bound to a single item. The item is shared with the caller; the pipeline
/// only ever fills in its content hash and pixel dimensions.
///
/// # Example
///
/// ```no_run
/// use image_dl::{Config, DownloaderContext, Image, ImageDownloader, ImageInfo, Size};
/// use std::sync::Arc;
///
/// # async fn run() -> image_dl::Result<()> {
/// let ctx = DownloaderContext::http(Config::default())?;
/// let image = Arc::new(Image::new(ImageInfo {
///     id: "7331".into(),
///     ext: "jpg".into(),
///     urls: [(Size::Full, "https://example.com/img/7331.jpg".to_string())].into(),
///     ..Default::default()
/// }));
///
/// let downloader = ImageDownloader::single(ctx, image, "%md5%.%ext%", "/tmp/images", Size::Full);
/// if let Some(report) = downloader.save().await {
///     println!("{:?}", report.outcomes);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ImageDownloader {
    pub(crate) image: Arc<Image>,
    pub(crate) outputs: Vec<OutputRequest>,
    pub(crate) options: SaveOptions,
    pub(crate) blacklist: Option<Arc<Blacklist>>,
    pub(crate) ctx: DownloaderContext,
    pub(crate) cancel: CancellationToken,
}

impl ImageDownloader {
    /// Create a downloader for `image` with the given outputs
    pub fn new(ctx: DownloaderContext, image: Arc<Image>, outputs: Vec<OutputRequest>) -> Self {
        Self {
            image,
            outputs,
            options: SaveOptions::default(),
            blacklist: None,
            ctx,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a downloader with a single output
    pub fn single(
        ctx: DownloaderContext,
        image: Arc<Image>,
        template: impl Into<String>,
        destination_root: impl Into<PathBuf>,
        size: Size,
    ) -> Self {
        Self::new(
            ctx,
            image,
            vec![OutputRequest::new(template, destination_root, size)],
        )
    }

    /// Set behaviour flags
    pub fn with_options(mut self, options: SaveOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach a blacklist; without one, the configured blacklist (if any) applies
    pub fn with_blacklist(mut self, blacklist: Arc<Blacklist>) -> Self {
        self.blacklist = Some(blacklist);
        self
    }

    /// The item
    pub fn image(&self) -> &Arc<Image> {
        &self.image
    }

    /// Requested outputs
    pub fn outputs(&self) -> &[OutputRequest] {
        &self.outputs
    }

    /// Behaviour flags
    pub fn options(&self) -> SaveOptions {
        self.options
    }

    /// Abort a run in flight; it completes with `None` and emits no completion event
    ///
    /// Cancellation is permanent for this downloader.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once [`cancel`](Self::cancel) was called
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that cancels this downloader when tripped
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the pipeline
    ///
    /// Yields one outcome per requested output, in request order, and emits
    /// [`Event::Saved`](crate::Event::Saved) exactly once. Failures are
    /// reported as outcome statuses, never as errors. Returns `None` if the
    /// run was cancelled.
    pub async fn save(&self) -> Option<SaveReport> {
        let outcomes = orchestration::run_save(self).await?;
        Some(SaveReport {
            image: self.image.clone(),
            outcomes,
        })
    }

    /// Run the pipeline on a tokio task
    ///
    /// Dropping the returned handle cancels the run.
    pub fn spawn(self) -> SaveHandle {
        SaveHandle::spawn(self)
    }
}
