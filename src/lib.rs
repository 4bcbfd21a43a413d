//! # image-dl
//!
//! Per-item image acquisition pipeline for booru-style image sources.
//!
//! Given an item (id, optional known MD5, declared extension, one URL per size
//! variant, tags), an [`ImageDownloader`] fetches the bytes, derives the content
//! hash when unknown, resolves a destination from a filename template, applies
//! the blacklist, falls back to a smaller variant when the requested one is
//! missing, optionally corrects the extension from the content, writes the file
//! and appends to the configured log destinations.
//!
//! ## Design Philosophy
//!
//! image-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Failure as data** - Every requested output yields a [`SaveOutcome`]; `save()` never errors
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Cancellable** - Cancelling a run aborts its request and suppresses its result
//!
//! ## Quick Start
//!
//! ```no_run
//! use image_dl::{Config, DownloaderContext, Image, ImageDownloader, ImageInfo, Size};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = DownloaderContext::http(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = ctx.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let image = Arc::new(Image::new(ImageInfo {
//!         id: "7331".into(),
//!         ext: "jpg".into(),
//!         urls: [
//!             (Size::Full, "https://example.com/img/7331.jpg".to_string()),
//!             (Size::Sample, "https://example.com/sample/7331.jpg".to_string()),
//!         ]
//!         .into(),
//!         page_url: Some("/posts/7331".into()),
//!         ..Default::default()
//!     }));
//!
//!     let downloader = ImageDownloader::single(
//!         ctx,
//!         image,
//!         "%copyright%/%md5%.%ext%",
//!         "/tmp/images",
//!         Size::Full,
//!     );
//!     if let Some(report) = downloader.save().await {
//!         for outcome in report.outcomes {
//!             println!("{:?} {}", outcome.status, outcome.path.display());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Tag blacklist rules
pub mod blacklist;
/// Configuration types
pub mod config;
/// Per-item download pipeline (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Size fallback state machine
pub mod fallback;
/// Content hashing
pub mod hash;
/// Serialized log appends
pub mod log_sink;
/// Content type sniffing and image dimensions
pub mod sniff;
/// Tag metadata and lazy tag loading
pub mod tags;
/// Filename templates and path resolution
pub mod template;
/// Network transport seam
pub mod transport;
/// Core types and data structures
pub mod types;
/// Utility functions for file operations
pub mod utils;

// Re-export commonly used types
pub use blacklist::Blacklist;
pub use config::{
    BlacklistConfig, CommandConfig, Config, FileCollisionAction, HttpConfig, LogFileConfig,
    LogLocation, MissingTagsPolicy, SaveConfig,
};
pub use downloader::{
    DownloaderContext, ImageDownloader, OutputRequest, SaveHandle, SaveOptions, SaveReport,
    save_batch,
};
pub use error::{Error, IsRetryable, Result};
pub use fallback::{FallbackState, SizeFallback};
pub use log_sink::LogSink;
pub use tags::{JsonTagLoader, LoadedTags, Tag, TagLoader};
pub use template::Metadata;
pub use transport::{FetchResponse, FetchStatus, HttpTransport, Transport};
pub use types::{
    Dimensions, Event, Image, ImageId, ImageInfo, SaveOutcome, SaveStatus, Size,
};
