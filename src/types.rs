//! Core types for image-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{OnceLock, RwLock};

/// Identifier of a remote item (numeric on most sites, but kept as text)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub String);

impl ImageId {
    /// Create a new ImageId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for ImageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ImageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ImageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Size variant (quality tier) of a remote item
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    /// Small preview / thumbnail
    Preview,
    /// Reduced-size sample
    Sample,
    /// Original file
    Full,
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Size::Preview => "preview",
            Size::Sample => "sample",
            Size::Full => "full",
        };
        f.write_str(name)
    }
}

/// Pixel dimensions of a downloaded image
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Plain description of a remote item, used to construct an [`Image`]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Item identifier
    pub id: String,
    /// Known content hash (MD5 hex), if the source provides it
    #[serde(default)]
    pub md5: Option<String>,
    /// Declared file extension, without the dot
    #[serde(default)]
    pub ext: String,
    /// Source URL per size variant
    #[serde(default)]
    pub urls: BTreeMap<Size, String>,
    /// Tags, in source order (may be empty until loaded)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Page URL used to lazily load tag metadata (absolute or relative to the file URL)
    #[serde(default)]
    pub page_url: Option<String>,
    /// Content rating
    #[serde(default)]
    pub rating: Option<String>,
    /// Creation date on the source
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A remote item shared between the caller and the download pipeline
///
/// Everything is read-only except the content hash (derived at most once) and
/// the pixel dimensions (set after the first successful save).
#[derive(Debug)]
pub struct Image {
    id: ImageId,
    ext: String,
    urls: BTreeMap<Size, String>,
    tags: Vec<String>,
    page_url: Option<String>,
    rating: Option<String>,
    created_at: Option<DateTime<Utc>>,
    md5: OnceLock<String>,
    dimensions: RwLock<Option<Dimensions>>,
}

impl Image {
    /// Create an item from its description
    pub fn new(info: ImageInfo) -> Self {
        let md5 = OnceLock::new();
        if let Some(known) = info.md5.filter(|m| !m.is_empty()) {
            let _ = md5.set(known);
        }
        Self {
            id: ImageId(info.id),
            ext: info.ext,
            urls: info.urls,
            tags: info.tags,
            page_url: info.page_url,
            rating: info.rating,
            created_at: info.created_at,
            md5,
            dimensions: RwLock::new(None),
        }
    }

    /// Item identifier
    pub fn id(&self) -> &ImageId {
        &self.id
    }

    /// Declared extension
    pub fn ext(&self) -> &str {
        &self.ext
    }

    /// Source URL for a size variant
    pub fn url(&self, size: Size) -> Option<&str> {
        self.urls.get(&size).map(String::as_str)
    }

    /// Tags known at construction time
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Page URL for tag loading
    pub fn page_url(&self) -> Option<&str> {
        self.page_url.as_deref()
    }

    /// Content rating
    pub fn rating(&self) -> Option<&str> {
        self.rating.as_deref()
    }

    /// Creation date
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Content hash, known or previously derived
    pub fn md5(&self) -> Option<&str> {
        self.md5.get().map(String::as_str)
    }

    /// Return the stored hash, deriving it with `derive` only if none is set yet
    pub(crate) fn md5_or_init(&self, derive: impl FnOnce() -> String) -> &str {
        self.md5.get_or_init(derive)
    }

    /// Pixel dimensions, once known
    pub fn dimensions(&self) -> Option<Dimensions> {
        match self.dimensions.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn set_dimensions(&self, dimensions: Dimensions) {
        match self.dimensions.write() {
            Ok(mut guard) => *guard = Some(dimensions),
            Err(poisoned) => *poisoned.into_inner() = Some(dimensions),
        }
    }
}

/// Terminal status of one requested output
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    /// Bytes written to the resolved path
    Saved,
    /// Target already existed and the collision action is Skip
    AlreadyExists,
    /// Skipped by the blacklist; nothing fetched
    Blacklisted,
    /// Remote resource absent for every attempted variant
    NotFound,
    /// Transport or server failure
    NetworkError,
    /// Local failure to persist (invalid path, permissions, disk)
    Error,
}

/// Result of attempting to save one requested output
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    /// Resolved (or best-effort) destination path
    pub path: PathBuf,
    /// Variant that was saved, or the requested one if nothing was saved
    pub size: Size,
    /// Terminal status
    pub status: SaveStatus,
    /// Last URL attempted, if any fetch happened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Event emitted during the save lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A save() run started
    Started {
        /// Item id
        image_id: ImageId,
        /// Number of requested outputs
        outputs: usize,
    },

    /// Item matched the blacklist
    Blacklisted {
        /// Item id
        image_id: ImageId,
        /// Rule lines that matched
        rules: Vec<String>,
    },

    /// Requested variant was absent; trying a lower-tier variant
    FallbackAttempt {
        /// Item id
        image_id: ImageId,
        /// Variant that returned not-found
        from: Size,
        /// Variant about to be fetched
        to: Size,
    },

    /// save() finished (emitted exactly once per non-cancelled run)
    Saved {
        /// Item id
        image_id: ImageId,
        /// One outcome per requested output, in request order
        outcomes: Vec<SaveOutcome>,
    },

    /// A log destination could not be appended to
    LogAppendFailed {
        /// Destination path
        path: PathBuf,
        /// Error message
        error: String,
    },

    /// A post-save command failed or timed out
    CommandFailed {
        /// Program that was run
        program: PathBuf,
        /// Exit code if the process exited
        exit_code: Option<i32>,
    },
}
