//! Lazy tag metadata loading
//!
//! Items coming from listing pages often carry a flat tag list (or none). A
//! [`TagLoader`] fetches the categorized tags from the item's page when a
//! template or the blacklist needs them.

use crate::error::{Error, Result};
use crate::transport::{FetchStatus, Transport};
use crate::types::{Image, Size};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Category given to tags the source did not categorize
pub const DEFAULT_CATEGORY: &str = "general";

/// A tag with its category (copyright, artist, character, ...)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name as used by the source (underscored)
    pub name: String,
    /// Category, if the source provides one
    #[serde(default)]
    pub category: Option<String>,
}

/// Tags and page metadata returned by a [`TagLoader`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedTags {
    /// Tags in page order
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Content rating from the page
    #[serde(default)]
    pub rating: Option<String>,
    /// Creation date from the page
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Tag data available to a pipeline run, loaded or not
#[derive(Clone, Debug, Default)]
pub struct TagData {
    /// Tag names, in order
    pub tags: Vec<String>,
    /// Tag names grouped by category
    pub categories: BTreeMap<String, Vec<String>>,
    /// Content rating
    pub rating: Option<String>,
    /// Creation date
    pub created_at: Option<DateTime<Utc>>,
    /// True once a [`TagLoader`] succeeded
    pub loaded: bool,
}

impl TagData {
    /// Tag data carried by the item itself (uncategorized)
    pub fn from_image(image: &Image) -> Self {
        Self {
            tags: image.tags().to_vec(),
            categories: BTreeMap::new(),
            rating: image.rating().map(String::from),
            created_at: image.created_at(),
            loaded: false,
        }
    }

    /// Replace tags with loaded ones, keeping item values the page lacks
    pub fn merge(&mut self, loaded: LoadedTags) {
        let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut tags = Vec::with_capacity(loaded.tags.len());
        for tag in loaded.tags {
            let category = tag
                .category
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
                .to_lowercase();
            categories.entry(category).or_default().push(tag.name.clone());
            tags.push(tag.name);
        }
        self.tags = tags;
        self.categories = categories;
        self.rating = loaded.rating.or(self.rating.take());
        self.created_at = loaded.created_at.or(self.created_at);
        self.loaded = true;
    }
}

/// Loads tag metadata for an item
#[async_trait::async_trait]
pub trait TagLoader: Send + Sync {
    /// Load tags for `image`
    async fn load_tags(&self, image: &Image) -> Result<LoadedTags>;
}

/// Loads tags from a JSON page document fetched through a [`Transport`]
///
/// Expected document shape:
///
/// ```json
/// {
///   "tags": [{"name": "to_heart_2", "category": "copyright"}, {"name": "tag1"}],
///   "rating": "safe",
///   "created_at": "2024-01-02T03:04:05Z"
/// }
/// ```
///
/// Relative page URLs are resolved against the item's full-size URL.
pub struct JsonTagLoader {
    transport: Arc<dyn Transport>,
}

impl JsonTagLoader {
    /// Create a loader fetching through `transport`
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait::async_trait]
impl TagLoader for JsonTagLoader {
    async fn load_tags(&self, image: &Image) -> Result<LoadedTags> {
        let page_url = page_url(image)?;
        let response = self.transport.fetch(&page_url).await?;
        if response.status != FetchStatus::Ok {
            return Err(Error::TagLoad(format!(
                "page {page_url} returned {:?}",
                response.status
            )));
        }
        let loaded: LoadedTags = serde_json::from_slice(&response.bytes)
            .map_err(|e| Error::TagLoad(format!("invalid tag document at {page_url}: {e}")))?;
        tracing::debug!(image_id = %image.id(), tags = loaded.tags.len(), "loaded tags");
        Ok(loaded)
    }
}

/// Absolute page URL of `image`
fn page_url(image: &Image) -> Result<String> {
    let page = image
        .page_url()
        .ok_or_else(|| Error::TagLoad(format!("item {} has no page url", image.id())))?;

    if let Ok(absolute) = url::Url::parse(page) {
        return Ok(absolute.to_string());
    }

    let base = [Size::Full, Size::Sample, Size::Preview]
        .into_iter()
        .find_map(|size| image.url(size))
        .ok_or_else(|| Error::TagLoad(format!("cannot resolve relative page url {page}")))?;
    let base = url::Url::parse(base)
        .map_err(|e| Error::TagLoad(format!("invalid item url {base}: {e}")))?;
    base.join(page)
        .map(|u| u.to_string())
        .map_err(|e| Error::TagLoad(format!("cannot resolve page url {page}: {e}")))
}
