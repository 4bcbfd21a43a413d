use super::*;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::tags::{LoadedTags, Tag, TagLoader};
use crate::transport::{FetchResponse, FetchStatus, Transport};
use crate::types::{Event, ImageInfo, SaveStatus};
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

mod success;

pub(super) const MD5: &str = "1bc29b36f623ba82aaf6724fd3b16718";
pub(super) const FULL_URL: &str = "http://test.com/img/oldfilename.jpg";
pub(super) const SAMPLE_URL: &str = "http://test.com/sample/oldfilename.jpg";
pub(super) const PREVIEW_URL: &str = "http://test.com/preview/oldfilename.jpg";

/// Canned reply of a [`ScriptedTransport`]
#[derive(Clone)]
pub(super) enum Reply {
    Body(Vec<u8>),
    Typed(Vec<u8>, &'static str),
    NotFound,
    Status(u16),
    Fail,
    Hang,
}

/// In-memory transport answering from a URL -> reply table (unknown URLs are 404)
#[derive(Default)]
pub(super) struct ScriptedTransport {
    replies: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn reply(self, url: &str, reply: Reply) -> Self {
        self.replies.lock().unwrap().insert(url.to_string(), reply);
        self
    }

    pub(super) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(Reply::NotFound);

        match reply {
            Reply::Body(bytes) => Ok(FetchResponse::ok(bytes)),
            Reply::Typed(bytes, content_type) => {
                Ok(FetchResponse::ok(bytes).header("Content-Type", content_type))
            }
            Reply::NotFound => Ok(FetchResponse::with_status(FetchStatus::NotFound)),
            Reply::Status(code) => Ok(FetchResponse::with_status(FetchStatus::Failed(code))),
            Reply::Fail => Err(Error::Transport("connection refused".into())),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Tag loader returning fixed tags (or failing when `tags` is None)
pub(super) struct MockTagLoader {
    tags: Option<LoadedTags>,
    calls: AtomicUsize,
}

impl MockTagLoader {
    pub(super) fn returning(tags: LoadedTags) -> Self {
        Self {
            tags: Some(tags),
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn failing() -> Self {
        Self {
            tags: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TagLoader for MockTagLoader {
    async fn load_tags(&self, _image: &Image) -> Result<LoadedTags> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tags
            .clone()
            .ok_or_else(|| Error::TagLoad("page unavailable".into()))
    }
}

/// Tags of the test item's page, with a copyright of "to_heart_2"
pub(super) fn page_tags() -> LoadedTags {
    let tag = |name: &str, category: Option<&str>| Tag {
        name: name.into(),
        category: category.map(String::from),
    };
    LoadedTags {
        tags: vec![
            tag("to_heart_2", Some("copyright")),
            tag("tag1", None),
            tag("tag2", None),
            tag("tag3", None),
        ],
        rating: Some("safe".into()),
        created_at: None,
    }
}

/// The test item: id 7331, declared jpg, three size URLs
pub(super) fn create_image(known_md5: bool, tags: &[&str]) -> Arc<Image> {
    Arc::new(Image::new(ImageInfo {
        id: "7331".into(),
        md5: known_md5.then(|| MD5.to_string()),
        ext: "jpg".into(),
        urls: BTreeMap::from([
            (Size::Full, FULL_URL.to_string()),
            (Size::Sample, SAMPLE_URL.to_string()),
            (Size::Preview, PREVIEW_URL.to_string()),
        ]),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        page_url: Some("/posts/7331".into()),
        ..Default::default()
    }))
}

pub(super) fn encode(format: image::ImageFormat, width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    image::RgbImage::new(width, height)
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

pub(super) fn jpeg_bytes() -> Vec<u8> {
    encode(image::ImageFormat::Jpeg, 1, 1)
}

pub(super) fn png_bytes() -> Vec<u8> {
    encode(image::ImageFormat::Png, 1, 1)
}

pub(super) fn context(transport: &Arc<ScriptedTransport>, config: Config) -> DownloaderContext {
    DownloaderContext::new(config, transport.clone())
}

/// Drain every event currently buffered in `rx`
pub(super) fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub(super) fn saved_events(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::Saved { .. }))
        .count()
}

pub(super) fn single_status(report: &SaveReport) -> SaveStatus {
    assert_eq!(report.outcomes.len(), 1);
    report.outcomes[0].status
}
