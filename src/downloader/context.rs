//! Shared services for download pipelines: settings, transport, tag loader, log sink and events.

use crate::config::Config;
use crate::error::Result;
use crate::log_sink::LogSink;
use crate::tags::{JsonTagLoader, TagLoader};
use crate::transport::{HttpTransport, Transport};
use crate::types::Event;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// Services shared by every [`ImageDownloader`](super::ImageDownloader) (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct DownloaderContext {
    /// Settings, snapshotted once per `save()`
    pub(crate) config: Arc<RwLock<Config>>,
    /// Fetches item bytes
    pub(crate) transport: Arc<dyn Transport>,
    /// Loads page tags on demand (optional)
    pub(crate) tag_loader: Option<Arc<dyn TagLoader>>,
    /// Append lock map shared by all pipelines
    pub(crate) log_sink: Arc<LogSink>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl DownloaderContext {
    /// Create a context around an existing transport, without a tag loader
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        // Buffer of 1000 events so slow subscribers rarely lag
        let (event_tx, _rx) = broadcast::channel(1000);
        Self {
            config: Arc::new(RwLock::new(config)),
            transport,
            tag_loader: None,
            log_sink: Arc::new(LogSink::new()),
            event_tx,
        }
    }

    /// Create a context backed by reqwest, loading tags from JSON item pages
    pub fn http(config: Config) -> Result<Self> {
        config.validate()?;
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.http)?);
        let loader = Arc::new(JsonTagLoader::new(transport.clone()));
        Ok(Self::new(config, transport).with_tag_loader(loader))
    }

    /// Use `loader` for lazy tag loading
    pub fn with_tag_loader(mut self, loader: Arc<dyn TagLoader>) -> Self {
        self.tag_loader = Some(loader);
        self
    }

    /// Share a log sink with other contexts appending to the same files
    pub fn with_log_sink(mut self, log_sink: Arc<LogSink>) -> Self {
        self.log_sink = log_sink;
        self
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current settings
    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Replace the settings; runs already in flight keep their snapshot
    pub async fn update_config(&self, config: Config) -> Result<()> {
        config.validate()?;
        *self.config.write().await = config;
        tracing::debug!("configuration updated");
        Ok(())
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}
