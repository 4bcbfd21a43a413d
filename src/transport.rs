//! Network transport seam
//!
//! The pipeline only needs `fetch(url)`. [`HttpTransport`] is the reqwest-backed
//! implementation; tests and embedders can plug in their own.

use crate::config::HttpConfig;
use crate::error::Result;
use std::collections::HashMap;

/// Classified HTTP status of a fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchStatus {
    /// 2xx; body is available
    Ok,
    /// Resource absent (404 / 410)
    NotFound,
    /// Any other non-success status
    Failed(u16),
}

/// Response of a fetch
#[derive(Clone, Debug)]
pub struct FetchResponse {
    /// Classified status
    pub status: FetchStatus,
    /// Response body (empty unless status is Ok)
    pub bytes: Vec<u8>,
    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,
}

impl FetchResponse {
    /// Successful response with a body
    pub fn ok(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            status: FetchStatus::Ok,
            bytes: bytes.into(),
            headers: HashMap::new(),
        }
    }

    /// Bodiless response with the given status
    pub fn with_status(status: FetchStatus) -> Self {
        Self {
            status,
            bytes: Vec::new(),
            headers: HashMap::new(),
        }
    }

    /// Add a header (name is lowercased)
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// `Content-Type` header, if present
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

/// Fetches a URL
///
/// `Err` means the request never produced an HTTP response (connection
/// failure, timeout, ...). Dropping the returned future must abort the request.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url`
    async fn fetch(&self, url: &str) -> Result<FetchResponse>;
}

/// reqwest-backed transport
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport from HTTP settings
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let status = if status.is_success() {
            FetchStatus::Ok
        } else if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            FetchStatus::NotFound
        } else {
            FetchStatus::Failed(status.as_u16())
        };

        let bytes = match status {
            FetchStatus::Ok => response.bytes().await?.to_vec(),
            _ => Vec::new(),
        };

        tracing::debug!(url, status = ?status, bytes = bytes.len(), "fetched");
        Ok(FetchResponse {
            status,
            bytes,
            headers,
        })
    }
}
