//! Dataset source fetching.
//!
//! This module provides:
//! - [`SourceFetcher`] trait for abstracting where dataset payloads come from
//! - [`LocationFetcher`] production fetcher reading `http(s)` URLs and local files
//! - [`MockSourceFetcher`] mock fetcher with pre-configured location → payload mappings

mod mock;

pub use mock::MockSourceFetcher;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Default timeout for remote downloads.
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Errors raised while fetching a dataset payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The HTTP request failed.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("unexpected status {status} from {location}")]
    Status { location: String, status: u16 },

    /// The local file could not be read.
    #[error("io error: {0}")]
    Io(String),

    /// No payload is registered for the location.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Where a location points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation<'a> {
    /// Remote `http` or `https` URL.
    Remote(Url),
    /// Local file path.
    Local(&'a Path),
}

impl<'a> SourceLocation<'a> {
    /// Classify a location string. Anything that is not an `http(s)` URL is a path.
    pub fn parse(location: &'a str) -> Self {
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Remote(url),
            _ => Self::Local(Path::new(location)),
        }
    }
}

/// Trait for fetching raw dataset payloads.
///
/// This trait abstracts the data source to enable dependency injection
/// and mocking for testing. Production code uses [`LocationFetcher`], while
/// tests use [`MockSourceFetcher`].
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch the raw payload stored at `location`.
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError>;
}

/// Production fetcher for remote URLs and local files.
pub struct LocationFetcher {
    client: ReqwestClient,
}

impl LocationFetcher {
    /// Create a fetcher with the default download timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS))
    }

    /// Create a fetcher with a custom download timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    async fn download(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        info!(url = %url, "Downloading file");

        let location = url.to_string();
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                location,
                status: status.as_u16(),
            });
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        debug!(url = %location, size = bytes.len(), "Download complete");
        Ok(bytes.to_vec())
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, FetchError> {
        info!(path = %path.display(), "Reading file");
        tokio::fs::read(path)
            .await
            .map_err(|e| FetchError::Io(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl SourceFetcher for LocationFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        match SourceLocation::parse(location) {
            SourceLocation::Remote(url) => self.download(url).await,
            SourceLocation::Local(path) => self.read_file(path).await,
        }
    }
}
