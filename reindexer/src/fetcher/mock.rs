//! Mock source fetcher for testing and local development.
//!
//! The `MockSourceFetcher` can be pre-populated with location → payload
//! mappings, allowing tests to run without network or disk access.
//!
//! # Example
//!
//! ```ignore
//! use reindexer::fetcher::{MockSourceFetcher, SourceFetcher};
//! use serde_json::json;
//!
//! let fetcher = MockSourceFetcher::new();
//! fetcher.insert_json("https://example.org/provincias.json", &json!({"timestamp": 1}));
//! let bytes = fetcher.fetch("https://example.org/provincias.json").await?;
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::fetcher::{FetchError, SourceFetcher};

/// Mock fetcher that returns pre-configured payloads.
///
/// Locations without a payload fail with [`FetchError::NotFound`]. When
/// `read_local_files` is enabled, unknown locations that exist on disk are
/// read from disk, so snapshots written during a test can be fetched back.
#[derive(Debug, Default)]
pub struct MockSourceFetcher {
    payloads: RwLock<HashMap<String, Vec<u8>>>,
    read_local_files: bool,
    fetched: RwLock<Vec<String>>,
}

impl MockSourceFetcher {
    /// Create a new empty mock fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fall back to reading existing local files for unknown locations.
    pub fn reading_local_files(mut self) -> Self {
        self.read_local_files = true;
        self
    }

    /// Register raw bytes for a location.
    pub fn insert(&self, location: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut payloads) = self.payloads.write() {
            payloads.insert(location.into(), bytes.into());
        }
    }

    /// Register a JSON payload for a location.
    pub fn insert_json(&self, location: impl Into<String>, payload: &Value) {
        self.insert(location, payload.to_string());
    }

    /// Remove the payload of a location, making it unreachable.
    pub fn remove(&self, location: &str) {
        if let Ok(mut payloads) = self.payloads.write() {
            payloads.remove(location);
        }
    }

    /// Every location fetched so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched
            .read()
            .map(|fetched| fetched.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SourceFetcher for MockSourceFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        if let Ok(mut fetched) = self.fetched.write() {
            fetched.push(location.to_string());
        }

        let registered = self
            .payloads
            .read()
            .map_err(|_| FetchError::Io("mock payloads lock poisoned".to_string()))?
            .get(location)
            .cloned();

        match registered {
            Some(bytes) => Ok(bytes),
            None if self.read_local_files && Path::new(location).exists() => {
                tokio::fs::read(location)
                    .await
                    .map_err(|e| FetchError::Io(e.to_string()))
            }
            None => Err(FetchError::NotFound(location.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_registered_payload() {
        let fetcher = MockSourceFetcher::new();
        fetcher.insert_json("a", &json!({"x": 1}));

        let bytes = fetcher.fetch("a").await.unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value, json!({"x": 1}));
        assert_eq!(fetcher.fetched(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_unknown_location() {
        let fetcher = MockSourceFetcher::new();
        fetcher.insert("a", "{}");
        fetcher.remove("a");

        assert_eq!(
            fetcher.fetch("a").await,
            Err(FetchError::NotFound("a".to_string()))
        );
    }
}
