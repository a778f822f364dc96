//! Search index provider trait definition.
//!
//! This module defines the abstract interface for the index lifecycle calls,
//! allowing for different backend implementations (OpenSearch, Elasticsearch,
//! in-memory).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SearchIndexError;
use crate::types::{AliasAction, BatchOperationSummary, ClusterOverview, CreateDocumentRequest};

/// Abstracts the underlying search engine (OpenSearch, Elasticsearch, etc.).
///
/// Implementations are injected into the reindexer as
/// `Arc<dyn SearchIndexProvider>` so tests can swap in the in-memory provider.
///
/// All methods return `Result<T, SearchIndexError>` for consistent error
/// handling across backends.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Resolve the physical index an alias currently points to.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - If the alias does not exist
    /// * `Ok(Some(name))` - The physical index name
    /// * `Err(SearchIndexError)` - If the lookup fails
    async fn resolve_alias(&self, alias: &str) -> Result<Option<String>, SearchIndexError>;

    /// Create a physical index.
    ///
    /// # Arguments
    ///
    /// * `index` - The physical index name
    /// * `body` - The creation body (`settings` and `mappings`)
    async fn create_index(&self, index: &str, body: &Value) -> Result<(), SearchIndexError>;

    /// Delete a physical index.
    async fn delete_index(&self, index: &str) -> Result<(), SearchIndexError>;

    /// Apply alias actions as one atomic request.
    ///
    /// Either every action is applied or none is.
    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), SearchIndexError>;

    /// Create documents in bulk.
    ///
    /// Each document is submitted as a `create` operation. Per-document
    /// failures are reported in the returned summary, in request order.
    ///
    /// # Arguments
    ///
    /// * `index` - The physical index name
    /// * `documents` - The documents to create
    /// * `timeout` - Upper bound for the whole request
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Per-document outcome
    /// * `Err(SearchIndexError)` - If the request failed as a whole
    async fn bulk_create(
        &self,
        index: &str,
        documents: &[CreateDocumentRequest],
        timeout: Duration,
    ) -> Result<BatchOperationSummary, SearchIndexError>;

    /// Describe the cluster's indices, aliases and nodes.
    async fn describe_cluster(&self) -> Result<ClusterOverview, SearchIndexError>;
}
