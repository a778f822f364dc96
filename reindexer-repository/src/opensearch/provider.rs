//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust crate.

use std::time::Duration;

use async_trait::async_trait;
use opensearch::{
    cat::{CatAliasesParts, CatIndicesParts},
    http::{
        request::JsonBody,
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesGetAliasParts},
    BulkParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{
    AliasAction, BatchOperationResult, BatchOperationSummary, ClusterOverview,
    CreateDocumentRequest,
};

/// OpenSearch provider implementation.
///
/// # Example
///
/// ```ignore
/// use reindexer_repository::{AliasAction, OpenSearchProvider, SearchIndexProvider};
///
/// let provider = OpenSearchProvider::new("http://localhost:9200").await?;
/// let current = provider.resolve_alias("provincias").await?;
/// provider
///     .update_aliases(&[AliasAction::add("provincias-1a2b3c4d-1546300800", "provincias")])
///     .await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        let response = client
            .ping()
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;
        if !response.status_code().is_success() {
            return Err(SearchIndexError::connection(format!(
                "Ping failed with status {}",
                response.status_code()
            )));
        }

        info!(url = %url, "Created OpenSearch provider");

        Ok(Self { client })
    }

    /// Read the body of a failed response for error reporting.
    async fn failure_body(response: Response) -> String {
        response.text().await.unwrap_or_default()
    }

    /// Build the NDJSON body of a bulk create request.
    fn bulk_body(documents: &[CreateDocumentRequest]) -> Vec<JsonBody<Value>> {
        let mut body = Vec::with_capacity(documents.len() * 2);
        for doc in documents {
            body.push(JsonBody::new(json!({ "create": { "_id": doc.id } })));
            body.push(JsonBody::new(Value::Object(doc.source.clone())));
        }
        body
    }

    /// Turn a bulk response body into per-document results.
    ///
    /// Results keep the request order; the engine returns one item per
    /// operation.
    fn parse_bulk_response(
        documents: &[CreateDocumentRequest],
        response: &Value,
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        let items = response["items"]
            .as_array()
            .ok_or_else(|| SearchIndexError::parse("Bulk response has no items"))?;

        if items.len() != documents.len() {
            return Err(SearchIndexError::parse(format!(
                "Bulk response has {} items for {} documents",
                items.len(),
                documents.len()
            )));
        }

        let results = items
            .iter()
            .zip(documents)
            .map(|(item, doc)| {
                let op = &item["create"];
                let status = op["status"].as_u64().unwrap_or_default();
                let created = op["result"].as_str() == Some("created");
                match op.get("error") {
                    None if created || (200..300).contains(&status) => {
                        BatchOperationResult::created(&doc.id)
                    }
                    Some(err) => BatchOperationResult::failed(&doc.id, err.clone()),
                    None => BatchOperationResult::failed(
                        &doc.id,
                        json!({ "status": status, "result": op["result"] }),
                    ),
                }
            })
            .collect();

        Ok(BatchOperationSummary::from_results(results))
    }

    /// Fetch a verbose `_cat` table as text.
    async fn cat_text(
        response: Result<Response, opensearch::Error>,
    ) -> Result<String, SearchIndexError> {
        let response = response.map_err(|e| SearchIndexError::connection(e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    async fn resolve_alias(&self, alias: &str) -> Result<Option<String>, SearchIndexError> {
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Name(&[alias]))
            .send()
            .await
            .map_err(|e| SearchIndexError::alias(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let error_body = Self::failure_body(response).await;
            error!(status = %status, body = %error_body, "Get alias request failed");
            return Err(SearchIndexError::alias(format!(
                "Get alias failed with status {}: {}",
                status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        // Response shape: { "<index>": { "aliases": { "<alias>": {} } } }
        let indices = body
            .as_object()
            .ok_or_else(|| SearchIndexError::parse("Get alias response is not an object"))?;
        if indices.len() > 1 {
            error!(
                alias = %alias,
                indices = ?indices.keys().collect::<Vec<_>>(),
                "Alias resolves to more than one index"
            );
        }

        Ok(indices.keys().next().cloned())
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::index_creation(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = Self::failure_body(response).await;
            error!(status = %status, body = %error_body, "Create index request failed");
            return Err(SearchIndexError::index_creation(format!(
                "Create index failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(index = %index, "Index created");
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchIndexError::index_deletion(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = Self::failure_body(response).await;
            error!(status = %status, body = %error_body, "Delete index request failed");
            return Err(SearchIndexError::index_deletion(format!(
                "Delete index failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(index = %index, "Index deleted");
        Ok(())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), SearchIndexError> {
        // A single _aliases call is applied atomically by the engine.
        let response = self
            .client
            .indices()
            .update_aliases()
            .body(json!({ "actions": actions }))
            .send()
            .await
            .map_err(|e| SearchIndexError::alias(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = Self::failure_body(response).await;
            error!(status = %status, body = %error_body, "Update aliases request failed");
            return Err(SearchIndexError::alias(format!(
                "Update aliases failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(action_count = actions.len(), "Aliases updated");
        Ok(())
    }

    async fn bulk_create(
        &self,
        index: &str,
        documents: &[CreateDocumentRequest],
        timeout: Duration,
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(index))
            .request_timeout(timeout)
            .body(Self::bulk_body(documents))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchIndexError::Timeout(timeout.as_secs())
                } else {
                    SearchIndexError::bulk_index(e.to_string())
                }
            })?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = Self::failure_body(response).await;
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(SearchIndexError::bulk_index(format!(
                "Bulk request failed with status {}: {}",
                status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let summary = Self::parse_bulk_response(documents, &body)?;
        debug!(
            index = %index,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk create completed"
        );
        Ok(summary)
    }

    async fn describe_cluster(&self) -> Result<ClusterOverview, SearchIndexError> {
        let cat = self.client.cat();
        let indices =
            Self::cat_text(cat.indices(CatIndicesParts::None).v(true).send().await).await?;
        let aliases =
            Self::cat_text(cat.aliases(CatAliasesParts::None).v(true).send().await).await?;
        let nodes = Self::cat_text(cat.nodes().v(true).send().await).await?;

        Ok(ClusterOverview {
            indices,
            aliases,
            nodes,
        })
    }
}
