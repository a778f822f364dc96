//! Bulk ingestor.
//!
//! Streams a dataset's documents into a freshly created index as `create`
//! operations, in bounded chunks. Failures are tallied per document and never
//! stop the ingestion.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reindexer_repository::{BatchOperationSummary, CreateDocumentRequest, SearchIndexProvider};
use reindexer_shared::Document;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

/// Field holding the engine document id.
pub const ID_FIELD: &str = "id";

/// Configuration for the bulk ingestor.
#[derive(Debug, Clone)]
pub struct IngestorConfig {
    /// Number of documents per bulk request.
    pub chunk_size: usize,
    /// Upper bound for each bulk request.
    pub request_timeout: Duration,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            request_timeout: Duration::from_secs(500),
        }
    }
}

/// A document that could not be created.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFailure {
    /// Position of the document in the dataset.
    pub position: usize,
    /// Document id, when the document carried one.
    pub id: Option<String>,
    /// Error reported by the engine, or the local rejection reason.
    pub reason: Value,
}

/// Outcome of ingesting one dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestionOutcome {
    /// Documents seen.
    pub processed: usize,
    /// Documents created.
    pub created: usize,
    /// Documents that failed.
    pub errored: usize,
    /// Details of every failed document, in dataset order.
    pub failures: Vec<DocumentFailure>,
}

impl IngestionOutcome {
    fn record_failure(&mut self, failure: DocumentFailure) {
        warn!(
            position = failure.position,
            document_id = failure.id.as_deref().unwrap_or("<missing>"),
            error = %failure.reason,
            "Error processing document"
        );
        self.errored += 1;
        self.failures.push(failure);
    }
}

/// Extract the engine id of a document.
///
/// Strings and numbers are accepted; anything else, an empty string or a
/// missing field yields `None`.
pub fn document_id(doc: &Document) -> Option<String> {
    match doc.get(ID_FIELD)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Return a copy of `doc` without the excluded fields.
pub fn filter_document(doc: &Document, excludes: &BTreeSet<String>) -> Document {
    doc.iter()
        .filter(|(key, _)| !excludes.contains(key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Ingestor that creates documents in a physical index.
pub struct BulkIngestor {
    provider: Arc<dyn SearchIndexProvider>,
    config: IngestorConfig,
}

impl BulkIngestor {
    /// Create a new ingestor with the default configuration.
    pub fn new(provider: Arc<dyn SearchIndexProvider>) -> Self {
        Self {
            provider,
            config: IngestorConfig::default(),
        }
    }

    /// Create a new ingestor with custom configuration.
    pub fn with_config(provider: Arc<dyn SearchIndexProvider>, config: IngestorConfig) -> Self {
        Self { provider, config }
    }

    /// Ingest `documents` into `index`.
    ///
    /// Excluded fields are removed before submission. Documents without an
    /// id are recorded as failures and never submitted. A chunk whose request
    /// fails or times out marks each of its documents as failed; the next
    /// chunk is still submitted.
    #[instrument(skip(self, documents, excludes), fields(document_count = documents.len()))]
    pub async fn ingest(
        &self,
        index: &str,
        documents: &[Document],
        excludes: &BTreeSet<String>,
    ) -> IngestionOutcome {
        let mut outcome = IngestionOutcome {
            processed: documents.len(),
            ..Default::default()
        };

        info!(index = %index, "Inserting documents");

        let chunk_size = self.config.chunk_size.max(1);
        let mut chunks = stream::iter(documents.iter().enumerate()).chunks(chunk_size);

        while let Some(chunk) = chunks.next().await {
            let mut positions = Vec::with_capacity(chunk.len());
            let mut requests = Vec::with_capacity(chunk.len());

            for (position, doc) in chunk {
                let source = filter_document(doc, excludes);
                match document_id(&source) {
                    Some(id) => {
                        positions.push(position);
                        requests.push(CreateDocumentRequest { id, source });
                    }
                    None => outcome.record_failure(DocumentFailure {
                        position,
                        id: None,
                        reason: json!({
                            "type": "missing_document_id",
                            "reason": format!("document has no usable '{}' field", ID_FIELD)
                        }),
                    }),
                }
            }

            if requests.is_empty() {
                continue;
            }

            match self.submit(index, &requests).await {
                Ok(summary) => {
                    for (result, position) in summary.results.into_iter().zip(&positions) {
                        if result.success {
                            outcome.created += 1;
                        } else {
                            outcome.record_failure(DocumentFailure {
                                position: *position,
                                id: Some(result.document_id),
                                reason: result.error.unwrap_or(Value::Null),
                            });
                        }
                    }
                }
                Err(reason) => {
                    warn!(
                        index = %index,
                        chunk_len = requests.len(),
                        error = %reason,
                        "Bulk request failed, marking chunk documents as failed"
                    );
                    for (request, position) in requests.into_iter().zip(positions) {
                        outcome.record_failure(DocumentFailure {
                            position,
                            id: Some(request.id),
                            reason: reason.clone(),
                        });
                    }
                }
            }
        }

        // Keep failures in dataset order regardless of how they were found.
        outcome.failures.sort_by_key(|f| f.position);

        info!(
            index = %index,
            processed = outcome.processed,
            created = outcome.created,
            errored = outcome.errored,
            "Ingestion summary"
        );
        outcome
    }

    /// Submit one chunk, bounded by the request timeout.
    ///
    /// Returns the engine error payload when the chunk failed as a whole.
    async fn submit(
        &self,
        index: &str,
        requests: &[CreateDocumentRequest],
    ) -> Result<BatchOperationSummary, Value> {
        let timeout = self.config.request_timeout;
        debug!(index = %index, count = requests.len(), "Submitting bulk chunk");

        let summary = match tokio::time::timeout(
            timeout,
            self.provider.bulk_create(index, requests, timeout),
        )
        .await
        {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => return Err(json!({ "type": "bulk_request_failed", "reason": e.to_string() })),
            Err(_) => {
                return Err(json!({
                    "type": "timeout",
                    "reason": format!("bulk request exceeded {} seconds", timeout.as_secs())
                }))
            }
        };

        if summary.results.len() != requests.len() {
            return Err(json!({
                "type": "bulk_response_mismatch",
                "reason": format!(
                    "{} results for {} documents",
                    summary.results.len(),
                    requests.len()
                )
            }));
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reindexer_repository::InMemorySearchProvider;
    use serde_json::Map;

    fn doc(id: Option<Value>, extra: &[(&str, Value)]) -> Document {
        let mut doc = Map::new();
        if let Some(id) = id {
            doc.insert(ID_FIELD.to_string(), id);
        }
        for (key, value) in extra {
            doc.insert(key.to_string(), value.clone());
        }
        doc
    }

    async fn provider_with_index(index: &str) -> Arc<InMemorySearchProvider> {
        let provider = Arc::new(InMemorySearchProvider::new());
        provider.create_index(index, &json!({})).await.unwrap();
        provider
    }

    #[test]
    fn test_document_id() {
        assert_eq!(document_id(&doc(Some(json!("06")), &[])), Some("06".to_string()));
        assert_eq!(document_id(&doc(Some(json!(6)), &[])), Some("6".to_string()));
        assert_eq!(document_id(&doc(Some(json!("")), &[])), None);
        assert_eq!(document_id(&doc(Some(json!(null)), &[])), None);
        assert_eq!(document_id(&doc(Some(json!({"a": 1})), &[])), None);
        assert_eq!(document_id(&doc(None, &[])), None);
    }

    #[test]
    fn test_filter_document_keeps_order() {
        let excludes: BTreeSet<String> = ["codigo_postal".to_string()].into();
        let original = doc(
            Some(json!("1")),
            &[
                ("nombre", json!("Av. Corrientes")),
                ("codigo_postal", json!({"inicio": 1000})),
                ("tipo", json!("AV")),
            ],
        );

        let filtered = filter_document(&original, &excludes);

        assert_eq!(filtered.keys().collect::<Vec<_>>(), vec!["id", "nombre", "tipo"]);
    }

    #[tokio::test]
    async fn test_missing_ids_are_counted_not_submitted() {
        let provider = provider_with_index("provincias-a-1").await;
        let ingestor = BulkIngestor::with_config(
            provider.clone(),
            IngestorConfig {
                chunk_size: 7,
                ..Default::default()
            },
        );

        let missing = [5usize, 42, 99];
        let documents: Vec<Document> = (0..100)
            .map(|i| {
                if missing.contains(&i) {
                    doc(None, &[("nombre", json!(format!("doc {}", i)))])
                } else {
                    doc(Some(json!(i.to_string())), &[])
                }
            })
            .collect();

        let outcome = ingestor
            .ingest("provincias-a-1", &documents, &BTreeSet::new())
            .await;

        assert_eq!(outcome.processed, 100);
        assert_eq!(outcome.created, 97);
        assert_eq!(outcome.errored, 3);
        assert_eq!(
            outcome.failures.iter().map(|f| f.position).collect::<Vec<_>>(),
            missing.to_vec()
        );
        assert!(outcome.failures.iter().all(|f| f.id.is_none()));
        assert_eq!(provider.documents("provincias-a-1").len(), 97);

        let submitted: usize = provider
            .bulk_requests()
            .iter()
            .map(|r| r.documents.len())
            .sum();
        assert_eq!(submitted, 97);
        assert!(provider.bulk_requests().iter().all(|r| r.documents.len() <= 7));
    }

    #[tokio::test]
    async fn test_excluded_fields_never_submitted() {
        let provider = provider_with_index("calles-a-1").await;
        let ingestor = BulkIngestor::new(provider.clone());
        let excludes: BTreeSet<String> = ["codigo_postal".to_string()].into();

        let documents: Vec<Document> = (0..20)
            .map(|i| {
                doc(
                    Some(json!(i)),
                    &[("codigo_postal", json!("1000")), ("nombre", json!("x"))],
                )
            })
            .collect();

        let outcome = ingestor.ingest("calles-a-1", &documents, &excludes).await;

        assert_eq!(outcome.created, 20);
        for request in provider.bulk_requests() {
            for submitted in request.documents {
                assert!(!submitted.source.contains_key("codigo_postal"));
                assert!(submitted.source.contains_key("nombre"));
            }
        }
        // The dataset itself is left untouched.
        assert!(documents.iter().all(|d| d.contains_key("codigo_postal")));
    }

    #[tokio::test]
    async fn test_duplicate_ids_fail_loudly() {
        let provider = provider_with_index("i").await;
        let ingestor = BulkIngestor::new(provider.clone());

        let documents = vec![
            doc(Some(json!("1")), &[("v", json!("first"))]),
            doc(Some(json!("1")), &[("v", json!("second"))]),
        ];

        let outcome = ingestor.ingest("i", &documents, &BTreeSet::new()).await;

        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.errored, 1);
        assert_eq!(outcome.failures[0].position, 1);
        assert_eq!(outcome.failures[0].id.as_deref(), Some("1"));
        assert_eq!(
            outcome.failures[0].reason["type"],
            "version_conflict_engine_exception"
        );
        assert_eq!(provider.documents("i")[0]["v"], "first");
    }

    #[tokio::test]
    async fn test_failed_chunk_does_not_stop_ingestion() {
        let provider = Arc::new(InMemorySearchProvider::new().fail_bulk_calls([1]));
        provider.create_index("i", &json!({})).await.unwrap();
        let ingestor = BulkIngestor::with_config(
            provider.clone(),
            IngestorConfig {
                chunk_size: 10,
                ..Default::default()
            },
        );

        let documents: Vec<Document> = (0..30).map(|i| doc(Some(json!(i)), &[])).collect();

        let outcome = ingestor.ingest("i", &documents, &BTreeSet::new()).await;

        assert_eq!(outcome.processed, 30);
        assert_eq!(outcome.created, 20);
        assert_eq!(outcome.errored, 10);
        assert_eq!(
            outcome.failures.iter().map(|f| f.position).collect::<Vec<_>>(),
            (10..20).collect::<Vec<_>>()
        );
        assert_eq!(outcome.failures[0].reason["type"], "bulk_request_failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_chunk_counts_as_errors() {
        let provider =
            Arc::new(InMemorySearchProvider::new().with_bulk_delay(Duration::from_secs(60)));
        provider.create_index("i", &json!({})).await.unwrap();
        let ingestor = BulkIngestor::with_config(
            provider.clone(),
            IngestorConfig {
                chunk_size: 5,
                request_timeout: Duration::from_secs(1),
            },
        );

        let documents: Vec<Document> = (0..10).map(|i| doc(Some(json!(i)), &[])).collect();

        let outcome = ingestor.ingest("i", &documents, &BTreeSet::new()).await;

        assert_eq!(outcome.processed, 10);
        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.errored, 10);
        assert_eq!(provider.bulk_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let provider = provider_with_index("i").await;
        let ingestor = BulkIngestor::new(provider.clone());

        let outcome = ingestor.ingest("i", &[], &BTreeSet::new()).await;

        assert_eq!(outcome, IngestionOutcome::default());
        assert!(provider.bulk_requests().is_empty());
    }
}
