//! Request and response types for search engine operations.

use reindexer_shared::Document;
use serde::Serialize;
use serde_json::Value;

/// Request to create one document in a physical index.
///
/// Creation fails if a document with the same id already exists; it never
/// overwrites.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateDocumentRequest {
    /// Engine document id.
    pub id: String,
    /// Document source as submitted to the engine.
    pub source: Document,
}

/// One action of an atomic alias update.
///
/// Serializes to the `_aliases` action layout, e.g.
/// `{"add": {"index": "calles-1a2b3c4d-1546300800", "alias": "calles"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasAction {
    /// Attach `alias` to `index`.
    Add { index: String, alias: String },
    /// Detach `alias` from `index`.
    Remove { index: String, alias: String },
}

impl AliasAction {
    /// Create an add action.
    pub fn add(index: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Add {
            index: index.into(),
            alias: alias.into(),
        }
    }

    /// Create a remove action.
    pub fn remove(index: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Remove {
            index: index.into(),
            alias: alias.into(),
        }
    }
}

/// Result of a batch operation for a single document.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOperationResult {
    /// The document id.
    pub document_id: String,
    /// Whether the document was created.
    pub success: bool,
    /// Error reported by the engine if the operation failed.
    pub error: Option<Value>,
}

impl BatchOperationResult {
    /// A successful result.
    pub fn created(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            success: true,
            error: None,
        }
    }

    /// A failed result carrying the engine error.
    pub fn failed(document_id: impl Into<String>, error: Value) -> Self {
        Self {
            document_id: document_id.into(),
            success: false,
            error: Some(error),
        }
    }
}

/// Summary of a bulk operation containing aggregate statistics and
/// individual results, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOperationSummary {
    /// Total number of items in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each item.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// Build a summary from individual results.
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

/// Tabular overview of the cluster, as returned by the `_cat` APIs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterOverview {
    pub indices: String,
    pub aliases: String,
    pub nodes: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alias_action_json() {
        assert_eq!(
            serde_json::to_value(AliasAction::add("calles-abc-1", "calles")).unwrap(),
            json!({"add": {"index": "calles-abc-1", "alias": "calles"}})
        );
        assert_eq!(
            serde_json::to_value(AliasAction::remove("calles-abc-0", "calles")).unwrap(),
            json!({"remove": {"index": "calles-abc-0", "alias": "calles"}})
        );
    }

    #[test]
    fn test_summary_from_results() {
        let summary = BatchOperationSummary::from_results(vec![
            BatchOperationResult::created("1"),
            BatchOperationResult::failed("2", json!({"type": "version_conflict_engine_exception"})),
            BatchOperationResult::created("3"),
        ]);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
    }
}
