//! Error types for the reindexer.

use reindexer_repository::SearchIndexError;
use reindexer_shared::DatasetError;
use thiserror::Error;

use crate::fetcher::FetchError;

/// Errors that stop a single collection's reindex attempt.
///
/// None of these abort a batch run: the orchestrator contains them per
/// collection and reports them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReindexError {
    /// The source could not be read.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The payload is malformed.
    #[error("Parse error: {0}")]
    Parse(#[from] DatasetError),

    /// The dataset's major version differs from the supported one.
    #[error("Incompatible dataset version {found} (expected major {expected})")]
    IncompatibleVersion { expected: String, found: String },

    /// The dataset carries no documents.
    #[error("No data to index")]
    EmptyDataset,

    /// The candidate index is not newer than the aliased one.
    #[error("Index {current} is identical or more recent than {candidate}")]
    StaleData { candidate: String, current: String },

    /// An engine call failed.
    #[error("Engine error: {0}")]
    Engine(#[from] SearchIndexError),

    /// Ingestion finished without creating a single document.
    #[error("None of the {processed} documents were indexed")]
    NothingIndexed { processed: usize },

    /// The collection pipeline panicked.
    #[error("Unexpected failure: {0}")]
    Panicked(String),

    /// The snapshot could not be written.
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl ReindexError {
    /// Create a snapshot error.
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    /// Whether the error means the source data could not be used.
    ///
    /// These are the failures that send a forced run to the backup source.
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            Self::Fetch(_)
                | Self::Parse(_)
                | Self::IncompatibleVersion { .. }
                | Self::EmptyDataset
                | Self::StaleData { .. }
        )
    }
}
