//! # Reindexer
//!
//! Zero-downtime reindexer for geographic reference datasets (provinces,
//! departments, municipalities, localities and streets) stored in OpenSearch.
//!
//! ## Architecture
//!
//! Every collection is served through a stable alias. A reindex builds a new
//! versioned index next to the live one and repoints the alias in a single
//! request once the new index is fully loaded:
//!
//! 1. **Fetcher**: Reads the dataset from its primary source or snapshot
//! 2. **Validator**: Checks the dataset version and contents
//! 3. **Freshness**: Decides whether the data is newer than the live index
//! 4. **Ingestor**: Bulk loads documents into the new index
//! 5. **Swap**: Repoints the alias and drops the previous index
//! 6. **Snapshot**: Keeps the last ingested dataset as a local backup
//! 7. **Orchestrator**: Coordinates the flow for every collection
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`fetcher`]: Dataset sources
//! - [`validator`]: Dataset compatibility checks
//! - [`freshness`]: Index freshness comparison
//! - [`ingestor`]: Bulk document ingestion
//! - [`swap`]: Alias swap coordination
//! - [`snapshot`]: Local dataset snapshots
//! - [`orchestrator`]: Coordinates the reindex flow
//! - [`notifier`]: Run notifications
//! - [`errors`]: Error types for the reindexer

pub mod config;
pub mod errors;
pub mod fetcher;
pub mod freshness;
pub mod ingestor;
pub mod notifier;
pub mod orchestrator;
pub mod snapshot;
pub mod swap;
pub mod validator;

pub use config::Dependencies;
pub use errors::ReindexError;

use reindexer_repository::SearchIndexError;
use thiserror::Error;

/// Errors that can occur during reindexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Search engine error outside of a collection run.
    #[error("Search engine error: {0}")]
    EngineError(#[from] SearchIndexError),

    /// The run finished with errors.
    #[error("Reindex run finished with {0} errors")]
    RunFailed(usize),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
