//! # Reindexer Repository
//!
//! This crate provides the trait and implementations used to drive the write
//! path of a search engine: index creation and deletion, alias resolution and
//! atomic alias updates, and bulk document creation. It includes the error
//! type, request/response types, a concrete OpenSearch implementation and an
//! in-memory implementation for tests and local runs.

pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod types;

pub use errors::SearchIndexError;
pub use interfaces::SearchIndexProvider;
pub use memory::InMemorySearchProvider;
pub use opensearch::OpenSearchProvider;
pub use types::{
    AliasAction, BatchOperationResult, BatchOperationSummary, ClusterOverview,
    CreateDocumentRequest,
};
