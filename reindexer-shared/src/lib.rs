//! # Reindexer Shared
//!
//! This crate defines the data structures shared across the reindexer crates:
//! the fetched [`Dataset`] and its [`Document`]s, the versioned [`IndexId`]
//! used as a physical index name, and the per-collection
//! [`CollectionDescriptor`].

pub mod types;

pub use types::collection::{CollectionDescriptor, DEFAULT_DOCS_KEY};
pub use types::dataset::{Dataset, DatasetError, Document};
pub use types::index_id::{IndexId, IndexIdError};
