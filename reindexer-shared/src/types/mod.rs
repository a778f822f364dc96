//! This module defines the core data structures used across the reindexer.
//! It re-exports `Dataset`, `Document`, `IndexId` and `CollectionDescriptor`.

pub mod collection;
pub mod dataset;
pub mod index_id;

pub use collection::{CollectionDescriptor, DEFAULT_DOCS_KEY};
pub use dataset::{Dataset, DatasetError, Document};
pub use index_id::{IndexId, IndexIdError};
