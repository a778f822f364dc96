//! Configuration and dependency initialization.

pub mod collections;
mod dependencies;

pub use collections::{build_collections, CollectionSpec, COLLECTIONS};
pub use dependencies::{ConnectionMode, Dependencies, Settings};
