//! Collection descriptors.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde_json::Value;

/// Default key under which documents are nested in a dataset payload.
pub const DEFAULT_DOCS_KEY: &str = "entidades";

/// Immutable configuration of one logical dataset.
///
/// Descriptors are built once at startup and shared read-only by the
/// orchestrator; each one owns its alias, source, snapshot path and mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDescriptor {
    /// Stable alias readers query (e.g. "provincias").
    pub alias: String,
    /// Primary source location: an http(s) URL or a local path.
    pub source: String,
    /// Local snapshot file used as backup source.
    pub backup_path: PathBuf,
    /// Document mapping sent on index creation.
    pub mapping: Value,
    /// Document fields never sent to the engine.
    pub excludes: BTreeSet<String>,
    /// Key under which documents are nested in the payload.
    pub docs_key: String,
}

impl CollectionDescriptor {
    /// Create a descriptor with an empty mapping, no excluded fields and the
    /// default docs key.
    pub fn new(
        alias: impl Into<String>,
        source: impl Into<String>,
        backup_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            alias: alias.into(),
            source: source.into(),
            backup_path: backup_path.into(),
            mapping: Value::Object(Default::default()),
            excludes: BTreeSet::new(),
            docs_key: DEFAULT_DOCS_KEY.to_string(),
        }
    }

    /// Set the document mapping.
    pub fn with_mapping(mut self, mapping: Value) -> Self {
        self.mapping = mapping;
        self
    }

    /// Set the excluded document fields.
    pub fn with_excludes<I, S>(mut self, excludes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = excludes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the docs key.
    pub fn with_docs_key(mut self, docs_key: impl Into<String>) -> Self {
        self.docs_key = docs_key.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let descriptor = CollectionDescriptor::new("provincias", "a", "b");
        assert_eq!(descriptor.docs_key, DEFAULT_DOCS_KEY);
        assert!(descriptor.excludes.is_empty());
        assert_eq!(descriptor.mapping, json!({}));
    }
}
