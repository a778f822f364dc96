//! The reference collections handled by the reindexer.

use std::path::Path;

use reindexer_shared::{CollectionDescriptor, DEFAULT_DOCS_KEY};
use serde_json::Value;
use tracing::warn;

use crate::snapshot::SnapshotStore;
use crate::IndexingError;

/// Static description of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    pub alias: &'static str,
    /// Environment variable holding the primary source location.
    pub source_var: &'static str,
    pub excludes: &'static [&'static str],
    pub docs_key: &'static str,
}

/// Collections in processing order.
pub const COLLECTIONS: &[CollectionSpec] = &[
    CollectionSpec {
        alias: "provincias",
        source_var: "STATES_FILE",
        excludes: &[],
        docs_key: DEFAULT_DOCS_KEY,
    },
    CollectionSpec {
        alias: "departamentos",
        source_var: "DEPARTMENTS_FILE",
        excludes: &[],
        docs_key: DEFAULT_DOCS_KEY,
    },
    CollectionSpec {
        alias: "municipios",
        source_var: "MUNICIPALITIES_FILE",
        excludes: &[],
        docs_key: DEFAULT_DOCS_KEY,
    },
    CollectionSpec {
        alias: "localidades",
        source_var: "LOCALITIES_FILE",
        excludes: &[],
        docs_key: DEFAULT_DOCS_KEY,
    },
    CollectionSpec {
        alias: "calles",
        source_var: "STREETS_FILE",
        excludes: &["codigo_postal"],
        docs_key: "vias",
    },
];

/// Build the descriptors of every collection with a configured source.
///
/// `lookup` resolves a variable name to its value. Collections without a
/// source are skipped with a warning. When `mappings_dir` is set, the mapping
/// of each collection is read from `{mappings_dir}/{alias}.json`.
pub fn build_collections(
    lookup: impl Fn(&str) -> Option<String>,
    snapshots: &SnapshotStore,
    mappings_dir: Option<&Path>,
) -> Result<Vec<CollectionDescriptor>, IndexingError> {
    let mut descriptors = Vec::with_capacity(COLLECTIONS.len());

    for spec in COLLECTIONS {
        let Some(source) = lookup(spec.source_var).filter(|s| !s.trim().is_empty()) else {
            warn!(
                alias = spec.alias,
                variable = spec.source_var,
                "No source configured, collection will not be indexed"
            );
            continue;
        };

        let mapping = match mappings_dir {
            Some(dir) => read_mapping(dir, spec.alias)?,
            None => Value::Object(Default::default()),
        };

        descriptors.push(
            CollectionDescriptor::new(spec.alias, source, snapshots.path_for(spec.alias))
                .with_mapping(mapping)
                .with_excludes(spec.excludes.iter().copied())
                .with_docs_key(spec.docs_key),
        );
    }

    Ok(descriptors)
}

fn read_mapping(dir: &Path, alias: &str) -> Result<Value, IndexingError> {
    let path = dir.join(format!("{}.json", alias));
    if !path.exists() {
        warn!(alias = alias, path = %path.display(), "Mapping file not found, using dynamic mapping");
        return Ok(Value::Object(Default::default()));
    }

    let bytes = std::fs::read(&path)
        .map_err(|e| IndexingError::config(format!("{}: {}", path.display(), e)))?;
    let mapping: Value = serde_json::from_slice(&bytes)
        .map_err(|e| IndexingError::config(format!("{}: {}", path.display(), e)))?;

    if !mapping.is_object() {
        return Err(IndexingError::config(format!(
            "{}: mapping must be a JSON object",
            path.display()
        )));
    }
    Ok(mapping)
}
