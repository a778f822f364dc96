//! Dataset compatibility checks.

use reindexer_shared::Dataset;

use crate::errors::ReindexError;

/// Version of the dataset files this build understands.
///
/// Bump it when the code is updated to read a new dataset layout.
pub const FILE_VERSION: &str = "2.0.0";

/// Major component of [`FILE_VERSION`].
pub fn expected_major() -> &'static str {
    FILE_VERSION.split('.').next().unwrap_or(FILE_VERSION)
}

/// Check that a dataset can be indexed by this build.
///
/// Only the major version must match; minor and patch differences are
/// accepted.
///
/// # Returns
///
/// * `Ok(Dataset)` - The dataset, unchanged
/// * `Err(ReindexError::IncompatibleVersion)` - Major version mismatch
/// * `Err(ReindexError::EmptyDataset)` - No documents to index
pub fn validate(dataset: Dataset, expected_major: &str) -> Result<Dataset, ReindexError> {
    if dataset.major_version() != Some(expected_major) {
        return Err(ReindexError::IncompatibleVersion {
            expected: expected_major.to_string(),
            found: dataset.version.clone(),
        });
    }

    if dataset.is_empty() {
        return Err(ReindexError::EmptyDataset);
    }

    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn dataset(version: &str, docs: usize) -> Dataset {
        let documents = (0..docs)
            .map(|i| {
                let mut doc = Map::new();
                doc.insert("id".to_string(), json!(i.to_string()));
                doc
            })
            .collect();
        Dataset::new(1546300800, version, "entidades", documents)
    }

    #[test]
    fn test_expected_major() {
        assert_eq!(expected_major(), "2");
    }

    #[test]
    fn test_same_major_accepted() {
        for version in ["2.0.0", "2.1.0", "2.0.7", "2.10.3"] {
            assert!(validate(dataset(version, 1), "2").is_ok(), "{}", version);
        }
    }

    #[test]
    fn test_major_mismatch_rejected() {
        let result = validate(dataset("1.0.0", 3), "2");
        assert_eq!(
            result.unwrap_err(),
            ReindexError::IncompatibleVersion {
                expected: "2".to_string(),
                found: "1.0.0".to_string(),
            }
        );

        assert!(matches!(
            validate(dataset("3.0.0", 3), "2"),
            Err(ReindexError::IncompatibleVersion { .. })
        ));
        assert!(matches!(
            validate(dataset("", 3), "2"),
            Err(ReindexError::IncompatibleVersion { .. })
        ));
        assert!(matches!(
            validate(dataset("20.0.0", 3), "2"),
            Err(ReindexError::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn test_empty_dataset() {
        assert_eq!(
            validate(dataset("2.0.0", 0), "2").unwrap_err(),
            ReindexError::EmptyDataset
        );
    }
}
