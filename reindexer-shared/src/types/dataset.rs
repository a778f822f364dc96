//! Dataset payload types.
//!
//! A dataset is the JSON payload produced by the upstream ETL for one
//! collection. Besides the document list it carries a generation `timestamp`
//! and a `version` string used for compatibility checks.

use serde_json::{Map, Value};
use thiserror::Error;

/// A raw document as found in the dataset payload.
///
/// Field order is preserved so documents are submitted exactly as received.
pub type Document = Map<String, Value>;

/// Errors raised while reading a dataset payload.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DatasetError {
    /// The payload is not valid JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// The payload is valid JSON but not an object.
    #[error("Dataset payload must be a JSON object")]
    NotAnObject,

    /// A required top-level field is absent.
    #[error("Missing field '{0}'")]
    MissingField(String),

    /// A top-level field has the wrong type.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

impl DatasetError {
    fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// A fetched dataset.
///
/// The parsed view of a payload. Snapshots keep the payload bytes
/// themselves, so a dataset is never serialized back.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Data generation time, in unix seconds.
    pub timestamp: i64,
    /// Semantic version string ("major.minor.patch").
    pub version: String,
    /// Key under which the documents are nested in the payload.
    pub docs_key: String,
    /// The documents to index.
    pub documents: Vec<Document>,
    /// Remaining top-level payload fields.
    pub extra: Map<String, Value>,
}

impl Dataset {
    /// Build a dataset with no extra payload fields.
    pub fn new(
        timestamp: i64,
        version: impl Into<String>,
        docs_key: impl Into<String>,
        documents: Vec<Document>,
    ) -> Self {
        Self {
            timestamp,
            version: version.into(),
            docs_key: docs_key.into(),
            documents,
            extra: Map::new(),
        }
    }

    /// Parse a dataset from raw JSON bytes.
    ///
    /// # Arguments
    ///
    /// * `bytes` - The raw payload
    /// * `docs_key` - The key holding the document list (e.g. "entidades")
    pub fn from_slice(bytes: &[u8], docs_key: &str) -> Result<Self, DatasetError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| DatasetError::InvalidJson(e.to_string()))?;
        Self::from_value(value, docs_key)
    }

    /// Build a dataset from an already parsed JSON value.
    pub fn from_value(value: Value, docs_key: &str) -> Result<Self, DatasetError> {
        let Value::Object(mut payload) = value else {
            return Err(DatasetError::NotAnObject);
        };

        let timestamp = match payload.remove("timestamp") {
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| DatasetError::invalid_field("timestamp", "not an integer"))?,
            // Some producers emit the timestamp as a numeric string.
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|e| DatasetError::invalid_field("timestamp", e.to_string()))?,
            Some(_) => {
                return Err(DatasetError::invalid_field(
                    "timestamp",
                    "expected an integer",
                ))
            }
            None => return Err(DatasetError::MissingField("timestamp".to_string())),
        };

        let version = match payload.remove("version") {
            Some(Value::String(s)) => s,
            Some(_) => return Err(DatasetError::invalid_field("version", "expected a string")),
            None => return Err(DatasetError::MissingField("version".to_string())),
        };

        let documents = match payload.remove(docs_key) {
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(position, item)| match item {
                    Value::Object(doc) => Ok(doc),
                    _ => Err(DatasetError::invalid_field(
                        docs_key,
                        format!("item {} is not an object", position),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(DatasetError::invalid_field(docs_key, "expected an array")),
            None => return Err(DatasetError::MissingField(docs_key.to_string())),
        };

        Ok(Self {
            timestamp,
            version,
            docs_key: docs_key.to_string(),
            documents,
            extra: payload,
        })
    }

    /// The major component of the dataset version, if any.
    pub fn major_version(&self) -> Option<&str> {
        self.version
            .split('.')
            .next()
            .map(str::trim)
            .filter(|major| !major.is_empty())
    }

    /// Whether the dataset contains no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_slice_reads_fields() {
        let payload = json!({
            "timestamp": 1546300800,
            "version": "2.1.0",
            "fecha_creacion": "2019-01-01",
            "entidades": [
                {"id": "02", "nombre": "Ciudad Autónoma de Buenos Aires"},
                {"id": "06", "nombre": "Buenos Aires"}
            ]
        });

        let dataset =
            Dataset::from_slice(payload.to_string().as_bytes(), "entidades").unwrap();

        assert_eq!(dataset.timestamp, 1546300800);
        assert_eq!(dataset.version, "2.1.0");
        assert_eq!(dataset.documents.len(), 2);
        assert_eq!(dataset.documents[1]["nombre"], "Buenos Aires");
        assert_eq!(dataset.extra["fecha_creacion"], "2019-01-01");
    }

    #[test]
    fn test_extra_fields_are_kept() {
        let payload = json!({
            "timestamp": 10,
            "version": "2.0.0",
            "fuente": "INDEC",
            "vias": [{"id": "a", "codigo_postal": "1000"}]
        });

        let dataset = Dataset::from_value(payload, "vias").unwrap();

        assert_eq!(dataset.docs_key, "vias");
        assert_eq!(dataset.documents[0]["codigo_postal"], "1000");
        assert_eq!(dataset.extra.len(), 1);
        assert_eq!(dataset.extra["fuente"], "INDEC");
    }

    #[test]
    fn test_timestamp_as_numeric_string() {
        let payload = json!({"timestamp": "42", "version": "2.0.0", "entidades": []});
        let dataset = Dataset::from_value(payload, "entidades").unwrap();
        assert_eq!(dataset.timestamp, 42);
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_missing_docs_key() {
        let payload = json!({"timestamp": 1, "version": "2.0.0", "entidades": []});
        let result = Dataset::from_value(payload, "vias");
        assert_eq!(
            result.unwrap_err(),
            DatasetError::MissingField("vias".to_string())
        );
    }

    #[test]
    fn test_invalid_payloads() {
        assert!(matches!(
            Dataset::from_slice(b"not json", "entidades"),
            Err(DatasetError::InvalidJson(_))
        ));
        assert_eq!(
            Dataset::from_value(json!([1, 2]), "entidades").unwrap_err(),
            DatasetError::NotAnObject
        );
        assert!(matches!(
            Dataset::from_value(
                json!({"timestamp": 1.5, "version": "2.0.0", "entidades": []}),
                "entidades"
            ),
            Err(DatasetError::InvalidField { .. })
        ));
        assert!(matches!(
            Dataset::from_value(
                json!({"timestamp": 1, "version": "2.0.0", "entidades": [1]}),
                "entidades"
            ),
            Err(DatasetError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_major_version() {
        let mut dataset = Dataset::new(1, "2.3.4", "entidades", vec![]);
        assert_eq!(dataset.major_version(), Some("2"));

        dataset.version = "".to_string();
        assert_eq!(dataset.major_version(), None);
    }
}
