//! Versioned physical index identifiers.
//!
//! Every reindex creates a fresh physical index named
//! `{alias}-{token}-{timestamp}`. The random token keeps names unique when the
//! same dataset is indexed twice; the timestamp is the dataset generation time
//! and is the only component used to compare freshness.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Length of the random token embedded in index names.
pub const TOKEN_LEN: usize = 8;

/// Errors raised when reading an index name back into an [`IndexId`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndexIdError {
    /// The name does not follow the `{alias}-{token}-{timestamp}` layout.
    #[error("Index name '{0}' is not a versioned index name")]
    Malformed(String),
}

/// Identifier of a physical, versioned index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexId {
    alias: String,
    token: String,
    timestamp: i64,
}

impl IndexId {
    /// Generate a new identifier for `alias` holding data generated at `timestamp`.
    pub fn generate(alias: impl Into<String>, timestamp: i64) -> Self {
        let token = Uuid::new_v4().simple().to_string()[..TOKEN_LEN].to_string();
        Self {
            alias: alias.into(),
            token,
            timestamp,
        }
    }

    /// Build an identifier from its parts.
    pub fn from_parts(alias: impl Into<String>, token: impl Into<String>, timestamp: i64) -> Self {
        Self {
            alias: alias.into(),
            token: token.into(),
            timestamp,
        }
    }

    /// Read an identifier back from a physical index name.
    ///
    /// The alias itself may contain dashes, so the name is split from the right.
    ///
    /// # Example
    ///
    /// ```
    /// use reindexer_shared::IndexId;
    ///
    /// let id = IndexId::parse("calles-1a2b3c4d-1546300800").unwrap();
    /// assert_eq!(id.alias(), "calles");
    /// assert_eq!(id.timestamp(), 1546300800);
    /// ```
    pub fn parse(name: &str) -> Result<Self, IndexIdError> {
        let malformed = || IndexIdError::Malformed(name.to_string());

        let mut parts = name.rsplitn(3, '-');
        let timestamp = parts
            .next()
            .and_then(|ts| ts.parse::<i64>().ok())
            .ok_or_else(malformed)?;
        let token = parts.next().filter(|t| !t.is_empty()).ok_or_else(malformed)?;
        let alias = parts.next().filter(|a| !a.is_empty()).ok_or_else(malformed)?;

        Ok(Self::from_parts(alias, token, timestamp))
    }

    /// The alias this index is built for.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The random collision-avoidance token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The dataset generation time embedded in the identifier.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// The embedded timestamp as a UTC date, when in range.
    pub fn generated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    /// The physical index name.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.alias, self.token, self.timestamp)
    }
}
