//! Dependency initialization and wiring for the reindexer.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::collections::build_collections;
use crate::fetcher::LocationFetcher;
use crate::ingestor::IngestorConfig;
use crate::notifier::{LogNotifier, Notifier};
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::snapshot::SnapshotStore;
use crate::swap::CleanupPolicy;
use crate::validator;
use crate::IndexingError;
use reindexer_repository::{OpenSearchProvider, SearchIndexProvider};

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Default environment name shown in notifications.
const DEFAULT_ENV: &str = "dev";

/// Default snapshot directory.
const DEFAULT_BACKUPS_DIR: &str = "backups";

/// Connection mode for OpenSearch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection until successful.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if not set or invalid.
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "retry".to_string())
            .to_lowercase()
            .as_str()
        {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Settings read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub opensearch_url: String,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    /// Environment name shown in notifications.
    pub env: String,
    pub backups_dir: PathBuf,
    pub mappings_dir: Option<PathBuf>,
    pub ingestor: IngestorConfig,
    pub cleanup_policy: CleanupPolicy,
    pub notify_enabled: bool,
}

impl Settings {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `OPENSEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - `REINDEX_ENV`: Environment name used in notifications (default: dev)
    /// - `BACKUPS_DIR`: Snapshot directory (default: backups)
    /// - `MAPPINGS_DIR`: Directory holding `{alias}.json` mappings (optional)
    /// - `BULK_CHUNK_SIZE`: Documents per bulk request (default: 500)
    /// - `BULK_REQUEST_TIMEOUT_SECS`: Bulk request timeout (default: 500)
    /// - `ORPHAN_INDEX_POLICY`: "warn" or "escalate" (default: warn)
    /// - `NOTIFY_ENABLED`: Send the run notification (default: false)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which resolves a variable name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, IndexingError> {
        let defaults = IngestorConfig::default();

        let chunk_size = parse_var(&lookup, "BULK_CHUNK_SIZE")?.unwrap_or(defaults.chunk_size);
        if chunk_size == 0 {
            return Err(IndexingError::config("BULK_CHUNK_SIZE must be greater than 0"));
        }
        let request_timeout = parse_var(&lookup, "BULK_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let cleanup_policy = match lookup("ORPHAN_INDEX_POLICY") {
            Some(value) => value.parse().map_err(IndexingError::config)?,
            None => CleanupPolicy::default(),
        };

        let notify_enabled = lookup("NOTIFY_ENABLED")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            opensearch_url: lookup("OPENSEARCH_URL")
                .unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string()),
            connection_mode: ConnectionMode::parse(lookup("OPENSEARCH_CONNECTION_MODE")),
            retry_interval: Duration::from_secs(
                lookup("OPENSEARCH_RETRY_INTERVAL_SECS")
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_INTERVAL_SECS),
            ),
            env: lookup("REINDEX_ENV").unwrap_or_else(|| DEFAULT_ENV.to_string()),
            backups_dir: lookup("BACKUPS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUPS_DIR)),
            mappings_dir: lookup("MAPPINGS_DIR").map(PathBuf::from),
            ingestor: IngestorConfig {
                chunk_size,
                request_timeout,
            },
            cleanup_policy,
            notify_enabled,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, IndexingError>
where
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| IndexingError::config(format!("Invalid {}: {}", key, e)))
        })
        .transpose()
}

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The search engine client.
    pub provider: Arc<dyn SearchIndexProvider>,
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    /// Run notifier, when notifications are enabled.
    pub notifier: Option<Arc<dyn Notifier>>,
    /// Environment name shown in notifications.
    pub env: String,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// Collection sources are read from `STATES_FILE`, `DEPARTMENTS_FILE`,
    /// `MUNICIPALITIES_FILE`, `LOCALITIES_FILE` and `STREETS_FILE`; see
    /// [`Settings::from_env`] for the rest.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If initialization fails (only in fail-fast mode
    ///   for connection errors)
    pub async fn new() -> Result<Self, IndexingError> {
        let settings = Settings::from_env()?;

        info!(
            opensearch_url = %settings.opensearch_url,
            connection_mode = ?settings.connection_mode,
            retry_interval_secs = settings.retry_interval.as_secs(),
            env = %settings.env,
            backups_dir = %settings.backups_dir.display(),
            chunk_size = settings.ingestor.chunk_size,
            request_timeout_secs = settings.ingestor.request_timeout.as_secs(),
            cleanup_policy = ?settings.cleanup_policy,
            "Initializing dependencies"
        );

        let snapshots = SnapshotStore::new(settings.backups_dir.clone());
        let collections = build_collections(
            |key| env::var(key).ok(),
            &snapshots,
            settings.mappings_dir.as_deref(),
        )?;
        info!(collection_count = collections.len(), "Collections configured");

        // Initialize OpenSearch provider with retry logic
        let provider: Arc<dyn SearchIndexProvider> = Arc::new(
            Self::connect_to_opensearch(
                &settings.opensearch_url,
                settings.connection_mode,
                settings.retry_interval,
            )
            .await?,
        );

        info!("OpenSearch connection established");

        let fetcher = LocationFetcher::new()
            .map_err(|e| IndexingError::config(format!("Failed to create fetcher: {}", e)))?;

        let orchestrator = Orchestrator::with_config(
            provider.clone(),
            Arc::new(fetcher),
            collections,
            OrchestratorConfig {
                expected_major: validator::expected_major().to_string(),
                backups_dir: settings.backups_dir.clone(),
                ingestor: settings.ingestor.clone(),
                cleanup_policy: settings.cleanup_policy,
            },
        );

        let notifier: Option<Arc<dyn Notifier>> = if settings.notify_enabled {
            Some(Arc::new(LogNotifier))
        } else {
            None
        };

        Ok(Self {
            provider,
            orchestrator,
            notifier,
            env: settings.env,
        })
    }

    /// Connect to OpenSearch with retry logic based on connection mode.
    async fn connect_to_opensearch(
        url: &str,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<OpenSearchProvider, IndexingError> {
        loop {
            match OpenSearchProvider::new(url).await {
                Ok(provider) => return Ok(provider),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(IndexingError::config(format!(
                            "Failed to connect to OpenSearch: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to OpenSearch, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }
}
