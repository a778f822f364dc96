//! Orchestrator module for the reindexer.
//!
//! Runs the reindex pipeline of every configured collection:
//! fetch, validate, compare, create and ingest, swap, cleanup and snapshot,
//! with a fallback to the local snapshot in forced runs.

mod report;

pub use report::{
    BatchReport, CollectionOutcome, CollectionReport, LogEntry, LogLevel, ReindexStage, RunLog,
    SkipReason, SourceKind,
};

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use reindexer_repository::opensearch::index_body;
use reindexer_repository::SearchIndexProvider;
use reindexer_shared::{CollectionDescriptor, Dataset, IndexId};
use tracing::{debug, error, info, instrument, warn};

use crate::errors::ReindexError;
use crate::fetcher::SourceFetcher;
use crate::freshness::is_newer;
use crate::ingestor::{BulkIngestor, IngestionOutcome, IngestorConfig};
use crate::snapshot::SnapshotStore;
use crate::swap::{AliasSwapCoordinator, CleanupPolicy};
use crate::validator::{self, validate};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Major dataset version this build accepts.
    pub expected_major: String,
    /// Directory holding the collection snapshots.
    pub backups_dir: PathBuf,
    pub ingestor: IngestorConfig,
    pub cleanup_policy: CleanupPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            expected_major: validator::expected_major().to_string(),
            backups_dir: PathBuf::from("backups"),
            ingestor: IngestorConfig::default(),
            cleanup_policy: CleanupPolicy::default(),
        }
    }
}

/// A collection rebuilt into a new index.
struct Built {
    index: String,
    /// The fetched payload, as read from the source.
    payload: Vec<u8>,
    ingestion: IngestionOutcome,
}

/// Where and why a pipeline attempt stopped.
struct StageError {
    stage: ReindexStage,
    error: ReindexError,
}

trait AtStage<T> {
    fn at(self, stage: ReindexStage) -> Result<T, StageError>;
}

impl<T, E: Into<ReindexError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: ReindexStage) -> Result<T, StageError> {
        self.map_err(|e| StageError {
            stage,
            error: e.into(),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic without message".to_string())
}

/// Orchestrator that coordinates the reindex components.
///
/// Collections are processed one after another and independently: whatever
/// happens to one collection, a panic included, is recorded in the
/// [`BatchReport`] and the next collection is still attempted.
pub struct Orchestrator {
    provider: Arc<dyn SearchIndexProvider>,
    fetcher: Arc<dyn SourceFetcher>,
    collections: Vec<CollectionDescriptor>,
    config: OrchestratorConfig,
    ingestor: BulkIngestor,
    swapper: AliasSwapCoordinator,
    snapshots: SnapshotStore,
}

impl Orchestrator {
    /// Create a new orchestrator with the default configuration.
    pub fn new(
        provider: Arc<dyn SearchIndexProvider>,
        fetcher: Arc<dyn SourceFetcher>,
        collections: Vec<CollectionDescriptor>,
    ) -> Self {
        Self::with_config(provider, fetcher, collections, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        provider: Arc<dyn SearchIndexProvider>,
        fetcher: Arc<dyn SourceFetcher>,
        collections: Vec<CollectionDescriptor>,
        config: OrchestratorConfig,
    ) -> Self {
        let ingestor = BulkIngestor::with_config(provider.clone(), config.ingestor.clone());
        let swapper = AliasSwapCoordinator::new(provider.clone(), config.cleanup_policy);
        let snapshots = SnapshotStore::new(config.backups_dir.clone());

        Self {
            provider,
            fetcher,
            collections,
            config,
            ingestor,
            swapper,
            snapshots,
        }
    }

    pub fn collections(&self) -> &[CollectionDescriptor] {
        &self.collections
    }

    /// Run the reindex of every collection.
    ///
    /// With `forced` set, freshness is not checked and collections whose
    /// primary source cannot be used are rebuilt from their snapshot.
    #[instrument(skip(self))]
    pub async fn run(&self, forced: bool) -> BatchReport {
        let mut report = BatchReport::new(forced);
        report.log.info(
            None,
            format!(
                "Starting reindex of {} collections (forced: {})",
                self.collections.len(),
                forced
            ),
        );

        if let Err(e) = self.snapshots.ensure_dir().await {
            report
                .log
                .error(None, format!("Could not create backups directory: {}", e));
        }

        for descriptor in &self.collections {
            let mut stage = ReindexStage::FetchingPrimary;
            let pipeline = self.reindex_collection(descriptor, forced, &mut report, &mut stage);
            let result = AssertUnwindSafe(pipeline).catch_unwind().await;

            let collection = match result {
                Ok(collection) => collection,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(
                        alias = %descriptor.alias,
                        stage = %stage,
                        panic = %message,
                        "Collection pipeline panicked"
                    );
                    report.log.error(
                        Some(descriptor.alias.as_str()),
                        format!("Unexpected failure while {}: {}", stage, message),
                    );
                    CollectionReport {
                        alias: descriptor.alias.clone(),
                        index: None,
                        outcome: CollectionOutcome::Failed {
                            stage,
                            error: ReindexError::Panicked(message),
                        },
                    }
                }
            };
            report.collections.push(collection);
        }

        info!(
            forced,
            processed = report.total_processed(),
            created = report.total_created(),
            errored = report.total_errored(),
            warnings = report.warning_count(),
            errors = report.error_count(),
            "Reindex run finished"
        );
        report
    }

    /// Reindex one collection. `stage` follows the pipeline as it advances.
    #[instrument(skip_all, fields(alias = %descriptor.alias))]
    async fn reindex_collection(
        &self,
        descriptor: &CollectionDescriptor,
        forced: bool,
        report: &mut BatchReport,
        stage: &mut ReindexStage,
    ) -> CollectionReport {
        let alias = descriptor.alias.as_str();
        report
            .log
            .info(Some(alias), format!("Reindexing collection '{}'", alias));

        let primary = self
            .attempt(descriptor, SourceKind::Primary, !forced, report, stage)
            .await;

        let (index, outcome) = match primary {
            Ok(built) => {
                let snapshot_written = match self
                    .snapshots
                    .write(&descriptor.backup_path, &built.payload)
                    .await
                {
                    Ok(()) => true,
                    Err(e) => {
                        report.log.error(Some(alias), e.to_string());
                        false
                    }
                };
                (
                    Some(built.index),
                    CollectionOutcome::Ok {
                        source: SourceKind::Primary,
                        ingestion: built.ingestion,
                        snapshot_written,
                    },
                )
            }
            Err(failure) if failure.error.is_source_failure() && forced => {
                report.log.warn(
                    Some(alias),
                    format!(
                        "Could not index from primary source ({}); retrying with backup",
                        failure.error
                    ),
                );
                match self
                    .attempt(descriptor, SourceKind::Backup, false, report, stage)
                    .await
                {
                    // The backup already is the snapshot.
                    Ok(built) => (
                        Some(built.index),
                        CollectionOutcome::Ok {
                            source: SourceKind::Backup,
                            ingestion: built.ingestion,
                            snapshot_written: false,
                        },
                    ),
                    Err(failure) => {
                        report.log.error(
                            Some(alias),
                            format!(
                                "Could not index from backup while {}: {}",
                                failure.stage, failure.error
                            ),
                        );
                        (None, Self::failed(failure))
                    }
                }
            }
            Err(failure) => match SkipReason::from_error(&failure.error) {
                Some(reason) => {
                    report.log.warn(
                        Some(alias),
                        format!("Skipping index creation: {}", failure.error),
                    );
                    (None, CollectionOutcome::Skipped(reason))
                }
                None => {
                    report.log.error(
                        Some(alias),
                        format!("Reindex failed while {}: {}", failure.stage, failure.error),
                    );
                    (None, Self::failed(failure))
                }
            },
        };

        CollectionReport {
            alias: alias.to_string(),
            index,
            outcome,
        }
    }

    fn failed(failure: StageError) -> CollectionOutcome {
        CollectionOutcome::Failed {
            stage: failure.stage,
            error: failure.error,
        }
    }

    /// Run one pipeline attempt from `source`.
    async fn attempt(
        &self,
        descriptor: &CollectionDescriptor,
        source: SourceKind,
        check_freshness: bool,
        report: &mut BatchReport,
        stage: &mut ReindexStage,
    ) -> Result<Built, StageError> {
        let alias = descriptor.alias.as_str();
        let location = match source {
            SourceKind::Primary => {
                *stage = ReindexStage::FetchingPrimary;
                descriptor.source.clone()
            }
            SourceKind::Backup => {
                *stage = ReindexStage::FetchingBackup;
                descriptor.backup_path.to_string_lossy().into_owned()
            }
        };

        debug!(stage = %stage, location = %location, "Fetching dataset");
        let payload = self.fetcher.fetch(&location).await.at(*stage)?;
        let dataset = Dataset::from_slice(&payload, &descriptor.docs_key).at(*stage)?;

        *stage = ReindexStage::Validating;
        let dataset = validate(dataset, &self.config.expected_major).at(*stage)?;

        *stage = ReindexStage::Comparing;
        let current = self.provider.resolve_alias(alias).await.at(*stage)?;
        let candidate = IndexId::generate(alias, dataset.timestamp);

        if check_freshness {
            self.check_freshness(&candidate, current.as_deref(), report)
                .at(*stage)?;
        }

        *stage = ReindexStage::CreatingIndex;
        let index = candidate.name();
        report.log.info(
            Some(alias),
            format!(
                "Creating index '{}' ({} documents, generated at {})",
                index,
                dataset.documents.len(),
                candidate
                    .generated_at()
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| dataset.timestamp.to_string())
            ),
        );
        self.provider
            .create_index(&index, &index_body(&descriptor.mapping))
            .await
            .at(*stage)?;

        *stage = ReindexStage::Ingesting;
        let ingestion = self
            .ingestor
            .ingest(&index, &dataset.documents, &descriptor.excludes)
            .await;
        for failure in &ingestion.failures {
            report.log.warn(
                Some(alias),
                format!(
                    "Error processing document {} (position {}): {}",
                    failure.id.as_deref().unwrap_or("<no id>"),
                    failure.position,
                    failure.reason
                ),
            );
        }
        report.log.info(
            Some(alias),
            format!(
                "Documents processed: {}, created: {}, errors: {}",
                ingestion.processed, ingestion.created, ingestion.errored
            ),
        );

        // An empty index never replaces the one being served.
        if ingestion.created == 0 {
            self.discard(&index).await;
            return Err(StageError {
                stage: *stage,
                error: ReindexError::NothingIndexed {
                    processed: ingestion.processed,
                },
            });
        }

        *stage = ReindexStage::Swapping;
        if let Err(e) = self.swapper.swap(alias, &index, current.as_deref()).await {
            if e.is_rejected() {
                self.discard(&index).await;
            } else {
                report.log.warn(
                    Some(alias),
                    format!("Keeping index '{}': alias state unknown after {}", index, e),
                );
            }
            return Err(StageError {
                stage: *stage,
                error: e.into_engine_error().into(),
            });
        }
        report
            .log
            .info(Some(alias), format!("Alias '{}' now points to '{}'", alias, index));

        if let Some(old) = current.as_deref() {
            *stage = ReindexStage::Cleanup;
            if let Some(orphan) = self.swapper.cleanup(old).await.orphaned {
                let message = format!("Previous index '{}' could not be deleted", orphan);
                match self.swapper.policy() {
                    CleanupPolicy::Warn => report.log.warn(Some(alias), message),
                    CleanupPolicy::Escalate => report.log.error(Some(alias), message),
                }
                report.orphaned_indices.push(orphan);
            }
        }

        Ok(Built {
            index,
            payload,
            ingestion,
        })
    }

    /// Delete a new index the alias does not point to.
    async fn discard(&self, index: &str) {
        if let Err(e) = self.provider.delete_index(index).await {
            warn!(index = %index, error = %e, "Failed to delete unreferenced index");
        }
    }

    fn check_freshness(
        &self,
        candidate: &IndexId,
        current: Option<&str>,
        report: &mut BatchReport,
    ) -> Result<(), ReindexError> {
        let Some(current_name) = current else {
            return Ok(());
        };

        let current_id = match IndexId::parse(current_name) {
            Ok(id) => id,
            Err(e) => {
                report.log.warn(
                    Some(candidate.alias()),
                    format!("{}; treating new data as more recent", e),
                );
                return Ok(());
            }
        };

        if is_newer(candidate, Some(&current_id)) {
            Ok(())
        } else {
            Err(ReindexError::StaleData {
                candidate: candidate.name(),
                current: current_name.to_string(),
            })
        }
    }
}
