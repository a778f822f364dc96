//! Run log and batch report.
//!
//! The orchestrator records every notable event of a run in a [`RunLog`] and
//! every collection's outcome in a [`BatchReport`]. Both feed the run
//! notification.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{error, info, warn};

use crate::errors::ReindexError;
use crate::ingestor::IngestionOutcome;

/// Severity of a run log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One entry of the run log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    /// Collection alias, or `None` for run-wide entries.
    pub collection: Option<String>,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - ",
            self.at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.level
        )?;
        if let Some(collection) = &self.collection {
            write!(f, "[{}] ", collection)?;
        }
        write!(f, "{}", self.message)
    }
}

/// Collector for the events of a run.
///
/// Every entry is also emitted through `tracing`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunLog {
    entries: Vec<LogEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, collection: Option<&str>, message: impl Into<String>) {
        self.push(LogLevel::Info, collection, message.into());
    }

    pub fn warn(&mut self, collection: Option<&str>, message: impl Into<String>) {
        self.push(LogLevel::Warning, collection, message.into());
    }

    pub fn error(&mut self, collection: Option<&str>, message: impl Into<String>) {
        self.push(LogLevel::Error, collection, message.into());
    }

    fn push(&mut self, level: LogLevel, collection: Option<&str>, message: String) {
        let alias = collection.unwrap_or("-");
        match level {
            LogLevel::Info => info!(alias = %alias, "{}", message),
            LogLevel::Warning => warn!(alias = %alias, "{}", message),
            LogLevel::Error => error!(alias = %alias, "{}", message),
        }
        self.entries.push(LogEntry {
            at: Utc::now(),
            level,
            collection: collection.map(str::to_string),
            message,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of entries at `level`.
    pub fn count(&self, level: LogLevel) -> usize {
        self.entries.iter().filter(|e| e.level == level).count()
    }

    /// Render the log as text, one entry per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        out
    }
}

/// Where the indexed data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Primary,
    Backup,
}

/// Why a collection was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The aliased index is as recent as the fetched data.
    Stale,
    IncompatibleVersion,
    EmptyDataset,
    /// The source could not be fetched or parsed.
    SourceUnavailable,
}

impl SkipReason {
    /// Skip reason for a source failure, if the error is one.
    pub fn from_error(error: &ReindexError) -> Option<Self> {
        match error {
            ReindexError::StaleData { .. } => Some(Self::Stale),
            ReindexError::IncompatibleVersion { .. } => Some(Self::IncompatibleVersion),
            ReindexError::EmptyDataset => Some(Self::EmptyDataset),
            ReindexError::Fetch(_) | ReindexError::Parse(_) => Some(Self::SourceUnavailable),
            ReindexError::Engine(_)
            | ReindexError::NothingIndexed { .. }
            | ReindexError::Panicked(_)
            | ReindexError::Snapshot(_) => None,
        }
    }
}

/// Stage of a collection pipeline.
///
/// The terminal states are the [`CollectionOutcome`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexStage {
    FetchingPrimary,
    FetchingBackup,
    Validating,
    Comparing,
    CreatingIndex,
    Ingesting,
    Swapping,
    Cleanup,
}

impl fmt::Display for ReindexStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FetchingPrimary => "fetching primary",
            Self::FetchingBackup => "fetching backup",
            Self::Validating => "validating",
            Self::Comparing => "comparing",
            Self::CreatingIndex => "creating index",
            Self::Ingesting => "ingesting",
            Self::Swapping => "swapping",
            Self::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Final outcome of one collection.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionOutcome {
    /// The alias now points to a freshly built index.
    Ok {
        source: SourceKind,
        ingestion: IngestionOutcome,
        snapshot_written: bool,
    },
    /// Nothing changed for this collection.
    Skipped(SkipReason),
    /// The pipeline stopped at `stage`.
    Failed {
        stage: ReindexStage,
        error: ReindexError,
    },
}

/// Report of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionReport {
    pub alias: String,
    /// Index the alias points to after the run, when it was rebuilt.
    pub index: Option<String>,
    pub outcome: CollectionOutcome,
}

/// Report of a whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub forced: bool,
    pub collections: Vec<CollectionReport>,
    /// Previous indices that could not be deleted after a swap.
    pub orphaned_indices: Vec<String>,
    pub log: RunLog,
}

impl BatchReport {
    pub fn new(forced: bool) -> Self {
        Self {
            forced,
            ..Default::default()
        }
    }

    /// Report of a collection by alias.
    pub fn collection(&self, alias: &str) -> Option<&CollectionReport> {
        self.collections.iter().find(|c| c.alias == alias)
    }

    fn ingestions(&self) -> impl Iterator<Item = &IngestionOutcome> {
        self.collections.iter().filter_map(|c| match &c.outcome {
            CollectionOutcome::Ok { ingestion, .. } => Some(ingestion),
            _ => None,
        })
    }

    pub fn total_processed(&self) -> usize {
        self.ingestions().map(|i| i.processed).sum()
    }

    pub fn total_created(&self) -> usize {
        self.ingestions().map(|i| i.created).sum()
    }

    pub fn total_errored(&self) -> usize {
        self.ingestions().map(|i| i.errored).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.log.count(LogLevel::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.log.count(LogLevel::Error)
    }

    /// Whether any collection failed or any error was logged.
    pub fn has_failures(&self) -> bool {
        self.error_count() > 0
            || self
                .collections
                .iter()
                .any(|c| matches!(c.outcome, CollectionOutcome::Failed { .. }))
    }
}
