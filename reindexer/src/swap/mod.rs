//! Alias swap coordination.
//!
//! Repoints a stable alias from the previous physical index to a freshly
//! built one in a single alias update request. Dropping the previous index
//! is a separate cleanup step that never undoes the swap.

use std::str::FromStr;
use std::sync::Arc;

use reindexer_repository::{AliasAction, SearchIndexError, SearchIndexProvider};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// What to do when the previous index cannot be deleted after a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPolicy {
    /// Log a warning and report the orphaned index.
    #[default]
    Warn,
    /// Log an error and count the orphaned index as a run error.
    Escalate,
}

impl FromStr for CleanupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "escalate" | "error" => Ok(Self::Escalate),
            other => Err(format!("unknown orphan index policy '{}'", other)),
        }
    }
}

/// Result of the cleanup that follows a swap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupOutcome {
    /// Previous index left behind because its deletion failed.
    pub orphaned: Option<String>,
}

/// Why an alias swap did not go through.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SwapError {
    /// The alias update failed and the alias does not point to the new index.
    #[error("{0}")]
    Rejected(SearchIndexError),

    /// The alias update failed and the alias could not be read back, so it
    /// may already point to the new index.
    #[error("{error} (alias could not be verified: {lookup})")]
    Unverified {
        error: SearchIndexError,
        lookup: SearchIndexError,
    },
}

impl SwapError {
    /// Whether the new index is known to be unreferenced by the alias.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// The error returned by the alias update.
    pub fn into_engine_error(self) -> SearchIndexError {
        match self {
            Self::Rejected(error) | Self::Unverified { error, .. } => error,
        }
    }
}

/// Coordinates alias swaps against a search engine.
pub struct AliasSwapCoordinator {
    provider: Arc<dyn SearchIndexProvider>,
    policy: CleanupPolicy,
}

impl AliasSwapCoordinator {
    pub fn new(provider: Arc<dyn SearchIndexProvider>, policy: CleanupPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn policy(&self) -> CleanupPolicy {
        self.policy
    }

    /// Point `alias` at `new_index`, detaching it from `old_index`.
    ///
    /// The removal and the addition are sent as one request, so readers
    /// observe either the old or the new index. A failed request may still
    /// have been applied by the engine, so the alias is read back before the
    /// failure is reported: when it already points to `new_index` the swap
    /// counts as done.
    #[instrument(skip(self))]
    pub async fn swap(
        &self,
        alias: &str,
        new_index: &str,
        old_index: Option<&str>,
    ) -> Result<(), SwapError> {
        let mut actions = Vec::with_capacity(2);
        if let Some(old) = old_index {
            actions.push(AliasAction::remove(old, alias));
        }
        actions.push(AliasAction::add(new_index, alias));

        if let Err(e) = self.provider.update_aliases(&actions).await {
            match self.provider.resolve_alias(alias).await {
                Ok(Some(bound)) if bound == new_index => {
                    warn!(
                        alias = %alias,
                        index = %new_index,
                        error = %e,
                        "Alias update reported an error but was applied"
                    );
                }
                Ok(_) => return Err(SwapError::Rejected(e)),
                Err(lookup) => return Err(SwapError::Unverified { error: e, lookup }),
            }
        }

        info!(alias = %alias, index = %new_index, "Alias now points to new index");
        Ok(())
    }

    /// Delete the index an alias pointed to before a swap.
    ///
    /// A failed deletion is logged according to the policy and the index
    /// name is returned in [`CleanupOutcome::orphaned`].
    #[instrument(skip(self), fields(policy = ?self.policy))]
    pub async fn cleanup(&self, old_index: &str) -> CleanupOutcome {
        match self.provider.delete_index(old_index).await {
            Ok(()) => {
                info!(index = %old_index, "Deleted previous index");
                CleanupOutcome::default()
            }
            Err(e) => {
                match self.policy {
                    CleanupPolicy::Warn => {
                        warn!(index = %old_index, error = %e, "Failed to delete previous index")
                    }
                    CleanupPolicy::Escalate => {
                        error!(index = %old_index, error = %e, "Failed to delete previous index")
                    }
                }
                CleanupOutcome {
                    orphaned: Some(old_index.to_string()),
                }
            }
        }
    }
}
