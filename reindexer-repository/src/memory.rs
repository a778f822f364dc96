//! In-memory search index provider for testing and local runs.
//!
//! `InMemorySearchProvider` keeps indices, documents and aliases in process
//! memory and records every request it receives, so tests can inspect the
//! exact payloads submitted and inject failures at each step.
//!
//! # Example
//!
//! ```ignore
//! use reindexer_repository::{InMemorySearchProvider, SearchIndexProvider};
//!
//! let provider = InMemorySearchProvider::new().with_index("provincias-0000aaaa-1", "provincias");
//! assert_eq!(
//!     provider.resolve_alias("provincias").await?,
//!     Some("provincias-0000aaaa-1".to_string())
//! );
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use reindexer_shared::Document;
use serde_json::{json, Value};

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{
    AliasAction, BatchOperationResult, BatchOperationSummary, ClusterOverview,
    CreateDocumentRequest,
};

/// A recorded bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedBulk {
    pub index: String,
    pub documents: Vec<CreateDocumentRequest>,
}

#[derive(Debug, Default)]
struct State {
    /// Physical index name -> creation body and documents.
    indices: BTreeMap<String, StoredIndex>,
    /// Alias -> indices it points to.
    aliases: BTreeMap<String, BTreeSet<String>>,
    bulk_requests: Vec<RecordedBulk>,
    alias_requests: Vec<Vec<AliasAction>>,
    deleted: Vec<String>,
}

#[derive(Debug, Default, Clone)]
struct StoredIndex {
    body: Value,
    documents: BTreeMap<String, Document>,
}

#[derive(Debug, Default)]
struct Faults {
    create_index: bool,
    delete_index: bool,
    /// Fail the alias update after applying this many actions to the staged state.
    alias_update_after: Option<usize>,
    /// Apply alias updates, then report them as failed.
    alias_response_lost: bool,
    /// Fail alias lookups once this many succeeded.
    alias_lookups_after: Option<usize>,
    alias_lookups: usize,
    /// Bulk calls (0-based) that fail as a whole.
    failing_bulk_calls: BTreeSet<usize>,
    /// Delay applied to bulk calls, used to trigger timeouts.
    bulk_delay: Option<Duration>,
    bulk_calls: usize,
}

/// In-memory provider with failure injection.
#[derive(Debug, Default)]
pub struct InMemorySearchProvider {
    state: Mutex<State>,
    faults: Mutex<Faults>,
}

impl InMemorySearchProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create an index and point `alias` at it.
    pub fn with_index(self, index: impl Into<String>, alias: impl Into<String>) -> Self {
        {
            let mut state = self.lock_state();
            let index = index.into();
            state.indices.insert(index.clone(), StoredIndex::default());
            state.aliases.entry(alias.into()).or_default().insert(index);
        }
        self
    }

    /// Make every index creation fail.
    pub fn fail_create_index(self) -> Self {
        self.lock_faults().create_index = true;
        self
    }

    /// Make every index deletion fail.
    pub fn fail_delete_index(self) -> Self {
        self.lock_faults().delete_index = true;
        self
    }

    /// Make alias updates fail after `applied` actions were staged.
    ///
    /// The staged state is discarded, as a real engine does with a rejected
    /// `_aliases` request.
    pub fn fail_alias_update_after(self, applied: usize) -> Self {
        self.lock_faults().alias_update_after = Some(applied);
        self
    }

    /// Apply every alias update but answer it with an error, as when the
    /// connection drops after the engine committed the request.
    pub fn lose_alias_update_responses(self) -> Self {
        self.lock_faults().alias_response_lost = true;
        self
    }

    /// Make alias lookups fail once `succeeded` lookups went through.
    pub fn fail_alias_lookups_after(self, succeeded: usize) -> Self {
        self.lock_faults().alias_lookups_after = Some(succeeded);
        self
    }

    /// Make the given bulk calls (0-based, in call order) fail as a whole.
    pub fn fail_bulk_calls(self, calls: impl IntoIterator<Item = usize>) -> Self {
        self.lock_faults().failing_bulk_calls.extend(calls);
        self
    }

    /// Delay every bulk call.
    pub fn with_bulk_delay(self, delay: Duration) -> Self {
        self.lock_faults().bulk_delay = Some(delay);
        self
    }

    /// Indices the alias currently points to.
    pub fn alias_targets(&self, alias: &str) -> Vec<String> {
        self.lock_state()
            .aliases
            .get(alias)
            .map(|targets| targets.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of all existing indices.
    pub fn index_names(&self) -> Vec<String> {
        self.lock_state().indices.keys().cloned().collect()
    }

    /// Creation body of an index.
    pub fn index_body(&self, index: &str) -> Option<Value> {
        self.lock_state().indices.get(index).map(|i| i.body.clone())
    }

    /// Documents stored in an index.
    pub fn documents(&self, index: &str) -> Vec<Document> {
        self.lock_state()
            .indices
            .get(index)
            .map(|i| i.documents.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every bulk request received, in order.
    pub fn bulk_requests(&self) -> Vec<RecordedBulk> {
        self.lock_state().bulk_requests.clone()
    }

    /// Every alias update request received, in order.
    pub fn alias_requests(&self) -> Vec<Vec<AliasAction>> {
        self.lock_state().alias_requests.clone()
    }

    /// Indices deleted so far, in order.
    pub fn deleted_indices(&self) -> Vec<String> {
        self.lock_state().deleted.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply_alias_action(
        aliases: &mut BTreeMap<String, BTreeSet<String>>,
        indices: &BTreeMap<String, StoredIndex>,
        action: &AliasAction,
    ) -> Result<(), SearchIndexError> {
        match action {
            AliasAction::Add { index, alias } => {
                if !indices.contains_key(index) {
                    return Err(SearchIndexError::alias(format!("no such index [{}]", index)));
                }
                aliases.entry(alias.clone()).or_default().insert(index.clone());
            }
            AliasAction::Remove { index, alias } => {
                let removed = aliases
                    .get_mut(alias)
                    .map(|targets| targets.remove(index))
                    .unwrap_or(false);
                if !removed {
                    return Err(SearchIndexError::alias(format!(
                        "aliases [{}] missing on index [{}]",
                        alias, index
                    )));
                }
                if aliases.get(alias).is_some_and(BTreeSet::is_empty) {
                    aliases.remove(alias);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndexProvider for InMemorySearchProvider {
    async fn resolve_alias(&self, alias: &str) -> Result<Option<String>, SearchIndexError> {
        {
            let mut faults = self.lock_faults();
            if faults.alias_lookups_after == Some(faults.alias_lookups) {
                return Err(SearchIndexError::connection("Injected alias lookup failure"));
            }
            faults.alias_lookups += 1;
        }

        Ok(self
            .lock_state()
            .aliases
            .get(alias)
            .and_then(|targets| targets.iter().next().cloned()))
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), SearchIndexError> {
        if self.lock_faults().create_index {
            return Err(SearchIndexError::index_creation("Injected create failure"));
        }

        let mut state = self.lock_state();
        if state.indices.contains_key(index) {
            return Err(SearchIndexError::index_creation(format!(
                "resource_already_exists_exception: index [{}] already exists",
                index
            )));
        }
        state.indices.insert(
            index.to_string(),
            StoredIndex {
                body: body.clone(),
                documents: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), SearchIndexError> {
        if self.lock_faults().delete_index {
            return Err(SearchIndexError::index_deletion("Injected delete failure"));
        }

        let mut state = self.lock_state();
        if state.indices.remove(index).is_none() {
            return Err(SearchIndexError::index_deletion(format!(
                "index_not_found_exception: [{}]",
                index
            )));
        }
        for targets in state.aliases.values_mut() {
            targets.remove(index);
        }
        state.aliases.retain(|_, targets| !targets.is_empty());
        state.deleted.push(index.to_string());
        Ok(())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), SearchIndexError> {
        let (fail_after, response_lost) = {
            let faults = self.lock_faults();
            (faults.alias_update_after, faults.alias_response_lost)
        };

        let mut state = self.lock_state();
        state.alias_requests.push(actions.to_vec());

        // Stage on a copy; commit only when every action applied.
        let mut staged = state.aliases.clone();
        for (applied, action) in actions.iter().enumerate() {
            if fail_after == Some(applied) {
                return Err(SearchIndexError::alias("Injected alias update failure"));
            }
            Self::apply_alias_action(&mut staged, &state.indices, action)?;
        }

        state.aliases = staged;
        if response_lost {
            return Err(SearchIndexError::alias("Connection reset by peer"));
        }
        Ok(())
    }

    async fn bulk_create(
        &self,
        index: &str,
        documents: &[CreateDocumentRequest],
        timeout: Duration,
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        let (call, fail, delay) = {
            let mut faults = self.lock_faults();
            let call = faults.bulk_calls;
            faults.bulk_calls += 1;
            (
                call,
                faults.failing_bulk_calls.contains(&call),
                faults.bulk_delay,
            )
        };

        self.lock_state().bulk_requests.push(RecordedBulk {
            index: index.to_string(),
            documents: documents.to_vec(),
        });

        if let Some(delay) = delay {
            if delay >= timeout {
                tokio::time::sleep(timeout).await;
                return Err(SearchIndexError::Timeout(timeout.as_secs()));
            }
            tokio::time::sleep(delay).await;
        }

        if fail {
            return Err(SearchIndexError::bulk_index(format!(
                "Injected failure on bulk call {}",
                call
            )));
        }

        let mut state = self.lock_state();
        let stored = state.indices.get_mut(index).ok_or_else(|| {
            SearchIndexError::bulk_index(format!("index_not_found_exception: [{}]", index))
        })?;

        let results = documents
            .iter()
            .map(|doc| {
                if stored.documents.contains_key(&doc.id) {
                    BatchOperationResult::failed(
                        &doc.id,
                        json!({
                            "type": "version_conflict_engine_exception",
                            "reason": format!("[{}]: version conflict, document already exists", doc.id)
                        }),
                    )
                } else {
                    stored.documents.insert(doc.id.clone(), doc.source.clone());
                    BatchOperationResult::created(&doc.id)
                }
            })
            .collect();

        Ok(BatchOperationSummary::from_results(results))
    }

    async fn describe_cluster(&self) -> Result<ClusterOverview, SearchIndexError> {
        let state = self.lock_state();

        let mut indices = String::from("index docs.count\n");
        for (name, index) in &state.indices {
            indices.push_str(&format!("{} {}\n", name, index.documents.len()));
        }

        let mut aliases = String::from("alias index\n");
        for (alias, targets) in &state.aliases {
            for target in targets {
                aliases.push_str(&format!("{} {}\n", alias, target));
            }
        }

        Ok(ClusterOverview {
            indices,
            aliases,
            nodes: String::from("name\nin-memory\n"),
        })
    }
}
