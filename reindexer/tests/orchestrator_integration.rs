//! Integration tests for the reindex orchestrator.
//!
//! These tests use the real Orchestrator with the in-memory search provider
//! and the mock source fetcher, and write snapshots to temporary directories.

use std::path::Path;
use std::sync::Arc;

use reindexer::errors::ReindexError;
use reindexer::fetcher::MockSourceFetcher;
use reindexer::ingestor::IngestorConfig;
use reindexer::notifier::NotificationMessage;
use reindexer::orchestrator::{
    BatchReport, CollectionOutcome, Orchestrator, OrchestratorConfig, SkipReason, SourceKind,
};
use reindexer_repository::{AliasAction, InMemorySearchProvider, SearchIndexProvider};
use reindexer_shared::{CollectionDescriptor, IndexId};
use serde_json::{json, Value};
use tempfile::TempDir;

const PROVINCES_URL: &str = "https://example.org/provincias.json";
const STREETS_URL: &str = "https://example.org/calles.json";

const T1: i64 = 1546300800;
const T2: i64 = 1548979200;

fn provinces(timestamp: i64, version: &str, count: usize) -> Value {
    json!({
        "timestamp": timestamp,
        "version": version,
        "fuente": "IGN",
        "entidades": (0..count)
            .map(|i| json!({"id": format!("{:02}", i), "nombre": format!("Provincia {}", i)}))
            .collect::<Vec<_>>()
    })
}

fn streets(timestamp: i64, count: usize) -> Value {
    json!({
        "timestamp": timestamp,
        "version": "2.0.0",
        "vias": (0..count)
            .map(|i| json!({
                "id": format!("0200701{:06}", i),
                "nombre": format!("Calle {}", i),
                "codigo_postal": {"inicio": 1000 + i}
            }))
            .collect::<Vec<_>>()
    })
}

struct Harness {
    dir: TempDir,
    provider: Arc<InMemorySearchProvider>,
    fetcher: Arc<MockSourceFetcher>,
    orchestrator: Orchestrator,
}

impl Harness {
    fn new(provider: InMemorySearchProvider) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let backups = dir.path().join("backups");
        let provider = Arc::new(provider);
        let fetcher = Arc::new(MockSourceFetcher::new().reading_local_files());

        let collections = vec![
            CollectionDescriptor::new("provincias", PROVINCES_URL, backups.join("provincias.json"))
                .with_mapping(json!({"properties": {"nombre": {"type": "text"}}})),
            CollectionDescriptor::new("calles", STREETS_URL, backups.join("calles.json"))
                .with_excludes(["codigo_postal"])
                .with_docs_key("vias"),
        ];

        let orchestrator = Orchestrator::with_config(
            provider.clone(),
            fetcher.clone(),
            collections,
            OrchestratorConfig {
                backups_dir: backups,
                ingestor: IngestorConfig {
                    chunk_size: 10,
                    ..Default::default()
                },
                ..Default::default()
            },
        );

        Self {
            dir,
            provider,
            fetcher,
            orchestrator,
        }
    }

    fn snapshot_path(&self, alias: &str) -> std::path::PathBuf {
        self.dir.path().join("backups").join(format!("{}.json", alias))
    }

    fn snapshot(&self, alias: &str) -> Option<Value> {
        read_json(&self.snapshot_path(alias))
    }

    fn alias_target(&self, alias: &str) -> String {
        let targets = self.provider.alias_targets(alias);
        assert_eq!(targets.len(), 1, "alias {} targets {:?}", alias, targets);
        targets[0].clone()
    }
}

fn read_json(path: &Path) -> Option<Value> {
    std::fs::read(path)
        .ok()
        .map(|bytes| serde_json::from_slice(&bytes).unwrap())
}

fn outcome<'a>(report: &'a BatchReport, alias: &str) -> &'a CollectionOutcome {
    &report.collection(alias).unwrap().outcome
}

#[tokio::test]
async fn test_first_run_builds_indices_and_snapshots() {
    let h = Harness::new(InMemorySearchProvider::new());
    h.fetcher.insert_json(PROVINCES_URL, &provinces(T1, "2.0.0", 24));
    h.fetcher.insert_json(STREETS_URL, &streets(T1, 35));

    let report = h.orchestrator.run(false).await;

    assert!(!report.has_failures());
    assert_eq!(report.total_processed(), 59);
    assert_eq!(report.total_created(), 59);

    let index = h.alias_target("provincias");
    assert_eq!(IndexId::parse(&index).unwrap().timestamp(), T1);
    assert_eq!(report.collection("provincias").unwrap().index.as_deref(), Some(index.as_str()));
    assert_eq!(h.provider.documents(&index).len(), 24);
    assert_eq!(
        h.provider.index_body(&index).unwrap()["mappings"],
        json!({"properties": {"nombre": {"type": "text"}}})
    );

    // Streets are submitted without postal codes.
    let streets_index = h.alias_target("calles");
    assert!(h
        .provider
        .documents(&streets_index)
        .iter()
        .all(|doc| !doc.contains_key("codigo_postal")));

    assert_eq!(h.snapshot("provincias"), Some(provinces(T1, "2.0.0", 24)));
    // The snapshot keeps the full payload, excluded fields included.
    assert_eq!(h.snapshot("calles"), Some(streets(T1, 35)));
}

#[tokio::test]
async fn test_stale_then_newer_data() {
    let h = Harness::new(InMemorySearchProvider::new());
    h.fetcher.insert_json(PROVINCES_URL, &provinces(T1, "2.0.0", 3));
    h.fetcher.insert_json(STREETS_URL, &streets(T1, 3));

    h.orchestrator.run(false).await;
    let first_index = h.alias_target("provincias");
    let first_snapshot_modified = std::fs::metadata(h.snapshot_path("provincias"))
        .unwrap()
        .modified()
        .unwrap();

    // Same data again: nothing changes.
    let report = h.orchestrator.run(false).await;
    assert_eq!(
        outcome(&report, "provincias"),
        &CollectionOutcome::Skipped(SkipReason::Stale)
    );
    assert_eq!(h.alias_target("provincias"), first_index);
    assert_eq!(h.provider.index_names().len(), 2);
    assert_eq!(
        std::fs::metadata(h.snapshot_path("provincias"))
            .unwrap()
            .modified()
            .unwrap(),
        first_snapshot_modified
    );
    assert!(!report.has_failures());
    assert_eq!(report.warning_count(), 2);

    // Newer data: swap and drop the previous index.
    h.fetcher.insert_json(PROVINCES_URL, &provinces(T2, "2.0.0", 4));
    let report = h.orchestrator.run(false).await;

    assert!(matches!(
        outcome(&report, "provincias"),
        CollectionOutcome::Ok {
            source: SourceKind::Primary,
            snapshot_written: true,
            ..
        }
    ));
    let second_index = h.alias_target("provincias");
    assert_ne!(second_index, first_index);
    assert_eq!(IndexId::parse(&second_index).unwrap().timestamp(), T2);
    assert!(!h.provider.index_names().contains(&first_index));
    assert_eq!(
        h.provider.alias_requests().last().unwrap(),
        &vec![
            AliasAction::remove(&first_index, "provincias"),
            AliasAction::add(&second_index, "provincias"),
        ]
    );
    assert_eq!(h.snapshot("provincias").unwrap()["timestamp"], T2);
    assert_eq!(
        outcome(&report, "calles"),
        &CollectionOutcome::Skipped(SkipReason::Stale)
    );
}

#[tokio::test]
async fn test_forced_run_rebuilds_same_data() {
    let h = Harness::new(InMemorySearchProvider::new());
    h.fetcher.insert_json(PROVINCES_URL, &provinces(T1, "2.0.0", 3));
    h.fetcher.insert_json(STREETS_URL, &streets(T1, 3));

    h.orchestrator.run(false).await;
    let first_index = h.alias_target("provincias");

    let report = h.orchestrator.run(true).await;

    assert!(matches!(
        outcome(&report, "provincias"),
        CollectionOutcome::Ok {
            source: SourceKind::Primary,
            ..
        }
    ));
    let second_index = h.alias_target("provincias");
    assert_ne!(second_index, first_index);
    assert_eq!(IndexId::parse(&second_index).unwrap().timestamp(), T1);
}

#[tokio::test]
async fn test_forced_run_falls_back_to_backup() {
    let h = Harness::new(InMemorySearchProvider::new());
    h.fetcher.insert_json(PROVINCES_URL, &provinces(T1, "2.0.0", 5));
    h.fetcher.insert_json(STREETS_URL, &streets(T1, 5));
    h.orchestrator.run(false).await;
    let snapshot_before = std::fs::read(h.snapshot_path("provincias")).unwrap();

    h.fetcher.remove(PROVINCES_URL);
    let report = h.orchestrator.run(true).await;

    match outcome(&report, "provincias") {
        CollectionOutcome::Ok {
            source,
            ingestion,
            snapshot_written,
        } => {
            assert_eq!(*source, SourceKind::Backup);
            assert_eq!(ingestion.created, 5);
            assert!(!snapshot_written);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(
        std::fs::read(h.snapshot_path("provincias")).unwrap(),
        snapshot_before
    );
    assert!(h
        .fetcher
        .fetched()
        .contains(&h.snapshot_path("provincias").to_string_lossy().into_owned()));
    assert!(!report.has_failures());
}

#[tokio::test]
async fn test_forced_run_without_backup_fails() {
    let h = Harness::new(InMemorySearchProvider::new());
    h.fetcher.insert_json(STREETS_URL, &streets(T1, 2));

    let report = h.orchestrator.run(true).await;

    assert!(matches!(
        outcome(&report, "provincias"),
        CollectionOutcome::Failed {
            error: ReindexError::Fetch(_),
            ..
        }
    ));
    assert!(matches!(outcome(&report, "calles"), CollectionOutcome::Ok { .. }));
    assert!(report.has_failures());
    assert!(h.provider.alias_targets("provincias").is_empty());
}

#[tokio::test]
async fn test_incompatible_version_leaves_alias_untouched() {
    let h = Harness::new(InMemorySearchProvider::new().with_index("provincias-aaaaaaaa-1", "provincias"));
    h.fetcher.insert_json(PROVINCES_URL, &provinces(T2, "1.0.0", 3));
    h.fetcher.insert_json(STREETS_URL, &streets(T2, 3));

    let report = h.orchestrator.run(false).await;

    assert_eq!(
        outcome(&report, "provincias"),
        &CollectionOutcome::Skipped(SkipReason::IncompatibleVersion)
    );
    assert_eq!(h.alias_target("provincias"), "provincias-aaaaaaaa-1");
    assert!(h.provider.deleted_indices().is_empty());
    assert!(h.snapshot("provincias").is_none());
    assert!(matches!(outcome(&report, "calles"), CollectionOutcome::Ok { .. }));
}

#[tokio::test]
async fn test_empty_and_unavailable_sources_are_skipped() {
    let h = Harness::new(InMemorySearchProvider::new());
    h.fetcher.insert_json(PROVINCES_URL, &provinces(T1, "2.0.0", 0));
    h.fetcher.insert(STREETS_URL, "not json");

    let report = h.orchestrator.run(false).await;

    assert_eq!(
        outcome(&report, "provincias"),
        &CollectionOutcome::Skipped(SkipReason::EmptyDataset)
    );
    assert_eq!(
        outcome(&report, "calles"),
        &CollectionOutcome::Skipped(SkipReason::SourceUnavailable)
    );
    assert!(h.provider.index_names().is_empty());
    assert!(!report.has_failures());
}

#[tokio::test]
async fn test_engine_failure_in_one_collection_does_not_stop_others() {
    // The first bulk call belongs to provincias.
    let h = Harness::new(InMemorySearchProvider::new().fail_bulk_calls([0]));
    h.fetcher.insert_json(PROVINCES_URL, &provinces(T1, "2.0.0", 15));
    h.fetcher.insert_json(STREETS_URL, &streets(T1, 5));

    let report = h.orchestrator.run(false).await;

    match outcome(&report, "provincias") {
        CollectionOutcome::Ok { ingestion, .. } => {
            assert_eq!(ingestion.processed, 15);
            assert_eq!(ingestion.created, 5);
            assert_eq!(ingestion.errored, 10);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(matches!(outcome(&report, "calles"), CollectionOutcome::Ok { .. }));
    assert_eq!(report.warning_count(), 10);
}

#[tokio::test]
async fn test_notification_summarises_run() {
    let h = Harness::new(InMemorySearchProvider::new());
    h.fetcher.insert_json(PROVINCES_URL, &provinces(T1, "1.9.0", 3));

    let report = h.orchestrator.run(true).await;
    let message = NotificationMessage::from_report("staging", &report);

    // Neither collection has a usable primary source nor a snapshot to fall back to.
    assert_eq!(report.error_count(), 2);
    assert_eq!(report.warning_count(), 2);
    assert_eq!(
        message.subject,
        "Reindex [staging] Index - Errors: 2 - Warnings: 2"
    );
    assert_eq!(message.body, "Data reindex run. Forced mode: true");
    assert_eq!(message.attachments[0].content, report.log.render());
}

#[tokio::test]
async fn test_cluster_overview_lists_aliases() {
    let h = Harness::new(InMemorySearchProvider::new());
    h.fetcher.insert_json(PROVINCES_URL, &provinces(T1, "2.0.0", 2));
    h.fetcher.insert_json(STREETS_URL, &streets(T1, 2));
    h.orchestrator.run(false).await;

    let overview = h.provider.describe_cluster().await.unwrap();

    assert!(overview
        .aliases
        .contains(&format!("provincias {}", h.alias_target("provincias"))));
    assert!(overview.indices.lines().count() >= 3);
}
