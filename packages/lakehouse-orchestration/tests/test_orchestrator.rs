//! Integration tests for full and subset runs
//!
//! - Subset scope follows the source → target map
//! - Missing selective capability is fatal and nothing runs
//! - Store failures are reported, not raised

use async_trait::async_trait;
use lakehouse_etl::{BronzeTransformer, GoldBuilder, StageReport};
use lakehouse_orchestration::{
    GoldStage, IndexStage, Orchestrator, OrchestratorError, Phase, SilverStage, StoreStage,
};
use lakehouse_store::search::IndexSummary;
use lakehouse_store::sync::{SyncReport, TableReport, TableStatus};
use lakehouse_store::StorageError;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const ORGANIZATION_CSV: &str = "\
projectId;organisationID;name;shortName;country;ecContribution;netEcContribution;role
101;900;Acme;ACM;BE;500;450;coordinator
102;901;Beta Labs;BL;FR;200;180;participant
";

const PROJECT_CSV: &str = "\
id;acronym;title;abstract;startDate;endDate;totalCost;ecMaxContribution;status;keywords
101;ALPHA;Alpha;About alpha;2021-01-01;2021-12-31;1000;900;SIGNED;alpha
";

struct Lake {
    dir: TempDir,
}

impl Lake {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("bronze")).unwrap();
        std::fs::write(dir.path().join("bronze/organization.csv"), ORGANIZATION_CSV).unwrap();
        std::fs::write(dir.path().join("bronze/project.csv"), PROJECT_CSV).unwrap();
        Self { dir }
    }

    fn silver(&self) -> Arc<BronzeTransformer> {
        Arc::new(BronzeTransformer::new(
            self.dir.path().join("bronze"),
            self.dir.path().join("silver"),
        ))
    }

    fn gold(&self) -> Arc<GoldBuilder> {
        Arc::new(GoldBuilder::new(self.dir.path().join("silver"), self.dir.path().join("gold")).unwrap())
    }

    fn gold_exists(&self, name: &str) -> bool {
        self.dir.path().join("gold").join(format!("{}.arrow", name)).is_file()
    }
}

/// Records sync calls; optionally fails
#[derive(Default)]
struct RecordingStore {
    calls: Mutex<Vec<Option<Vec<String>>>>,
    fail: bool,
}

#[async_trait]
impl StoreStage for RecordingStore {
    async fn sync(&self, only: Option<&[String]>) -> lakehouse_orchestration::Result<SyncReport> {
        self.calls.lock().push(only.map(|o| o.to_vec()));
        if self.fail {
            return Err(StorageError::database("connection refused").into());
        }
        Ok(SyncReport {
            tables: only
                .unwrap_or_default()
                .iter()
                .map(|t| TableReport {
                    table: t.clone(),
                    rows: 1,
                    status: TableStatus::Loaded,
                })
                .collect(),
            indexes: Vec::new(),
        })
    }
}

#[derive(Default)]
struct CountingIndexer {
    runs: AtomicUsize,
}

#[async_trait]
impl IndexStage for CountingIndexer {
    async fn index(&self) -> lakehouse_orchestration::Result<IndexSummary> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(IndexSummary {
            indexed: 1,
            unchanged: 0,
            seconds: 0.0,
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        })
    }
}

/// A stage with only a full entrypoint
#[derive(Default)]
struct FullOnly {
    runs: AtomicUsize,
}

impl SilverStage for FullOnly {
    fn run_full(&self) -> lakehouse_orchestration::Result<StageReport> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(StageReport::default())
    }
}

impl GoldStage for FullOnly {
    fn run_full(&self) -> lakehouse_orchestration::Result<StageReport> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(StageReport::default())
    }
}

#[tokio::test]
async fn test_subset_builds_only_organization_targets() {
    let lake = Lake::new();
    let store = Arc::new(RecordingStore::default());
    let orchestrator = Orchestrator::new(lake.silver(), lake.gold()).with_store(store.clone());

    let summary = orchestrator.run_subset(&["organization.csv"]).await.unwrap();

    assert!(summary.ok);
    assert_eq!(summary.changed, vec!["organization.csv"]);
    assert_eq!(summary.sources, vec!["organizations"]);
    assert_eq!(
        summary.gold_synced,
        vec!["dim_country", "dim_organization", "fact_funding"]
    );
    assert!(lake.gold_exists("dim_organization"));
    assert!(!lake.gold_exists("dim_project"));
    assert!(!lake.gold_exists("dim_topic"));
    assert!(!lake.dir.path().join("silver/project.arrow").exists());

    let calls = store.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].as_deref(), Some(&summary.gold_synced[..]));
    assert!(matches!(summary.phases.last(), Some(Phase::Store(_))));
}

#[tokio::test]
async fn test_subset_with_paths_uses_basenames() {
    let lake = Lake::new();
    let orchestrator = Orchestrator::new(lake.silver(), lake.gold());
    let summary = orchestrator
        .run_subset(&["/somewhere/else/project.csv"])
        .await
        .unwrap();
    assert_eq!(summary.changed, vec!["project.csv"]);
    assert_eq!(summary.sources, vec!["projects"]);
    assert!(lake.gold_exists("dim_project"));
}

#[tokio::test]
async fn test_missing_capability_is_fatal_and_runs_nothing() {
    let full_only = Arc::new(FullOnly::default());
    let lake = Lake::new();
    let orchestrator = Orchestrator::new(full_only.clone(), lake.gold());

    let err = orchestrator.run_subset(&["organization.csv"]).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::MissingCapability { stage: "silver" }
    ));
    assert_eq!(full_only.runs.load(Ordering::SeqCst), 0);
    assert!(!lake.dir.path().join("silver").exists());
}

#[tokio::test]
async fn test_missing_gold_capability_runs_no_silver() {
    let lake = Lake::new();
    let full_only = Arc::new(FullOnly::default());
    let orchestrator = Orchestrator::new(lake.silver(), full_only.clone());

    let err = orchestrator.run_subset(&["project.csv"]).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::MissingCapability { stage: "gold" }));
    assert_eq!(full_only.runs.load(Ordering::SeqCst), 0);
    assert!(!lake.dir.path().join("silver/project.arrow").exists());
}

#[tokio::test]
async fn test_unknown_or_empty_changes_are_a_noop() {
    let full_only = Arc::new(FullOnly::default());
    let orchestrator = Orchestrator::new(full_only.clone(), full_only.clone());

    let summary = orchestrator.run_subset(&["unknown.csv"]).await.unwrap();
    assert!(summary.ok);
    assert!(summary.sources.is_empty());
    assert!(summary.phases.is_empty());

    let none: [&str; 0] = [];
    let summary = orchestrator.run_subset(&none).await.unwrap();
    assert!(summary.ok && summary.changed.is_empty());
    assert_eq!(full_only.runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_full_run_requires_store() {
    let lake = Lake::new();
    let orchestrator = Orchestrator::new(lake.silver(), lake.gold());
    let err = orchestrator.run_full().await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Config(_)));
    assert!(!lake.dir.path().join("silver").exists());
}

#[tokio::test]
async fn test_full_run_reports_store_failure() {
    let lake = Lake::new();
    let store = Arc::new(RecordingStore {
        fail: true,
        ..RecordingStore::default()
    });
    let orchestrator = Orchestrator::new(lake.silver(), lake.gold()).with_store(store.clone());

    let summary = orchestrator.run_full().await.unwrap();
    assert!(!summary.ok);
    assert!(summary.error.as_deref().unwrap().contains("connection refused"));
    assert_eq!(store.calls.lock().clone(), vec![None]);
    assert!(lake.gold_exists("dim_project"));
    assert!(lake.gold_exists("dim_organization"));
}

#[tokio::test]
async fn test_full_run_refreshes_search_index() {
    let lake = Lake::new();
    let store = Arc::new(RecordingStore::default());
    let indexer = CountingIndexer::default();
    let orchestrator = Orchestrator::new(lake.silver(), lake.gold()).with_store(store);

    let refresh = orchestrator.run_full_then_index(Some(&indexer)).await.unwrap();
    assert!(refresh.summary.ok);
    assert_eq!(refresh.index.map(|i| i.indexed), Some(1));
    assert_eq!(indexer.runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_full_run_skips_search_index() {
    let lake = Lake::new();
    let store = Arc::new(RecordingStore {
        fail: true,
        ..RecordingStore::default()
    });
    let indexer = CountingIndexer::default();
    let orchestrator = Orchestrator::new(lake.silver(), lake.gold()).with_store(store);

    let refresh = orchestrator.run_full_then_index(Some(&indexer)).await.unwrap();
    assert!(!refresh.summary.ok);
    assert!(refresh.index.is_none());
    assert_eq!(indexer.runs.load(Ordering::SeqCst), 0);
}
