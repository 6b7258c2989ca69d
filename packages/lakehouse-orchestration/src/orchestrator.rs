//! Lake orchestration entrypoints
//!
//! `run_full`: silver (all) → gold (all) → store (all).
//! `run_subset`: changed files → sources → silver (files) → gold (targets)
//! → store (targets). A subset run never falls back to a full one.

use crate::error::{OrchestratorError, Result};
use crate::pipeline::{GoldStage, IndexStage, SilverStage, StoreStage};
use lakehouse_etl::features::gold::targets_for_sources;
use lakehouse_etl::{Dataset, GoldTarget, StageReport};
use lakehouse_store::search::IndexSummary;
use lakehouse_store::sync::SyncReport;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Full,
    Subset,
}

/// What one phase of a run produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", content = "report", rename_all = "snake_case")]
pub enum Phase {
    Silver(StageReport),
    Gold(StageReport),
    Store(SyncReport),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub ok: bool,
    /// Changed raw file names, sorted
    pub changed: Vec<String>,
    /// Sources the changed files map to, sorted
    pub sources: Vec<String>,
    /// Gold targets rebuilt by this run, sorted
    pub gold_synced: Vec<String>,
    pub phases: Vec<Phase>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    fn new(mode: RunMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            ok: true,
            changed: Vec::new(),
            sources: Vec::new(),
            gold_synced: Vec::new(),
            phases: Vec::new(),
            duration_ms: 0,
            error: None,
        }
    }

    fn finish(mut self, start: Instant) -> Self {
        self.duration_ms = start.elapsed().as_millis() as u64;
        self
    }
}

/// A full run and the search refresh that followed it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullRefresh {
    pub summary: RunSummary,
    /// `None` when no indexer was given or the run failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexSummary>,
}

/// Basename of each changed path, deduplicated and sorted
pub fn normalize_changed<S: AsRef<str>>(changed_files: &[S]) -> Vec<String> {
    changed_files
        .iter()
        .filter_map(|f| {
            Path::new(f.as_ref().trim())
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sources for the given file names; unknown names are warned about and dropped
pub fn sources_for_files(files: &[String]) -> Vec<String> {
    let mut sources = BTreeSet::new();
    for name in files {
        match Dataset::from_file_name(name) {
            Some(dataset) => {
                sources.insert(dataset.source().to_string());
            }
            None => warn!("[runner] {} does not map to a known source; ignored", name),
        }
    }
    sources.into_iter().collect()
}

pub struct Orchestrator {
    silver: Arc<dyn SilverStage>,
    gold: Arc<dyn GoldStage>,
    store: Option<Arc<dyn StoreStage>>,
}

impl Orchestrator {
    pub fn new(silver: Arc<dyn SilverStage>, gold: Arc<dyn GoldStage>) -> Self {
        Self {
            silver,
            gold,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn StoreStage>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Everything, unconditionally. Requires a store.
    pub async fn run_full(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let store = self.store.as_ref().ok_or_else(|| {
            lakehouse_etl::ConfigError::missing("relational store", "SUPABASE_DB_URL")
        })?;
        let mut summary = RunSummary::new(RunMode::Full);

        info!("[runner] full run {}", summary.run_id);
        summary.phases.push(Phase::Silver(self.silver.run_full()?));
        let gold = self.gold.run_full()?;
        summary.gold_synced = gold_names(&gold);
        summary.phases.push(Phase::Gold(gold));

        match store.sync(None).await {
            Ok(report) => summary.phases.push(Phase::Store(report)),
            Err(e) => {
                error!("[runner] store sync failed: {}", e);
                summary.ok = false;
                summary.error = Some(format!("store sync failed: {}", e));
            }
        }
        Ok(summary.finish(start))
    }

    /// `run_full`, then refresh the search index if the run succeeded
    pub async fn run_full_then_index(
        &self,
        indexer: Option<&dyn IndexStage>,
    ) -> Result<FullRefresh> {
        let summary = self.run_full().await?;
        let index = match indexer {
            Some(indexer) if summary.ok => Some(indexer.index().await?),
            Some(_) => {
                warn!("[runner] full run failed; search index not refreshed");
                None
            }
            None => None,
        };
        Ok(FullRefresh { summary, index })
    }

    /// Only what the changed raw files affect
    pub async fn run_subset<S: AsRef<str>>(&self, changed_files: &[S]) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::new(RunMode::Subset);
        summary.changed = normalize_changed(changed_files);
        summary.sources = sources_for_files(&summary.changed);
        info!("[runner] affected sources: {:?}", summary.sources);

        if summary.sources.is_empty() {
            info!("[runner] no sources to process (no-op)");
            return Ok(summary.finish(start));
        }

        let silver = self
            .silver
            .selective()
            .ok_or_else(|| OrchestratorError::missing_capability("silver"))?;
        let gold = self
            .gold
            .selective()
            .ok_or_else(|| OrchestratorError::missing_capability("gold"))?;

        summary
            .phases
            .push(Phase::Silver(silver.run_files(&summary.changed)?));

        let targets = targets_for_sources(&summary.sources);
        info!(
            "[runner] gold targets: {:?}",
            targets.iter().map(|t| t.name()).collect::<Vec<_>>()
        );
        if targets.is_empty() {
            info!("[runner] no gold targets to process (no-op)");
            return Ok(summary.finish(start));
        }

        let report = gold.run_targets(&targets)?;
        summary.gold_synced = target_names(&targets);
        summary.phases.push(Phase::Gold(report));

        if let Some(store) = &self.store {
            match store.sync(Some(summary.gold_synced.as_slice())).await {
                Ok(report) => summary.phases.push(Phase::Store(report)),
                Err(e) => {
                    error!("[runner] store sync failed: {}", e);
                    summary.ok = false;
                    summary.error = Some(format!("store sync failed: {}", e));
                }
            }
        }
        info!("[runner] gold synced: {:?}", summary.gold_synced);
        Ok(summary.finish(start))
    }
}

fn target_names(targets: &[GoldTarget]) -> Vec<String> {
    let names: BTreeSet<String> = targets.iter().map(|t| t.name().to_string()).collect();
    names.into_iter().collect()
}

fn gold_names(report: &StageReport) -> Vec<String> {
    let names: BTreeSet<String> = report.written().into_iter().map(str::to_string).collect();
    names.into_iter().collect()
}
