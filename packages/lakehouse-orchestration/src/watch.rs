//! Bronze sensor: detect → subset run → persist mtimes → index

use crate::change_detector::{detect_changes, scan_raw_dir};
use crate::error::Result;
use crate::orchestrator::{Orchestrator, RunSummary};
use crate::pipeline::IndexStage;
use crate::state_store::MtimeStore;
use lakehouse_store::search::IndexSummary;
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

pub const DEFAULT_POKE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cycle", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Nothing changed
    Idle,
    /// Another cycle was still running
    Busy,
    Ran {
        summary: RunSummary,
        #[serde(skip_serializing_if = "Option::is_none")]
        index: Option<IndexSummary>,
    },
}

pub struct BronzeWatcher {
    orchestrator: Arc<Orchestrator>,
    state: Arc<dyn MtimeStore>,
    raw_dir: PathBuf,
    indexer: Option<Arc<dyn IndexStage>>,
    interval: Duration,
    in_flight: Mutex<()>,
}

impl BronzeWatcher {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        state: Arc<dyn MtimeStore>,
        raw_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            orchestrator,
            state,
            raw_dir: raw_dir.into(),
            indexer: None,
            interval: DEFAULT_POKE_INTERVAL,
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_indexer(mut self, indexer: Arc<dyn IndexStage>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// One sensor cycle. Mtimes are saved only after a successful subset run.
    pub async fn run_cycle(&self, force: bool) -> Result<CycleOutcome> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!("[sensor] previous cycle still running; skipped");
            return Ok(CycleOutcome::Busy);
        };

        let previous = self.state.load()?;
        let current = scan_raw_dir(&self.raw_dir);
        let changes = detect_changes(&previous, &current, force);

        if changes.is_empty() {
            if force {
                info!("[sensor] forced, but no raw files present");
            } else {
                info!("[sensor] no changes; waiting for next poke");
                return Ok(CycleOutcome::Idle);
            }
        } else {
            info!("[sensor] changes in bronze: {:?}", changes.changed);
        }

        let summary = self.orchestrator.run_subset(&changes.changed).await?;
        if summary.ok {
            if let Err(e) = self.state.save(&changes.mtimes) {
                warn!("[mtimes] could not persist state: {}", e);
            } else {
                info!("[mtimes] state updated with {} entries", changes.mtimes.len());
            }
        } else {
            warn!("[sensor] run reported failure; mtimes left unchanged");
        }

        let index = match &self.indexer {
            Some(indexer) => Some(indexer.index().await?),
            None => None,
        };
        Ok(CycleOutcome::Ran { summary, index })
    }

    /// Run cycles every interval until `shutdown` resolves. Only the first
    /// cycle honours `force`. A failed cycle is logged and the loop goes on.
    pub async fn watch<F>(&self, force: bool, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        let mut force = force;

        info!("[sensor] watching {} every {:?}", self.raw_dir.display(), self.interval);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("[sensor] shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle(force).await {
                        error!("[sensor] cycle failed: {}", e);
                    }
                    force = false;
                }
            }
        }
    }
}
