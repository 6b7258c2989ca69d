//! Silver → Gold
//!
//! Targets run in the topological order of [`GoldDag`]. A builder that owns
//! several targets runs at most once per invocation. Selective runs build
//! only the named targets; their dependencies are read from the gold
//! directory as they are.

pub mod builders;
pub mod dag;
pub mod keys;
pub mod targets;

pub use builders::BuildContext;
pub use dag::{GoldDag, TargetNode};
pub use targets::{targets_for_source, targets_for_sources, Builder, GoldTarget};

use crate::config::SurrogateKeys;
use crate::errors::Result;
use crate::shared::report::{OutputOutcome, StageReport};
use crate::shared::snapshot::SnapshotStore;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct GoldBuilder {
    silver: SnapshotStore,
    gold: SnapshotStore,
    keys: SurrogateKeys,
    dag: GoldDag,
}

impl GoldBuilder {
    pub fn new(silver_dir: impl Into<PathBuf>, gold_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            silver: SnapshotStore::new(silver_dir),
            gold: SnapshotStore::new(gold_dir),
            keys: SurrogateKeys::default(),
            dag: GoldDag::default_graph()?,
        })
    }

    pub fn with_keys(mut self, keys: SurrogateKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn dag(&self) -> &GoldDag {
        &self.dag
    }

    pub fn gold(&self) -> &SnapshotStore {
        &self.gold
    }

    /// Rebuild every target
    pub fn run_all(&self) -> Result<StageReport> {
        info!("[gold] full build\n{}", self.dag.execution_plan());
        self.execute(&self.dag.ordered())
    }

    /// Rebuild only `targets`, in dependency order
    pub fn run_targets(&self, targets: &[GoldTarget]) -> Result<StageReport> {
        let order = self.dag.ordered_subset(targets);
        info!(
            "[gold] selective build: {}",
            order.iter().map(|t| t.name()).collect::<Vec<_>>().join(", ")
        );
        self.execute(&order)
    }

    /// Rebuild the targets fed by the given sources
    pub fn run_for_sources<S: AsRef<str>>(&self, sources: &[S]) -> Result<StageReport> {
        self.run_targets(&targets_for_sources(sources))
    }

    fn execute(&self, order: &[GoldTarget]) -> Result<StageReport> {
        let ctx = BuildContext {
            silver: &self.silver,
            gold: &self.gold,
            keys: self.keys,
        };
        let mut report = StageReport::default();
        let mut ran: BTreeSet<Builder> = BTreeSet::new();

        for target in order {
            let builder = target.builder();
            if !ran.insert(builder) {
                debug!("[gold] {} already built by {}", target, builder.name());
                continue;
            }
            for (built, frame) in builders::run_builder(builder, &ctx)? {
                match frame {
                    Some(frame) => {
                        self.gold.write(built.name(), &frame)?;
                        info!("OK gold/{} ({} rows)", built, frame.len());
                        report.record(built.name(), OutputOutcome::Written { rows: frame.len() });
                    }
                    None => {
                        info!("[{}] no source", built);
                        report.record(built.name(), OutputOutcome::NoSource);
                    }
                }
            }
        }
        Ok(report)
    }
}
