//! Stage seams used by the orchestrator
//!
//! Silver and gold stages always offer a full run. Partial execution is a
//! separate capability reached through `selective()`; a stage without it
//! returns `None` and the orchestrator refuses subset runs.

use crate::error::Result;
use async_trait::async_trait;
use lakehouse_etl::{BronzeTransformer, GoldBuilder, GoldTarget, StageReport};
use lakehouse_store::search::{IndexSummary, ProjectIndexer};
use lakehouse_store::sync::{GoldSynchronizer, SyncReport};

pub trait SilverStage: Send + Sync {
    fn run_full(&self) -> Result<StageReport>;

    fn selective(&self) -> Option<&dyn SelectiveSilverStage> {
        None
    }
}

pub trait SelectiveSilverStage: Send + Sync {
    /// Process only the named raw files
    fn run_files(&self, files: &[String]) -> Result<StageReport>;
}

pub trait GoldStage: Send + Sync {
    fn run_full(&self) -> Result<StageReport>;

    fn selective(&self) -> Option<&dyn SelectiveGoldStage> {
        None
    }
}

pub trait SelectiveGoldStage: Send + Sync {
    /// Build only `targets`, in dependency order
    fn run_targets(&self, targets: &[GoldTarget]) -> Result<StageReport>;
}

/// Loads gold tables into the relational store
#[async_trait]
pub trait StoreStage: Send + Sync {
    async fn sync(&self, only: Option<&[String]>) -> Result<SyncReport>;
}

/// Refreshes the project search index
#[async_trait]
pub trait IndexStage: Send + Sync {
    async fn index(&self) -> Result<IndexSummary>;
}

impl SilverStage for BronzeTransformer {
    fn run_full(&self) -> Result<StageReport> {
        Ok(self.run_all()?)
    }

    fn selective(&self) -> Option<&dyn SelectiveSilverStage> {
        Some(self)
    }
}

impl SelectiveSilverStage for BronzeTransformer {
    fn run_files(&self, files: &[String]) -> Result<StageReport> {
        Ok(BronzeTransformer::run_files(self, files)?)
    }
}

impl GoldStage for GoldBuilder {
    fn run_full(&self) -> Result<StageReport> {
        Ok(self.run_all()?)
    }

    fn selective(&self) -> Option<&dyn SelectiveGoldStage> {
        Some(self)
    }
}

impl SelectiveGoldStage for GoldBuilder {
    fn run_targets(&self, targets: &[GoldTarget]) -> Result<StageReport> {
        Ok(GoldBuilder::run_targets(self, targets)?)
    }
}

#[async_trait]
impl StoreStage for GoldSynchronizer {
    async fn sync(&self, only: Option<&[String]>) -> Result<SyncReport> {
        Ok(GoldSynchronizer::sync(self, only).await?)
    }
}

#[async_trait]
impl IndexStage for ProjectIndexer {
    async fn index(&self) -> Result<IndexSummary> {
        Ok(self.run().await?)
    }
}
