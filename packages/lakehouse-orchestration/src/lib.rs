/*
 * Lakehouse Orchestration
 *
 * - Change detection over the raw directory (mtime based)
 * - Full and subset runs across silver, gold and the relational store
 * - Sensor loop with persisted change-tracking state
 */

pub mod change_detector;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod state_store;
pub mod watch;

// Re-exports
pub use change_detector::{detect_changes, scan_raw_dir, ChangeSet, Mtimes};
pub use error::{OrchestratorError, Result};
pub use orchestrator::{FullRefresh, Orchestrator, Phase, RunMode, RunSummary};
pub use pipeline::{
    GoldStage, IndexStage, SelectiveGoldStage, SelectiveSilverStage, SilverStage, StoreStage,
};
pub use state_store::{InMemoryMtimeStore, JsonFileMtimeStore, MtimeStore};
pub use watch::{BronzeWatcher, CycleOutcome};
