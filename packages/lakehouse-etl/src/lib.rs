//! lakehouse-etl: bronze → silver → gold transformations
//!
//! Raw CSV files land in the bronze directory. The bronze stage turns each
//! dataset into typed silver snapshots; the gold stage builds dimension,
//! bridge and fact tables from silver. Both stages can run in full or
//! restricted to what changed.
//!
//! Snapshots are Arrow IPC files, one per table.

pub mod config;
pub mod errors;
pub mod features;
pub mod shared;

pub use config::{ConfigError, LakeConfig, SurrogateKeys};
pub use errors::{EtlError, Result};
pub use features::bronze::{BronzeTransformer, Dataset};
pub use features::gold::{GoldBuilder, GoldDag, GoldTarget};
pub use shared::{Frame, OutputOutcome, SnapshotStore, StageReport, Value};
