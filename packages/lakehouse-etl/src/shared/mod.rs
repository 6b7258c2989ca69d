//! Shared building blocks: the in-memory frame, cell coercions and
//! columnar snapshots

pub mod coerce;
pub mod frame;
pub mod report;
pub mod snapshot;

pub use frame::{Frame, Value};
pub use report::{OutputOutcome, OutputReport, StageReport};
pub use snapshot::{column_types, ColumnType, SnapshotStore};
