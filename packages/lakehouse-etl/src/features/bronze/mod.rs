//! Bronze → Silver
//!
//! Raw CSV under the bronze directory becomes typed, deduplicated silver
//! snapshots. Two entrypoints:
//!
//! - [`BronzeTransformer::run_all`]: every dataset handler
//! - [`BronzeTransformer::run_files`]: only handlers whose raw file changed

pub mod datasets;
pub mod reader;

pub use datasets::{Dataset, DatasetHandler, HANDLERS};

use crate::errors::Result;
use crate::shared::report::{OutputOutcome, StageReport};
use crate::shared::snapshot::SnapshotStore;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct BronzeTransformer {
    bronze_dir: PathBuf,
    silver: SnapshotStore,
}

impl BronzeTransformer {
    pub fn new(bronze_dir: impl Into<PathBuf>, silver_dir: impl Into<PathBuf>) -> Self {
        Self {
            bronze_dir: bronze_dir.into(),
            silver: SnapshotStore::new(silver_dir),
        }
    }

    pub fn bronze_dir(&self) -> &Path {
        &self.bronze_dir
    }

    pub fn silver(&self) -> &SnapshotStore {
        &self.silver
    }

    /// Run every handler
    pub fn run_all(&self) -> Result<StageReport> {
        let mut report = StageReport::default();
        for handler in HANDLERS.iter() {
            report.merge(self.run_handler(handler)?);
        }
        Ok(report)
    }

    /// Run only the handlers whose raw file name is in `files`.
    /// Handlers run in table order; unknown names are reported and skipped.
    pub fn run_files<S: AsRef<str>>(&self, files: &[S]) -> Result<StageReport> {
        let mut report = StageReport::default();
        for f in files {
            let name = f.as_ref();
            if Dataset::from_file_name(name).is_none() && !report.unknown.iter().any(|u| u == name)
            {
                warn!("[bronze] no handler for {}", name);
                report.unknown.push(name.to_string());
            }
        }

        for handler in HANDLERS.iter() {
            if files.iter().any(|f| f.as_ref() == handler.file_name) {
                report.merge(self.run_handler(handler)?);
            }
        }
        Ok(report)
    }

    fn run_handler(&self, handler: &DatasetHandler) -> Result<StageReport> {
        let mut report = StageReport::default();
        let raw = reader::strip_unnamed(&reader::read_raw(&self.bronze_dir.join(handler.file_name)));

        if raw.is_empty() {
            info!("[{}] no source", handler.source);
            for output in handler.outputs {
                report.record(*output, OutputOutcome::NoSource);
            }
            return Ok(report);
        }

        for (output, frame) in (handler.transform)(raw) {
            match frame {
                Some(frame) if !frame.columns().is_empty() => {
                    self.silver.write(output, &frame)?;
                    info!("OK silver/{} ({} rows)", output, frame.len());
                    report.record(output, OutputOutcome::Written { rows: frame.len() });
                }
                _ => {
                    info!("[{}] no source for {}", handler.source, output);
                    report.record(output, OutputOutcome::NoSource);
                }
            }
        }
        Ok(report)
    }
}
