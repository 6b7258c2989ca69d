//! Raw-file change detection by modification time
//!
//! [`detect_changes`] is pure; [`scan_raw_dir`] reads the filesystem. Saving
//! the returned mtimes is left to the caller, once downstream work is done.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::debug;
use walkdir::WalkDir;

/// `filename → mtime` in seconds since the epoch
pub type Mtimes = BTreeMap<String, f64>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Sorted file names
    pub changed: Vec<String>,
    /// Current mtimes of every present file
    pub mtimes: Mtimes,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Files whose mtime strictly increased since `previous` (absent counts as
/// 0), or every present file when `force` is set.
pub fn detect_changes(previous: &Mtimes, current: &Mtimes, force: bool) -> ChangeSet {
    let changed = current
        .iter()
        .filter(|(name, mtime)| force || **mtime > previous.get(*name).copied().unwrap_or(0.0))
        .map(|(name, _)| name.clone())
        .collect();
    ChangeSet {
        changed,
        mtimes: current.clone(),
    }
}

/// `*.csv` files directly under `dir`. A missing directory is empty; files
/// that vanish before they can be stat'ed are skipped.
pub fn scan_raw_dir(dir: &Path) -> Mtimes {
    let mut mtimes = Mtimes::new();
    if !dir.is_dir() {
        debug!("[sensor] {} does not exist", dir.display());
        return mtimes;
    }

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.ends_with(".csv") {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let Some(secs) = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
        else {
            continue;
        };
        mtimes.insert(name, secs);
    }
    mtimes
}
