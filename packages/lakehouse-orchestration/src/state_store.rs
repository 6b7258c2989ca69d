//! Persistence for the change-tracking state

use crate::change_detector::Mtimes;
use crate::error::{OrchestratorError, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Load/save of `filename → mtime`
pub trait MtimeStore: Send + Sync {
    fn load(&self) -> Result<Mtimes>;
    fn save(&self, mtimes: &Mtimes) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryMtimeStore {
    state: Mutex<Mtimes>,
}

impl InMemoryMtimeStore {
    pub fn new(initial: Mtimes) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }
}

impl MtimeStore for InMemoryMtimeStore {
    fn load(&self) -> Result<Mtimes> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, mtimes: &Mtimes) -> Result<()> {
        *self.state.lock() = mtimes.clone();
        Ok(())
    }
}

/// JSON object on disk. Missing or unreadable content loads as empty.
pub struct JsonFileMtimeStore {
    path: PathBuf,
}

impl JsonFileMtimeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MtimeStore for JsonFileMtimeStore {
    fn load(&self) -> Result<Mtimes> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Mtimes::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(m) => Ok(m),
            Err(e) => {
                warn!("[mtimes] {} unreadable ({}); starting empty", self.path.display(), e);
                Ok(Mtimes::new())
            }
        }
    }

    fn save(&self, mtimes: &Mtimes) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(mtimes).map_err(OrchestratorError::state)?;
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, body)?;
        std::fs::rename(&staging, &self.path)?;
        debug!("[mtimes] saved {} entries", mtimes.len());
        Ok(())
    }
}
