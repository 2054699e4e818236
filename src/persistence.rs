//! Saving and restoring tally state across restarts
//!
//! Only the tick state and the snapshots survive a restart. Session context
//! is rebuilt from the journal. A process that writes the state file holds
//! [`StateLock`] for as long as it runs.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::activity::snapshot::Snapshot;
use crate::core::error::{Result, TallyError};
use crate::tick::TickState;

/// Everything that is written to disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    pub tick: TickState,
    pub current: Snapshot,
    /// Most recent first
    #[serde(default)]
    pub history: Vec<Snapshot>,
}

pub trait StateStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet
    fn load(&self) -> Result<Option<SavedState>>;
    fn save(&self, state: &SavedState) -> Result<()>;
}

/// Pretty-printed JSON in a single file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.sibling(".lock")
    }

    /// Claim the state file for this process
    ///
    /// Fails with [`TallyError::Locked`] while another holder is alive. A lock
    /// file left behind by a crashed process has to be removed by hand.
    pub fn lock(&self) -> Result<StateLock> {
        self.create_parent()?;
        let path = self.lock_path();
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(TallyError::Locked(path));
            }
            Err(err) => return Err(err.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        tracing::debug!(path = %path.display(), "state lock taken");
        Ok(StateLock { path })
    }

    fn create_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Exclusive claim on a state file, released on drop
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), %err, "failed to release state lock");
        }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<SavedState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let state = serde_json::from_str(&content)?;
        tracing::debug!(path = %self.path.display(), "state loaded");
        Ok(Some(state))
    }

    fn save(&self, state: &SavedState) -> Result<()> {
        self.create_parent()?;
        // Write then rename so a crash never leaves a half-written file
        let temp = self.temp_path();
        fs::write(&temp, serde_json::to_string_pretty(state)?)?;
        fs::rename(&temp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "state saved");
        Ok(())
    }
}
