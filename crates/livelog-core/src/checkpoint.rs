//! Checkpoint hand-off to a host process through a signal file.
//!
//! The host watches `<project>/.dvc/tmp/DVC_CHECKPOINT`. We write our PID into
//! it and block until the host deletes it, which marks the checkpoint as taken.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::env::{EnvSnapshot, DVC_ROOT};
use crate::error::Result;
use crate::storage;

/// Hook fired on every step advance while checkpointing is enabled.
pub trait Checkpointer {
    fn checkpoint(&mut self) -> Result<()>;
}

impl<F> Checkpointer for F
where
    F: FnMut() -> Result<()>,
{
    fn checkpoint(&mut self) -> Result<()> {
        self()
    }
}

pub const SIGNAL_FILE: &str = "DVC_CHECKPOINT";

#[derive(Debug, Clone)]
pub struct SignalFileCheckpoint {
    /// `None` when no project root could be found; checkpoints are then skipped.
    signal_file: Option<PathBuf>,
    poll_interval: Duration,
}

impl SignalFileCheckpoint {
    /// Locate the project from `DVC_ROOT`, else from the nearest ancestor of
    /// the working directory that contains `.dvc`.
    pub fn discover(env: &EnvSnapshot) -> Self {
        let root = match env.get(DVC_ROOT) {
            Some(root) => Some(PathBuf::from(root)),
            None => std::env::current_dir()
                .ok()
                .and_then(|cwd| find_project_root(&cwd)),
        };
        Self {
            signal_file: root.map(|r| signal_file_path(&r)),
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn for_project(root: &Path) -> Self {
        Self {
            signal_file: Some(signal_file_path(root)),
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn signal_file(&self) -> Option<&Path> {
        self.signal_file.as_deref()
    }
}

impl Checkpointer for SignalFileCheckpoint {
    fn checkpoint(&mut self) -> Result<()> {
        let Some(signal_file) = &self.signal_file else {
            warn!("No project root found, skipping checkpoint");
            return Ok(());
        };
        storage::ensure_parent(signal_file)?;
        fs::write(signal_file, std::process::id().to_string())?;
        debug!(path = %signal_file.display(), "Waiting for checkpoint");
        while signal_file.exists() {
            thread::sleep(self.poll_interval);
        }
        Ok(())
    }
}

fn signal_file_path(root: &Path) -> PathBuf {
    root.join(".dvc").join("tmp").join(SIGNAL_FILE)
}

fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".dvc").is_dir())
        .map(Path::to_path_buf)
}
