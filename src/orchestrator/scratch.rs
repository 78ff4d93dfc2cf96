//! Per-execution scratch space for intermediate artifacts.

use crate::job::JobId;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Directory and files owned by one pipeline execution.
///
/// Everything tracked here is removed by [`Scratch::cleanup`], which also runs
/// on drop so an abandoned execution cannot leak files.
pub struct Scratch {
    dir: PathBuf,
    artifacts: Vec<PathBuf>,
}

impl Scratch {
    /// Reserve `root/job-<id>-<uuid>`. Nothing is created on disk yet.
    pub fn new(root: &Path, job_id: JobId) -> Self {
        Self {
            dir: root.join(format!("job-{}-{}", job_id, Uuid::new_v4().simple())),
            artifacts: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if needed and return it.
    pub fn create(&self) -> std::io::Result<&Path> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(&self.dir)
    }

    /// Register a file for deletion.
    pub fn track(&mut self, path: &Path) {
        if !self.artifacts.iter().any(|p| p == path) {
            self.artifacts.push(path.to_path_buf());
        }
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Best-effort removal of every tracked file and the directory itself.
    ///
    /// Failures are logged, never returned. Returns the number of files removed.
    pub fn cleanup(&mut self) -> usize {
        let mut removed = 0;

        for path in self.artifacts.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove artifact {:?}: {}", path, e),
            }
        }

        if self.dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.dir) {
                warn!("Failed to remove scratch directory {:?}: {}", self.dir, e);
            }
        }

        if removed > 0 {
            debug!("Removed {} artifact(s)", removed);
        }
        removed
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        self.cleanup();
    }
}
