//! Staged files that must not outlive the process.
//!
//! Synthesized configurations are written next to the user's project. Drop
//! removes them on normal exit paths; files still registered when the
//! process is interrupted are removed by the termination handler.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tempfile::NamedTempFile;

/// Exit status after an interrupt, as shells report SIGINT.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

static GLOBAL: StagingRegistry = StagingRegistry::new();

/// Paths of staged files not yet removed.
#[derive(Debug, Default)]
pub struct StagingRegistry {
    paths: Mutex<BTreeSet<PathBuf>>,
}

impl StagingRegistry {
    pub const fn new() -> Self {
        StagingRegistry {
            paths: Mutex::new(BTreeSet::new()),
        }
    }

    /// The registry the termination handler drains.
    pub fn global() -> &'static StagingRegistry {
        &GLOBAL
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<PathBuf>> {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take ownership of `file` and register its path.
    pub fn stage(&'static self, file: NamedTempFile) -> StagedFile {
        let path = file.path().to_path_buf();
        self.lock().insert(path.clone());
        StagedFile {
            file: Some(file),
            path,
            registry: self,
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    /// Delete every registered file. Returns how many were removed.
    pub fn remove_all(&self) -> usize {
        let paths = std::mem::take(&mut *self.lock());
        let mut removed = 0;
        for path in &paths {
            match std::fs::remove_file(path) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "failed to remove staged file");
                }
            }
        }
        removed
    }
}

/// A temp file registered for removal on interrupt. Dropping it deletes the
/// file and then forgets it.
#[derive(Debug)]
pub struct StagedFile {
    file: Option<NamedTempFile>,
    path: PathBuf,
    registry: &'static StagingRegistry,
}

impl StagedFile {
    /// Stage `file` in the global registry.
    pub fn new(file: NamedTempFile) -> Self {
        StagingRegistry::global().stage(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn as_file_mut(&mut self) -> Option<&mut std::fs::File> {
        self.file.as_mut().map(NamedTempFile::as_file_mut)
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        // Delete before unregistering so an interrupt in between still finds it.
        drop(self.file.take());
        self.registry.lock().remove(&self.path);
    }
}

/// On SIGINT, SIGTERM or SIGHUP: remove staged files and exit with
/// [`INTERRUPTED_EXIT_CODE`]. Call once, early in `main`.
pub fn install_termination_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        let removed = StagingRegistry::global().remove_all();
        tracing::debug!(removed, "interrupted, staged files removed");
        std::process::exit(INTERRUPTED_EXIT_CODE);
    })
}
