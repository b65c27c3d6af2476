use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{debug, warn};

static TEMP_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A uniquely named directory under the system temp dir, removed when the
/// value is dropped, whatever path the scope exits through.
#[derive(Debug)]
pub struct ScopedTempDir {
    path: PathBuf,
}

impl ScopedTempDir {
    pub fn new(prefix: &str) -> Result<Self> {
        Self::new_in(&std::env::temp_dir(), prefix)
    }

    pub fn new_in(parent: &Path, prefix: &str) -> Result<Self> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_nanos())
            .unwrap_or_default();
        let path = parent.join(format!(
            "cudnnenv-{}-{}-{}-{}",
            prefix,
            std::process::id(),
            nanos,
            TEMP_DIR_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&path)
            .with_context(|| format!("failed creating tmp dir: {}", path.display()))?;
        debug!(path = %path.display(), "created temporary working directory");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedTempDir {
    fn drop(&mut self) {
        remove_dir_best_effort(&self.path);
    }
}

/// Owns a freshly created directory until [`VersionDirGuard::commit`] is
/// called. Dropping an uncommitted guard removes the directory recursively,
/// so errors, early returns, and panics all roll back.
#[derive(Debug)]
pub struct VersionDirGuard {
    path: PathBuf,
    committed: bool,
}

impl VersionDirGuard {
    /// Creates `path` itself with `create_dir`, so a directory that already
    /// exists (for example, one created by a concurrent invocation) is an
    /// `AlreadyExists` error rather than being adopted.
    pub fn create(path: &Path) -> io::Result<Self> {
        fs::create_dir(path)?;
        debug!(path = %path.display(), "created version directory");
        Ok(Self {
            path: path.to_path_buf(),
            committed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn commit(mut self) -> PathBuf {
        self.committed = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for VersionDirGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        debug!(path = %self.path.display(), "rolling back version directory");
        remove_dir_best_effort(&self.path);
    }
}

/// Recursive removal that never fails; secondary errors are logged so the
/// primary failure that triggered cleanup stays visible.
pub fn remove_dir_best_effort(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to remove directory");
        }
    }
}
