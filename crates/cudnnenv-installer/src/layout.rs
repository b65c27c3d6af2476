use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// On-disk layout of a version store:
///
/// ```text
/// <root>/
///   versions/<id>/
///   active -> versions/<id>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id)
    }

    pub fn active_path(&self) -> PathBuf {
        self.root.join("active")
    }

    /// Link target stored in `active`, relative to the root so the store can
    /// be relocated without rewriting the link.
    pub fn active_target(&self, id: &str) -> PathBuf {
        Path::new("versions").join(id)
    }

    pub fn active_include_dir(&self) -> PathBuf {
        self.active_path().join("cuda").join("include")
    }

    pub fn active_lib_dir(&self, lib_dir: &str) -> PathBuf {
        self.active_path().join("cuda").join(lib_dir)
    }
}

pub fn default_user_root() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows store root")?;
        return Ok(PathBuf::from(app_data).join("cudnnenv"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve store root")?;
    Ok(PathBuf::from(home).join(".cudnn"))
}
