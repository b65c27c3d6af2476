use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context};
use cudnnenv_core::{ArchiveLayout, ArchiveType, Catalog, InstallRecipe};
use cudnnenv_security::verify_sha256_file;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::extract::{ArchiveExtractor, ExtractRequest};
use crate::fetch::ArchiveFetcher;
use crate::fs_utils::{create_dir_symlink, is_symlink, remove_link_if_exists};
use crate::interrupt::{self, InterruptGuard};
use crate::layout::StoreLayout;
use crate::scoped::{remove_dir_best_effort, ScopedTempDir, VersionDirGuard};

/// Asks the user a yes/no question. Injected so uninstall can be driven
/// without touching process stdin.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> anyhow::Result<bool>;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> anyhow::Result<bool>,
{
    fn confirm(&mut self, question: &str) -> anyhow::Result<bool> {
        self(question)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum MaterializeSource<'a> {
    /// Download, verify, then unpack a catalog release.
    Remote(&'a InstallRecipe),
    /// Unpack an archive the user already has on disk.
    LocalArchive {
        path: &'a Path,
        archive_type: ArchiveType,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallOutcome {
    Removed,
    Declined,
}

pub struct VersionStore {
    layout: StoreLayout,
    fetcher: Box<dyn ArchiveFetcher>,
    extractor: Box<dyn ArchiveExtractor>,
}

impl VersionStore {
    pub fn new(
        layout: StoreLayout,
        fetcher: Box<dyn ArchiveFetcher>,
        extractor: Box<dyn ArchiveExtractor>,
    ) -> Self {
        Self {
            layout,
            fetcher,
            extractor,
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn resolve_path(&self, id: &str) -> PathBuf {
        self.layout.version_dir(id)
    }

    pub fn is_installed(&self, id: &str) -> bool {
        validate_version_id(id).is_ok() && self.resolve_path(id).exists()
    }

    pub fn list_installed(&self) -> Result<BTreeSet<String>, StoreError> {
        let dir = self.layout.versions_dir();
        if !dir.is_dir() {
            return Ok(BTreeSet::new());
        }

        let mut installed = BTreeSet::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("failed to read versions directory: {}", dir.display()))?
        {
            let entry = entry
                .with_context(|| format!("failed to read versions directory: {}", dir.display()))?;
            installed.insert(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(installed)
    }

    /// Produces a fully populated `versions/<id>` or nothing at all.
    ///
    /// The target directory is created before any work starts so that every
    /// failure (fetch, checksum, extraction, interrupt, panic) has a single
    /// directory to roll back.
    pub fn materialize(&self, id: &str, source: MaterializeSource<'_>) -> Result<PathBuf, StoreError> {
        validate_version_id(id)?;
        if self.is_installed(id) {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }

        let versions_dir = self.layout.versions_dir();
        fs::create_dir_all(&versions_dir)
            .with_context(|| format!("failed to create {}", versions_dir.display()))?;

        let _interrupts = InterruptGuard::install();
        let target = VersionDirGuard::create(&self.resolve_path(id)).map_err(|err| {
            if err.kind() == io::ErrorKind::AlreadyExists {
                StoreError::AlreadyExists(id.to_string())
            } else {
                StoreError::Io(anyhow!(err).context(format!(
                    "failed to create version directory for {id}"
                )))
            }
        })?;
        let workdir = ScopedTempDir::new("install")?;

        self.populate(target.path(), workdir.path(), source)?;
        if interrupt::interrupted() {
            return Err(StoreError::Interrupted);
        }

        drop(workdir);
        let path = target.commit();
        info!(version = id, path = %path.display(), "installed version");
        Ok(path)
    }

    fn populate(
        &self,
        target: &Path,
        workdir: &Path,
        source: MaterializeSource<'_>,
    ) -> Result<(), StoreError> {
        match source {
            MaterializeSource::Remote(recipe) => {
                let archive = workdir.join(recipe.archive_type.download_file_name());
                self.fetcher.fetch(&recipe.url, &archive)?;

                let check = verify_sha256_file(&archive, &recipe.sha256)?;
                if !check.matches() {
                    return Err(StoreError::VerificationFailed {
                        url: recipe.url.clone(),
                        expected: check.expected,
                        actual: check.actual,
                    });
                }
                debug!(url = %recipe.url, sha256 = %check.actual, "checksum verified");

                self.extractor.extract(&ExtractRequest {
                    archive: &archive,
                    archive_type: recipe.archive_type,
                    layout: &recipe.layout,
                    destination: target,
                    workdir,
                })
            }
            MaterializeSource::LocalArchive { path, archive_type } => {
                self.extractor.extract(&ExtractRequest {
                    archive: path,
                    archive_type,
                    layout: &ArchiveLayout::Nested,
                    destination: target,
                    workdir,
                })
            }
        }
    }

    /// Catalog-driven install: resolves the recipe before touching the
    /// filesystem, materializes only when missing, then activates.
    pub fn install(&self, catalog: &Catalog, id: &str) -> Result<InstallOutcome, StoreError> {
        let recipe = catalog
            .lookup(id)
            .ok_or_else(|| StoreError::UnknownVersion(id.to_string()))?;
        validate_version_id(id)?;

        let outcome = if self.is_installed(id) {
            debug!(version = id, "version already installed; skipping download");
            InstallOutcome::AlreadyPresent
        } else {
            self.materialize(id, MaterializeSource::Remote(recipe))?;
            InstallOutcome::Installed
        };

        self.activate(id)?;
        Ok(outcome)
    }

    pub fn install_file(&self, archive: &Path, id: &str) -> Result<PathBuf, StoreError> {
        validate_version_id(id)?;
        if self.is_installed(id) {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }
        if !archive.is_file() {
            return Err(anyhow!("archive not found: {}", archive.display()).into());
        }

        let archive_type = ArchiveType::infer_from_path(&archive.to_string_lossy())
            .unwrap_or(ArchiveType::TarGz);
        let path = self.materialize(
            id,
            MaterializeSource::LocalArchive {
                path: archive,
                archive_type,
            },
        )?;
        self.activate(id)?;
        Ok(path)
    }

    /// Points `active` at `versions/<id>`. The old link is removed before
    /// the new one is created; dying in between leaves no active version.
    pub fn activate(&self, id: &str) -> Result<(), StoreError> {
        validate_version_id(id)?;
        if !self.is_installed(id) {
            return Err(StoreError::NotInstalled(id.to_string()));
        }

        let link = self.layout.active_path();
        remove_link_if_exists(&link)
            .with_context(|| format!("failed to remove active link: {}", link.display()))?;
        let target = self.layout.active_target(id);
        create_dir_symlink(&target, &link).with_context(|| {
            format!(
                "failed to create active link {} -> {}",
                link.display(),
                target.display()
            )
        })?;
        debug!(version = id, "activated version");
        Ok(())
    }

    pub fn deactivate(&self) -> Result<(), StoreError> {
        let link = self.layout.active_path();
        let removed = remove_link_if_exists(&link)
            .with_context(|| format!("failed to remove active link: {}", link.display()))?;
        debug!(removed, "deactivated");
        Ok(())
    }

    /// The id the active link names, read from the link target alone. A link
    /// whose version directory was deleted still reports that id.
    pub fn current(&self) -> Result<Option<String>, StoreError> {
        let link = self.layout.active_path();
        let linked = is_symlink(&link)
            .with_context(|| format!("failed to inspect active link: {}", link.display()))?;
        if !linked {
            return Ok(None);
        }

        let target = fs::read_link(&link)
            .with_context(|| format!("failed to read active link: {}", link.display()))?;
        Ok(target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()))
    }

    /// Removes `versions/<id>` after confirmation. The active link is left
    /// alone even when it names `id`.
    pub fn uninstall(
        &self,
        id: &str,
        confirm: &mut dyn Confirm,
    ) -> Result<UninstallOutcome, StoreError> {
        validate_version_id(id)?;
        if !self.is_installed(id) {
            return Err(StoreError::NotInstalled(id.to_string()));
        }

        let path = self.resolve_path(id);
        if !confirm.confirm(&format!("remove {}?", path.display()))? {
            debug!(version = id, "uninstall declined");
            return Ok(UninstallOutcome::Declined);
        }

        remove_dir_best_effort(&path);
        info!(version = id, "uninstalled version");
        Ok(UninstallOutcome::Removed)
    }
}

/// A version id doubles as a directory name, so it must be exactly one
/// normal path component.
pub fn validate_version_id(id: &str) -> Result<(), StoreError> {
    let mut components = Path::new(id).components();
    let valid = !id.is_empty()
        && !id.contains(['/', '\\'])
        && matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidVersionId(id.to_string()))
    }
}
