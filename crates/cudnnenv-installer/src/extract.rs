use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use cudnnenv_core::{ArchiveLayout, ArchiveType};
use tracing::debug;

use crate::error::StoreError;
use crate::fs_utils::move_entry_or_copy;
use crate::interrupt;

/// Everything an extractor needs to populate one version directory.
#[derive(Debug, Clone, Copy)]
pub struct ExtractRequest<'a> {
    pub archive: &'a Path,
    pub archive_type: ArchiveType,
    pub layout: &'a ArchiveLayout,
    /// The freshly created version directory.
    pub destination: &'a Path,
    /// Scratch space that is discarded after the install.
    pub workdir: &'a Path,
}

pub trait ArchiveExtractor {
    fn extract(&self, request: &ExtractRequest<'_>) -> Result<(), StoreError>;
}

/// Unpacks archives with the system `tar`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarExtractor;

impl ArchiveExtractor for TarExtractor {
    fn extract(&self, request: &ExtractRequest<'_>) -> Result<(), StoreError> {
        let result = match request.layout {
            ArchiveLayout::Nested => {
                unpack_archive(request.archive, request.destination, request.archive_type)
            }
            ArchiveLayout::Flat { root, lib_dir } => {
                let unpacked = request.workdir.join("unpacked");
                fs::create_dir_all(&unpacked)
                    .with_context(|| format!("failed to create {}", unpacked.display()))
                    .and_then(|_| {
                        unpack_archive(request.archive, &unpacked, request.archive_type)
                    })
                    .and_then(|_| {
                        flatten_legacy_payload(&unpacked, root, request.destination, lib_dir)
                    })
            }
        };

        // A SIGINT also reaches the tar child, which then fails; report the
        // interrupt rather than the child's exit status.
        match result {
            Ok(()) => Ok(()),
            Err(_) if interrupt::interrupted() => Err(StoreError::Interrupted),
            Err(err) => Err(err.into()),
        }
    }
}

/// `tar -xf` detects gzip and xz compression on its own; the archive type
/// only feeds the log line.
fn unpack_archive(archive_path: &Path, dst: &Path, archive_type: ArchiveType) -> Result<()> {
    debug!(
        archive = %archive_path.display(),
        dst = %dst.display(),
        kind = archive_type.as_str(),
        "extracting archive"
    );
    let output = Command::new("tar")
        .arg("-xf")
        .arg(archive_path)
        .arg("-C")
        .arg(dst)
        .output()
        .context("failed to extract tar archive: could not run `tar`")?;
    if output.status.success() {
        return Ok(());
    }

    Err(anyhow!(
        "failed to extract tar archive {}: {} ({})",
        archive_path.display(),
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    ))
}

/// Legacy (v2-era) archives put headers and libraries side by side under a
/// single root directory. Sort them into `cuda/include` and `cuda/<lib_dir>`.
pub(crate) fn flatten_legacy_payload(
    unpacked: &Path,
    root: &str,
    destination: &Path,
    lib_dir: &str,
) -> Result<()> {
    let source_root = unpacked.join(root);
    if !source_root.is_dir() {
        return Err(anyhow!(
            "archive root '{}' was not found after extraction: {}",
            root,
            source_root.display()
        ));
    }

    let include_dst = destination.join("cuda").join("include");
    let lib_dst = destination.join("cuda").join(lib_dir);
    for dir in [&include_dst, &lib_dst] {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let mut entries = fs::read_dir(&source_root)
        .with_context(|| format!("failed to read {}", source_root.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("failed to read {}", source_root.display()))?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut moved = 0_usize;
    for entry in entries {
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to stat {}", entry.path().display()))?;
        if file_type.is_dir() {
            debug!(path = %entry.path().display(), "skipping nested directory in legacy archive");
            continue;
        }

        let file_name = entry.file_name();
        let target_dir = if is_header(&file_name) {
            &include_dst
        } else {
            &lib_dst
        };
        move_entry_or_copy(&entry.path(), &target_dir.join(&file_name))?;
        moved += 1;
    }

    if moved == 0 {
        return Err(anyhow!(
            "no files found under archive root '{}'",
            source_root.display()
        ));
    }
    Ok(())
}

fn is_header(file_name: &OsString) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("h"))
}
