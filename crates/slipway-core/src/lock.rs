//! Per-content-root update lock.
//!
//! Excludes other cooperating launcher instances from mutating a directory
//! while it is being updated. The lock itself is a non-blocking advisory lock
//! on a marker file inside the directory. On platforms without reliable
//! "directory in use" detection (Windows), construction first probes the
//! directory with a rename round-trip; a directory that is held open by a
//! running application cannot be renamed there, so the probe fails fast
//! before any file is touched.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fs2::FileExt;

/// Name of the lock file inside a content root.
pub const LOCK_FILE: &str = "slipway.lock";

/// Suffix of the temporary directory name used by the rename probe.
const RENAME_SUFFIX: &str = ".1";

#[derive(Debug)]
pub struct DirectoryUpdateLock {
    directory: PathBuf,
    path: PathBuf,
    file: File,
    locked: bool,
}

impl DirectoryUpdateLock {
    /// Open (creating if needed) the lock file channel for `directory`.
    ///
    /// `rename_probe` enables the defensive rename round-trip; pass the
    /// platform gate from configuration so non-Windows hosts skip it
    /// entirely.
    pub fn new(directory: &Path, rename_probe: bool) -> Result<Self> {
        if !directory.is_dir() {
            bail!("'{}' is not a directory", directory.display());
        }
        let path = directory.join(LOCK_FILE);

        if rename_probe {
            if path.is_file() {
                std::fs::remove_file(&path).with_context(|| {
                    format!("remove lock file {} before renaming", path.display())
                })?;
            }
            rename_round_trip(directory)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .with_context(|| format!("open lock file {}", path.display()))?;
        Ok(Self {
            directory: directory.to_path_buf(),
            path,
            file,
            locked: false,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Attempt the advisory lock. Idempotent when already held. Returns
    /// whether the lock is now held; a lock held by another process yields
    /// `Ok(false)`, anything else I/O-ish is an error.
    pub fn lock(&mut self) -> Result<bool> {
        if self.locked {
            return Ok(true);
        }
        match self.file.try_lock_exclusive() {
            Ok(()) => {
                self.locked = true;
                Ok(true)
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(false),
            Err(e) => Err(e).with_context(|| format!("lock {}", self.path.display())),
        }
    }

    /// Release the advisory lock. No-op when not held.
    pub fn unlock(&mut self) -> Result<()> {
        if !self.locked {
            return Ok(());
        }
        FileExt::unlock(&self.file)
            .with_context(|| format!("unlock {}", self.path.display()))?;
        self.locked = false;
        Ok(())
    }

    /// Remove the lock file. The lock must have been released first; calling
    /// this while still holding it is a programming error.
    pub fn delete(self) -> Result<()> {
        if self.locked {
            bail!("BUG: lock on {} must be released before deletion", self.path.display());
        }
        drop(self.file);
        std::fs::remove_file(&self.path)
            .with_context(|| format!("remove lock file {}", self.path.display()))
    }
}

/// Lock every lock in the batch. Returns true only if all succeeded; keeps
/// going after a refusal so the log shows every contended root.
pub fn lock_all(locks: &mut [DirectoryUpdateLock]) -> Result<bool> {
    let mut all = true;
    for lock in locks.iter_mut() {
        let ok = lock.lock()?;
        if !ok {
            tracing::warn!("directory {} is locked by another instance", lock.directory().display());
        }
        all &= ok;
    }
    Ok(all)
}

/// Release and remove every lock, logging rather than propagating individual
/// failures so one bad lock cannot keep the others on disk.
pub fn unlock_all_and_delete(locks: Vec<DirectoryUpdateLock>) {
    for mut lock in locks {
        if let Err(e) = lock.unlock() {
            tracing::error!("unable to unlock {}: {e:#}", lock.directory().display());
            continue;
        }
        if let Err(e) = lock.delete() {
            tracing::error!("unable to delete lock: {e:#}");
        }
    }
}

/// The rename round-trip probe. `directory` exists; the suffixed sibling may
/// not. Cases:
///
/// 1. suffixed name is a file - corrupt state, fail;
/// 2. suffixed dir non-empty, directory empty - a previous run was
///    interrupted mid-probe: delete the empty original and rename the
///    suffixed dir back into place;
/// 3. suffixed dir empty - delete it and proceed with the probe;
/// 4. both non-empty - ambiguous, fail;
/// 5. suffixed dir absent - rename there and immediately back; either rename
///    failing means the directory is in use.
fn rename_round_trip(directory: &Path) -> Result<()> {
    let renamed = sibling_with_suffix(directory);
    if renamed.is_file() {
        bail!("Rename directory {} is a file", renamed.display());
    }
    if renamed.is_dir() {
        if dir_is_empty(directory)? {
            std::fs::remove_dir(directory)
                .with_context(|| format!("deleting directory {}", directory.display()))?;
            std::fs::rename(&renamed, directory).with_context(|| {
                format!(
                    "renaming directory {} back to {}",
                    renamed.display(),
                    directory.display()
                )
            })?;
            return Ok(());
        } else if dir_is_empty(&renamed)? {
            std::fs::remove_dir(&renamed)
                .with_context(|| format!("deleting rename directory {}", renamed.display()))?;
        } else {
            bail!(
                "Both {} and {} are non-empty",
                directory.display(),
                renamed.display()
            );
        }
    }

    std::fs::rename(directory, &renamed).with_context(|| {
        format!(
            "renaming directory {} to {} (directory in use?)",
            directory.display(),
            renamed.display()
        )
    })?;
    std::fs::rename(&renamed, directory).with_context(|| {
        format!(
            "renaming directory {} back to {}",
            renamed.display(),
            directory.display()
        )
    })?;
    Ok(())
}

fn sibling_with_suffix(directory: &Path) -> PathBuf {
    let name = directory
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    directory.with_file_name(format!("{name}{RENAME_SUFFIX}"))
}

/// A directory counts as empty when it does not exist or holds no entries.
fn dir_is_empty(directory: &Path) -> Result<bool> {
    if !directory.exists() {
        return Ok(true);
    }
    let mut entries = std::fs::read_dir(directory)
        .with_context(|| format!("read {}", directory.display()))?;
    Ok(entries.next().is_none())
}
