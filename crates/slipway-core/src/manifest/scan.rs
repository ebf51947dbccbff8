//! Build manifest assets by scanning a content root and hashing every file.
//!
//! Used by the manifest tool's `create` action. Hashing is submitted to the
//! worker pool one file at a time; the batch is awaited in full.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::hashing::HashAlgorithm;
use crate::pool::TaskPool;

use super::Asset;

/// Recursively list every file under `directory`, depth-first. Directories
/// themselves are not returned.
pub fn find_files(directory: &Path) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        bail!("'{}' is not a directory", directory.display());
    }
    let mut files = Vec::new();
    let mut pending = vec![directory.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).with_context(|| format!("read {}", dir.display()))? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    Ok(files)
}

/// Relative path from `root` to `file` as a forward-slash string.
pub fn relativize(root: &Path, file: &Path) -> Result<String> {
    let relative = file
        .strip_prefix(root)
        .with_context(|| format!("'{}' is not under '{}'", file.display(), root.display()))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Hash every file under `content_root` in parallel and return the resulting
/// assets (unsorted; the manifest constructor orders them).
pub async fn scan_content_root(
    pool: &TaskPool,
    content_root: &Path,
    algorithm: HashAlgorithm,
) -> Result<Vec<Asset>> {
    let files = find_files(content_root)?;
    tracing::info!(
        count = files.len(),
        root = %content_root.display(),
        "hashing content root"
    );
    let mut tasks = Vec::with_capacity(files.len());
    for file in files {
        let relative = relativize(content_root, &file)?;
        tasks.push(move || -> Result<Asset> {
            let size = std::fs::metadata(&file)
                .with_context(|| format!("stat {}", file.display()))?
                .len();
            let hash = algorithm.hash_file(&file)?;
            Ok(Asset::new(relative, size, hash))
        });
    }
    let mut assets = Vec::with_capacity(tasks.len());
    for result in pool.run_all(tasks).await {
        assets.push(result??);
    }
    Ok(assets)
}
