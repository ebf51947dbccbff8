//! Set difference between manifest-declared paths and on-disk paths for one
//! content root.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;

use crate::lock::LOCK_FILE;
use crate::manifest::{Manifest, MANIFEST_FILE};

/// Partition of one content root's paths, all keyed by relative path with the
/// size attached.
#[derive(Debug, Default, Clone)]
pub struct ContentDiff {
    /// Present in both with equal size. Download-skip candidates, pending
    /// hash reverification.
    pub common: BTreeMap<String, u64>,
    /// Declared by the manifest but absent on disk or of a different size.
    pub fetch: BTreeMap<String, u64>,
    /// On disk only: deletion candidates. Never contains pipeline-owned
    /// files (manifest, lock).
    pub extraneous: BTreeMap<String, u64>,
}

/// Compute the three partitions. Entries whose file name is the manifest or
/// lock file are excluded from `extraneous` regardless of the diff result.
pub fn diff(
    manifest_sizes: &BTreeMap<String, u64>,
    disk_sizes: &BTreeMap<String, u64>,
) -> ContentDiff {
    let mut out = ContentDiff::default();
    for (path, size) in manifest_sizes {
        match disk_sizes.get(path) {
            Some(disk_size) if disk_size == size => {
                out.common.insert(path.clone(), *size);
            }
            _ => {
                out.fetch.insert(path.clone(), *size);
            }
        }
    }
    for (path, size) in disk_sizes {
        if manifest_sizes.contains_key(path) || is_pipeline_owned(path) {
            continue;
        }
        out.extraneous.insert(path.clone(), *size);
    }
    out
}

/// Size map of a manifest's declared assets.
pub fn manifest_sizes(manifest: &Manifest) -> BTreeMap<String, u64> {
    manifest
        .assets()
        .iter()
        .map(|a| (a.path().to_string(), a.size()))
        .collect()
}

/// Size map of every file currently under `content_root`.
pub fn disk_sizes(content_root: &Path) -> Result<BTreeMap<String, u64>> {
    let mut map = BTreeMap::new();
    for file in crate::manifest::scan::find_files(content_root)? {
        let relative = crate::manifest::scan::relativize(content_root, &file)?;
        let size = std::fs::metadata(&file)?.len();
        map.insert(relative, size);
    }
    Ok(map)
}

fn is_pipeline_owned(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name == MANIFEST_FILE || name == LOCK_FILE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(entries: &[(&str, u64)]) -> BTreeMap<String, u64> {
        entries.iter().map(|(p, s)| (p.to_string(), *s)).collect()
    }

    #[test]
    fn partitions_are_disjoint_and_complete() {
        let manifest = sizes(&[("same", 10), ("resized", 20), ("new", 30)]);
        let disk = sizes(&[("same", 10), ("resized", 21), ("stale", 5)]);
        let d = diff(&manifest, &disk);
        assert_eq!(d.common, sizes(&[("same", 10)]));
        assert_eq!(d.fetch, sizes(&[("resized", 20), ("new", 30)]));
        assert_eq!(d.extraneous, sizes(&[("stale", 5)]));
    }

    #[test]
    fn pipeline_files_never_extraneous() {
        let manifest = sizes(&[]);
        let disk = sizes(&[
            (MANIFEST_FILE, 100),
            (LOCK_FILE, 0),
            ("nested/slipway.lock", 0),
            ("user.dat", 7),
        ]);
        let d = diff(&manifest, &disk);
        assert_eq!(d.extraneous, sizes(&[("user.dat", 7)]));
    }

    #[test]
    fn size_mismatch_is_fetched_not_extraneous() {
        let manifest = sizes(&[("a", 1)]);
        let disk = sizes(&[("a", 2)]);
        let d = diff(&manifest, &disk);
        assert!(d.common.is_empty());
        assert_eq!(d.fetch, sizes(&[("a", 1)]));
        assert!(d.extraneous.is_empty());
    }
}
