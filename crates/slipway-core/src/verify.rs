//! Per-asset verification against the file system.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::manifest::{Asset, Manifest};
use crate::pool::TaskPool;

/// Verdict for one asset. Only `Ok` is a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    MissingFile,
    SizeDiffers,
    HashDiffers,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Outcome::Ok => "OK",
            Outcome::MissingFile => "MissingFile",
            Outcome::SizeDiffers => "SizeDiffers",
            Outcome::HashDiffers => "HashDiffers",
        };
        f.write_str(name)
    }
}

/// Outcome of verifying one asset, tied back to the asset and the content
/// root it was checked under.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub content_root: PathBuf,
    pub asset: Asset,
    pub outcome: Outcome,
}

/// Check one local file against one manifest entry. Short-circuits in order:
/// existence, then size, then a whole-file hash.
pub fn verify_asset(manifest: &Manifest, asset: &Asset, file: &Path) -> Result<Outcome> {
    if !file.is_file() {
        return Ok(Outcome::MissingFile);
    }
    let size = std::fs::metadata(file)?.len();
    if size != asset.size() {
        return Ok(Outcome::SizeDiffers);
    }
    if manifest.hash_algorithm().hash_file(file)? != asset.hash() {
        return Ok(Outcome::HashDiffers);
    }
    Ok(Outcome::Ok)
}

/// Verify every asset of `manifest` under `content_root` in parallel and wait
/// for the full batch. A single slow check does not block the others from
/// starting, but the batch only resolves once every unit has.
pub async fn verify_all(
    pool: &TaskPool,
    manifest: &Manifest,
    content_root: &Path,
) -> Vec<Result<VerificationResult>> {
    let mut tasks = Vec::with_capacity(manifest.assets().len());
    for asset in manifest.assets() {
        let manifest = manifest.clone();
        let asset = asset.clone();
        let root = content_root.to_path_buf();
        tasks.push(move || -> Result<VerificationResult> {
            let file = root.join(asset.path());
            let outcome = verify_asset(&manifest, &asset, &file)?;
            Ok(VerificationResult {
                content_root: root,
                asset,
                outcome,
            })
        });
    }
    pool.run_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.and_then(|r| r))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::HashAlgorithm;

    fn manifest_for(assets: Vec<Asset>) -> Manifest {
        Manifest::standalone(assets, HashAlgorithm::Sha256).unwrap()
    }

    fn asset_for(path: &str, content: &[u8], dir: &Path) -> Asset {
        let file = dir.join(path);
        std::fs::write(&file, content).unwrap();
        Asset::new(
            path,
            content.len() as u64,
            HashAlgorithm::Sha256.hash_file(&file).unwrap(),
        )
    }

    #[test]
    fn ok_when_everything_matches() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset_for("a.bin", b"payload", dir.path());
        let m = manifest_for(vec![asset.clone()]);
        let outcome = verify_asset(&m, &asset, &dir.path().join("a.bin")).unwrap();
        assert_eq!(outcome, Outcome::Ok);
    }

    #[test]
    fn missing_file_wins_over_everything() {
        let dir = tempfile::tempdir().unwrap();
        let asset = Asset::new("gone.bin", 99, "ab".repeat(32));
        let m = manifest_for(vec![asset.clone()]);
        let outcome = verify_asset(&m, &asset, &dir.path().join("gone.bin")).unwrap();
        assert_eq!(outcome, Outcome::MissingFile);
    }

    #[test]
    fn size_differs_wins_over_hash_differs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.bin"), b"short").unwrap();
        // Declared size and hash are both wrong; size must be reported.
        let asset = Asset::new("b.bin", 999, "cd".repeat(32));
        let m = manifest_for(vec![asset.clone()]);
        let outcome = verify_asset(&m, &asset, &dir.path().join("b.bin")).unwrap();
        assert_eq!(outcome, Outcome::SizeDiffers);
    }

    #[test]
    fn hash_differs_when_only_content_changed() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset_for("c.bin", b"original", dir.path());
        std::fs::write(dir.path().join("c.bin"), b"0riginal").unwrap();
        let m = manifest_for(vec![asset.clone()]);
        let outcome = verify_asset(&m, &asset, &dir.path().join("c.bin")).unwrap();
        assert_eq!(outcome, Outcome::HashDiffers);
    }

    #[tokio::test]
    async fn verify_all_covers_every_asset() {
        let dir = tempfile::tempdir().unwrap();
        let good = asset_for("good.bin", b"good", dir.path());
        let missing = Asset::new("missing.bin", 4, "ee".repeat(32));
        let m = manifest_for(vec![good, missing]);

        let pool = TaskPool::new(None);
        let results = verify_all(&pool, &m, dir.path()).await;
        assert_eq!(results.len(), 2);
        let by_path: std::collections::BTreeMap<String, Outcome> = results
            .into_iter()
            .map(|r| r.unwrap())
            .map(|r| (r.asset.path().to_string(), r.outcome))
            .collect();
        assert_eq!(by_path["good.bin"], Outcome::Ok);
        assert_eq!(by_path["missing.bin"], Outcome::MissingFile);
    }
}
