//! Manifest data model: a named, hash-verified set of assets.
//!
//! A manifest is immutable once constructed. It is built either by scanning a
//! content directory ([`scan`]) or by decoding the on-disk/wire property map
//! ([`codec`]).

pub mod codec;
pub mod scan;

use thiserror::Error;

use crate::hashing::HashAlgorithm;

/// File name of the manifest inside a content root.
pub const MANIFEST_FILE: &str = "slipway.manifest";

/// Default runtime executable path when a runtime manifest omits `java.path`.
const DEFAULT_RUNTIME_PATH: &str = "bin/java";

/// A manifest or part of it failed to verify. The message is user-facing.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ManifestError(pub String);

/// One file in a manifest: relative path, byte size, content digest under the
/// manifest's hash algorithm (lowercase hex).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    path: String,
    size: u64,
    hash: String,
}

impl Asset {
    pub fn new(path: impl Into<String>, size: u64, hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size,
            hash: hash.into(),
        }
    }

    /// Path relative to the content root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Lowercase hex digest.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Kind of a manifest and of the application target it belongs to.
///
/// A runtime-kind application carries two manifests and only one of them is
/// runtime-kind: the runtime itself. Wire names are `jvm` and `std`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    Runtime,
    Standalone,
}

impl ManifestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ManifestKind::Runtime => "jvm",
            ManifestKind::Standalone => "std",
        }
    }

    pub fn from_str(name: &str) -> Option<Self> {
        match name {
            "jvm" => Some(ManifestKind::Runtime),
            "std" => Some(ManifestKind::Standalone),
            _ => None,
        }
    }
}

/// The authoritative, hash-protected description of a content root's expected
/// file set.
///
/// Assets are held sorted by path with unique paths; both are enforced at
/// construction, as is the runtime-kind invariant that `runtime_path` names
/// exactly one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    kind: ManifestKind,
    hash_algorithm: HashAlgorithm,
    assets: Vec<Asset>,
    runtime_path: Option<String>,
}

impl Manifest {
    /// Build a standalone manifest.
    pub fn standalone(
        assets: Vec<Asset>,
        hash_algorithm: HashAlgorithm,
    ) -> Result<Self, ManifestError> {
        Ok(Self {
            kind: ManifestKind::Standalone,
            hash_algorithm,
            assets: sorted_unique(assets)?,
            runtime_path: None,
        })
    }

    /// Build a runtime manifest. `runtime_path` defaults to `bin/java` and
    /// must name one of the assets.
    pub fn runtime(
        assets: Vec<Asset>,
        hash_algorithm: HashAlgorithm,
        runtime_path: Option<String>,
    ) -> Result<Self, ManifestError> {
        let assets = sorted_unique(assets)?;
        let runtime_path = runtime_path.unwrap_or_else(|| DEFAULT_RUNTIME_PATH.to_string());
        if !assets.iter().any(|a| a.path() == runtime_path) {
            return Err(ManifestError(format!(
                "Unable to find the runtime executable referenced by '{runtime_path}'"
            )));
        }
        Ok(Self {
            kind: ManifestKind::Runtime,
            hash_algorithm,
            assets,
            runtime_path: Some(runtime_path),
        })
    }

    pub fn kind(&self) -> ManifestKind {
        self.kind
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// Relative path of the runtime executable; present iff the manifest is
    /// runtime-kind.
    pub fn runtime_path(&self) -> Option<&str> {
        self.runtime_path.as_deref()
    }

    /// Sum of all asset sizes in bytes.
    pub fn total_size(&self) -> u64 {
        self.assets.iter().map(Asset::size).sum()
    }
}

fn sorted_unique(mut assets: Vec<Asset>) -> Result<Vec<Asset>, ManifestError> {
    assets.sort_by(|a, b| a.path.cmp(&b.path));
    for pair in assets.windows(2) {
        if pair[0].path == pair[1].path {
            return Err(ManifestError(format!(
                "Duplicate asset path '{}' in manifest",
                pair[0].path
            )));
        }
    }
    Ok(assets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(path: &str) -> Asset {
        Asset::new(path, 1, "aa".repeat(32))
    }

    #[test]
    fn assets_sorted_by_path() {
        let m = Manifest::standalone(
            vec![asset("b/two"), asset("a/one")],
            HashAlgorithm::Sha256,
        )
        .unwrap();
        let paths: Vec<&str> = m.assets().iter().map(Asset::path).collect();
        assert_eq!(paths, ["a/one", "b/two"]);
    }

    #[test]
    fn duplicate_paths_rejected() {
        let err = Manifest::standalone(vec![asset("x"), asset("x")], HashAlgorithm::Sha256)
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate asset path"));
    }

    #[test]
    fn runtime_path_must_name_an_asset() {
        let err = Manifest::runtime(
            vec![asset("lib/rt.jar")],
            HashAlgorithm::Sha256,
            Some("bin/java".into()),
        )
        .unwrap_err();
        assert!(err.to_string().contains("bin/java"));

        let m = Manifest::runtime(
            vec![asset("bin/java"), asset("lib/rt.jar")],
            HashAlgorithm::Sha256,
            None,
        )
        .unwrap();
        assert_eq!(m.runtime_path(), Some("bin/java"));
    }

    #[test]
    fn total_size_sums_assets() {
        let m = Manifest::standalone(
            vec![
                Asset::new("a", 10, "aa".repeat(32)),
                Asset::new("b", 32, "bb".repeat(32)),
            ],
            HashAlgorithm::Sha256,
        )
        .unwrap();
        assert_eq!(m.total_size(), 42);
    }
}
