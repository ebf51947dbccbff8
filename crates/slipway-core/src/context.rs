//! Mutable state threaded through the stage pipeline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use url::Url;

use crate::lock::DirectoryUpdateLock;
use crate::manifest::Manifest;

/// The launch target's manifests, paired with their content roots.
/// Application first; a runtime-kind target additionally carries the runtime
/// manifest.
#[derive(Debug, Clone)]
pub struct TargetWithManifests {
    bindings: Vec<(PathBuf, Manifest)>,
}

impl TargetWithManifests {
    pub fn new(bindings: Vec<(PathBuf, Manifest)>) -> Self {
        Self { bindings }
    }

    pub fn bindings(&self) -> &[(PathBuf, Manifest)] {
        &self.bindings
    }

    /// The application manifest's binding (always present).
    pub fn application(&self) -> &(PathBuf, Manifest) {
        &self.bindings[0]
    }

    /// The runtime manifest's binding, if the target has one.
    pub fn runtime(&self) -> Option<&(PathBuf, Manifest)> {
        self.bindings.get(1)
    }

    /// Total size of every asset across all manifests.
    pub fn total_size(&self) -> u64 {
        self.bindings.iter().map(|(_, m)| m.total_size()).sum()
    }
}

/// Run context owned by the pipeline driver. Each stage reads what earlier
/// stages wrote and may fill in its own field: prepare adds the locks, fetch
/// adds the winning base URL per content root and the manifests.
#[derive(Default)]
pub struct RunContext {
    pub locks: Option<Vec<DirectoryUpdateLock>>,
    pub base_urls: BTreeMap<PathBuf, Url>,
    pub target: Option<TargetWithManifests>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base URL recorded for a content root by the fetch stage.
    pub fn base_url_for(&self, content_root: &Path) -> Option<&Url> {
        self.base_urls.get(content_root)
    }

    /// The target with manifests; available after the fetch stage.
    pub fn target(&self) -> Option<&TargetWithManifests> {
        self.target.as_ref()
    }
}
