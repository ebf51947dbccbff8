//! Fetch the manifest(s) for the launch target.
//!
//! Online: each configured base URL is tried in order; a transport failure
//! falls through to the next URL, and running out of URLs is fatal. Offline:
//! the manifest is read from the existing on-disk copy instead of any network
//! call. The manifests are not written back to disk here.

use std::path::Path;

use url::Url;

use crate::config::ContentBinding;
use crate::context::{RunContext, TargetWithManifests};
use crate::error::LaunchError;
use crate::fetch::{http_get_bytes, join_url};
use crate::manifest::{codec, Manifest, ManifestKind, MANIFEST_FILE};

use super::StageEnv;

pub(crate) const PROGRESS: (u8, u8) = (2, 5);

pub async fn run(env: &StageEnv, ctx: &mut RunContext) -> Result<(), LaunchError> {
    env.observer.notify(PROGRESS.0, Some("Fetching manifests..."));

    let target = &env.config.target;
    let mut bindings = Vec::new();

    let app = fetch_binding(env, ctx, &target.application, ManifestKind::Standalone).await?;
    bindings.push((target.application.content_root.clone(), app));
    if let Some(runtime) = &target.runtime {
        let rt = fetch_binding(env, ctx, runtime, ManifestKind::Runtime).await?;
        bindings.push((runtime.content_root.clone(), rt));
    }

    ctx.target = Some(TargetWithManifests::new(bindings));
    env.observer.notify(PROGRESS.1, None);
    Ok(())
}

/// Fetch and decode one binding's manifest, record the source URL in the
/// context, and require the declared kind to match the binding. The
/// application binding always carries a standalone manifest; only the
/// runtime binding carries a runtime one.
async fn fetch_binding(
    env: &StageEnv,
    ctx: &mut RunContext,
    binding: &ContentBinding,
    expected: ManifestKind,
) -> Result<Manifest, LaunchError> {
    let (source, text) = if env.config.offline {
        read_local_manifest(&binding.content_root)?
    } else {
        fetch_remote_manifest(env, binding).await?
    };

    let manifest = codec::decode(&text)?;
    if manifest.kind() != expected {
        return Err(LaunchError::Verification(format!(
            "Manifest at {source} must be a {} manifest type",
            expected.as_str()
        )));
    }
    ctx.base_urls.insert(binding.content_root.clone(), source);
    Ok(manifest)
}

fn read_local_manifest(content_root: &Path) -> Result<(Url, String), LaunchError> {
    let manifest_file = content_root.join(MANIFEST_FILE);
    tracing::info!("trying to read manifest from {}", manifest_file.display());
    if !manifest_file.is_file() {
        return Err(LaunchError::Fatal(format!(
            "Offline mode enabled but no manifest file at {}",
            manifest_file.display()
        )));
    }
    let text = std::fs::read_to_string(&manifest_file)
        .map_err(|e| LaunchError::Fatal(format!("Unable to read {}: {e}", manifest_file.display())))?;
    let absolute = std::fs::canonicalize(&manifest_file)
        .unwrap_or_else(|_| manifest_file.clone());
    let url = Url::from_file_path(&absolute).map_err(|()| {
        LaunchError::Fatal(format!("Unable to express {} as a URL", manifest_file.display()))
    })?;
    Ok((url, text))
}

async fn fetch_remote_manifest(
    env: &StageEnv,
    binding: &ContentBinding,
) -> Result<(Url, String), LaunchError> {
    for base in &binding.base_urls {
        let url = match join_url(base, MANIFEST_FILE) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("skipping malformed manifest url under {base}: {e}");
                continue;
            }
        };
        tracing::info!("trying to fetch manifest from {url}");
        let fetch_url = url.clone();
        match env.pool.run(move || http_get_bytes(&fetch_url)).await {
            Ok(Ok(bytes)) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                return Ok((base.clone(), text));
            }
            Ok(Err(e)) => {
                tracing::warn!("unable to download manifest from {url}: {e}");
            }
            Err(e) => {
                tracing::error!("unknown error during manifest download from {url}: {e:#}");
            }
        }
    }
    Err(LaunchError::Fatal(
        "Unable to download manifest from any URLs".to_string(),
    ))
}
