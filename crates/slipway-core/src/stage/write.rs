//! Write the fetched manifest(s) back to their content roots, mainly so a
//! later offline run can read them from disk.

use anyhow::anyhow;

use crate::context::RunContext;
use crate::error::LaunchError;
use crate::manifest::{codec, MANIFEST_FILE};

use super::StageEnv;

pub(crate) const PROGRESS: (u8, u8) = (95, 97);

pub fn run(env: &StageEnv, ctx: &mut RunContext) -> Result<(), LaunchError> {
    let target = ctx
        .target()
        .ok_or_else(|| LaunchError::Internal(anyhow!("fetch stage did not populate the target")))?;
    env.observer
        .notify(PROGRESS.0, Some("Writing out manifests..."));

    for (root, manifest) in target.bindings() {
        let path = root.join(MANIFEST_FILE);
        let text = codec::encode_with_comment(manifest, "updated by slipway");
        if let Err(e) = std::fs::write(&path, text) {
            tracing::error!("unable to write manifest {}: {e}", path.display());
            return Err(LaunchError::Fatal(
                "Error while writing the manifest file".to_string(),
            ));
        }
        tracing::info!("wrote manifest {}", path.display());
    }

    env.observer.notify(PROGRESS.1, None);
    Ok(())
}
