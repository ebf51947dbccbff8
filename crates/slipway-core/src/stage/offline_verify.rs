//! Verify the manifests' assets against disk without any network access.
//! No-op unless offline mode is on.
//!
//! Failures are aggregated over the whole batch so the log shows every bad
//! asset before the stage fails.

use anyhow::anyhow;

use crate::context::RunContext;
use crate::error::LaunchError;
use crate::verify::{self, Outcome};

use super::StageEnv;

pub(crate) const PROGRESS: (u8, u8) = (5, 95);

pub async fn run(env: &StageEnv, ctx: &mut RunContext) -> Result<(), LaunchError> {
    if !env.config.offline {
        return Ok(());
    }
    tracing::info!("starting to verify files in offline mode");
    env.observer
        .notify(PROGRESS.0, Some("Verifying in offline mode..."));

    let target = ctx
        .target()
        .ok_or_else(|| LaunchError::Internal(anyhow!("fetch stage did not populate the target")))?;

    let mut failed = false;
    for (root, manifest) in target.bindings() {
        for result in verify::verify_all(&env.pool, manifest, root).await {
            match result {
                Ok(r) if r.outcome == Outcome::Ok => {}
                Ok(r) => {
                    failed = true;
                    tracing::warn!(
                        "asset {} in content root {} failed to verify with outcome {}",
                        r.asset.path(),
                        root.display(),
                        r.outcome
                    );
                }
                Err(e) => {
                    failed = true;
                    tracing::error!("unknown error during file verification: {e:#}");
                }
            }
        }
    }

    if failed {
        return Err(LaunchError::Fatal(
            "One or more files failed to verify".to_string(),
        ));
    }
    env.observer.notify(PROGRESS.1, None);
    Ok(())
}
