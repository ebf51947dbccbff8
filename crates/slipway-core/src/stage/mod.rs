//! The launch pipeline: a fixed, ordered sequence of stages, each owning an
//! inclusive slice of the 0-100 progress scale. Stages run strictly
//! sequentially against a shared [`RunContext`]; the pipeline halts on the
//! first stage that fails.

pub mod fetch;
pub mod launch;
pub mod offline_verify;
pub mod prepare;
pub mod update;
pub mod write;

use std::sync::Arc;

use crate::config::Config;
use crate::context::RunContext;
use crate::error::LaunchError;
use crate::pool::TaskPool;
use crate::progress::ProgressObserver;

/// The stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageId {
    PrepareDirectories,
    FetchManifests,
    OfflineVerify,
    Update,
    WriteManifests,
    Launch,
}

impl StageId {
    pub const ALL: [StageId; 6] = [
        StageId::PrepareDirectories,
        StageId::FetchManifests,
        StageId::OfflineVerify,
        StageId::Update,
        StageId::WriteManifests,
        StageId::Launch,
    ];

    /// Inclusive `[low, high]` progress slice owned by the stage. The
    /// offline-verify and update stages share a slice because exactly one of
    /// them does work in any given run.
    pub fn progress_range(self) -> (u8, u8) {
        match self {
            StageId::PrepareDirectories => prepare::PROGRESS,
            StageId::FetchManifests => fetch::PROGRESS,
            StageId::OfflineVerify => offline_verify::PROGRESS,
            StageId::Update => update::PROGRESS,
            StageId::WriteManifests => write::PROGRESS,
            StageId::Launch => launch::PROGRESS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StageId::PrepareDirectories => "prepare-directories",
            StageId::FetchManifests => "fetch-manifests",
            StageId::OfflineVerify => "offline-verify",
            StageId::Update => "update",
            StageId::WriteManifests => "write-manifests",
            StageId::Launch => "launch",
        }
    }
}

/// Shared collaborators handed to every stage alongside the run context.
pub struct StageEnv {
    pub config: Arc<Config>,
    pub observer: Arc<dyn ProgressObserver>,
    pub pool: TaskPool,
}

/// Run every stage in order. A stage error stops the pipeline; no later
/// stage runs.
pub async fn run_pipeline(env: &StageEnv, ctx: &mut RunContext) -> Result<(), LaunchError> {
    for stage in StageId::ALL {
        tracing::debug!(stage = stage.name(), "starting stage");
        match stage {
            StageId::PrepareDirectories => prepare::run(env, ctx)?,
            StageId::FetchManifests => fetch::run(env, ctx).await?,
            StageId::OfflineVerify => offline_verify::run(env, ctx).await?,
            StageId::Update => update::run(env, ctx).await?,
            StageId::WriteManifests => write::run(env, ctx)?,
            StageId::Launch => launch::run(env, ctx).await?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_slices_cover_the_scale_in_order() {
        assert_eq!(StageId::PrepareDirectories.progress_range(), (0, 2));
        assert_eq!(StageId::FetchManifests.progress_range(), (2, 5));
        assert_eq!(StageId::OfflineVerify.progress_range(), (5, 95));
        assert_eq!(StageId::Update.progress_range(), (5, 95));
        assert_eq!(StageId::WriteManifests.progress_range(), (95, 97));
        assert_eq!(StageId::Launch.progress_range(), (97, 100));
    }
}
