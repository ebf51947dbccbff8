//! Initial stage: create content root directories and construct the
//! directory locks the update stage will take.
//!
//! Fails when a content root cannot be created, or when the lock
//! construction's rename probe detects the directory is in use.

use crate::context::RunContext;
use crate::error::LaunchError;
use crate::lock::DirectoryUpdateLock;

use super::StageEnv;

pub(crate) const PROGRESS: (u8, u8) = (0, 2);

pub fn run(env: &StageEnv, ctx: &mut RunContext) -> Result<(), LaunchError> {
    env.observer
        .notify(PROGRESS.0, Some("Preparing application directories..."));

    let mut locks = Vec::new();
    for binding in env.config.target.content_roots() {
        let root = &binding.content_root;
        if root.is_file() {
            return Err(LaunchError::Fatal(format!(
                "Content root {} is a file but must be a directory",
                root.display()
            )));
        }
        if !root.is_dir() {
            std::fs::create_dir_all(root).map_err(|e| {
                LaunchError::Fatal(format!(
                    "Failed to create content root {}: {e}",
                    root.display()
                ))
            })?;
        }
        let lock = DirectoryUpdateLock::new(root, env.config.rename_probe).map_err(|e| {
            LaunchError::Fatal(format!(
                "Unable to prepare directory {} for update: {e:#}",
                root.display()
            ))
        })?;
        locks.push(lock);
    }

    ctx.locks = Some(locks);
    env.observer.notify(PROGRESS.1, None);
    Ok(())
}
