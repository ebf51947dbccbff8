//! The final stage: hand off to the application that was just updated.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::anyhow;

use crate::context::{RunContext, TargetWithManifests};
use crate::error::LaunchError;
use crate::manifest::ManifestKind;

use super::StageEnv;

pub(crate) const PROGRESS: (u8, u8) = (97, 100);

/// How long to watch the spawned process before declaring the hand-off done.
/// A child that dies with a non-zero code inside this window fails the stage.
const EXIT_GRACE: Duration = Duration::from_millis(500);

pub async fn run(env: &StageEnv, ctx: &mut RunContext) -> Result<(), LaunchError> {
    let target = ctx
        .target()
        .ok_or_else(|| LaunchError::Internal(anyhow!("fetch stage did not populate the target")))?;
    env.observer
        .notify(PROGRESS.0, Some("Launching application..."));

    let command = match env.config.target.kind {
        ManifestKind::Standalone => standalone_command(env)?,
        ManifestKind::Runtime => runtime_command(env, target)?,
    };
    spawn_and_watch(command).await?;

    env.observer.notify(PROGRESS.1, None);
    Ok(())
}

fn standalone_command(env: &StageEnv) -> Result<Command, LaunchError> {
    let target = &env.config.target;
    let command = target
        .command
        .as_ref()
        .ok_or_else(|| LaunchError::Internal(anyhow!("standalone target without a command")))?;
    let root = &target.application.content_root;
    let program = root.join(command);
    ensure_executable(&program)?;

    tracing::info!("launching standalone target {}", program.display());
    let mut cmd = Command::new(&program);
    cmd.args(&target.args).current_dir(root);
    Ok(cmd)
}

fn runtime_command(
    env: &StageEnv,
    target: &TargetWithManifests,
) -> Result<Command, LaunchError> {
    let config_target = &env.config.target;
    let (runtime_root, runtime_manifest) = target
        .runtime()
        .ok_or_else(|| LaunchError::Internal(anyhow!("runtime target without a runtime manifest")))?;
    let runtime_path = runtime_manifest
        .runtime_path()
        .ok_or_else(|| LaunchError::Internal(anyhow!("runtime manifest without a runtime path")))?;
    let entry_class = config_target
        .entry_class
        .as_ref()
        .ok_or_else(|| LaunchError::Internal(anyhow!("runtime target without an entry class")))?;

    let java = runtime_root.join(runtime_path);
    ensure_executable(&java)?;

    let (app_root, app_manifest) = target.application();
    tracing::info!("launching runtime target via {}", java.display());

    let mut cmd = Command::new(&java);
    cmd.env_clear();
    cmd.env("JAVA_HOME", runtime_root);
    cmd.args(&config_target.runtime_args);
    let jars: Vec<&str> = app_manifest
        .assets()
        .iter()
        .map(|a| a.path())
        .filter(|p| p.ends_with(".jar"))
        .collect();
    if !jars.is_empty() {
        let separator = if cfg!(windows) { ";" } else { ":" };
        cmd.arg("-cp").arg(jars.join(separator));
    }
    cmd.arg(entry_class);
    cmd.args(&config_target.args);
    cmd.current_dir(app_root);
    Ok(cmd)
}

#[cfg(unix)]
fn ensure_executable(program: &Path) -> Result<(), LaunchError> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = std::fs::metadata(program).map_err(|e| {
        LaunchError::Fatal(format!("Cannot execute {}: {e}", program.display()))
    })?;
    let mut permissions = metadata.permissions();
    if permissions.mode() & 0o111 == 0 {
        permissions.set_mode(permissions.mode() | 0o755);
        std::fs::set_permissions(program, permissions).map_err(|e| {
            LaunchError::Fatal(format!("Cannot execute {}: {e}", program.display()))
        })?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_executable(program: &Path) -> Result<(), LaunchError> {
    if !program.is_file() {
        return Err(LaunchError::Fatal(format!(
            "Cannot execute {}",
            program.display()
        )));
    }
    Ok(())
}

async fn spawn_and_watch(mut command: Command) -> Result<(), LaunchError> {
    tracing::info!("executing {command:?}");
    let mut child = command
        .spawn()
        .map_err(|e| LaunchError::Fatal(format!("Unable to execute process: {e}")))?;

    tokio::time::sleep(EXIT_GRACE).await;
    match child.try_wait() {
        Ok(Some(status)) if !status.success() => Err(LaunchError::Fatal(format!(
            "Application exited with non-zero code {}",
            status.code().unwrap_or(-1)
        ))),
        Ok(Some(_)) => Ok(()),
        Ok(None) => {
            tracing::debug!("application still running after hand-off");
            Ok(())
        }
        Err(e) => Err(LaunchError::Internal(anyhow!(
            "checking application status: {e}"
        ))),
    }
}
