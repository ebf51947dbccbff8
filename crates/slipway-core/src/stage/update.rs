//! The update stage: bring every content root into conformance with its
//! manifest. No-op in offline mode.
//!
//! Order of operations: take the directory locks, delete extraneous files,
//! create missing directories, then reconcile every asset as an independent
//! parallel task (hash-verify the local file, or download while hashing in a
//! single pass). Task results are funneled through one consumer so progress
//! accounting and logging stay totally ordered. The batch is never abandoned
//! early: all tasks finish, then the stage fails if any outcome was bad.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use url::Url;

use crate::context::{RunContext, TargetWithManifests};
use crate::diff::{self, ContentDiff};
use crate::error::{LaunchError, TransportError};
use crate::fetch;
use crate::hashing::HashAlgorithm;
use crate::lock;
use crate::manifest::Asset;
use crate::progress::{self, PercentageCounter};
use crate::verify::{Outcome, VerificationResult};

use super::StageEnv;

pub(crate) const PROGRESS: (u8, u8) = (5, 95);
const PROGRESS_DELETE_EXTRA: u8 = PROGRESS.0 + 2;
const PROGRESS_MKDIRS: u8 = PROGRESS.0 + 4;
const PROGRESS_DOWNLOAD_START: u8 = PROGRESS.0 + 5;

/// Bound on draining the result sink once every task has finished. Blowing
/// this is a leak we refuse to tolerate in this stage.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

pub async fn run(env: &StageEnv, ctx: &mut RunContext) -> Result<(), LaunchError> {
    if env.config.offline {
        return Ok(());
    }
    env.observer
        .notify(PROGRESS.0, Some("Updating application files..."));
    tracing::info!("starting to update files in online mode");

    let mut locks = ctx
        .locks
        .take()
        .ok_or_else(|| LaunchError::Internal(anyhow!("prepare stage did not populate locks")))?;

    let outcome = match lock::lock_all(&mut locks) {
        Ok(true) => update_locked(env, ctx).await,
        Ok(false) => Err(LaunchError::Fatal(
            "Unable to lock directories for update".to_string(),
        )),
        Err(e) => Err(LaunchError::Fatal(format!(
            "Unable to lock directories for update: {e:#}"
        ))),
    };
    lock::unlock_all_and_delete(locks);

    outcome?;
    tracing::info!("updates complete");
    Ok(())
}

async fn update_locked(env: &StageEnv, ctx: &RunContext) -> Result<(), LaunchError> {
    let target = ctx
        .target()
        .ok_or_else(|| LaunchError::Internal(anyhow!("fetch stage did not populate the target")))?;
    let total_size = target.total_size();
    tracing::info!("manifest(s) specify {total_size} bytes in total");

    let mut diffs = Vec::new();
    for (root, manifest) in target.bindings() {
        let disk = diff::disk_sizes(root)?;
        diffs.push((root.clone(), diff::diff(&diff::manifest_sizes(manifest), &disk)));
    }

    env.observer.notify(PROGRESS_DELETE_EXTRA, None);
    delete_extraneous(&diffs);

    env.observer.notify(PROGRESS_MKDIRS, None);
    create_missing_directories(target);

    env.observer.notify(PROGRESS_DOWNLOAD_START, None);
    reconcile_all(env, ctx, target, total_size, &diffs).await
}

fn delete_extraneous(diffs: &[(PathBuf, ContentDiff)]) {
    for (root, diff) in diffs {
        for (path, size) in &diff.extraneous {
            let file = root.join(path);
            tracing::info!("deleting extra file {} of size {size}", file.display());
            if let Err(e) = std::fs::remove_file(&file) {
                tracing::warn!("unable to delete file {}: {e}", file.display());
            }
        }
    }
}

fn create_missing_directories(target: &TargetWithManifests) {
    for (root, manifest) in target.bindings() {
        for asset in manifest.assets() {
            let file = root.join(asset.path());
            let Some(parent) = file.parent() else { continue };
            if !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!("failed to create directory {}: {e}", parent.display());
                }
            }
        }
    }
}

/// Message from a reconcile task to the single-consumer sink.
enum TaskReport {
    Outcome(VerificationResult),
    Failed(anyhow::Error),
}

async fn reconcile_all(
    env: &StageEnv,
    ctx: &RunContext,
    target: &TargetWithManifests,
    total_size: u64,
    diffs: &[(PathBuf, ContentDiff)],
) -> Result<(), LaunchError> {
    let counter = Arc::new(progress::scaled_counter(
        total_size,
        PROGRESS_DOWNLOAD_START,
        PROGRESS.1,
        Arc::clone(&env.observer),
    ));

    let (tx, rx) = mpsc::unbounded_channel::<TaskReport>();
    let sink = tokio::spawn(run_result_sink(rx, Arc::clone(&counter)));

    let mut join_set = JoinSet::new();
    for ((root, diff), (_, manifest)) in diffs.iter().zip(target.bindings()) {
        let base_url = ctx
            .base_url_for(root)
            .cloned()
            .ok_or_else(|| LaunchError::Internal(anyhow!("no base URL recorded for {}", root.display())))?;
        for asset in manifest.assets() {
            let size_matches = diff.common.contains_key(asset.path());
            let task = reconcile_task(
                base_url.clone(),
                root.clone(),
                manifest.hash_algorithm(),
                asset.clone(),
                size_matches,
            );
            let pool = env.pool.clone();
            let tx = tx.clone();
            join_set.spawn(async move {
                let report = match pool.run(task).await {
                    Ok(Ok(result)) => TaskReport::Outcome(result),
                    Ok(Err(e)) | Err(e) => TaskReport::Failed(e),
                };
                let _ = tx.send(report);
            });
        }
    }
    drop(tx);

    let mut join_failed = false;
    while let Some(joined) = join_set.join_next().await {
        if let Err(e) = joined {
            tracing::error!("BUG: update task failed to join: {e}");
            join_failed = true;
        }
    }

    // Every sender is gone; the sink must drain promptly.
    let sink_failed = tokio::time::timeout(DRAIN_GRACE, sink)
        .await
        .map_err(|_| LaunchError::Fatal("BUG: unable to drain update results".to_string()))?
        .map_err(|e| LaunchError::Internal(anyhow!("result sink join: {e}")))?;

    if sink_failed || join_failed {
        return Err(LaunchError::Fatal(
            "Update process failed because one or more files failed verification".to_string(),
        ));
    }
    Ok(())
}

/// Single consumer of task results: counts verified bytes into the progress
/// counter and logs failures in arrival order. Returns whether any asset
/// failed.
async fn run_result_sink(
    mut rx: mpsc::UnboundedReceiver<TaskReport>,
    counter: Arc<PercentageCounter>,
) -> bool {
    let mut failed = false;
    while let Some(report) = rx.recv().await {
        match report {
            TaskReport::Outcome(r) => match r.outcome {
                Outcome::Ok => counter.add(r.asset.size()),
                Outcome::HashDiffers => {
                    failed = true;
                    tracing::warn!(
                        "downloaded hash differs for {} under {}",
                        r.asset.path(),
                        r.content_root.display()
                    );
                }
                Outcome::SizeDiffers => {
                    failed = true;
                    tracing::warn!(
                        "downloaded size differs for {} under {}",
                        r.asset.path(),
                        r.content_root.display()
                    );
                }
                Outcome::MissingFile => {
                    failed = true;
                    tracing::warn!("asset {} missing on server", r.asset.path());
                }
            },
            TaskReport::Failed(e) => {
                failed = true;
                tracing::error!("update task failed with unknown error: {e:#}");
            }
        }
    }
    failed
}

/// The blocking verify-or-fetch unit for one asset.
fn reconcile_task(
    base_url: Url,
    content_root: PathBuf,
    algorithm: HashAlgorithm,
    asset: Asset,
    size_matches: bool,
) -> impl FnOnce() -> Result<VerificationResult> + Send + 'static {
    move || {
        let outcome = reconcile_asset(&base_url, &content_root, algorithm, &asset, size_matches)?;
        Ok(VerificationResult {
            content_root,
            asset,
            outcome,
        })
    }
}

fn reconcile_asset(
    base_url: &Url,
    content_root: &Path,
    algorithm: HashAlgorithm,
    asset: &Asset,
    size_matches: bool,
) -> Result<Outcome> {
    let file = content_root.join(asset.path());

    // Size already matches: a hash match means no network access at all.
    if size_matches {
        if algorithm.hash_file(&file)? == asset.hash() {
            return Ok(Outcome::Ok);
        }
        tracing::debug!("H> {}", asset.path());
    }

    if file.exists() {
        tracing::debug!("S> {}", asset.path());
        if let Err(e) = std::fs::remove_file(&file) {
            tracing::warn!("unable to delete {}: {e}", file.display());
        }
    } else {
        tracing::debug!("X> {}", asset.path());
    }

    let url = fetch::join_url(base_url, asset.path())
        .with_context(|| format!("resolving {} against {base_url}", asset.path()))?;
    match fetch::http_get_hashed(&url, &file, algorithm) {
        Ok(download) => {
            if download.digest == asset.hash() {
                Ok(Outcome::Ok)
            } else {
                Ok(Outcome::HashDiffers)
            }
        }
        Err(TransportError::Status(code)) => {
            tracing::warn!("unable to download {url}: HTTP {code}");
            remove_partial(&file);
            Ok(Outcome::MissingFile)
        }
        Err(e) => {
            remove_partial(&file);
            Err(e).with_context(|| format!("download {url}"))
        }
    }
}

fn remove_partial(file: &Path) {
    if file.exists() {
        if let Err(e) = std::fs::remove_file(file) {
            tracing::warn!("unable to delete partial file {}: {e}", file.display());
        }
    }
}
