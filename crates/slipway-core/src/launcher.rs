//! Top-level launcher driver: wires configuration, the progress observer,
//! the worker pool, and the stage pipeline together, and turns the pipeline's
//! error taxonomy into the terminal failure display.

use std::sync::Arc;

use crate::config::Config;
use crate::context::RunContext;
use crate::error::LaunchError;
use crate::logging::Scrollback;
use crate::pool::TaskPool;
use crate::progress::ProgressObserver;
use crate::stage::{self, StageEnv};

/// Run the whole launch pipeline. Returns whether it succeeded; on failure
/// the observer has already been shown the user-facing message plus the
/// recent log tail.
pub async fn run(
    config: Config,
    observer: Arc<dyn ProgressObserver>,
    scrollback: Scrollback,
) -> bool {
    tracing::info!(
        application = %config.name,
        offline = config.offline,
        "starting launch pipeline"
    );
    let pool = TaskPool::new(config.pool_size);
    let env = StageEnv {
        config: Arc::new(config),
        observer: Arc::clone(&observer),
        pool,
    };
    let mut ctx = RunContext::new();

    observer.show();
    match stage::run_pipeline(&env, &mut ctx).await {
        Ok(()) => {
            observer.await_close();
            true
        }
        Err(LaunchError::Verification(message)) => {
            tracing::error!("manifest failed to verify: {message}");
            observer.report_failure(&message, &scrollback.tail());
            false
        }
        Err(LaunchError::Fatal(message)) => {
            tracing::error!("fatal error: {message}");
            observer.report_failure(&message, &scrollback.tail());
            false
        }
        Err(LaunchError::Internal(e)) => {
            tracing::error!("BUG: unknown error occurred: {e:#}");
            observer.report_failure("Unknown error", &scrollback.tail());
            false
        }
    }
}
