//! The `launch` command: load configuration, run the full stage pipeline.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use slipway_core::config::Config;
use slipway_core::launcher;
use slipway_core::logging::Scrollback;

use crate::cli::console::ConsoleObserver;

pub async fn run_launch(config_path: &Path, offline: bool, scrollback: Scrollback) -> Result<bool> {
    let mut config = Config::load(config_path)?;
    if offline {
        config.offline = true;
    }
    tracing::debug!("loaded config: {config:?}");

    let observer = Arc::new(ConsoleObserver::new(&config.name));
    Ok(launcher::run(config, observer, scrollback).await)
}
