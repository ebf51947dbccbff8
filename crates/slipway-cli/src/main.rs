use slipway_core::config::DEFAULT_SCROLLBACK;
use slipway_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Initialize logging as early as possible; fall back to stderr when the
    // log file cannot be opened.
    let scrollback = match logging::init_logging(DEFAULT_SCROLLBACK) {
        Ok(scrollback) => scrollback,
        Err(_) => logging::init_logging_stderr(DEFAULT_SCROLLBACK),
    };

    match CliCommand::run_from_args(scrollback).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("slipway error: {err:#}");
            std::process::exit(1);
        }
    }
}
