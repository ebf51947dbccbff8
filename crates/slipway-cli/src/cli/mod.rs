//! CLI for the Slipway launcher.

mod commands;
mod console;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use slipway_core::logging::Scrollback;

use commands::{run_launch, run_manifest_create, run_manifest_verify};

/// Top-level CLI for the Slipway launcher.
#[derive(Debug, Parser)]
#[command(name = "slipway")]
#[command(about = "Slipway: manifest-driven application launcher/updater", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Update the configured application from its origins, then launch it.
    Launch {
        /// Path to the launcher configuration file (TOML).
        #[arg(long, value_name = "FILE")]
        config: PathBuf,

        /// Verify against the on-disk manifest without any network access.
        #[arg(long)]
        offline: bool,
    },

    /// Create or verify content manifests.
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ManifestAction {
    /// Scan a content directory and write a fresh manifest for it.
    ///
    /// `create jvm <CONTENT_PATH> <RUNTIME_PATH>` for a runtime manifest,
    /// `create std <CONTENT_PATH>` for a standalone one.
    Create {
        /// Application kind: `jvm` or `std`.
        kind: String,
        /// The content directory to scan.
        content_path: PathBuf,
        /// Relative path of the runtime executable (jvm manifests only).
        runtime_path: Option<String>,
    },

    /// Verify a content directory against its existing manifest.
    Verify {
        /// The content directory to verify.
        content_path: PathBuf,
    },
}

impl CliCommand {
    /// Parse arguments and dispatch. `Ok(false)` means the command ran and
    /// reported its own failure (exit code 1 without a second diagnostic).
    pub async fn run_from_args(scrollback: Scrollback) -> Result<bool> {
        let cli = Cli::parse();
        match cli.command {
            CliCommand::Launch { config, offline } => {
                run_launch(&config, offline, scrollback).await
            }
            CliCommand::Manifest { action } => {
                match action {
                    ManifestAction::Create {
                        kind,
                        content_path,
                        runtime_path,
                    } => run_manifest_create(&kind, &content_path, runtime_path.as_deref()).await?,
                    ManifestAction::Verify { content_path } => {
                        run_manifest_verify(&content_path).await?
                    }
                }
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests;
