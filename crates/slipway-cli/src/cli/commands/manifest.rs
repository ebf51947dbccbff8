//! The `manifest create` / `manifest verify` commands.

use std::path::Path;

use anyhow::{bail, Context, Result};

use slipway_core::hashing::HashAlgorithm;
use slipway_core::manifest::{codec, scan, Manifest, ManifestKind, MANIFEST_FILE};
use slipway_core::pool::TaskPool;
use slipway_core::verify::{self, Outcome};

pub async fn run_manifest_create(
    kind: &str,
    content_path: &Path,
    runtime_path: Option<&str>,
) -> Result<()> {
    let kind = ManifestKind::from_str(kind)
        .with_context(|| format!("application type '{kind}' is invalid"))?;
    if !content_path.is_dir() {
        bail!("'{}' is not a directory", content_path.display());
    }
    let manifest_file = content_path.join(MANIFEST_FILE);
    if manifest_file.exists() {
        bail!(
            "The manifest file '{}' already exists. Delete it and try again.",
            manifest_file.display()
        );
    }

    let pool = TaskPool::new(None);
    let assets = scan::scan_content_root(&pool, content_path, HashAlgorithm::Sha256).await?;
    let manifest = match kind {
        ManifestKind::Runtime => {
            let runtime_path =
                runtime_path.context("please specify the relative path of the runtime executable")?;
            let executable = content_path.join(runtime_path);
            if !executable.is_file() {
                bail!("runtime executable is not a file: {}", executable.display());
            }
            Manifest::runtime(assets, HashAlgorithm::Sha256, Some(runtime_path.to_string()))?
        }
        ManifestKind::Standalone => {
            if runtime_path.is_some() {
                bail!("std manifests do not take a runtime executable path");
            }
            Manifest::standalone(assets, HashAlgorithm::Sha256)?
        }
    };

    let comment = generation_comment();
    std::fs::write(&manifest_file, codec::encode_with_comment(&manifest, &comment))
        .with_context(|| format!("write {}", manifest_file.display()))?;
    println!("{}", manifest_file.display());
    Ok(())
}

pub async fn run_manifest_verify(content_path: &Path) -> Result<()> {
    if !content_path.is_dir() {
        bail!("'{}' is not a directory", content_path.display());
    }
    let manifest_file = content_path.join(MANIFEST_FILE);
    if !manifest_file.is_file() {
        bail!("The manifest file '{}' does not exist", manifest_file.display());
    }

    let text = std::fs::read_to_string(&manifest_file)
        .with_context(|| format!("read {}", manifest_file.display()))?;
    let manifest = codec::decode(&text)?;

    let pool = TaskPool::new(None);
    let mut fail = false;
    for result in verify::verify_all(&pool, &manifest, content_path).await {
        match result {
            Ok(r) if r.outcome == Outcome::Ok => {}
            Ok(r) => {
                fail = true;
                eprintln!("{} failed to verify with outcome: {}", r.asset.path(), r.outcome);
            }
            Err(e) => {
                fail = true;
                eprintln!("verification error: {e:#}");
            }
        }
    }
    if fail {
        bail!("one or more files failed to verify");
    }
    Ok(())
}

fn generation_comment() -> String {
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    format!("Auto-generated by {user} with the slipway manifest tool")
}
