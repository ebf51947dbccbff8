//! Launcher configuration, loaded from a TOML file.
//!
//! The file is parsed into raw serde structs and then validated into the
//! resolved [`Config`] the pipeline works with; URL and per-kind requirement
//! errors surface before any stage runs.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use url::Url;

use crate::manifest::ManifestKind;

/// Default number of log lines kept for the failure backtrace display.
pub const DEFAULT_SCROLLBACK: usize = 10_000;

#[derive(Debug, Deserialize)]
struct RawConfig {
    name: String,
    #[serde(default)]
    offline: bool,
    /// Worker pool bound; absent = unbounded.
    #[serde(default)]
    pool_size: Option<usize>,
    /// Override for the directory rename probe; defaults to the platform gate.
    #[serde(default)]
    rename_probe: Option<bool>,
    #[serde(default)]
    scrollback: Option<usize>,
    application: RawApplication,
    #[serde(default)]
    runtime: Option<RawRuntime>,
}

#[derive(Debug, Deserialize)]
struct RawApplication {
    /// `jvm` or `std`.
    kind: String,
    content_root: PathBuf,
    base_urls: Vec<String>,
    #[serde(default)]
    args: Vec<String>,
    /// Standalone only: command to execute, relative to the content root.
    #[serde(default)]
    command: Option<String>,
    /// Runtime-kind only: class to hand off to.
    #[serde(default)]
    entry_class: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRuntime {
    content_root: PathBuf,
    base_urls: Vec<String>,
    #[serde(default)]
    args: Vec<String>,
}

/// One manifest/content-root binding: where the files live locally and which
/// origins serve them.
#[derive(Debug, Clone)]
pub struct ContentBinding {
    pub content_root: PathBuf,
    pub base_urls: Vec<Url>,
}

/// Resolved launch target.
#[derive(Debug, Clone)]
pub struct LaunchTarget {
    pub kind: ManifestKind,
    pub application: ContentBinding,
    pub args: Vec<String>,
    /// Standalone: the command to execute.
    pub command: Option<String>,
    /// Runtime kind: the runtime's own binding plus JVM arguments and entry
    /// class.
    pub runtime: Option<ContentBinding>,
    pub runtime_args: Vec<String>,
    pub entry_class: Option<String>,
}

impl LaunchTarget {
    /// All content roots of the target, application first.
    pub fn content_roots(&self) -> Vec<&ContentBinding> {
        let mut roots = vec![&self.application];
        if let Some(runtime) = &self.runtime {
            roots.push(runtime);
        }
        roots
    }
}

/// Validated launcher configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub offline: bool,
    pub pool_size: Option<usize>,
    pub rename_probe: bool,
    pub scrollback: usize,
    pub target: LaunchTarget,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&text)
            .with_context(|| format!("parse config {}", path.display()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let kind = ManifestKind::from_str(&raw.application.kind)
            .with_context(|| format!("application kind '{}' is not supported", raw.application.kind))?;

        let application = ContentBinding {
            content_root: raw.application.content_root,
            base_urls: parse_urls(&raw.application.base_urls, "application.base_urls")?,
        };

        let (command, entry_class, runtime, runtime_args) = match kind {
            ManifestKind::Standalone => {
                let command = raw
                    .application
                    .command
                    .context("standalone applications need application.command")?;
                if raw.runtime.is_some() {
                    bail!("standalone applications do not take a [runtime] section");
                }
                (Some(command), None, None, Vec::new())
            }
            ManifestKind::Runtime => {
                let entry_class = raw
                    .application
                    .entry_class
                    .context("jvm applications need application.entry_class")?;
                let rt = raw.runtime.context("jvm applications need a [runtime] section")?;
                let runtime = ContentBinding {
                    content_root: rt.content_root,
                    base_urls: parse_urls(&rt.base_urls, "runtime.base_urls")?,
                };
                (None, Some(entry_class), Some(runtime), rt.args)
            }
        };

        Ok(Self {
            name: raw.name,
            offline: raw.offline,
            pool_size: raw.pool_size,
            rename_probe: raw.rename_probe.unwrap_or(cfg!(windows)),
            scrollback: raw.scrollback.unwrap_or(DEFAULT_SCROLLBACK),
            target: LaunchTarget {
                kind,
                application,
                args: raw.application.args,
                command,
                runtime,
                runtime_args,
                entry_class,
            },
        })
    }
}

fn parse_urls(urls: &[String], field: &str) -> Result<Vec<Url>> {
    if urls.is_empty() {
        bail!("{field} must list at least one URL");
    }
    urls.iter()
        .map(|u| Url::parse(u).with_context(|| format!("{field} contains a malformed url '{u}'")))
        .collect()
}
