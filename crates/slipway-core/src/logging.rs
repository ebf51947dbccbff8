//! Logging init: file under the XDG state dir, or graceful fallback to
//! stderr, with every formatted line also kept in an in-memory scrollback so
//! a terminal failure can show the recent log history.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Bounded buffer of the most recent formatted log lines.
#[derive(Clone)]
pub struct Scrollback {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl Scrollback {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    fn push_bytes(&self, buf: &[u8]) {
        let text = String::from_utf8_lossy(buf);
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        for line in text.lines().filter(|l| !l.is_empty()) {
            if lines.len() == self.capacity {
                lines.pop_front();
            }
            lines.push_back(line.to_string());
        }
    }

    /// The retained lines, oldest first.
    pub fn tail(&self) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.iter().cloned().collect()
    }
}

/// Writer for one log event: the scrollback plus a file (or stderr when the
/// file handle could not be cloned).
enum Sink {
    File(fs::File),
    Stderr,
}

struct TeeWriter {
    scrollback: Scrollback,
    sink: Sink,
}

impl io::Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scrollback.push_bytes(buf);
        match &mut self.sink {
            Sink::File(f) => f.write(buf),
            Sink::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::File(f) => f.flush(),
            Sink::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct TeeMakeWriter {
    scrollback: Scrollback,
    file: Option<fs::File>,
}

impl<'a> MakeWriter<'a> for TeeMakeWriter {
    type Writer = TeeWriter;

    fn make_writer(&'a self) -> Self::Writer {
        let sink = self
            .file
            .as_ref()
            .and_then(|f| f.try_clone().ok())
            .map(Sink::File)
            .unwrap_or(Sink::Stderr);
        TeeWriter {
            scrollback: self.scrollback.clone(),
            sink,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,slipway=debug"))
}

fn init_with(file: Option<fs::File>, scrollback_lines: usize) -> Scrollback {
    let scrollback = Scrollback::new(scrollback_lines);
    let writer = BoxMakeWriter::new(TeeMakeWriter {
        scrollback: scrollback.clone(),
        file,
    });
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .init();
    scrollback
}

/// Initialize structured logging to `~/.local/state/slipway/slipway.log`.
/// On failure (e.g. log dir unwritable), returns Err so the caller can fall
/// back to [`init_logging_stderr`].
pub fn init_logging(scrollback_lines: usize) -> Result<Scrollback> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("slipway")?;
    let log_dir = xdg_dirs.get_state_home().join("slipway");
    fs::create_dir_all(&log_dir)?;
    let log_file_path: PathBuf = log_dir.join("slipway.log");
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    let scrollback = init_with(Some(file), scrollback_lines);
    tracing::info!("slipway logging initialized at {}", log_file_path.display());
    Ok(scrollback)
}

/// Initialize logging to stderr only (no file). Use when [`init_logging`]
/// fails so the launcher still reports what happened.
pub fn init_logging_stderr(scrollback_lines: usize) -> Scrollback {
    init_with(None, scrollback_lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrollback_keeps_most_recent_lines() {
        let sb = Scrollback::new(3);
        for i in 0..5 {
            sb.push_bytes(format!("line {i}\n").as_bytes());
        }
        assert_eq!(sb.tail(), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn scrollback_splits_multi_line_writes() {
        let sb = Scrollback::new(10);
        sb.push_bytes(b"first\nsecond\n");
        assert_eq!(sb.tail(), vec!["first", "second"]);
    }
}
