//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over the configured `log_level` in both modes.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Compact logging to stderr for interactive commands.
pub fn init_terminal(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Timestamped logging to `path` for a detached monitor.
///
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init_file(path: &Path, level: &str) -> Result<WorkerGuard> {
    let dir = path.parent().context("log file has no parent directory")?;
    let name = path.file_name().context("log file has no file name")?;
    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}
