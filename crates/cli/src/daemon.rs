//! PID and log file bookkeeping for background monitors.
//!
//! Each detached monitor writes `~/.harbinger-<pid>.pid` containing its PID
//! and repository path on two lines, and logs to `~/.harbinger.<pid>.log`.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::platform::ProcessControl;

/// Set in the environment of a detached child.
pub const DETACHED_ENV: &str = "HARBINGER_DETACHED";

/// PID file written by releases that supported only one monitor.
const LEGACY_PID_FILE: &str = ".harbinger.pid";
const PID_PREFIX: &str = ".harbinger-";
const PID_SUFFIX: &str = ".pid";
const LOG_PREFIX: &str = ".harbinger.";
const LOG_SUFFIX: &str = ".log";

/// Log files smaller than this are considered startup noise.
const SMALL_LOG_BYTES: u64 = 1024;
/// Lines that only record a monitor starting up.
const STARTUP_MARKERS: &[&str] = &[
    "starting monitor",
    "opened git repository",
    "initial sync status",
    "starting polling loop",
    "wrote PID file",
];

/// A running background monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorRecord {
    pub pid: u32,
    pub repo_path: String,
    pub pid_file: PathBuf,
}

/// Directory that holds PID and log files.
pub fn state_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

pub fn pid_file_path(dir: &Path, pid: u32) -> PathBuf {
    dir.join(format!("{PID_PREFIX}{pid}{PID_SUFFIX}"))
}

pub fn log_file_path(dir: &Path, pid: u32) -> PathBuf {
    dir.join(format!("{LOG_PREFIX}{pid}{LOG_SUFFIX}"))
}

/// Write `pid\nrepo` to `path`.
pub fn write_pid_file(path: &Path, pid: u32, repo: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create PID file directory")?;
    }
    fs::write(path, format!("{pid}\n{}\n", repo.display())).context("failed to write PID file")?;
    info!(pid, path = %path.display(), "wrote PID file");
    Ok(())
}

/// Parse PID file contents. A missing repository line reads as `unknown`.
///
/// PIDs outside `1..=i32::MAX` are rejected: as `pid_t` they would address a
/// process group or every process the user owns.
pub fn parse_pid_file(contents: &str) -> Option<(u32, String)> {
    let mut lines = contents.lines();
    let pid: u32 = lines.next()?.trim().parse().ok()?;
    if pid == 0 || i32::try_from(pid).is_err() {
        return None;
    }
    let repo = lines
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or("unknown")
        .to_string();
    Some((pid, repo))
}

pub fn remove_pid_file(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).context("failed to remove PID file")?;
        info!(path = %path.display(), "removed PID file");
    }
    Ok(())
}

/// Removes the PID file when the monitor exits.
pub struct PidFileGuard {
    path: PathBuf,
}

impl PidFileGuard {
    pub fn create(path: PathBuf, pid: u32, repo: &Path) -> Result<Self> {
        write_pid_file(&path, pid, repo)?;
        Ok(Self { path })
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        if let Err(e) = remove_pid_file(&self.path) {
            warn!(error = %e, "failed to remove PID file");
        }
    }
}

/// All live monitors with PID files in `dir`. Stale PID files are deleted.
pub fn find_monitors<P: ProcessControl + ?Sized>(dir: &Path, control: &P) -> Result<Vec<MonitorRecord>> {
    let mut monitors = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(monitors),
        Err(e) => return Err(e).context("failed to read state directory"),
    };

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let is_pid_file = name == LEGACY_PID_FILE
            || (name.starts_with(PID_PREFIX) && name.ends_with(PID_SUFFIX));
        if !is_pid_file {
            continue;
        }

        let path = entry.path();
        let Ok(contents) = fs::read_to_string(&path) else {
            continue;
        };
        let Some((pid, repo_path)) = parse_pid_file(&contents) else {
            debug!(path = %path.display(), "ignoring unreadable PID file");
            continue;
        };

        if control.is_alive(pid) {
            monitors.push(MonitorRecord {
                pid,
                repo_path,
                pid_file: path,
            });
        } else {
            info!(pid, "removing stale PID file");
            remove_pid_file(&path)?;
        }
    }

    monitors.sort_by_key(|m| m.pid);
    Ok(monitors)
}

/// Stop one monitor, remove its PID file and tidy up its log.
pub fn stop_monitor<P: ProcessControl + ?Sized>(
    dir: &Path,
    record: &MonitorRecord,
    control: &P,
) -> Result<()> {
    let result = control
        .send_stop_signal(record.pid)
        .with_context(|| format!("failed to stop monitor (PID {})", record.pid));
    remove_pid_file(&record.pid_file)?;
    result?;

    let log = log_file_path(dir, record.pid);
    if cleanup_log_file(&log)? {
        debug!(path = %log.display(), "removed startup-only log file");
    }
    Ok(())
}

/// Delete `path` if it is small or holds only startup lines.
/// Returns whether it was removed.
pub fn cleanup_log_file(path: &Path) -> Result<bool> {
    let Ok(meta) = fs::metadata(path) else {
        return Ok(false);
    };

    let removable = meta.len() < SMALL_LOG_BYTES || {
        let reader = BufReader::new(fs::File::open(path)?);
        let lines: Vec<String> = reader.lines().take(10).collect::<Result<_, _>>()?;
        lines.len() < 10
            && lines.iter().all(|line| {
                line.trim().is_empty() || STARTUP_MARKERS.iter().any(|m| line.contains(m))
            })
    };

    if removable {
        fs::remove_file(path).context("failed to remove log file")?;
    }
    Ok(removable)
}

/// Log files in `dir` as `(pid, path, size)`, sorted by PID.
pub fn list_log_files(dir: &Path) -> Result<Vec<(u32, PathBuf, u64)>> {
    let mut logs = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(logs),
        Err(e) => return Err(e).context("failed to read state directory"),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let pid = name
            .strip_prefix(LOG_PREFIX)
            .and_then(|rest| rest.strip_suffix(LOG_SUFFIX))
            .and_then(|pid| pid.parse::<u32>().ok());
        if let Some(pid) = pid {
            logs.push((pid, entry.path(), entry.metadata()?.len()));
        }
    }
    logs.sort_by_key(|(pid, _, _)| *pid);
    Ok(logs)
}
