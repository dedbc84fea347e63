//! `harbinger monitor`: foreground polling, or a detached background copy of
//! itself.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use humantime_serde::re::humantime;
use tracing::{info, warn};

use harbinger_core::conflict::scan_unmerged;
use harbinger_core::{HarbingerConfig, Monitor, Notifier, RefStore, TickReport};

use super::{open_repo, print_sync_state, resolve_in_terminal};
use crate::daemon::{self, PidFileGuard, DETACHED_ENV};
use crate::platform::{self, ProcessControl};
use crate::scheduler::run_polling_loop;
use crate::signals::setup_signal_handlers;
use crate::ui;

#[derive(Debug, Clone)]
pub struct MonitorArgs {
    pub interval: Option<Duration>,
    pub path: PathBuf,
    pub branch: Option<String>,
    pub detach: bool,
}

/// Whether this process is the detached child of `monitor --detach`.
pub fn is_detached_child() -> bool {
    std::env::var_os(DETACHED_ENV).is_some()
}

pub async fn run(
    config: HarbingerConfig,
    args: MonitorArgs,
    config_path: Option<&Path>,
) -> Result<()> {
    if args.detach && !is_detached_child() {
        return spawn_detached(&args, config_path);
    }
    run_loop(config, args).await
}

/// Re-run this executable as a background monitor and return immediately.
fn spawn_detached(args: &MonitorArgs, config_path: Option<&Path>) -> Result<()> {
    // Fail here, where the error is visible, rather than in the child.
    let repo = open_repo(&args.path)?;
    if let Some(branch) = &args.branch {
        harbinger_core::git::validate_ref_name(branch)?;
    }

    let exe = std::env::current_exe().context("failed to locate the harbinger executable")?;
    let mut cmd = Command::new(exe);
    if let Some(path) = config_path {
        cmd.arg("--config").arg(path);
    }
    cmd.arg("monitor").arg("--path").arg(repo.repo_path());
    if let Some(interval) = args.interval {
        cmd.arg("--interval")
            .arg(humantime::format_duration(interval).to_string());
    }
    if let Some(branch) = &args.branch {
        cmd.arg("--branch").arg(branch);
    }
    cmd.env(DETACHED_ENV, "1")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    platform::native().set_detached_attributes(&mut cmd);

    let child = cmd.spawn().context("failed to start background monitor")?;
    let pid = child.id();
    info!(pid, "spawned background monitor");

    let log = daemon::log_file_path(&daemon::state_dir()?, pid);
    println!(
        "{}",
        ui::success(&format!(
            "Monitoring {} in the background (PID {pid})",
            repo.repo_path().display()
        ))
    );
    println!("  Logs: {}", ui::dim(&log.display().to_string()));
    println!("  Stop: harbinger stop {pid}");
    Ok(())
}

async fn run_loop(mut config: HarbingerConfig, args: MonitorArgs) -> Result<()> {
    let detached = is_detached_child();
    if let Some(interval) = args.interval {
        config.poll_interval = interval;
        config.validate()?;
    }

    let repo = open_repo(&args.path)?;
    let repo_path = repo.repo_path().to_path_buf();
    let poll_interval = config.poll_interval;
    let editor = config.editor.clone();
    let notifier = Notifier::new(config.notifications);
    let mut monitor = Monitor::new(repo, config, notifier, args.branch)?;

    let _pid_file = if detached {
        let pid = std::process::id();
        let path = daemon::pid_file_path(&daemon::state_dir()?, pid);
        Some(PidFileGuard::create(path, pid, &repo_path)?)
    } else {
        None
    };

    let initial = tokio::task::block_in_place(|| monitor.start())
        .context("failed to read initial repository state")?;

    if !detached {
        println!();
        println!("{}", ui::header(&format!("harbinger: watching {}", repo_path.display())));
        println!(
            "{}",
            ui::dim(&format!(
                "Polling every {}. Press Ctrl+C to stop.",
                humantime::format_duration(poll_interval)
            ))
        );
        println!();
        match &initial {
            Some(state) => print_sync_state(state),
            None => println!("{}", ui::dim("Current branch is ignored; waiting for a switch.")),
        }
        println!();
    }

    let shutdown = setup_signal_handlers();
    let mut prompted = false;
    run_polling_loop(&mut monitor, poll_interval, shutdown, |monitor, report| {
        if detached {
            return;
        }
        print_tick(report);
        if report.merge_in_progress && !prompted {
            prompted = true;
            offer_resolution(monitor, editor.clone());
        } else if !report.merge_in_progress {
            prompted = false;
        }
    })
    .await?;

    info!("monitor stopped");
    Ok(())
}

fn print_tick(report: &TickReport) {
    let time = report.checked_at.with_timezone(&chrono::Local).format("%H:%M:%S");
    for notification in &report.notifications {
        let line = format!("[{time}] {}: {}", notification.title, notification.message);
        println!("{}", ui::warn(&line));
    }
    if report.has_conflicts() {
        println!(
            "{}",
            ui::dim("Conflicts predicted. Merge when ready, then run `harbinger resolve`.")
        );
    }
    if let Some(reason) = &report.integration_error {
        println!("{}", ui::dim(&format!("Remote changes not integrated: {reason}")));
    }
}

/// Run a resolution session for a merge started outside harbinger.
fn offer_resolution<R: RefStore>(monitor: &Monitor<R>, editor: Option<String>) {
    let repo = monitor.repo();
    let result = tokio::task::block_in_place(|| -> Result<()> {
        let conflicts = scan_unmerged(repo)?;
        if conflicts.is_empty() {
            return Ok(());
        }
        println!();
        println!(
            "{}",
            ui::warn(&format!("Merge in progress with {} conflicted file(s)", conflicts.len()))
        );
        let outcomes = resolve_in_terminal(repo, &conflicts, editor)?;
        println!("{}", ui::outcome_table(&outcomes));
        Ok(())
    });
    if let Err(e) = result {
        warn!(error = %format!("{e:#}"), "interactive resolution ended");
        println!("{}", ui::error(&format!("{e:#}")));
    }
}
