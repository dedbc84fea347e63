//! Polling scheduler for the repository monitor.

use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use harbinger_core::{Monitor, RefStore, TickReport};

use crate::signals::Shutdown;

/// Tick `monitor` every `poll_interval` until shutdown is requested.
///
/// `on_report` sees every successful tick; a failed tick is logged and the
/// loop carries on.
pub async fn run_polling_loop<R, H>(
    monitor: &mut Monitor<R>,
    poll_interval: Duration,
    shutdown: Shutdown,
    mut on_report: H,
) -> Result<()>
where
    R: RefStore,
    H: FnMut(&Monitor<R>, &TickReport),
{
    info!(
        interval_secs = poll_interval.as_secs(),
        "starting polling loop"
    );

    loop {
        if shutdown.is_requested() {
            info!("shutdown requested, exiting polling loop");
            break;
        }

        let check = shutdown.begin_check();
        // Git subprocesses block; keep them off the async workers.
        let result = tokio::task::block_in_place(|| monitor.tick());
        drop(check);
        match result {
            Ok(report) => {
                log_report(&report);
                on_report(monitor, &report);
            }
            Err(e) => {
                error!(error = %e, "monitor tick failed");
            }
        }

        // Sleep with early exit on shutdown
        let sleep_step = Duration::from_secs(1).min(poll_interval);
        let mut slept = Duration::ZERO;
        while slept < poll_interval {
            if shutdown.is_requested() {
                info!("shutdown requested during sleep, exiting");
                return Ok(());
            }
            tokio::time::sleep(sleep_step).await;
            slept += sleep_step;
        }
    }

    Ok(())
}

fn log_report(report: &TickReport) {
    if report.skipped {
        return;
    }
    if let Some(state) = &report.state {
        if !state.is_in_sync() {
            info!(
                branch = %report.branch,
                ahead = state.ahead,
                behind = state.behind,
                conflicts = state.conflicts.len(),
                "branch diverged from remote"
            );
        }
    }
    if report.integrated {
        info!(branch = %report.branch, "integrated remote changes");
    }
    if let Some(reason) = &report.integration_error {
        warn!(reason = %reason, "remote changes not integrated");
    }
    if report.merge_in_progress {
        warn!("merge in progress; run `harbinger resolve` to work through conflicts");
    }
}
