use anyhow::{bail, Result};

use crate::daemon::{find_monitors, state_dir, stop_monitor};
use crate::platform;
use crate::ui;

/// List monitors when neither `pid` nor `all` is given.
pub fn run(pid: Option<u32>, all: bool) -> Result<()> {
    let dir = state_dir()?;
    let control = platform::native();
    let monitors = find_monitors(&dir, &control)?;

    if monitors.is_empty() {
        println!("{}", ui::dim("No background monitors are running."));
        return Ok(());
    }

    let targets: Vec<_> = match (pid, all) {
        (Some(pid), _) => {
            let Some(record) = monitors.iter().find(|m| m.pid == pid) else {
                bail!("no harbinger monitor with PID {pid}");
            };
            vec![record.clone()]
        }
        (None, true) => monitors,
        (None, false) => {
            println!("{}", ui::header("Running monitors"));
            for m in &monitors {
                println!("  {}  {}", ui::status_running(m.pid), m.repo_path);
            }
            println!();
            println!("Use `harbinger stop <PID>` or `harbinger stop --all`.");
            return Ok(());
        }
    };

    let mut failed = 0;
    for record in &targets {
        match stop_monitor(&dir, record, &control) {
            Ok(()) => println!(
                "{}",
                ui::success(&format!("Stopped monitor {} ({})", record.pid, record.repo_path))
            ),
            Err(e) => {
                failed += 1;
                println!("{}", ui::error(&format!("{e:#}")));
            }
        }
    }
    if failed > 0 {
        bail!("{failed} monitor(s) could not be stopped");
    }
    Ok(())
}
