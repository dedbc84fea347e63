use std::fs;

use anyhow::{Context, Result};

use crate::daemon::{list_log_files, log_file_path, state_dir};
use crate::ui;

/// Print the log of monitor `pid`, or list the available logs.
pub fn run(pid: Option<u32>) -> Result<()> {
    let dir = state_dir()?;

    let Some(pid) = pid else {
        let logs = list_log_files(&dir)?;
        if logs.is_empty() {
            println!("No log files found.");
            println!(
                "{}",
                ui::dim("Log files are created when monitors are run with --detach.")
            );
            return Ok(());
        }
        println!("{}", ui::header("Available log files"));
        for (pid, path, size) in logs {
            println!("  PID {pid}: {} {}", path.display(), ui::dim(&format!("({size} bytes)")));
        }
        println!();
        println!("Use `harbinger logs <PID>` to view a specific log file.");
        return Ok(());
    };

    let path = log_file_path(&dir, pid);
    if !path.exists() {
        println!(
            "No log file found for PID {pid} at {}. Is the monitor running in detached mode?",
            path.display()
        );
        return Ok(());
    }
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read log file {}", path.display()))?;
    print!("{contents}");
    Ok(())
}
