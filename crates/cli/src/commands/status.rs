use std::path::Path;

use anyhow::{Context, Result};

use harbinger_core::conflict::SimulatorOptions;
use harbinger_core::{HarbingerConfig, RefStore, SyncEvaluator};

use super::{open_repo, print_sync_state};
use crate::ui;

/// Fetch and evaluate once.
pub fn run(config: &HarbingerConfig, path: &Path, branch: Option<&str>) -> Result<()> {
    let repo = open_repo(path)?;
    repo.fetch_all().context("failed to fetch from remotes")?;

    let current = repo.current_branch().context("failed to read current branch")?;
    let compare = branch.unwrap_or(&current);
    let options = SimulatorOptions {
        allow_scratch_merge: config.scratch_merge_fallback,
    };
    let state = SyncEvaluator::new(&repo, options)
        .evaluate(&current, compare)
        .with_context(|| format!("failed to evaluate {current} against {compare}"))?;

    println!();
    println!("{}", ui::header(&format!("harbinger: {}", repo.repo_path().display())));
    println!("{}", "═".repeat(40));
    print_sync_state(&state);

    if repo.is_merge_in_progress()? {
        println!();
        println!(
            "{}",
            ui::warn("Merge in progress. Run `harbinger resolve` to work through conflicts.")
        );
    }
    if config.is_ignored(&current) {
        println!("{}", ui::dim("This branch is in ignore_branches; the monitor skips it."));
    }
    println!();
    Ok(())
}
