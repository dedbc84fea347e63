use std::path::Path;

use anyhow::Result;

use harbinger_core::conflict::scan_unmerged;
use harbinger_core::{HarbingerConfig, RefStore};

use super::{open_repo, resolve_in_terminal};
use crate::ui;

/// Walk through every unmerged file of an in-progress merge.
pub fn run(config: &HarbingerConfig, path: &Path) -> Result<()> {
    let repo = open_repo(path)?;

    if !repo.is_merge_in_progress()? {
        println!(
            "{}",
            ui::success("No merge conflicts detected. Repository is in a clean state.")
        );
        return Ok(());
    }

    let conflicts = scan_unmerged(&repo)?;
    if conflicts.is_empty() {
        println!(
            "{}",
            ui::success("All conflicts are resolved. Run `git commit` to complete the merge.")
        );
        return Ok(());
    }

    let outcomes = resolve_in_terminal(&repo, &conflicts, config.editor.clone())?;

    println!();
    println!("{}", ui::header("Resolution summary"));
    println!("{}", ui::outcome_table(&outcomes));

    let remaining = repo.unmerged_paths()?;
    if remaining.is_empty() {
        println!(
            "{}",
            ui::success("All conflicts resolved. Run `git commit` to complete the merge.")
        );
    } else {
        println!(
            "{}",
            ui::warn(&format!(
                "{} file(s) still conflicted: {}",
                remaining.len(),
                remaining.join(", ")
            ))
        );
    }
    Ok(())
}
