//! Subcommand implementations.

pub mod logs;
pub mod monitor;
pub mod resolve;
pub mod status;
pub mod stop;

use std::path::Path;

use anyhow::{Context, Result};

use harbinger_core::conflict::{CommandEditorLauncher, Conflict, ResolutionOutcome};
use harbinger_core::{GitRepository, RefStore, ResolutionSession, SyncState};

use crate::ui::{self, TerminalInput, TerminalPresenter};

pub(crate) fn open_repo(path: &Path) -> Result<GitRepository> {
    GitRepository::open(path)
        .with_context(|| format!("failed to open git repository at {}", path.display()))
}

/// Run an interactive session on stdin/stdout.
pub(crate) fn resolve_in_terminal<R: RefStore>(
    repo: &R,
    conflicts: &[Conflict],
    editor: Option<String>,
) -> Result<Vec<ResolutionOutcome>> {
    let mut input = TerminalInput::detect();
    let mut presenter = TerminalPresenter::stdout();
    let launcher = CommandEditorLauncher;
    let outcomes = ResolutionSession::new(repo, &mut input, &mut presenter, &launcher)
        .with_editor(editor)
        .resolve(conflicts)
        .context("conflict resolution aborted")?;
    Ok(outcomes)
}

/// Print a [`SyncState`] as an indented block.
pub(crate) fn print_sync_state(state: &SyncState) {
    println!("  Branch     {}", state.branch);
    if state.compare_branch != state.branch {
        println!("  Target     {}", state.compare_branch);
    }
    println!("  Local      {}", ui::short_sha(&state.local_commit));
    match &state.remote_commit {
        Some(remote) => println!("  Remote     {} ({})", ui::short_sha(remote), state.remote_ref),
        None => println!("  Remote     {}", ui::dim(&format!("{} not found", state.remote_ref))),
    }
    println!();

    if state.is_in_sync() {
        if state.has_upstream() {
            println!("{}", ui::success("In sync with remote"));
        } else {
            println!("{}", ui::warn("No remote branch to compare against"));
        }
        return;
    }

    println!(
        "{}",
        ui::warn(&format!(
            "Out of sync: {} ahead, {} behind",
            state.ahead, state.behind
        ))
    );
    if state.has_conflicts {
        println!(
            "{}",
            ui::error(&format!(
                "{} file(s) would conflict on merge",
                state.conflicts.len()
            ))
        );
        println!("{}", ui::conflict_table(&state.conflicts));
    } else if state.behind > 0 {
        println!("{}", ui::success("Remote changes merge cleanly"));
    }
}
