//! Sync evaluation between a local branch and its remote counterpart.

use tracing::{debug, info, instrument};

use crate::conflict::{Conflict, MergeSimulator, SimulatorOptions};
use crate::errors::GitError;
use crate::git::{validate_ref_name, RefStore};

/// Snapshot of one branch against its remote, computed fresh per tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub branch: String,
    /// Branch on the remote the local branch is compared with.
    pub compare_branch: String,
    /// `<remote>/<compare_branch>`.
    pub remote_ref: String,
    pub local_commit: String,
    /// `None` when the remote branch does not exist.
    pub remote_commit: Option<String>,
    pub ahead: usize,
    pub behind: usize,
    pub has_conflicts: bool,
    pub conflicts: Vec<Conflict>,
}

impl SyncState {
    /// True when the commits match, or there is no remote to diverge from.
    pub fn is_in_sync(&self) -> bool {
        self.remote_commit
            .as_deref()
            .map_or(true, |remote| remote == self.local_commit)
    }

    pub fn has_upstream(&self) -> bool {
        self.remote_commit.is_some()
    }
}

/// Computes [`SyncState`] using a [`RefStore`] and a [`MergeSimulator`].
pub struct SyncEvaluator<'a, R: RefStore> {
    repo: &'a R,
    simulator: MergeSimulator<'a, R>,
}

impl<'a, R: RefStore> SyncEvaluator<'a, R> {
    pub fn new(repo: &'a R, options: SimulatorOptions) -> Self {
        Self {
            repo,
            simulator: MergeSimulator::new(repo, options),
        }
    }

    /// Compare local `branch` with `compare_branch` on the branch's remote.
    ///
    /// The merge simulator only runs when the commits differ. A missing
    /// remote branch is reported as in sync, not as an error.
    #[instrument(skip(self))]
    pub fn evaluate(&self, branch: &str, compare_branch: &str) -> Result<SyncState, GitError> {
        validate_ref_name(branch)?;
        validate_ref_name(compare_branch)?;

        let remote = self.repo.remote_for_branch(branch)?;
        let remote_ref = format!("{remote}/{compare_branch}");
        let local_commit = self.repo.rev_parse(branch)?;

        let mut state = SyncState {
            branch: branch.to_string(),
            compare_branch: compare_branch.to_string(),
            remote_ref: remote_ref.clone(),
            local_commit,
            remote_commit: None,
            ahead: 0,
            behind: 0,
            has_conflicts: false,
            conflicts: Vec::new(),
        };

        let remote_commit = match self.repo.rev_parse(&remote_ref) {
            Ok(commit) => commit,
            Err(GitError::UnknownRef(_)) | Err(GitError::NoUpstream { .. }) => {
                debug!(remote_ref = %remote_ref, "no remote branch, treating as in sync");
                return Ok(state);
            }
            Err(e) => return Err(e),
        };

        if remote_commit == state.local_commit {
            state.remote_commit = Some(remote_commit);
            debug!("local and remote point at the same commit");
            return Ok(state);
        }
        state.remote_commit = Some(remote_commit);

        state.ahead = self.repo.count_commits(&remote_ref, branch)?;
        state.behind = self.repo.count_commits(branch, &remote_ref)?;
        state.conflicts = self.simulator.detect_conflicts(branch, &remote_ref)?;
        state.has_conflicts = !state.conflicts.is_empty();

        info!(
            branch,
            remote_ref = %remote_ref,
            ahead = state.ahead,
            behind = state.behind,
            conflicts = state.conflicts.len(),
            "branch diverged from remote"
        );
        Ok(state)
    }
}
