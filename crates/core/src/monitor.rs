//! One polling cycle of the repository monitor.
//!
//! [`Monitor`] owns the repository, the configuration and the notifier. The
//! scheduler in the CLI calls [`Monitor::tick`] on every interval; nothing
//! about conflicts is remembered between ticks, only the branch name, the
//! last remote commit seen and whether the last tick ended in sync.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::config::HarbingerConfig;
use crate::conflict::SimulatorOptions;
use crate::errors::GitError;
use crate::git::{validate_ref_name, RefStore};
use crate::notify::{Notification, Notifier};
use crate::sync::{SyncEvaluator, SyncState};

/// What one tick observed and did.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub checked_at: DateTime<Utc>,
    pub branch: String,
    /// The branch is listed in `ignore_branches`; nothing was evaluated.
    pub skipped: bool,
    /// Final state after any integration.
    pub state: Option<SyncState>,
    /// Remote changes were pulled or merged this tick.
    pub integrated: bool,
    /// Why integration was attempted and refused or failed.
    pub integration_error: Option<String>,
    /// A merge is in progress in the working tree.
    pub merge_in_progress: bool,
    pub notifications: Vec<Notification>,
}

impl TickReport {
    fn new(branch: String) -> Self {
        Self {
            checked_at: Utc::now(),
            branch,
            skipped: false,
            state: None,
            integrated: false,
            integration_error: None,
            merge_in_progress: false,
            notifications: Vec::new(),
        }
    }

    pub fn has_conflicts(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.has_conflicts)
    }
}

pub struct Monitor<R: RefStore> {
    repo: R,
    config: HarbingerConfig,
    notifier: Notifier,
    /// Remote branch to compare against instead of the current branch.
    target_branch: Option<String>,
    current_branch: Option<String>,
    /// `(remote_ref, commit)` from the previous evaluation.
    last_remote: Option<(String, String)>,
    last_in_sync: bool,
}

impl<R: RefStore> Monitor<R> {
    pub fn new(
        repo: R,
        config: HarbingerConfig,
        notifier: Notifier,
        target_branch: Option<String>,
    ) -> Result<Self, GitError> {
        if let Some(ref target) = target_branch {
            validate_ref_name(target)?;
        }
        Ok(Self {
            repo,
            config,
            notifier,
            target_branch,
            current_branch: None,
            last_remote: None,
            last_in_sync: false,
        })
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Fetch and record the initial branch and sync state.
    #[instrument(skip(self), fields(repo = %self.repo.repo_path().display()))]
    pub fn start(&mut self) -> Result<Option<SyncState>, GitError> {
        self.repo.fetch_all()?;
        let branch = self.repo.current_branch()?;
        info!(branch = %branch, target = ?self.target_branch, poll_interval = ?self.config.poll_interval, "starting monitor");
        self.current_branch = Some(branch.clone());

        if self.config.is_ignored(&branch) {
            info!(branch = %branch, "branch is ignored");
            return Ok(None);
        }

        let compare = self.compare_branch(&branch);
        let state = self.evaluator().evaluate(&branch, &compare)?;
        self.last_remote = remote_position(&state);
        self.last_in_sync = state.is_in_sync();
        info!(in_sync = self.last_in_sync, compare = %compare, "initial sync status");
        Ok(Some(state))
    }

    /// Run one polling cycle.
    #[instrument(skip(self))]
    pub fn tick(&mut self) -> Result<TickReport, GitError> {
        debug!("checking for changes");
        self.repo.fetch_all()?;

        let branch = self.repo.current_branch()?;
        if let Some(previous) = self.current_branch.as_deref() {
            if previous != branch {
                info!(from = %previous, to = %branch, "branch switch detected");
                self.last_in_sync = false;
            }
        }
        self.current_branch = Some(branch.clone());

        let mut report = TickReport::new(branch.clone());
        if self.config.is_ignored(&branch) {
            debug!(branch = %branch, "branch is ignored, skipping");
            report.skipped = true;
            return Ok(report);
        }

        let compare = self.compare_branch(&branch);
        let mut state = self.evaluator().evaluate(&branch, &compare)?;
        self.track_remote(&mut report, &state);

        if !state.is_in_sync() {
            let remote = state.remote_commit.as_deref().unwrap_or_default();
            if self.last_in_sync {
                let notification = Notification::out_of_sync(&branch, &state.local_commit, remote);
                self.emit(&mut report, notification);
            }
            if state.behind > 0 {
                self.emit(&mut report, Notification::behind_remote(&branch, state.behind));
            }
            if state.has_conflicts {
                self.emit(&mut report, Notification::conflicts(state.conflicts.len()));
                info!("conflicts predicted; run `harbinger resolve` after merging");
            } else if state.behind > 0 && self.should_integrate(&branch, &compare) {
                match self.integrate(&state) {
                    Ok(()) => {
                        report.integrated = true;
                        self.emit(&mut report, Notification::auto_pull(&branch, state.behind));
                        state = self.evaluator().evaluate(&branch, &compare)?;
                    }
                    Err(e) => {
                        warn!(error = %e, "automatic integration skipped");
                        report.integration_error = Some(e.to_string());
                    }
                }
            }
        }

        let in_sync = state.is_in_sync();
        if in_sync && !self.last_in_sync {
            self.emit(&mut report, Notification::in_sync(&branch));
        }
        self.last_in_sync = in_sync;

        report.merge_in_progress = self.repo.is_merge_in_progress()?;
        report.state = Some(state);
        Ok(report)
    }

    fn compare_branch(&self, branch: &str) -> String {
        self.target_branch
            .clone()
            .unwrap_or_else(|| branch.to_string())
    }

    fn evaluator(&self) -> SyncEvaluator<'_, R> {
        SyncEvaluator::new(
            &self.repo,
            SimulatorOptions {
                allow_scratch_merge: self.config.scratch_merge_fallback,
            },
        )
    }

    fn should_integrate(&self, branch: &str, compare: &str) -> bool {
        if branch == compare {
            self.config.auto_sync || self.config.auto_resolve
        } else {
            self.config.auto_resolve
        }
    }

    /// Pull when tracking the same branch, merge the remote ref otherwise.
    fn integrate(&self, state: &SyncState) -> Result<(), GitError> {
        if state.branch == state.compare_branch {
            info!(branch = %state.branch, commits = state.behind, "pulling remote changes");
            self.repo.pull()
        } else {
            if self.repo.has_uncommitted_changes()? {
                return Err(GitError::UncommittedChanges {
                    operation: format!("merge {}", state.remote_ref),
                });
            }
            info!(branch = %state.branch, from = %state.remote_ref, "merging remote branch");
            self.repo.merge(&state.remote_ref)
        }
    }

    /// Notify when the compared remote commit moved since the last tick.
    fn track_remote(&mut self, report: &mut TickReport, state: &SyncState) {
        let current = remote_position(state);
        if let (Some((prev_ref, prev)), Some((remote_ref, commit))) = (&self.last_remote, &current) {
            if prev_ref == remote_ref && prev != commit {
                info!(remote = %remote_ref, commit = %commit, "remote branch updated");
                self.emit(report, Notification::remote_change(&state.compare_branch, commit));
            }
        }
        self.last_remote = current;
    }

    fn emit(&self, report: &mut TickReport, notification: Notification) {
        self.notifier.notify(&notification);
        report.notifications.push(notification);
    }
}

fn remote_position(state: &SyncState) -> Option<(String, String)> {
    state
        .remote_commit
        .clone()
        .map(|commit| (state.remote_ref.clone(), commit))
}
