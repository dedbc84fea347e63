//! Synchronous git CLI adapter.
//!
//! [`RefStore`] is the command surface the simulator, evaluator and
//! resolution session consume; [`GitRepository`] backs it with `git`
//! subprocesses run inside the repository directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::{debug, info, instrument, warn};

use super::refname::validate_ref_name;
use crate::errors::GitError;

/// Which side of a conflicted merge to keep when checking out a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Ours,
    Theirs,
}

impl Side {
    fn flag(self) -> &'static str {
        match self {
            Self::Ours => "--ours",
            Self::Theirs => "--theirs",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ours => write!(f, "ours"),
            Self::Theirs => write!(f, "theirs"),
        }
    }
}

/// Raw result of a `git merge-tree --write-tree --name-only` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeTreeOutput {
    /// `true` when the merge would complete without conflicts.
    pub clean: bool,
    /// Standard output of the command.
    pub stdout: String,
}

/// Queries and mutations against a version-control reference store.
///
/// Every method that accepts a ref validates it before running anything.
pub trait RefStore {
    /// Absolute path of the working tree.
    fn repo_path(&self) -> &Path;

    /// Name of the currently checked-out branch.
    fn current_branch(&self) -> Result<String, GitError>;

    /// Resolve a ref to a commit id. Missing refs yield [`GitError::UnknownRef`].
    fn rev_parse(&self, rev: &str) -> Result<String, GitError>;

    /// Fetch all remotes.
    fn fetch_all(&self) -> Result<(), GitError>;

    /// Remote configured for `branch`, `origin` when none is set.
    fn remote_for_branch(&self, branch: &str) -> Result<String, GitError>;

    /// Number of commits reachable from `to` but not from `from`.
    fn count_commits(&self, from: &str, to: &str) -> Result<usize, GitError>;

    /// Non-destructive merge preview. Returns
    /// [`GitError::MergePreviewUnsupported`] on git versions without it.
    fn merge_tree(&self, ours: &str, theirs: &str) -> Result<MergeTreeOutput, GitError>;

    /// Common ancestor of two refs, `None` for unrelated histories.
    fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>, GitError>;

    /// Paths that differ between two refs.
    fn changed_paths(&self, from: &str, to: &str) -> Result<Vec<String>, GitError>;

    /// Content of `path` at `rev`, `None` when it does not exist there.
    fn show_file(&self, rev: &str, path: &str) -> Result<Option<Vec<u8>>, GitError>;

    /// Paths currently in the unmerged (conflicted) state.
    fn unmerged_paths(&self) -> Result<Vec<String>, GitError>;

    /// Read a file from the working tree.
    fn read_working_file(&self, path: &str) -> Result<String, GitError>;

    /// Overwrite the working copy of `path` with one side of the merge.
    fn checkout_side(&self, path: &str, side: Side) -> Result<(), GitError>;

    /// Stage `path`.
    fn stage(&self, path: &str) -> Result<(), GitError>;

    /// Whether the working tree or index has uncommitted changes.
    fn has_uncommitted_changes(&self) -> Result<bool, GitError>;

    /// Pull the current branch from its upstream.
    fn pull(&self) -> Result<(), GitError>;

    /// Merge `rev` into the current branch and commit.
    fn merge(&self, rev: &str) -> Result<(), GitError>;

    /// Start a `--no-commit` merge of `rev`. Conflicts are not an error.
    fn start_scratch_merge(&self, rev: &str) -> Result<(), GitError>;

    /// Abort any in-progress merge, restoring the pre-merge state.
    fn abort_merge(&self) -> Result<(), GitError>;

    /// Whether a merge is currently in progress (`MERGE_HEAD` exists).
    fn is_merge_in_progress(&self) -> Result<bool, GitError>;
}

/// [`RefStore`] backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct GitRepository {
    path: PathBuf,
}

impl GitRepository {
    /// Open the repository containing `path`.
    ///
    /// `path` may be any directory inside the worktree; the stored path is
    /// the worktree root, since git reports file paths relative to it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(GitError::RepositoryNotFound("(empty path)".into()));
        }
        let abs = path
            .canonicalize()
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;

        let probe = Self { path: abs };
        let output = probe.git(&["rev-parse", "--show-toplevel"])?;
        let toplevel = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || toplevel.is_empty() {
            return Err(GitError::RepositoryNotFound(probe.path.display().to_string()));
        }

        let repo = Self {
            path: PathBuf::from(toplevel),
        };
        info!(path = %repo.path.display(), "opened git repository");
        Ok(repo)
    }

    /// Run git with `args` and return the raw output regardless of status.
    fn git(&self, args: &[&str]) -> Result<Output, GitError> {
        debug!(cmd = ?format!("git {}", args.join(" ")), "running git command");
        Command::new("git")
            .current_dir(&self.path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    GitError::BinaryNotFound("git".into())
                } else {
                    GitError::IoError(e)
                }
            })
    }

    /// Run git and fail on a non-zero exit, returning stdout.
    fn run_git(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.git(args)?;
        if !output.status.success() {
            return Err(command_failed(args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl RefStore for GitRepository {
    fn repo_path(&self) -> &Path {
        &self.path
    }

    fn current_branch(&self) -> Result<String, GitError> {
        let out = self.run_git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    #[instrument(skip(self))]
    fn rev_parse(&self, rev: &str) -> Result<String, GitError> {
        validate_ref_name(rev)?;
        let spec = format!("{rev}^{{commit}}");
        let output = self.git(&["rev-parse", "--verify", "--quiet", &spec])?;
        if !output.status.success() {
            return Err(GitError::UnknownRef(rev.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    #[instrument(skip(self))]
    fn fetch_all(&self) -> Result<(), GitError> {
        self.run_git(&["fetch", "--all"])?;
        debug!("fetch completed");
        Ok(())
    }

    fn remote_for_branch(&self, branch: &str) -> Result<String, GitError> {
        validate_ref_name(branch)?;
        let key = format!("branch.{branch}.remote");
        let output = self.git(&["config", &key])?;
        let remote = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || remote.is_empty() {
            return Ok("origin".into());
        }
        Ok(remote)
    }

    fn count_commits(&self, from: &str, to: &str) -> Result<usize, GitError> {
        validate_ref_name(from)?;
        validate_ref_name(to)?;
        let range = format!("{from}..{to}");
        let output = self.git(&["rev-list", "--count", &range])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("unknown revision") || stderr.contains("bad revision") {
                return Err(GitError::UnknownRef(range));
            }
            return Err(command_failed(&["rev-list"], &output));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        text.trim().parse().map_err(|_| GitError::CommandFailed {
            command: "rev-list".into(),
            exit_code: 0,
            stderr: format!("unexpected commit count output: {}", text.trim()),
        })
    }

    #[instrument(skip(self))]
    fn merge_tree(&self, ours: &str, theirs: &str) -> Result<MergeTreeOutput, GitError> {
        validate_ref_name(ours)?;
        validate_ref_name(theirs)?;
        let output = self.git(&["merge-tree", "--write-tree", "--name-only", ours, theirs])?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        match output.status.code() {
            Some(0) => Ok(MergeTreeOutput { clean: true, stdout }),
            Some(1) if !stdout.trim().is_empty() => Ok(MergeTreeOutput { clean: false, stdout }),
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if stderr.contains("unknown option") || stderr.contains("usage:") {
                    let first = stderr.lines().next().unwrap_or_default().to_string();
                    debug!(%first, "merge-tree --write-tree not supported");
                    return Err(GitError::MergePreviewUnsupported(first));
                }
                Err(command_failed(&["merge-tree"], &output))
            }
        }
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>, GitError> {
        validate_ref_name(a)?;
        validate_ref_name(b)?;
        let output = self.git(&["merge-base", a, b])?;
        if output.status.success() {
            let base = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Ok(Some(base));
        }
        // Exit 1 with nothing on stderr means "no common ancestor".
        if output.status.code() == Some(1) && output.stderr.is_empty() {
            return Ok(None);
        }
        Err(command_failed(&["merge-base"], &output))
    }

    fn changed_paths(&self, from: &str, to: &str) -> Result<Vec<String>, GitError> {
        validate_ref_name(from)?;
        validate_ref_name(to)?;
        let out = self.run_git(&["diff", "--name-only", from, to])?;
        Ok(non_empty_lines(&out))
    }

    fn show_file(&self, rev: &str, path: &str) -> Result<Option<Vec<u8>>, GitError> {
        validate_ref_name(rev)?;
        let spec = format!("{rev}:{path}");
        let output = self.git(&["show", &spec])?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(output.stdout))
    }

    fn unmerged_paths(&self) -> Result<Vec<String>, GitError> {
        let out = self.run_git(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(non_empty_lines(&out))
    }

    fn read_working_file(&self, path: &str) -> Result<String, GitError> {
        let bytes = std::fs::read(self.path.join(path))?;
        Ok(String::from_utf8_lossy(&bytes).to_string())
    }

    #[instrument(skip(self))]
    fn checkout_side(&self, path: &str, side: Side) -> Result<(), GitError> {
        self.run_git(&["checkout", side.flag(), "--", path])?;
        debug!(path, %side, "checked out side");
        Ok(())
    }

    #[instrument(skip(self))]
    fn stage(&self, path: &str) -> Result<(), GitError> {
        self.run_git(&["add", "--", path])?;
        debug!(path, "staged");
        Ok(())
    }

    fn has_uncommitted_changes(&self) -> Result<bool, GitError> {
        let out = self.run_git(&["status", "--porcelain"])?;
        Ok(!out.trim().is_empty())
    }

    #[instrument(skip(self))]
    fn pull(&self) -> Result<(), GitError> {
        if self.has_uncommitted_changes()? {
            return Err(GitError::UncommittedChanges {
                operation: "pull".into(),
            });
        }
        let output = self.git(&["pull"])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("no tracking information") {
                return Err(GitError::NoUpstream {
                    branch: self.current_branch()?,
                });
            }
            return Err(command_failed(&["pull"], &output));
        }
        info!("pull completed");
        Ok(())
    }

    #[instrument(skip(self))]
    fn merge(&self, rev: &str) -> Result<(), GitError> {
        validate_ref_name(rev)?;
        if self.has_uncommitted_changes()? {
            return Err(GitError::UncommittedChanges {
                operation: "merge".into(),
            });
        }
        self.run_git(&["merge", "--no-edit", rev])?;
        info!(rev, "merge completed");
        Ok(())
    }

    #[instrument(skip(self))]
    fn start_scratch_merge(&self, rev: &str) -> Result<(), GitError> {
        validate_ref_name(rev)?;
        let output = self.git(&["merge", "--no-commit", "--no-ff", rev])?;
        if output.status.success() {
            return Ok(());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.contains("CONFLICT") {
            debug!(rev, "scratch merge stopped on conflicts");
            return Ok(());
        }
        Err(command_failed(&["merge"], &output))
    }

    #[instrument(skip(self))]
    fn abort_merge(&self) -> Result<(), GitError> {
        if !self.is_merge_in_progress()? {
            return Ok(());
        }
        if let Err(e) = self.run_git(&["merge", "--abort"]) {
            warn!(error = %e, "merge --abort failed, falling back to reset --merge");
            self.run_git(&["reset", "--merge"])?;
        }
        debug!("merge aborted");
        Ok(())
    }

    fn is_merge_in_progress(&self) -> Result<bool, GitError> {
        let output = self.git(&["rev-parse", "-q", "--verify", "MERGE_HEAD"])?;
        Ok(output.status.success())
    }
}

fn command_failed(args: &[&str], output: &Output) -> GitError {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let exit_code = output.status.code().unwrap_or(-1);
    let command = args.first().copied().unwrap_or("git").to_string();
    warn!(%command, exit_code, %stderr, "git command failed");
    GitError::CommandFailed {
        command,
        exit_code,
        stderr,
    }
}

fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
