//! In-memory [`RefStore`] used by unit tests.
//!
//! Every call is appended to `calls` as a short `"op arg..."` string so
//! tests can assert exactly which operations ran.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::refname::validate_ref_name;
use super::repository::{MergeTreeOutput, RefStore, Side};
use crate::errors::GitError;

/// Scripted behaviour of `merge_tree`.
#[derive(Debug, Clone)]
pub enum MergeTreeBehavior {
    Clean,
    Conflicts(String),
    Unsupported,
}

#[derive(Debug)]
pub struct FakeRepository {
    pub path: PathBuf,
    pub branch: RefCell<String>,
    pub refs: RefCell<HashMap<String, String>>,
    pub counts: HashMap<(String, String), usize>,
    pub merge_tree: MergeTreeBehavior,
    pub merge_base: Option<String>,
    pub changed: HashMap<(String, String), Vec<String>>,
    pub files: HashMap<(String, String), Vec<u8>>,
    pub unmerged: RefCell<Vec<String>>,
    pub working: HashMap<String, String>,
    pub uncommitted: Cell<bool>,
    pub scratch_conflicts: Vec<String>,
    pub merge_in_progress: Cell<bool>,
    pub fail_checkout: bool,
    pub fail_stage: bool,
    pub fail_scratch_merge: bool,
    pub calls: RefCell<Vec<String>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        let mut refs = HashMap::new();
        refs.insert("main".to_string(), "a".repeat(40));
        refs.insert("HEAD".to_string(), "a".repeat(40));
        Self {
            path: PathBuf::from("/fake/repo"),
            branch: RefCell::new("main".into()),
            refs: RefCell::new(refs),
            counts: HashMap::new(),
            merge_tree: MergeTreeBehavior::Clean,
            merge_base: None,
            changed: HashMap::new(),
            files: HashMap::new(),
            unmerged: RefCell::new(Vec::new()),
            working: HashMap::new(),
            uncommitted: Cell::new(false),
            scratch_conflicts: Vec::new(),
            merge_in_progress: Cell::new(false),
            fail_checkout: false,
            fail_stage: false,
            fail_scratch_merge: false,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn set_ref(&self, name: &str, sha: &str) {
        self.refs.borrow_mut().insert(name.to_string(), sha.to_string());
    }

    pub fn set_count(&mut self, from: &str, to: &str, n: usize) {
        self.counts.insert((from.to_string(), to.to_string()), n);
    }

    pub fn set_file(&mut self, rev: &str, path: &str, content: &str) {
        self.files
            .insert((rev.to_string(), path.to_string()), content.as_bytes().to_vec());
    }

    pub fn set_changed(&mut self, from: &str, to: &str, paths: &[&str]) {
        self.changed.insert(
            (from.to_string(), to.to_string()),
            paths.iter().map(|p| p.to_string()).collect(),
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn failure(command: &str) -> GitError {
        GitError::CommandFailed {
            command: command.into(),
            exit_code: 1,
            stderr: "scripted failure".into(),
        }
    }
}

impl RefStore for FakeRepository {
    fn repo_path(&self) -> &Path {
        &self.path
    }

    fn current_branch(&self) -> Result<String, GitError> {
        self.record("current_branch".into());
        Ok(self.branch.borrow().clone())
    }

    fn rev_parse(&self, rev: &str) -> Result<String, GitError> {
        validate_ref_name(rev)?;
        self.record(format!("rev_parse {rev}"));
        self.refs
            .borrow()
            .get(rev)
            .cloned()
            .ok_or_else(|| GitError::UnknownRef(rev.to_string()))
    }

    fn fetch_all(&self) -> Result<(), GitError> {
        self.record("fetch_all".into());
        Ok(())
    }

    fn remote_for_branch(&self, branch: &str) -> Result<String, GitError> {
        validate_ref_name(branch)?;
        Ok("origin".into())
    }

    fn count_commits(&self, from: &str, to: &str) -> Result<usize, GitError> {
        validate_ref_name(from)?;
        validate_ref_name(to)?;
        self.record(format!("count_commits {from}..{to}"));
        Ok(*self
            .counts
            .get(&(from.to_string(), to.to_string()))
            .unwrap_or(&0))
    }

    fn merge_tree(&self, ours: &str, theirs: &str) -> Result<MergeTreeOutput, GitError> {
        validate_ref_name(ours)?;
        validate_ref_name(theirs)?;
        self.record(format!("merge_tree {ours} {theirs}"));
        match &self.merge_tree {
            MergeTreeBehavior::Clean => Ok(MergeTreeOutput {
                clean: true,
                stdout: format!("{}\n", "f".repeat(40)),
            }),
            MergeTreeBehavior::Conflicts(stdout) => Ok(MergeTreeOutput {
                clean: false,
                stdout: stdout.clone(),
            }),
            MergeTreeBehavior::Unsupported => Err(GitError::MergePreviewUnsupported(
                "error: unknown option `write-tree'".into(),
            )),
        }
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>, GitError> {
        validate_ref_name(a)?;
        validate_ref_name(b)?;
        self.record(format!("merge_base {a} {b}"));
        Ok(self.merge_base.clone())
    }

    fn changed_paths(&self, from: &str, to: &str) -> Result<Vec<String>, GitError> {
        self.record(format!("changed_paths {from} {to}"));
        Ok(self
            .changed
            .get(&(from.to_string(), to.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn show_file(&self, rev: &str, path: &str) -> Result<Option<Vec<u8>>, GitError> {
        validate_ref_name(rev)?;
        self.record(format!("show_file {rev}:{path}"));
        Ok(self.files.get(&(rev.to_string(), path.to_string())).cloned())
    }

    fn unmerged_paths(&self) -> Result<Vec<String>, GitError> {
        self.record("unmerged_paths".into());
        Ok(self.unmerged.borrow().clone())
    }

    fn read_working_file(&self, path: &str) -> Result<String, GitError> {
        self.record(format!("read_working_file {path}"));
        self.working.get(path).cloned().ok_or_else(|| {
            GitError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                path.to_string(),
            ))
        })
    }

    fn checkout_side(&self, path: &str, side: Side) -> Result<(), GitError> {
        self.record(format!("checkout --{side} {path}"));
        if self.fail_checkout {
            return Err(Self::failure("checkout"));
        }
        Ok(())
    }

    fn stage(&self, path: &str) -> Result<(), GitError> {
        self.record(format!("add {path}"));
        if self.fail_stage {
            return Err(Self::failure("add"));
        }
        Ok(())
    }

    fn has_uncommitted_changes(&self) -> Result<bool, GitError> {
        self.record("has_uncommitted_changes".into());
        Ok(self.uncommitted.get())
    }

    fn pull(&self) -> Result<(), GitError> {
        self.record("pull".into());
        if self.uncommitted.get() {
            return Err(GitError::UncommittedChanges {
                operation: "pull".into(),
            });
        }
        let branch = self.branch.borrow().clone();
        let upstream = self.refs.borrow().get(&format!("origin/{branch}")).cloned();
        match upstream {
            Some(sha) => {
                self.set_ref(&branch, &sha);
                Ok(())
            }
            None => Err(GitError::NoUpstream { branch }),
        }
    }

    fn merge(&self, rev: &str) -> Result<(), GitError> {
        validate_ref_name(rev)?;
        self.record(format!("merge {rev}"));
        let target = self.refs.borrow().get(rev).cloned();
        let branch = self.branch.borrow().clone();
        match target {
            Some(sha) => {
                self.set_ref(&branch, &sha);
                Ok(())
            }
            None => Err(GitError::UnknownRef(rev.to_string())),
        }
    }

    fn start_scratch_merge(&self, rev: &str) -> Result<(), GitError> {
        validate_ref_name(rev)?;
        self.record(format!("start_scratch_merge {rev}"));
        self.merge_in_progress.set(true);
        if self.fail_scratch_merge {
            return Err(Self::failure("merge"));
        }
        *self.unmerged.borrow_mut() = self.scratch_conflicts.clone();
        Ok(())
    }

    fn abort_merge(&self) -> Result<(), GitError> {
        self.record("abort_merge".into());
        self.merge_in_progress.set(false);
        self.unmerged.borrow_mut().clear();
        Ok(())
    }

    fn is_merge_in_progress(&self) -> Result<bool, GitError> {
        Ok(self.merge_in_progress.get())
    }
}
