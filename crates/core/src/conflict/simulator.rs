//! Merge simulation.
//!
//! Predicts which files would conflict if `target` were merged into
//! `current`, leaving the working tree and index as they were. Strategies
//! are tried in order until one is supported:
//!
//! 1. `git merge-tree --write-tree` (git 2.38+), fully in-memory.
//! 2. A diff heuristic over the merge base: a path conflicts when both sides
//!    changed it and the two results differ. This does not reproduce
//!    line-level merge semantics.
//! 3. Optionally, a scratch `--no-commit` merge that is always aborted.

use std::collections::HashSet;

use tracing::{debug, error, info, instrument, warn};

use super::{Conflict, ConflictSource};
use crate::errors::GitError;
use crate::git::{validate_ref_name, RefStore};

/// Tuning for [`MergeSimulator`].
#[derive(Debug, Clone, Default)]
pub struct SimulatorOptions {
    /// Permit the scratch-merge strategy when neither preview works.
    /// Requires a clean working tree with `current` checked out.
    pub allow_scratch_merge: bool,
}

/// Non-destructive conflict predictor over a [`RefStore`].
pub struct MergeSimulator<'a, R: RefStore> {
    repo: &'a R,
    options: SimulatorOptions,
}

impl<'a, R: RefStore> MergeSimulator<'a, R> {
    pub fn new(repo: &'a R, options: SimulatorOptions) -> Self {
        Self { repo, options }
    }

    /// Return the files that would conflict when merging `target_ref` into
    /// `current_ref`. An empty list means the merge would be clean.
    #[instrument(skip(self))]
    pub fn detect_conflicts(
        &self,
        current_ref: &str,
        target_ref: &str,
    ) -> Result<Vec<Conflict>, GitError> {
        validate_ref_name(current_ref)?;
        validate_ref_name(target_ref)?;
        self.repo.rev_parse(target_ref)?;
        self.repo.rev_parse(current_ref)?;

        match self.with_merge_tree(current_ref, target_ref) {
            Err(GitError::MergePreviewUnsupported(reason)) => {
                info!(%reason, "merge-tree unavailable, falling back to diff heuristic");
            }
            result => return result,
        }

        match self.with_diff_heuristic(current_ref, target_ref) {
            Err(GitError::MergePreviewUnsupported(reason)) => {
                info!(%reason, "diff heuristic unavailable");
            }
            result => return result,
        }

        if self.options.allow_scratch_merge {
            return self.with_scratch_merge(current_ref, target_ref);
        }

        Err(GitError::CommandFailed {
            command: "merge-tree".into(),
            exit_code: -1,
            stderr: format!(
                "no non-destructive merge preview available for {current_ref} and {target_ref}"
            ),
        })
    }

    fn with_merge_tree(&self, current: &str, target: &str) -> Result<Vec<Conflict>, GitError> {
        let output = self.repo.merge_tree(current, target)?;
        if output.clean {
            debug!("merge-tree reports a clean merge");
            return Ok(Vec::new());
        }
        let conflicts = parse_merge_tree_output(&output.stdout);
        info!(count = conflicts.len(), "merge-tree reported conflicts");
        Ok(conflicts)
    }

    fn with_diff_heuristic(&self, current: &str, target: &str) -> Result<Vec<Conflict>, GitError> {
        let base = self.repo.merge_base(current, target)?.ok_or_else(|| {
            GitError::MergePreviewUnsupported(format!("{current} and {target} share no merge base"))
        })?;

        let ours: HashSet<String> = self.repo.changed_paths(&base, current)?.into_iter().collect();
        let mut seen = HashSet::new();
        let candidates: Vec<String> = self
            .repo
            .changed_paths(&base, target)?
            .into_iter()
            .filter(|p| ours.contains(p) && seen.insert(p.clone()))
            .collect();
        debug!(count = candidates.len(), "paths changed on both sides");

        let mut conflicts = Vec::new();
        for path in candidates {
            let base_content = self.repo.show_file(&base, &path)?;
            let our_content = self.repo.show_file(current, &path)?;
            let their_content = self.repo.show_file(target, &path)?;

            if our_content != their_content
                && our_content != base_content
                && their_content != base_content
            {
                let content = format!("Potential conflict in {path}\n");
                conflicts.push(Conflict::new(path, content, ConflictSource::DiffHeuristic));
            }
        }
        info!(count = conflicts.len(), "diff heuristic found conflicts");
        Ok(conflicts)
    }

    fn with_scratch_merge(&self, current: &str, target: &str) -> Result<Vec<Conflict>, GitError> {
        if self.repo.has_uncommitted_changes()? {
            return Err(GitError::UncommittedChanges {
                operation: "simulate a merge".into(),
            });
        }
        if self.repo.rev_parse("HEAD")? != self.repo.rev_parse(current)? {
            return Err(GitError::CommandFailed {
                command: "merge".into(),
                exit_code: -1,
                stderr: format!("scratch merge needs {current} checked out"),
            });
        }

        warn!(target, "using scratch merge to detect conflicts");
        let _abort = MergeAbortGuard { repo: self.repo };
        self.repo.start_scratch_merge(target)?;
        let conflicts = self
            .repo
            .unmerged_paths()?
            .into_iter()
            .map(|path| {
                let content = format!("CONFLICT (content): Merge conflict in {path}\n");
                Conflict::new(path, content, ConflictSource::ScratchMerge)
            })
            .collect();
        Ok(conflicts)
    }
}

/// Aborts the scratch merge when dropped, whatever happened in between.
struct MergeAbortGuard<'a, R: RefStore> {
    repo: &'a R,
}

impl<R: RefStore> Drop for MergeAbortGuard<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.repo.abort_merge() {
            error!(error = %e, "failed to abort scratch merge; working tree may be mid-merge");
        }
    }
}

/// Parse `git merge-tree --write-tree --name-only` output.
///
/// Layout: the tree id, the conflicted paths (one per line), a blank line,
/// then informational messages such as
/// `CONFLICT (content): Merge conflict in src/lib.rs`.
pub fn parse_merge_tree_output(stdout: &str) -> Vec<Conflict> {
    let mut lines = stdout.lines();
    let _tree = lines.next();

    let mut paths: Vec<String> = Vec::new();
    for line in lines.by_ref() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if !paths.iter().any(|p| p == line) {
            paths.push(line.to_string());
        }
    }

    let messages: Vec<&str> = lines.filter(|l| l.contains("CONFLICT")).collect();

    if paths.is_empty() {
        for message in &messages {
            if let Some(path) = path_from_message(message) {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
    }

    paths
        .into_iter()
        .map(|path| {
            let related: Vec<&str> = messages
                .iter()
                .copied()
                .filter(|m| m.contains(path.as_str()))
                .collect();
            let content = if related.is_empty() {
                format!("CONFLICT: Merge conflict in {path}\n")
            } else {
                format!("{}\n", related.join("\n"))
            };
            Conflict::new(path, content, ConflictSource::MergePreview)
        })
        .collect()
}

fn path_from_message(message: &str) -> Option<String> {
    if let Some((_, path)) = message.split_once("Merge conflict in ") {
        return Some(path.trim().to_string());
    }
    let (_, rest) = message.split_once("): ")?;
    rest.split_whitespace().next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::fake::{FakeRepository, MergeTreeBehavior};

    const SHA_OURS: &str = "1111111111111111111111111111111111111111";
    const SHA_THEIRS: &str = "2222222222222222222222222222222222222222";
    const SHA_BASE: &str = "0000000000000000000000000000000000000000";

    fn repo_with_target() -> FakeRepository {
        let repo = FakeRepository::new();
        repo.set_ref("main", SHA_OURS);
        repo.set_ref("HEAD", SHA_OURS);
        repo.set_ref("origin/main", SHA_THEIRS);
        repo
    }

    #[test]
    fn test_parse_merge_tree_name_only() {
        let stdout = "4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
                      src/lib.rs\n\
                      README.md\n\
                      \n\
                      Auto-merging src/lib.rs\n\
                      CONFLICT (content): Merge conflict in src/lib.rs\n\
                      Auto-merging README.md\n\
                      CONFLICT (content): Merge conflict in README.md\n";
        let conflicts = parse_merge_tree_output(stdout);
        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].path, "src/lib.rs");
        assert_eq!(
            conflicts[0].raw_content,
            "CONFLICT (content): Merge conflict in src/lib.rs\n"
        );
        assert_eq!(conflicts[1].path, "README.md");
        assert_eq!(conflicts[1].source, ConflictSource::MergePreview);
    }

    #[test]
    fn test_parse_merge_tree_messages_only() {
        let stdout = "deadbeef\n\nCONFLICT (content): Merge conflict in a.txt\n\
                      CONFLICT (modify/delete): b.txt deleted in HEAD and modified in feature.\n";
        let conflicts = parse_merge_tree_output(stdout);
        let paths: Vec<&str> = conflicts.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_merge_tree_clean() {
        let repo = repo_with_target();
        let sim = MergeSimulator::new(&repo, SimulatorOptions::default());
        assert!(sim.detect_conflicts("main", "origin/main").unwrap().is_empty());
        assert_eq!(repo.count_calls("merge_tree"), 1);
        assert_eq!(repo.count_calls("merge_base"), 0);
    }

    #[test]
    fn test_merge_tree_conflicts() {
        let mut repo = repo_with_target();
        repo.merge_tree =
            MergeTreeBehavior::Conflicts("abc\nfile.txt\n\nCONFLICT (content): Merge conflict in file.txt\n".into());
        let sim = MergeSimulator::new(&repo, SimulatorOptions::default());
        let conflicts = sim.detect_conflicts("main", "origin/main").unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].path, "file.txt");
    }

    #[test]
    fn test_invalid_ref_rejected_before_any_call() {
        let repo = repo_with_target();
        let sim = MergeSimulator::new(&repo, SimulatorOptions::default());
        let result = sim.detect_conflicts("main", "feature;rm -rf");
        assert!(matches!(result, Err(GitError::InvalidRefName { .. })));
        assert!(repo.calls().is_empty());
    }

    #[test]
    fn test_unknown_target_ref() {
        let repo = repo_with_target();
        let sim = MergeSimulator::new(&repo, SimulatorOptions::default());
        let result = sim.detect_conflicts("main", "origin/missing");
        assert!(matches!(result, Err(GitError::UnknownRef(r)) if r == "origin/missing"));
        assert_eq!(repo.count_calls("merge_tree"), 0);
    }

    fn heuristic_repo() -> FakeRepository {
        let mut repo = repo_with_target();
        repo.merge_tree = MergeTreeBehavior::Unsupported;
        repo.merge_base = Some(SHA_BASE.into());
        repo.set_changed(SHA_BASE, "main", &["both.txt", "same.txt", "ours_only.txt"]);
        repo.set_changed(SHA_BASE, "origin/main", &["both.txt", "same.txt", "theirs_only.txt"]);
        repo.set_file(SHA_BASE, "both.txt", "base\n");
        repo.set_file("main", "both.txt", "ours\n");
        repo.set_file("origin/main", "both.txt", "theirs\n");
        repo.set_file(SHA_BASE, "same.txt", "base\n");
        repo.set_file("main", "same.txt", "identical\n");
        repo.set_file("origin/main", "same.txt", "identical\n");
        repo
    }

    #[test]
    fn test_fallback_to_diff_heuristic() {
        let repo = heuristic_repo();
        let sim = MergeSimulator::new(&repo, SimulatorOptions::default());
        let conflicts = sim.detect_conflicts("main", "origin/main").unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].path, "both.txt");
        assert_eq!(conflicts[0].source, ConflictSource::DiffHeuristic);
        assert_eq!(conflicts[0].raw_content, "Potential conflict in both.txt\n");
        // Only paths touched on both sides are inspected.
        assert_eq!(repo.count_calls("show_file"), 6);
    }

    #[test]
    fn test_heuristic_treats_missing_base_as_distinct() {
        let mut repo = heuristic_repo();
        repo.files.remove(&(SHA_BASE.to_string(), "both.txt".to_string()));
        let sim = MergeSimulator::new(&repo, SimulatorOptions::default());
        let conflicts = sim.detect_conflicts("main", "origin/main").unwrap();
        assert_eq!(conflicts.len(), 1);
    }

    #[test]
    fn test_no_strategy_available_without_scratch_merge() {
        let mut repo = repo_with_target();
        repo.merge_tree = MergeTreeBehavior::Unsupported;
        let sim = MergeSimulator::new(&repo, SimulatorOptions::default());
        let result = sim.detect_conflicts("main", "origin/main");
        assert!(matches!(result, Err(GitError::CommandFailed { .. })));
        assert_eq!(repo.count_calls("start_scratch_merge"), 0);
    }

    #[test]
    fn test_scratch_merge_always_aborts() {
        let mut repo = repo_with_target();
        repo.merge_tree = MergeTreeBehavior::Unsupported;
        repo.scratch_conflicts = vec!["x.rs".into()];
        let options = SimulatorOptions {
            allow_scratch_merge: true,
        };
        let sim = MergeSimulator::new(&repo, options);
        let conflicts = sim.detect_conflicts("main", "origin/main").unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].source, ConflictSource::ScratchMerge);
        assert_eq!(repo.count_calls("abort_merge"), 1);
        assert!(!repo.merge_in_progress.get());
    }

    #[test]
    fn test_scratch_merge_aborts_on_failure() {
        let mut repo = repo_with_target();
        repo.merge_tree = MergeTreeBehavior::Unsupported;
        repo.fail_scratch_merge = true;
        let sim = MergeSimulator::new(
            &repo,
            SimulatorOptions {
                allow_scratch_merge: true,
            },
        );
        assert!(sim.detect_conflicts("main", "origin/main").is_err());
        assert_eq!(repo.count_calls("abort_merge"), 1);
        assert!(!repo.merge_in_progress.get());
    }

    #[test]
    fn test_scratch_merge_refuses_dirty_tree() {
        let mut repo = repo_with_target();
        repo.merge_tree = MergeTreeBehavior::Unsupported;
        repo.uncommitted.set(true);
        let sim = MergeSimulator::new(
            &repo,
            SimulatorOptions {
                allow_scratch_merge: true,
            },
        );
        assert!(matches!(
            sim.detect_conflicts("main", "origin/main"),
            Err(GitError::UncommittedChanges { .. })
        ));
        assert_eq!(repo.count_calls("start_scratch_merge"), 0);
    }
}
