//! Conflict detection, parsing, and interactive resolution.
//!
//! The conflict subsystem is responsible for:
//! 1. **Detection** -- simulating a merge to find conflicting paths without
//!    touching the working tree.
//! 2. **Parsing** -- splitting conflict-marker text into typed sections.
//! 3. **Resolution** -- driving a per-file interactive session that applies
//!    the chosen side and stages it.

pub mod diff;
pub mod editor;
pub mod parser;
pub mod session;
pub mod simulator;

use tracing::debug;

use crate::errors::ResolveError;
use crate::git::RefStore;

pub use editor::{find_editor, resolve_editor, CommandEditorLauncher, EditorLauncher};
pub use parser::{parse_conflict, ConflictSection, SectionKind};
pub use session::{
    Choice, InputSource, LineInput, Presenter, ResolutionAction, ResolutionOutcome,
    ResolutionSession,
};
pub use simulator::{MergeSimulator, SimulatorOptions};

/// Where a [`Conflict`]'s content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSource {
    /// An unmerged file read from the working tree; content has real markers.
    WorkingTree,
    /// Reported by a non-destructive `merge-tree` preview.
    MergePreview,
    /// Inferred by comparing base, ours and theirs blobs.
    DiffHeuristic,
    /// Captured from a scratch merge that was aborted afterwards.
    ScratchMerge,
}

impl std::fmt::Display for ConflictSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorkingTree => write!(f, "working_tree"),
            Self::MergePreview => write!(f, "merge_preview"),
            Self::DiffHeuristic => write!(f, "diff_heuristic"),
            Self::ScratchMerge => write!(f, "scratch_merge"),
        }
    }
}

/// One file under dispute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Repository-relative path.
    pub path: String,
    /// File text with markers, or a diagnostic line for predicted conflicts.
    pub raw_content: String,
    pub source: ConflictSource,
}

impl Conflict {
    pub fn new(
        path: impl Into<String>,
        raw_content: impl Into<String>,
        source: ConflictSource,
    ) -> Self {
        Self {
            path: path.into(),
            raw_content: raw_content.into(),
            source,
        }
    }
}

/// Collect the currently-unmerged files whose content carries conflict markers.
pub fn scan_unmerged<R: RefStore>(repo: &R) -> Result<Vec<Conflict>, ResolveError> {
    let mut conflicts = Vec::new();
    for path in repo.unmerged_paths().map_err(ResolveError::Scan)? {
        let content = repo.read_working_file(&path).map_err(ResolveError::Scan)?;
        if parser::has_conflict_markers(&content) {
            conflicts.push(Conflict::new(path, content, ConflictSource::WorkingTree));
        } else {
            debug!(path = %path, "unmerged file has no conflict markers, skipping");
        }
    }
    Ok(conflicts)
}
