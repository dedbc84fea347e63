//! Side-by-side view of a conflicted file as a unified diff.

use super::parser::{parse_conflict, SectionKind};

/// Unified diff from the joined `Ours` sections to the joined `Theirs`
/// sections of `raw`. Returns `None` when the file has no conflict blocks.
pub fn conflict_diff(path: &str, raw: &str) -> Option<String> {
    let sections = parse_conflict(raw);
    let mut ours = String::new();
    let mut theirs = String::new();
    let mut blocks = 0;

    for section in &sections {
        match section.kind {
            SectionKind::Ours => {
                ours.push_str(&section.content);
                blocks += 1;
            }
            SectionKind::Theirs => theirs.push_str(&section.content),
            SectionKind::Normal => {}
        }
    }
    if blocks == 0 {
        return None;
    }

    let patch = diffy::create_patch(&ours, &theirs).to_string();
    let hunks = patch
        .split_once("+++ modified\n")
        .map(|(_, rest)| rest)
        .unwrap_or(patch.as_str());
    Some(format!("--- a/{path} (ours)\n+++ b/{path} (theirs)\n{hunks}"))
}
