//! Conflict marker parsing.
//!
//! Splits the text of a conflicted file into an ordered list of
//! [`ConflictSection`]s: plain text, the local ("ours") side and the
//! incoming ("theirs") side of every conflict block.

/// Opens the local side of a conflict block.
pub const OURS_MARKER: &str = "<<<<<<<";
/// Separates the local side from the incoming side.
pub const SEPARATOR_MARKER: &str = "=======";
/// Closes the incoming side of a conflict block.
pub const THEIRS_MARKER: &str = ">>>>>>>";

/// Kind of text span within a conflicted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// Text outside any conflict block.
    Normal,
    /// The local side of a conflict block.
    Ours,
    /// The incoming side of a conflict block.
    Theirs,
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Ours => write!(f, "ours"),
            Self::Theirs => write!(f, "theirs"),
        }
    }
}

/// A typed span of text; every line keeps its trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictSection {
    pub kind: SectionKind,
    pub content: String,
}

impl ConflictSection {
    fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            content: String::new(),
        }
    }

    fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Parse raw file content into sections, in file order.
///
/// Markers are matched as fixed-length line prefixes, so trailing labels
/// (`<<<<<<< HEAD`) are fine and a marker in the middle of a line is plain
/// text. A second `<<<<<<<` inside an open block starts a fresh `Ours`
/// section without closing the previous one.
pub fn parse_conflict(raw: &str) -> Vec<ConflictSection> {
    let mut sections = Vec::new();
    let mut current = ConflictSection::new(SectionKind::Normal);
    let mut in_conflict = false;

    for line in raw.split_terminator('\n') {
        if line.starts_with(OURS_MARKER) {
            let previous = std::mem::replace(&mut current, ConflictSection::new(SectionKind::Ours));
            if !previous.is_blank() {
                sections.push(previous);
            }
            in_conflict = true;
        } else if in_conflict && line.starts_with(SEPARATOR_MARKER) {
            sections.push(std::mem::replace(
                &mut current,
                ConflictSection::new(SectionKind::Theirs),
            ));
        } else if in_conflict && line.starts_with(THEIRS_MARKER) {
            sections.push(std::mem::replace(
                &mut current,
                ConflictSection::new(SectionKind::Normal),
            ));
            in_conflict = false;
        } else {
            current.content.push_str(line);
            current.content.push('\n');
        }
    }

    if !current.is_blank() {
        sections.push(current);
    }
    sections
}

/// Whether `raw` contains at least one line starting with the ours-open marker.
pub fn has_conflict_markers(raw: &str) -> bool {
    raw.lines().any(|l| l.starts_with(OURS_MARKER))
}
