//! Terminal rendering for the CLI and the interactive resolver.

use std::io::{self, IsTerminal, Write};

use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use console::{Style, Term};

use harbinger_core::conflict::{
    Choice, Conflict, ConflictSection, ConflictSource, InputSource, LineInput, Presenter,
    ResolutionAction, ResolutionOutcome, SectionKind,
};

pub fn success(msg: &str) -> String {
    format!("{} {}", Style::new().green().apply_to("✓"), msg)
}

pub fn error(msg: &str) -> String {
    format!("{} {}", Style::new().red().apply_to("✗"), msg)
}

pub fn warn(msg: &str) -> String {
    format!("{} {}", Style::new().yellow().apply_to("⚠"), msg)
}

pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// Status indicator: running (green dot).
pub fn status_running(pid: u32) -> String {
    format!("{} Running (PID {pid})", Style::new().green().apply_to("●"))
}

/// First 7 characters of a commit id.
pub fn short_sha(sha: &str) -> &str {
    &sha[..sha.len().min(7)]
}

// ---------------------------------------------------------------------------
// Presenter
// ---------------------------------------------------------------------------

/// Colour-coded conflict presenter.
///
/// The screen is cleared before each file unless the previous output was a
/// diff, help text or an invalid-choice message the operator still needs
/// to read.
pub struct TerminalPresenter<W: Write> {
    out: W,
    term: Option<Term>,
    keep_screen: bool,
}

impl TerminalPresenter<Term> {
    pub fn stdout() -> Self {
        let term = Term::stdout();
        let clear = term.is_term().then(Term::stdout);
        Self {
            out: term,
            term: clear,
            keep_screen: false,
        }
    }
}

impl<W: Write> TerminalPresenter<W> {
    /// Presenter writing to `out` that never clears the screen.
    pub fn new(out: W) -> Self {
        Self {
            out,
            term: None,
            keep_screen: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    // Presenter methods return (), so write errors are dropped here.
    fn line(&mut self, text: impl std::fmt::Display) {
        let _ = writeln!(self.out, "{text}");
    }

    fn write_section(&mut self, section: &ConflictSection) {
        let (style, label) = match section.kind {
            SectionKind::Normal => (Style::new().dim(), None),
            SectionKind::Ours => (Style::new().green(), Some("YOURS (local)")),
            SectionKind::Theirs => (Style::new().red(), Some("THEIRS (incoming)")),
        };
        if let Some(label) = label {
            let rule = format!("──── {label} ────");
            self.line(style.clone().bold().apply_to(rule));
        }
        for text in section.content.lines() {
            self.line(style.apply_to(text));
        }
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn present_file(
        &mut self,
        index: usize,
        total: usize,
        conflict: &Conflict,
        sections: &[ConflictSection],
    ) {
        if !self.keep_screen {
            if let Some(term) = &self.term {
                let _ = term.clear_screen();
            }
        }
        self.keep_screen = false;

        self.line("");
        let title = format!("Conflict {} of {}: {}", index + 1, total, conflict.path);
        self.line(Style::new().cyan().bold().apply_to(title));
        if conflict.source != ConflictSource::WorkingTree {
            self.line(dim(&format!("(predicted by {})", conflict.source)));
        }
        self.line(dim(&"─".repeat(60)));
        for section in sections {
            self.write_section(section);
        }
        self.line(dim(&"─".repeat(60)));
    }

    fn present_menu(&mut self) {
        self.line(Style::new().yellow().bold().apply_to("What would you like to do?"));
        for (_, key, label) in Choice::MENU {
            self.line(format!("  {key}) {label}"));
        }
    }

    fn show_diff(&mut self, path: &str, diff: Option<&str>) {
        self.keep_screen = true;
        self.line("");
        match diff {
            Some(diff) => {
                for text in diff.lines() {
                    let styled = if text.starts_with("+++") || text.starts_with("---") {
                        Style::new().bold().apply_to(text)
                    } else if text.starts_with('+') {
                        Style::new().red().apply_to(text)
                    } else if text.starts_with('-') {
                        Style::new().green().apply_to(text)
                    } else if text.starts_with("@@") {
                        Style::new().cyan().apply_to(text)
                    } else {
                        Style::new().apply_to(text)
                    };
                    self.line(styled);
                }
            }
            None => self.line(warn(&format!("No conflict blocks to compare in {path}"))),
        }
    }

    fn show_help(&mut self) {
        self.keep_screen = true;
        self.line("");
        self.line(header("Resolution options"));
        self.line("  1 / o  Keep your local version of the whole file");
        self.line("  2 / t  Take the incoming version of the whole file");
        self.line("  3 / e  Open the file in your editor, then choose whether to stage it");
        self.line("  4 / s  Leave the file conflicted and move on");
        self.line("  5 / d  Show a diff between your side and the incoming side");
        self.line("  6 / h  Show this help");
        self.line(dim("Editor lookup: config `editor`, then $VISUAL, then $EDITOR."));
    }

    fn invalid_choice(&mut self, input: &str) {
        self.keep_screen = true;
        self.line(error(&format!("Invalid choice '{input}'. Enter 1-6.")));
    }

    fn error(&mut self, message: &str) {
        self.keep_screen = true;
        self.line(error(message));
    }

    fn outcome(&mut self, outcome: &ResolutionOutcome) {
        let text = if outcome.staged {
            format!("{}: {} and staged", outcome.path, outcome.action)
        } else {
            format!("{}: {}", outcome.path, outcome.action)
        };
        match outcome.action {
            ResolutionAction::Skipped => self.line(warn(&text)),
            _ => self.line(success(&text)),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Prompts with `dialoguer` on a terminal, plain line reads otherwise.
pub enum TerminalInput {
    Interactive,
    Piped(LineInput<io::StdinLock<'static>>),
}

impl TerminalInput {
    pub fn detect() -> Self {
        if io::stdin().is_terminal() && io::stdout().is_terminal() {
            Self::Interactive
        } else {
            Self::Piped(LineInput::new(io::stdin().lock()))
        }
    }
}

impl InputSource for TerminalInput {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match self {
            Self::Interactive => {
                let prompt = prompt.trim_end().trim_end_matches(':');
                let answer = dialoguer::Input::<String>::new()
                    .with_prompt(prompt)
                    .allow_empty(true)
                    .interact_text()
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
                Ok(Some(answer))
            }
            Self::Piped(lines) => lines.read_line(prompt),
        }
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Summary of a resolution session.
pub fn outcome_table(outcomes: &[ResolutionOutcome]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["File", "Action", "Staged"]);

    for outcome in outcomes {
        let action = match outcome.action {
            ResolutionAction::Skipped => Cell::new(outcome.action).fg(Color::Yellow),
            _ => Cell::new(outcome.action).fg(Color::Green),
        };
        table.add_row(vec![
            Cell::new(&outcome.path),
            action,
            Cell::new(if outcome.staged { "yes" } else { "no" }),
        ]);
    }
    table
}

/// Paths and sources of predicted conflicts.
pub fn conflict_table(conflicts: &[Conflict]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["File", "Detected by"]);
    for conflict in conflicts {
        table.add_row(vec![
            Cell::new(&conflict.path),
            Cell::new(conflict.source),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbinger_core::conflict::parse_conflict;

    fn render<F: FnOnce(&mut TerminalPresenter<Vec<u8>>)>(f: F) -> String {
        let mut presenter = TerminalPresenter::new(Vec::new());
        f(&mut presenter);
        let bytes = presenter.into_inner();
        console::strip_ansi_codes(&String::from_utf8(bytes).unwrap()).to_string()
    }

    #[test]
    fn test_present_file_shows_both_sides() {
        let raw = "top\n<<<<<<< HEAD\nmine\n=======\nyours\n>>>>>>> origin/main\n";
        let conflict = Conflict::new("src/lib.rs", raw, ConflictSource::WorkingTree);
        let sections = parse_conflict(raw);
        let out = render(|p| p.present_file(1, 3, &conflict, &sections));

        assert!(out.contains("Conflict 2 of 3: src/lib.rs"));
        assert!(out.contains("YOURS (local)"));
        assert!(out.contains("mine"));
        assert!(out.contains("THEIRS (incoming)"));
        assert!(out.contains("yours"));
        assert!(!out.contains("predicted by"));
    }

    #[test]
    fn test_predicted_conflict_names_its_source() {
        let conflict = Conflict::new(
            "a.txt",
            "Potential conflict in a.txt\n",
            ConflictSource::DiffHeuristic,
        );
        let sections = parse_conflict(&conflict.raw_content);
        let out = render(|p| p.present_file(0, 1, &conflict, &sections));
        assert!(out.contains("predicted by diff_heuristic"));
        assert!(out.contains("Potential conflict in a.txt"));
    }

    #[test]
    fn test_menu_lists_every_choice() {
        let out = render(|p| p.present_menu());
        for (_, key, label) in Choice::MENU {
            assert!(out.contains(&format!("{key}) {label}")));
        }
    }

    #[test]
    fn test_show_diff_without_blocks() {
        let out = render(|p| p.show_diff("a.txt", None));
        assert!(out.contains("No conflict blocks to compare in a.txt"));
    }

    #[test]
    fn test_outcome_lines() {
        let out = render(|p| {
            p.outcome(&ResolutionOutcome {
                path: "a.txt".into(),
                action: ResolutionAction::AcceptTheirs,
                staged: true,
            });
            p.outcome(&ResolutionOutcome {
                path: "b.txt".into(),
                action: ResolutionAction::Skipped,
                staged: false,
            });
        });
        assert!(out.contains("a.txt: accepted theirs and staged"));
        assert!(out.contains("b.txt: skipped"));
    }

    #[test]
    fn test_outcome_table_rows() {
        let table = outcome_table(&[ResolutionOutcome {
            path: "a.txt".into(),
            action: ResolutionAction::Edited,
            staged: false,
        }]);
        let text = console::strip_ansi_codes(&table.to_string()).to_string();
        assert!(text.contains("a.txt"));
        assert!(text.contains("edited"));
        assert!(text.contains("no"));
    }

    #[test]
    fn test_short_sha() {
        assert_eq!(short_sha("0123456789abcdef"), "0123456");
        assert_eq!(short_sha("abc"), "abc");
    }
}
