//! Interactive, per-file conflict resolution.
//!
//! A [`ResolutionSession`] walks an ordered list of [`Conflict`]s one file at
//! a time. Everything it touches is injected: the repository ([`RefStore`]),
//! where choices come from ([`InputSource`]), where output goes
//! ([`Presenter`]) and how the editor is run ([`EditorLauncher`]). Tests
//! drive it with scripted input and no terminal.
//!
//! The session is fail-fast: the first error from an apply step aborts the
//! remaining files and is returned to the caller.

use std::io::{self, BufRead, Write};

use tracing::{debug, info, warn};

use super::diff::conflict_diff;
use super::editor::{find_editor, EditorLauncher};
use super::parser::{parse_conflict, ConflictSection};
use super::Conflict;
use crate::errors::ResolveError;
use crate::git::{RefStore, Side};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// A line-oriented source of user answers.
pub trait InputSource {
    /// Show `prompt` and read one line without its terminator.
    /// `Ok(None)` signals end of input.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// [`InputSource`] over any buffered reader; prompts go to stdout.
pub struct LineInput<B> {
    reader: B,
}

impl<B: BufRead> LineInput<B> {
    pub fn new(reader: B) -> Self {
        Self { reader }
    }
}

impl<B: BufRead> InputSource for LineInput<B> {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }
}

/// Receives everything the session wants shown to the operator.
pub trait Presenter {
    /// Show file `index` (zero-based) of `total` with its parsed sections.
    fn present_file(
        &mut self,
        index: usize,
        total: usize,
        conflict: &Conflict,
        sections: &[ConflictSection],
    );
    fn present_menu(&mut self);
    /// `diff` is `None` when the file has no conflict blocks to compare.
    fn show_diff(&mut self, path: &str, diff: Option<&str>);
    fn show_help(&mut self);
    fn invalid_choice(&mut self, input: &str);
    fn error(&mut self, message: &str);
    fn outcome(&mut self, outcome: &ResolutionOutcome);
}

// ---------------------------------------------------------------------------
// Choices and outcomes
// ---------------------------------------------------------------------------

/// One menu entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    AcceptOurs,
    AcceptTheirs,
    Edit,
    Skip,
    ShowDiff,
    Help,
}

impl Choice {
    /// Menu order: key, alias, label.
    pub const MENU: [(Choice, &'static str, &'static str); 6] = [
        (Choice::AcceptOurs, "1", "Accept yours"),
        (Choice::AcceptTheirs, "2", "Accept theirs"),
        (Choice::Edit, "3", "Edit in your editor"),
        (Choice::Skip, "4", "Skip this file"),
        (Choice::ShowDiff, "5", "Show diff"),
        (Choice::Help, "6", "Help"),
    ];

    /// Parse a menu answer: `1`-`6`, or the letters `o t e s d h` and `?`.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "1" | "o" => Some(Self::AcceptOurs),
            "2" | "t" => Some(Self::AcceptTheirs),
            "3" | "e" => Some(Self::Edit),
            "4" | "s" => Some(Self::Skip),
            "5" | "d" => Some(Self::ShowDiff),
            "6" | "h" | "?" => Some(Self::Help),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        Self::MENU
            .iter()
            .find(|(c, _, _)| *c == self)
            .map(|(_, _, label)| *label)
            .unwrap_or_default()
    }
}

/// What was done to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionAction {
    AcceptOurs,
    AcceptTheirs,
    Edited,
    Skipped,
}

impl std::fmt::Display for ResolutionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AcceptOurs => write!(f, "accepted yours"),
            Self::AcceptTheirs => write!(f, "accepted theirs"),
            Self::Edited => write!(f, "edited"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Terminal result for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionOutcome {
    pub path: String,
    pub action: ResolutionAction,
    pub staged: bool,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Presenting(usize),
    AwaitingChoice(usize),
    Applying(usize, Choice),
    Done,
}

const CHOICE_PROMPT: &str = "Your choice [1-6]: ";

/// Drives resolution of a conflict set.
pub struct ResolutionSession<'a, R, I, P, L>
where
    R: RefStore,
    I: InputSource,
    P: Presenter,
    L: EditorLauncher,
{
    repo: &'a R,
    input: &'a mut I,
    presenter: &'a mut P,
    launcher: &'a L,
    editor: Option<String>,
}

impl<'a, R, I, P, L> ResolutionSession<'a, R, I, P, L>
where
    R: RefStore,
    I: InputSource,
    P: Presenter,
    L: EditorLauncher,
{
    pub fn new(repo: &'a R, input: &'a mut I, presenter: &'a mut P, launcher: &'a L) -> Self {
        Self {
            repo,
            input,
            presenter,
            launcher,
            editor: None,
        }
    }

    /// Editor command from configuration; takes precedence over the
    /// environment.
    pub fn with_editor(mut self, editor: Option<String>) -> Self {
        self.editor = editor;
        self
    }

    /// Resolve every conflict in order and return one outcome per file.
    pub fn resolve(&mut self, conflicts: &[Conflict]) -> Result<Vec<ResolutionOutcome>, ResolveError> {
        info!(count = conflicts.len(), "starting resolution session");
        let total = conflicts.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut state = if total == 0 {
            State::Done
        } else {
            State::Presenting(0)
        };

        loop {
            debug!(?state, "session state");
            state = match state {
                State::Presenting(i) => {
                    let conflict = &conflicts[i];
                    let sections = parse_conflict(&conflict.raw_content);
                    self.presenter.present_file(i, total, conflict, &sections);
                    self.presenter.present_menu();
                    State::AwaitingChoice(i)
                }
                State::AwaitingChoice(i) => {
                    let line = self
                        .input
                        .read_line(CHOICE_PROMPT)?
                        .ok_or(ResolveError::InputClosed)?;
                    match Choice::parse(&line) {
                        Some(Choice::ShowDiff) => {
                            let conflict = &conflicts[i];
                            let diff = conflict_diff(&conflict.path, &conflict.raw_content);
                            self.presenter.show_diff(&conflict.path, diff.as_deref());
                            State::Presenting(i)
                        }
                        Some(Choice::Help) => {
                            self.presenter.show_help();
                            State::Presenting(i)
                        }
                        Some(choice) => State::Applying(i, choice),
                        None => {
                            self.presenter.invalid_choice(line.trim());
                            State::Presenting(i)
                        }
                    }
                }
                State::Applying(i, choice) => match self.apply(&conflicts[i], choice)? {
                    Some(outcome) => {
                        info!(path = %outcome.path, action = %outcome.action, staged = outcome.staged, "file handled");
                        self.presenter.outcome(&outcome);
                        outcomes.push(outcome);
                        if i + 1 < total {
                            State::Presenting(i + 1)
                        } else {
                            State::Done
                        }
                    }
                    None => State::Presenting(i),
                },
                State::Done => break,
            };
        }

        Ok(outcomes)
    }

    /// Apply an action choice. `Ok(None)` means the file should be shown
    /// again (the editor exited unsuccessfully).
    fn apply(
        &mut self,
        conflict: &Conflict,
        choice: Choice,
    ) -> Result<Option<ResolutionOutcome>, ResolveError> {
        let path = conflict.path.as_str();
        let outcome = |action, staged| ResolutionOutcome {
            path: path.to_string(),
            action,
            staged,
        };

        match choice {
            Choice::AcceptOurs => {
                self.accept(path, Side::Ours)?;
                Ok(Some(outcome(ResolutionAction::AcceptOurs, true)))
            }
            Choice::AcceptTheirs => {
                self.accept(path, Side::Theirs)?;
                Ok(Some(outcome(ResolutionAction::AcceptTheirs, true)))
            }
            Choice::Skip => Ok(Some(outcome(ResolutionAction::Skipped, false))),
            Choice::Edit => {
                let editor = find_editor(self.editor.as_deref())?;
                let full_path = self.repo.repo_path().join(path);
                let succeeded = self
                    .launcher
                    .launch(&editor, &full_path)
                    .map_err(|source| ResolveError::EditorLaunch {
                        editor: editor.clone(),
                        source,
                    })?;
                if !succeeded {
                    warn!(editor = %editor, path, "editor exited unsuccessfully");
                    self.presenter
                        .error(&format!("{editor} exited unsuccessfully; {path} left as is"));
                    return Ok(None);
                }

                let staged = self.confirm_stage(path)?;
                if staged {
                    self.stage(path)?;
                }
                Ok(Some(outcome(ResolutionAction::Edited, staged)))
            }
            Choice::ShowDiff | Choice::Help => Ok(None),
        }
    }

    fn accept(&self, path: &str, side: Side) -> Result<(), ResolveError> {
        self.repo
            .checkout_side(path, side)
            .map_err(|source| ResolveError::ApplyFailed {
                path: path.to_string(),
                action: format!("accept {side}"),
                source,
            })?;
        self.stage(path)
    }

    fn stage(&self, path: &str) -> Result<(), ResolveError> {
        self.repo
            .stage(path)
            .map_err(|source| ResolveError::ApplyFailed {
                path: path.to_string(),
                action: "stage".into(),
                source,
            })
    }

    /// Empty input means yes.
    fn confirm_stage(&mut self, path: &str) -> Result<bool, ResolveError> {
        let prompt = format!("Stage {path}? [Y/n]: ");
        loop {
            let answer = self
                .input
                .read_line(&prompt)?
                .ok_or(ResolveError::InputClosed)?;
            match answer.trim().to_ascii_lowercase().as_str() {
                "" | "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                other => self.presenter.invalid_choice(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictSource;
    use crate::errors::GitError;
    use crate::git::fake::FakeRepository;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};

    struct ScriptedInput {
        lines: VecDeque<String>,
    }

    impl ScriptedInput {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|l| l.to_string()).collect(),
            }
        }
    }

    impl InputSource for ScriptedInput {
        fn read_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
            Ok(self.lines.pop_front())
        }
    }

    #[derive(Default)]
    struct RecordingPresenter {
        events: Vec<String>,
    }

    impl Presenter for RecordingPresenter {
        fn present_file(
            &mut self,
            index: usize,
            total: usize,
            conflict: &Conflict,
            sections: &[ConflictSection],
        ) {
            self.events.push(format!(
                "file {}/{} {} sections={}",
                index + 1,
                total,
                conflict.path,
                sections.len()
            ));
        }
        fn present_menu(&mut self) {
            self.events.push("menu".into());
        }
        fn show_diff(&mut self, path: &str, diff: Option<&str>) {
            self.events.push(format!("diff {path} {}", diff.is_some()));
        }
        fn show_help(&mut self) {
            self.events.push("help".into());
        }
        fn invalid_choice(&mut self, input: &str) {
            self.events.push(format!("invalid {input}"));
        }
        fn error(&mut self, message: &str) {
            self.events.push(format!("error {message}"));
        }
        fn outcome(&mut self, outcome: &ResolutionOutcome) {
            self.events.push(format!("outcome {} {}", outcome.path, outcome.action));
        }
    }

    struct ScriptedLauncher {
        results: RefCell<VecDeque<io::Result<bool>>>,
        launched: RefCell<Vec<(String, PathBuf)>>,
    }

    impl ScriptedLauncher {
        fn new(results: Vec<io::Result<bool>>) -> Self {
            Self {
                results: RefCell::new(results.into()),
                launched: RefCell::new(Vec::new()),
            }
        }
    }

    impl EditorLauncher for ScriptedLauncher {
        fn launch(&self, editor: &str, path: &Path) -> io::Result<bool> {
            self.launched
                .borrow_mut()
                .push((editor.to_string(), path.to_path_buf()));
            self.results.borrow_mut().pop_front().unwrap_or(Ok(true))
        }
    }

    fn conflict(path: &str) -> Conflict {
        Conflict::new(
            path,
            "line before\n<<<<<<< HEAD\nour change\n=======\ntheir change\n>>>>>>> branch\nline after\n",
            ConflictSource::WorkingTree,
        )
    }

    fn run(
        repo: &FakeRepository,
        conflicts: &[Conflict],
        lines: &[&str],
        launcher: &ScriptedLauncher,
    ) -> (Result<Vec<ResolutionOutcome>, ResolveError>, RecordingPresenter) {
        let mut input = ScriptedInput::new(lines);
        let mut presenter = RecordingPresenter::default();
        let result = ResolutionSession::new(repo, &mut input, &mut presenter, launcher)
            .with_editor(Some("fake-editor --wait".into()))
            .resolve(conflicts);
        (result, presenter)
    }

    #[test]
    fn test_accept_theirs_end_to_end() {
        let repo = FakeRepository::new();
        let launcher = ScriptedLauncher::new(vec![]);
        let (result, presenter) = run(&repo, &[conflict("a.txt")], &["2"], &launcher);

        let outcomes = result.unwrap();
        assert_eq!(
            outcomes,
            vec![ResolutionOutcome {
                path: "a.txt".into(),
                action: ResolutionAction::AcceptTheirs,
                staged: true,
            }]
        );
        assert_eq!(repo.calls(), vec!["checkout --theirs a.txt", "add a.txt"]);
        assert_eq!(presenter.events[0], "file 1/1 a.txt sections=4");
    }

    #[test]
    fn test_accept_ours_then_skip() {
        let repo = FakeRepository::new();
        let launcher = ScriptedLauncher::new(vec![]);
        let conflicts = [conflict("a.txt"), conflict("b.txt")];
        let (result, _) = run(&repo, &conflicts, &["o", "4"], &launcher);

        let outcomes = result.unwrap();
        assert_eq!(outcomes[0].action, ResolutionAction::AcceptOurs);
        assert_eq!(outcomes[1].action, ResolutionAction::Skipped);
        assert!(!outcomes[1].staged);
        assert_eq!(repo.calls(), vec!["checkout --ours a.txt", "add a.txt"]);
    }

    #[test]
    fn test_invalid_input_represents_same_file() {
        let repo = FakeRepository::new();
        let launcher = ScriptedLauncher::new(vec![]);
        let (result, presenter) = run(&repo, &[conflict("a.txt")], &["9", "s"], &launcher);

        assert_eq!(result.unwrap().len(), 1);
        assert_eq!(
            presenter.events,
            vec![
                "file 1/1 a.txt sections=4",
                "menu",
                "invalid 9",
                "file 1/1 a.txt sections=4",
                "menu",
                "outcome a.txt skipped",
            ]
        );
    }

    #[test]
    fn test_diff_and_help_do_not_consume_file() {
        let repo = FakeRepository::new();
        let launcher = ScriptedLauncher::new(vec![]);
        let (result, presenter) = run(&repo, &[conflict("a.txt")], &["5", "?", "1"], &launcher);

        assert_eq!(result.unwrap()[0].action, ResolutionAction::AcceptOurs);
        assert!(presenter.events.contains(&"diff a.txt true".to_string()));
        assert!(presenter.events.contains(&"help".to_string()));
        let presented = presenter
            .events
            .iter()
            .filter(|e| e.starts_with("file "))
            .count();
        assert_eq!(presented, 3);
    }

    #[test]
    fn test_apply_failure_aborts_session() {
        let mut repo = FakeRepository::new();
        repo.fail_checkout = true;
        let launcher = ScriptedLauncher::new(vec![]);
        let conflicts = [conflict("a.txt"), conflict("b.txt")];
        let (result, presenter) = run(&repo, &conflicts, &["2", "2"], &launcher);

        match result {
            Err(ResolveError::ApplyFailed { path, action, source }) => {
                assert_eq!(path, "a.txt");
                assert_eq!(action, "accept theirs");
                assert!(matches!(source, GitError::CommandFailed { .. }));
            }
            other => panic!("expected ApplyFailed, got {other:?}"),
        }
        assert_eq!(repo.count_calls("add"), 0);
        assert!(!presenter.events.iter().any(|e| e.contains("b.txt")));
    }

    #[test]
    fn test_stage_failure_aborts_session() {
        let mut repo = FakeRepository::new();
        repo.fail_stage = true;
        let launcher = ScriptedLauncher::new(vec![]);
        let (result, _) = run(&repo, &[conflict("a.txt")], &["1"], &launcher);
        assert!(matches!(
            result,
            Err(ResolveError::ApplyFailed { ref action, .. }) if action == "stage"
        ));
    }

    #[test]
    fn test_eof_aborts_with_input_closed() {
        let repo = FakeRepository::new();
        let launcher = ScriptedLauncher::new(vec![]);
        let (result, _) = run(&repo, &[conflict("a.txt")], &[], &launcher);
        assert!(matches!(result, Err(ResolveError::InputClosed)));
        assert!(repo.calls().is_empty());
    }

    #[test]
    fn test_edit_stages_by_default() {
        let repo = FakeRepository::new();
        let launcher = ScriptedLauncher::new(vec![Ok(true)]);
        let (result, _) = run(&repo, &[conflict("src/a.txt")], &["3", ""], &launcher);

        let outcomes = result.unwrap();
        assert_eq!(outcomes[0].action, ResolutionAction::Edited);
        assert!(outcomes[0].staged);
        assert_eq!(repo.calls(), vec!["add src/a.txt"]);

        let launched = launcher.launched.borrow();
        assert_eq!(launched[0].0, "fake-editor --wait");
        assert_eq!(launched[0].1, Path::new("/fake/repo/src/a.txt"));
    }

    #[test]
    fn test_edit_declined_staging_leaves_file_unstaged() {
        let repo = FakeRepository::new();
        let launcher = ScriptedLauncher::new(vec![Ok(true)]);
        let (result, _) = run(&repo, &[conflict("a.txt")], &["e", "maybe", "n"], &launcher);

        let outcomes = result.unwrap();
        assert_eq!(outcomes[0].action, ResolutionAction::Edited);
        assert!(!outcomes[0].staged);
        assert!(repo.calls().is_empty());
    }

    #[test]
    fn test_editor_failure_represents_file() {
        let repo = FakeRepository::new();
        let launcher = ScriptedLauncher::new(vec![Ok(false), Ok(true)]);
        let (result, presenter) = run(&repo, &[conflict("a.txt")], &["3", "3", "y"], &launcher);

        assert!(result.unwrap()[0].staged);
        assert_eq!(launcher.launched.borrow().len(), 2);
        assert!(presenter.events.iter().any(|e| e.starts_with("error ")));
    }

    #[test]
    fn test_editor_spawn_error_aborts() {
        let repo = FakeRepository::new();
        let launcher = ScriptedLauncher::new(vec![Err(io::Error::new(
            io::ErrorKind::NotFound,
            "no such file",
        ))]);
        let (result, _) = run(&repo, &[conflict("a.txt")], &["3"], &launcher);
        assert!(matches!(
            result,
            Err(ResolveError::EditorLaunch { ref editor, .. }) if editor == "fake-editor --wait"
        ));
    }

    #[test]
    fn test_empty_conflict_list() {
        let repo = FakeRepository::new();
        let launcher = ScriptedLauncher::new(vec![]);
        let (result, presenter) = run(&repo, &[], &[], &launcher);
        assert!(result.unwrap().is_empty());
        assert!(presenter.events.is_empty());
    }

    #[test]
    fn test_choice_parse() {
        assert_eq!(Choice::parse(" 2 "), Some(Choice::AcceptTheirs));
        assert_eq!(Choice::parse("T"), Some(Choice::AcceptTheirs));
        assert_eq!(Choice::parse("?"), Some(Choice::Help));
        assert_eq!(Choice::parse("7"), None);
        assert_eq!(Choice::parse(""), None);
        assert_eq!(Choice::Edit.label(), "Edit in your editor");
    }

    #[test]
    fn test_line_input_strips_terminators() {
        let mut input = LineInput::new(io::Cursor::new("2\r\nyes\n"));
        assert_eq!(input.read_line("").unwrap().as_deref(), Some("2"));
        assert_eq!(input.read_line("").unwrap().as_deref(), Some("yes"));
        assert_eq!(input.read_line("").unwrap(), None);
    }
}
